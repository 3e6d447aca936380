//! Business logic services

pub mod borrowings;
pub mod gateway;
pub mod notifier;
pub mod overdue;
pub mod payments;

use crate::{
    config::{GatewayConfig, NotifierConfig},
    error::AppResult,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub borrowings: borrowings::BorrowingsService,
    pub payments: payments::PaymentsService,
    pub overdue: overdue::OverdueService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        gateway_config: &GatewayConfig,
        notifier_config: &NotifierConfig,
    ) -> AppResult<Self> {
        let gateway = gateway::build(gateway_config)?;
        let notifier = notifier::Notifier::new(notifier_config)?;
        let public_base_url = gateway_config.public_base_url.clone();

        Ok(Self {
            borrowings: borrowings::BorrowingsService::new(
                repository.clone(),
                gateway.clone(),
                notifier.clone(),
                public_base_url.clone(),
            ),
            payments: payments::PaymentsService::new(
                repository.clone(),
                gateway,
                notifier.clone(),
                public_base_url,
            ),
            overdue: overdue::OverdueService::new(repository, notifier),
        })
    }
}
