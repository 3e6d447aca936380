//! Checkout gateway adapters for online payment settlement

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    config::GatewayConfig,
    error::{AppError, AppResult},
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Parameters for opening a checkout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub amount_cents: i64,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl SessionRequest {
    /// Build a session request whose redirect URLs land back on the
    /// borrowing's success/cancel endpoints. The provider substitutes
    /// the session identifier into the `{CHECKOUT_SESSION_ID}` slot.
    pub fn for_borrowing(
        amount_cents: i64,
        description: String,
        public_base_url: &str,
        borrowing_id: i32,
    ) -> Self {
        let base = format!(
            "{}/api/v1/borrowings/{}",
            public_base_url.trim_end_matches('/'),
            borrowing_id
        );
        Self {
            amount_cents,
            description,
            success_url: format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", base),
            cancel_url: format!("{}/cancel?session_id={{CHECKOUT_SESSION_ID}}", base),
        }
    }
}

/// Checkout session as reported by the gateway
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: Option<String>,
    pub url: Option<String>,
    pub amount_total: Option<i64>,
    pub payment_status: String,
    pub expires_at: Option<i64>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    /// Whether the session's deadline has passed at the given unix time
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.map(|t| now > t).unwrap_or(false)
    }
}

/// Payment provider behind the borrowing lifecycle. Implementations
/// must be safe to call concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    /// Open a checkout session for the given amount
    async fn create_session(&self, request: &SessionRequest) -> AppResult<CheckoutSession>;

    /// Fetch the current state of a previously opened session
    async fn get_session(&self, session_id: &str) -> AppResult<CheckoutSession>;
}

/// Stripe-backed gateway speaking the Checkout Sessions API
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, timeout_secs: u64) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, secret_key })
    }
}

#[async_trait]
impl CheckoutGateway for StripeGateway {
    async fn create_session(&self, request: &SessionRequest) -> AppResult<CheckoutSession> {
        let params = [
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.description.clone(),
            ),
        ];

        let response = self
            .http
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Checkout session request failed: {}", e))
            })?;

        read_session(response).await
    }

    async fn get_session(&self, session_id: &str) -> AppResult<CheckoutSession> {
        let response = self
            .http
            .get(format!("{}/checkout/sessions/{}", STRIPE_API_BASE, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Checkout session lookup failed: {}", e))
            })?;

        read_session(response).await
    }
}

/// Gateway used when no provider credentials are configured. Created
/// sessions carry no identifier or URL, so borrowing flows keep working
/// without online settlement.
pub struct NullGateway;

#[async_trait]
impl CheckoutGateway for NullGateway {
    async fn create_session(&self, request: &SessionRequest) -> AppResult<CheckoutSession> {
        Ok(CheckoutSession {
            id: None,
            url: None,
            amount_total: Some(request.amount_cents),
            payment_status: "unpaid".to_string(),
            expires_at: None,
        })
    }

    async fn get_session(&self, _session_id: &str) -> AppResult<CheckoutSession> {
        Err(AppError::ExternalService(
            "No checkout provider is configured".to_string(),
        ))
    }
}

/// Select the gateway implementation from configuration
pub fn build(config: &GatewayConfig) -> AppResult<Arc<dyn CheckoutGateway>> {
    match config.secret_key.as_deref() {
        Some(key) if !key.is_empty() => {
            tracing::info!("Checkout gateway enabled");
            Ok(Arc::new(StripeGateway::new(
                key.to_string(),
                config.timeout_secs,
            )?))
        }
        _ => {
            tracing::warn!("No checkout secret key configured, running with payment sessions disabled");
            Ok(Arc::new(NullGateway))
        }
    }
}

/// Open a session and cross-check the provider's reported total against
/// the locally computed charge. The local amount stays canonical; a
/// mismatch is logged and the session is used as-is.
pub(crate) async fn open_session(
    gateway: &dyn CheckoutGateway,
    request: &SessionRequest,
) -> AppResult<CheckoutSession> {
    let session = gateway.create_session(request).await?;
    if let Some(total) = session.amount_total {
        if total != request.amount_cents {
            tracing::warn!(
                computed = request.amount_cents,
                reported = total,
                "checkout session total differs from computed charge"
            );
        }
    }
    Ok(session)
}

/// Convert a charge to the gateway's integer minor units
pub(crate) fn charge_to_cents(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Internal(format!("Charge {} out of range", amount)))
}

async fn read_session(response: reqwest::Response) -> AppResult<CheckoutSession> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ExternalService(format!(
            "Checkout provider returned {}: {}",
            status, body
        )));
    }

    let session: StripeSession = response.json().await.map_err(|e| {
        AppError::ExternalService(format!("Invalid checkout provider response: {}", e))
    })?;

    Ok(session.into())
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    amount_total: Option<i64>,
    payment_status: Option<String>,
    expires_at: Option<i64>,
}

impl From<StripeSession> for CheckoutSession {
    fn from(session: StripeSession) -> Self {
        CheckoutSession {
            id: Some(session.id),
            url: session.url,
            amount_total: session.amount_total,
            payment_status: session.payment_status.unwrap_or_else(|| "unpaid".to_string()),
            expires_at: session.expires_at,
        }
    }
}
