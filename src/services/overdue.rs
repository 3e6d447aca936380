//! Overdue borrowing scan and notifications

use chrono::{Duration, NaiveDate, Utc};

use crate::{
    error::AppResult, models::borrowing::OverdueBorrowing, repository::Repository,
    services::notifier::Notifier,
};

pub(crate) const NO_OVERDUE_MESSAGE: &str = "There are no overdue borrowings.";

#[derive(Clone)]
pub struct OverdueService {
    repository: Repository,
    notifier: Notifier,
}

impl OverdueService {
    pub fn new(repository: Repository, notifier: Notifier) -> Self {
        Self { repository, notifier }
    }

    /// Scan for open borrowings due tomorrow or earlier and send one
    /// notification per borrowing. When none qualify, a single
    /// all-clear message goes out instead. Returns the number of
    /// overdue borrowings found.
    pub async fn scan_and_notify(&self) -> AppResult<usize> {
        let cutoff = Utc::now().date_naive() + Duration::days(1);
        let overdue = self.repository.borrowings.list_overdue(cutoff).await?;

        if overdue.is_empty() {
            self.notifier.send(NO_OVERDUE_MESSAGE).await;
            return Ok(0);
        }

        for borrowing in &overdue {
            self.notifier.send(&overdue_message(borrowing)).await;
        }

        tracing::info!(count = overdue.len(), "overdue borrowings reported");
        Ok(overdue.len())
    }
}

fn overdue_message(borrowing: &OverdueBorrowing) -> String {
    format!(
        "User {} has not returned the {} book yet. \
         Expected return date for this borrowing was {}.",
        borrowing.user_email, borrowing.book_title, borrowing.expected_return_date
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overdue_message() {
        let borrowing = OverdueBorrowing {
            id: 5,
            expected_return_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            user_email: "reader@example.com".to_string(),
            book_title: "Kobzar".to_string(),
        };
        assert_eq!(
            overdue_message(&borrowing),
            "User reader@example.com has not returned the Kobzar book yet. \
             Expected return date for this borrowing was 2024-03-04."
        );
    }
}
