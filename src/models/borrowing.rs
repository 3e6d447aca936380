//! Borrowing model and request/response types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};
use crate::models::book::Book;
use crate::models::payment::Payment;

/// Borrowing model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrowing {
    pub id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub book_id: i32,
    pub user_id: i32,
}

impl Borrowing {
    /// A borrowing is active until the book has been returned.
    pub fn is_active(&self) -> bool {
        self.actual_return_date.is_none()
    }
}

/// Borrowing with its book and payment history, as served by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowingDetails {
    pub id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub is_active: bool,
    pub user_email: String,
    pub book: Book,
    pub payments: Vec<Payment>,
}

/// Request to create a borrowing
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBorrowingRequest {
    pub book_id: i32,
    #[schema(example = "2024-03-01")]
    pub borrow_date: NaiveDate,
    #[schema(example = "2024-03-04")]
    pub expected_return_date: NaiveDate,
}

/// Request to return a borrowed book
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnBorrowingRequest {
    #[schema(example = "2024-03-04")]
    pub actual_return_date: NaiveDate,
}

/// Query parameters for borrowing list
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct BorrowingQuery {
    /// Filter by borrower, honored for staff callers only
    pub user_id: Option<i32>,
    /// "true" keeps open borrowings, "false" returned ones
    pub is_active: Option<String>,
}

impl BorrowingQuery {
    /// Parses the `is_active` filter. Only the literals "true" and
    /// "false" are accepted; anything else is a validation error.
    pub fn active_filter(&self) -> AppResult<Option<bool>> {
        match self.is_active.as_deref() {
            None => Ok(None),
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            Some(other) => Err(AppError::Validation(format!(
                "Invalid is_active value '{}', expected 'true' or 'false'",
                other
            ))),
        }
    }
}

/// Row shape for the overdue scan: borrowing joined with borrower and book
#[derive(Debug, Clone, FromRow)]
pub struct OverdueBorrowing {
    pub id: i32,
    pub expected_return_date: NaiveDate,
    pub user_email: String,
    pub book_title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(value: Option<&str>) -> BorrowingQuery {
        BorrowingQuery {
            user_id: None,
            is_active: value.map(String::from),
        }
    }

    #[test]
    fn test_active_filter_accepts_exact_literals() {
        assert_eq!(query(Some("true")).active_filter().unwrap(), Some(true));
        assert_eq!(query(Some("false")).active_filter().unwrap(), Some(false));
        assert_eq!(query(None).active_filter().unwrap(), None);
    }

    #[test]
    fn test_active_filter_rejects_everything_else() {
        for bad in ["True", "FALSE", "1", "0", "yes", ""] {
            assert!(query(Some(bad)).active_filter().is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_is_active_follows_actual_return_date() {
        let mut borrowing = Borrowing {
            id: 1,
            borrow_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            expected_return_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            actual_return_date: None,
            book_id: 1,
            user_id: 1,
        };
        assert!(borrowing.is_active());
        borrowing.actual_return_date = NaiveDate::from_ymd_opt(2024, 3, 3);
        assert!(!borrowing.is_active());
    }
}
