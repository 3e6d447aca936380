//! Borrowing lifecycle service: creation, return, fine assessment

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrowing::{
            BorrowingDetails, BorrowingQuery, CreateBorrowingRequest, ReturnBorrowingRequest,
        },
        payment::{NewPayment, PaymentKind, FINE_MULTIPLIER},
        user::UserClaims,
    },
    repository::Repository,
    services::{
        gateway::{self, CheckoutGateway, SessionRequest},
        notifier::Notifier,
    },
};

#[derive(Clone)]
pub struct BorrowingsService {
    repository: Repository,
    gateway: Arc<dyn CheckoutGateway>,
    notifier: Notifier,
    public_base_url: String,
}

impl BorrowingsService {
    pub fn new(
        repository: Repository,
        gateway: Arc<dyn CheckoutGateway>,
        notifier: Notifier,
        public_base_url: String,
    ) -> Self {
        Self {
            repository,
            gateway,
            notifier,
            public_base_url,
        }
    }

    /// List borrowings visible to the caller. Staff see everything and
    /// may narrow to one borrower with `user_id`; other callers always
    /// get their own rows and the `user_id` filter is ignored.
    pub async fn list_borrowings(
        &self,
        claims: &UserClaims,
        query: &BorrowingQuery,
    ) -> AppResult<Vec<BorrowingDetails>> {
        let active = query.active_filter()?;
        let user_filter = if claims.is_staff {
            query.user_id
        } else {
            Some(claims.user_id)
        };

        self.repository.borrowings.list(user_filter, active).await
    }

    /// Get one borrowing with its book and payment history
    pub async fn get_borrowing(
        &self,
        claims: &UserClaims,
        borrowing_id: i32,
    ) -> AppResult<BorrowingDetails> {
        self.repository
            .borrowings
            .get_details(borrowing_id, claims.visibility())
            .await
    }

    /// Create a borrowing: reserve a copy, open a checkout session for
    /// the rental charge and record the pending payment, all in one
    /// transaction. A gateway failure aborts the whole operation.
    pub async fn create_borrowing(
        &self,
        claims: &UserClaims,
        request: CreateBorrowingRequest,
    ) -> AppResult<BorrowingDetails> {
        if request.borrow_date > request.expected_return_date {
            return Err(AppError::Validation(
                "Borrow date cannot be after the expected return date".to_string(),
            ));
        }

        // Verify the borrower exists; a token can outlive its account
        let user = self.repository.users.get_by_id(claims.user_id).await?;

        if self.repository.payments.has_unpaid(claims.user_id).await? {
            return Err(AppError::Validation(
                "Settle your pending payments and fines before creating a new borrowing"
                    .to_string(),
            ));
        }

        let mut tx = self.repository.pool.begin().await?;

        let book = self
            .repository
            .books
            .lock_by_id(&mut tx, request.book_id)
            .await?;
        if book.inventory < 1 {
            return Err(AppError::Validation(
                "No copies of this book are currently available".to_string(),
            ));
        }

        let borrowing = self
            .repository
            .borrowings
            .insert(&mut tx, claims.user_id, &request)
            .await?;
        self.repository
            .books
            .decrement_inventory(&mut tx, book.id)
            .await?;

        let charge = rental_charge(
            borrowing.borrow_date,
            borrowing.expected_return_date,
            book.daily_fee,
        );
        let session_request = SessionRequest::for_borrowing(
            gateway::charge_to_cents(charge)?,
            session_description(PaymentKind::Payment, borrowing.id, &book.title),
            &self.public_base_url,
            borrowing.id,
        );
        let session = gateway::open_session(self.gateway.as_ref(), &session_request).await?;

        self.repository
            .payments
            .insert(
                &mut tx,
                &NewPayment {
                    borrowing_id: borrowing.id,
                    kind: PaymentKind::Payment,
                    to_pay: charge,
                    session_id: session.id,
                    session_url: session.url,
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            borrowing_id = borrowing.id,
            book_id = book.id,
            user_id = claims.user_id,
            "borrowing created"
        );

        let message = borrowing_created_message(
            &user.email,
            &book.title,
            borrowing.expected_return_date,
        );
        let notifier = self.notifier.clone();
        tokio::spawn(async move { notifier.send(&message).await });

        self.repository.borrowings.get_details(borrowing.id, None).await
    }

    /// Close a borrowing: record the return date, put the copy back and
    /// assess a fine when the book comes back late. Runs in one
    /// transaction so a concurrent return sees either nothing or all
    /// of it.
    pub async fn return_borrowing(
        &self,
        claims: &UserClaims,
        borrowing_id: i32,
        request: ReturnBorrowingRequest,
    ) -> AppResult<BorrowingDetails> {
        let mut tx = self.repository.pool.begin().await?;

        let borrowing = self
            .repository
            .borrowings
            .lock_by_id(&mut tx, borrowing_id, claims.visibility())
            .await?;

        if borrowing.actual_return_date.is_some() {
            return Err(AppError::Validation(
                "This borrowing has already been returned".to_string(),
            ));
        }
        if request.actual_return_date < borrowing.borrow_date {
            return Err(AppError::Validation(
                "Actual return date cannot be before the borrow date".to_string(),
            ));
        }

        self.repository
            .borrowings
            .set_returned(&mut tx, borrowing.id, request.actual_return_date)
            .await?;

        let book = self
            .repository
            .books
            .lock_by_id(&mut tx, borrowing.book_id)
            .await?;
        self.repository
            .books
            .increment_inventory(&mut tx, book.id)
            .await?;

        if request.actual_return_date > borrowing.expected_return_date {
            let fine = fine_charge(
                borrowing.expected_return_date,
                request.actual_return_date,
                book.daily_fee,
            );
            let session_request = SessionRequest::for_borrowing(
                gateway::charge_to_cents(fine)?,
                session_description(PaymentKind::Fine, borrowing.id, &book.title),
                &self.public_base_url,
                borrowing.id,
            );
            let session = gateway::open_session(self.gateway.as_ref(), &session_request).await?;

            self.repository
                .payments
                .insert(
                    &mut tx,
                    &NewPayment {
                        borrowing_id: borrowing.id,
                        kind: PaymentKind::Fine,
                        to_pay: fine,
                        session_id: session.id,
                        session_url: session.url,
                    },
                )
                .await?;

            tracing::info!(borrowing_id = borrowing.id, fine = %fine, "late return fined");
        }

        tx.commit().await?;

        tracing::info!(borrowing_id = borrowing.id, "borrowing returned");

        self.repository.borrowings.get_details(borrowing.id, None).await
    }
}

/// Rental charge for the planned borrowing period. Same-day periods
/// cost nothing.
pub(crate) fn rental_charge(
    borrow_date: NaiveDate,
    expected_return_date: NaiveDate,
    daily_fee: Decimal,
) -> Decimal {
    let days = (expected_return_date - borrow_date).num_days();
    Decimal::from(days) * daily_fee
}

/// Fine for the days a book came back after its expected return date
pub(crate) fn fine_charge(
    expected_return_date: NaiveDate,
    actual_return_date: NaiveDate,
    daily_fee: Decimal,
) -> Decimal {
    let days_overdue = (actual_return_date - expected_return_date).num_days();
    Decimal::from(days_overdue) * daily_fee * FINE_MULTIPLIER
}

/// Product name shown on the checkout page
pub(crate) fn session_description(kind: PaymentKind, borrowing_id: i32, book_title: &str) -> String {
    match kind {
        PaymentKind::Payment => format!("Borrowing #{} of {}", borrowing_id, book_title),
        PaymentKind::Fine => format!("Fine for borrowing #{} of {}", borrowing_id, book_title),
    }
}

pub(crate) fn borrowing_created_message(
    email: &str,
    book_title: &str,
    expected_return_date: NaiveDate,
) -> String {
    format!(
        "User {} has just borrowed the {} book. It is expected to be returned by {}.",
        email, book_title, expected_return_date
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rental_charge_three_days() {
        let charge = rental_charge(date(2024, 3, 1), date(2024, 3, 4), dec!(0.50));
        assert_eq!(charge, dec!(1.50));
    }

    #[test]
    fn test_rental_charge_same_day_is_zero() {
        let charge = rental_charge(date(2024, 3, 1), date(2024, 3, 1), dec!(0.50));
        assert_eq!(charge, dec!(0.00));
    }

    #[test]
    fn test_fine_charge_applies_multiplier() {
        // expected 2024-03-04, returned 2024-06-04: 92 days late at 0.50/day
        let fine = fine_charge(date(2024, 3, 4), date(2024, 6, 4), dec!(0.50));
        assert_eq!(fine, dec!(92.00));
    }

    #[test]
    fn test_fine_charge_one_day() {
        let fine = fine_charge(date(2024, 3, 4), date(2024, 3, 5), dec!(0.50));
        assert_eq!(fine, dec!(1.00));
    }

    #[test]
    fn test_session_descriptions() {
        assert_eq!(
            session_description(PaymentKind::Payment, 3, "Kobzar"),
            "Borrowing #3 of Kobzar"
        );
        assert_eq!(
            session_description(PaymentKind::Fine, 3, "Kobzar"),
            "Fine for borrowing #3 of Kobzar"
        );
    }

    #[test]
    fn test_borrowing_created_message() {
        let message =
            borrowing_created_message("reader@example.com", "Kobzar", date(2024, 3, 4));
        assert_eq!(
            message,
            "User reader@example.com has just borrowed the Kobzar book. \
             It is expected to be returned by 2024-03-04."
        );
    }
}
