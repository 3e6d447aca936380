//! Payments repository for database operations

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::payment::{NewPayment, Payment, PaymentStatus},
};

#[derive(Clone)]
pub struct PaymentsRepository {
    pool: Pool<Postgres>,
}

impl PaymentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get payment by ID. A `scope` of `Some(user_id)` restricts the
    /// lookup to payments on that borrower's borrowings.
    pub async fn get_by_id(&self, id: i32, scope: Option<i32>) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.* FROM payments p
            JOIN borrowings b ON p.borrowing_id = b.id
            WHERE p.id = $1 AND ($2::integer IS NULL OR b.user_id = $2)
            "#,
        )
        .bind(id)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment with id {} not found", id)))
    }

    /// Get payment by checkout session identifier
    pub async fn get_by_session_id(&self, session_id: &str) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Payment for session {} not found", session_id))
            })
    }

    /// List payments, newest last
    pub async fn list(&self, scope: Option<i32>) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT p.* FROM payments p
            JOIN borrowings b ON p.borrowing_id = b.id
            WHERE ($1::integer IS NULL OR b.user_id = $1)
            ORDER BY p.id
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Whether the user has any payment that is not settled yet
    pub async fn has_unpaid(&self, user_id: i32) -> AppResult<bool> {
        let unpaid: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM payments p
                JOIN borrowings b ON p.borrowing_id = b.id
                WHERE b.user_id = $1 AND p.status != $2
            )
            "#,
        )
        .bind(user_id)
        .bind(PaymentStatus::Paid)
        .fetch_one(&self.pool)
        .await?;

        Ok(unpaid)
    }

    /// Insert a pending payment within the caller's transaction
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: &NewPayment,
    ) -> AppResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (status, type, borrowing_id, session_url, session_id, to_pay)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(PaymentStatus::Pending)
        .bind(payment.kind)
        .bind(payment.borrowing_id)
        .bind(&payment.session_url)
        .bind(&payment.session_id)
        .bind(payment.to_pay)
        .fetch_one(&mut **tx)
        .await?;

        Ok(payment)
    }

    /// Settle a pending payment. Returns false when the payment was not
    /// in PENDING, so concurrent settlements resolve to a single winner.
    pub async fn mark_paid(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("UPDATE payments SET status = $1 WHERE id = $2 AND status = $3")
            .bind(PaymentStatus::Paid)
            .bind(id)
            .bind(PaymentStatus::Pending)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Expire a pending payment. Returns false when the payment already
    /// left PENDING.
    pub async fn mark_expired(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("UPDATE payments SET status = $1 WHERE id = $2 AND status = $3")
            .bind(PaymentStatus::Expired)
            .bind(id)
            .bind(PaymentStatus::Pending)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Attach a fresh checkout session to an expired payment and move it
    /// back to PENDING. Returns false when the payment was not EXPIRED.
    pub async fn renew_session(
        &self,
        id: i32,
        session_id: Option<&str>,
        session_url: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = $1, session_id = $2, session_url = $3
            WHERE id = $4 AND status = $5
            "#,
        )
        .bind(PaymentStatus::Pending)
        .bind(session_id)
        .bind(session_url)
        .bind(id)
        .bind(PaymentStatus::Expired)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending payments that have a checkout session to reconcile
    pub async fn list_pending_sessions(&self) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE status = $1 AND session_id IS NOT NULL ORDER BY id",
        )
        .bind(PaymentStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}
