//! Borrowings repository for database operations

use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrowing::{Borrowing, BorrowingDetails, CreateBorrowingRequest, OverdueBorrowing},
        payment::Payment,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.borrow_date, b.expected_return_date, b.actual_return_date,
           b.book_id, b.user_id,
           u.email AS user_email,
           bk.title AS book_title, bk.author AS book_author, bk.cover AS book_cover,
           bk.inventory AS book_inventory, bk.daily_fee AS book_daily_fee
    FROM borrowings b
    JOIN books bk ON b.book_id = bk.id
    JOIN users u ON b.user_id = u.id
"#;

#[derive(Clone)]
pub struct BorrowingsRepository {
    pool: Pool<Postgres>,
}

impl BorrowingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get borrowing by ID. A `scope` of `Some(user_id)` restricts the
    /// lookup to that borrower's rows; rows outside the scope read as
    /// absent rather than forbidden.
    pub async fn get_by_id(&self, id: i32, scope: Option<i32>) -> AppResult<Borrowing> {
        sqlx::query_as::<_, Borrowing>(
            "SELECT * FROM borrowings WHERE id = $1 AND ($2::integer IS NULL OR user_id = $2)",
        )
        .bind(id)
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    /// Get borrowing by ID holding a row lock until the caller's
    /// transaction ends
    pub async fn lock_by_id(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
        scope: Option<i32>,
    ) -> AppResult<Borrowing> {
        sqlx::query_as::<_, Borrowing>(
            r#"
            SELECT * FROM borrowings
            WHERE id = $1 AND ($2::integer IS NULL OR user_id = $2)
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(scope)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    /// Get borrowing with its book and payment history
    pub async fn get_details(&self, id: i32, scope: Option<i32>) -> AppResult<BorrowingDetails> {
        let sql = format!(
            "{} WHERE b.id = $1 AND ($2::integer IS NULL OR b.user_id = $2)",
            DETAILS_SELECT
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(scope)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))?;

        let mut details = details_from_row(&row);
        details.payments =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE borrowing_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(details)
    }

    /// List borrowings with their books and payment histories.
    /// `user_filter` limits rows to one borrower, `active` to open or
    /// closed borrowings; both pass through when `None`.
    pub async fn list(
        &self,
        user_filter: Option<i32>,
        active: Option<bool>,
    ) -> AppResult<Vec<BorrowingDetails>> {
        let sql = format!(
            r#"{}
            WHERE ($1::integer IS NULL OR b.user_id = $1)
              AND ($2::boolean IS NULL OR (b.actual_return_date IS NULL) = $2)
            ORDER BY b.id
            "#,
            DETAILS_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(user_filter)
            .bind(active)
            .fetch_all(&self.pool)
            .await?;

        let mut result: Vec<BorrowingDetails> = rows.iter().map(details_from_row).collect();

        let ids: Vec<i32> = result.iter().map(|b| b.id).collect();
        if !ids.is_empty() {
            let payments = sqlx::query_as::<_, Payment>(
                "SELECT * FROM payments WHERE borrowing_id = ANY($1) ORDER BY id",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

            let mut by_borrowing: HashMap<i32, Vec<Payment>> = HashMap::new();
            for payment in payments {
                by_borrowing.entry(payment.borrowing_id).or_default().push(payment);
            }
            for details in &mut result {
                if let Some(payments) = by_borrowing.remove(&details.id) {
                    details.payments = payments;
                }
            }
        }

        Ok(result)
    }

    /// Insert a new borrowing within the caller's transaction
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        request: &CreateBorrowingRequest,
    ) -> AppResult<Borrowing> {
        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            INSERT INTO borrowings (borrow_date, expected_return_date, book_id, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.borrow_date)
        .bind(request.expected_return_date)
        .bind(request.book_id)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(borrowing)
    }

    /// Record the return date within the caller's transaction
    pub async fn set_returned(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
        actual_return_date: NaiveDate,
    ) -> AppResult<()> {
        sqlx::query("UPDATE borrowings SET actual_return_date = $1 WHERE id = $2")
            .bind(actual_return_date)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// List open borrowings due on or before the given date, joined with
    /// borrower email and book title for notifications
    pub async fn list_overdue(&self, due_on_or_before: NaiveDate) -> AppResult<Vec<OverdueBorrowing>> {
        let overdue = sqlx::query_as::<_, OverdueBorrowing>(
            r#"
            SELECT b.id, b.expected_return_date,
                   u.email AS user_email, bk.title AS book_title
            FROM borrowings b
            JOIN users u ON b.user_id = u.id
            JOIN books bk ON b.book_id = bk.id
            WHERE b.actual_return_date IS NULL AND b.expected_return_date <= $1
            ORDER BY b.expected_return_date, b.id
            "#,
        )
        .bind(due_on_or_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(overdue)
    }
}

fn details_from_row(row: &PgRow) -> BorrowingDetails {
    let actual_return_date: Option<NaiveDate> = row.get("actual_return_date");
    BorrowingDetails {
        id: row.get("id"),
        borrow_date: row.get("borrow_date"),
        expected_return_date: row.get("expected_return_date"),
        actual_return_date,
        is_active: actual_return_date.is_none(),
        user_email: row.get("user_email"),
        book: Book {
            id: row.get("book_id"),
            title: row.get("book_title"),
            author: row.get("book_author"),
            cover: row.get("book_cover"),
            inventory: row.get("book_inventory"),
            daily_fee: row.get("book_daily_fee"),
        },
        payments: Vec::new(),
    }
}
