//! Books repository for database operations

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult},
    models::book::Book,
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get book by ID holding a row lock until the caller's transaction ends
    pub async fn lock_by_id(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Take one copy off the shelf. Fails when no copies are left, which
    /// keeps inventory non-negative even without the row lock.
    pub async fn decrement_inventory(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE books SET inventory = inventory - 1 WHERE id = $1 AND inventory > 0")
                .bind(id)
                .execute(&mut **tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(
                "No copies of this book are currently available".to_string(),
            ));
        }
        Ok(())
    }

    /// Put a returned copy back on the shelf
    pub async fn increment_inventory(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> AppResult<()> {
        sqlx::query("UPDATE books SET inventory = inventory + 1 WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
