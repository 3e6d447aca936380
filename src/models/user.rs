//! User model and JWT claims

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// User model from database. Accounts are provisioned out of band; the
/// server only reads them for scoping and notification texts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub is_staff: bool,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Borrower email
    pub sub: String,
    pub user_id: i32,
    pub is_staff: bool,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Row scope for reads: `None` means unrestricted (staff), otherwise
    /// queries are limited to the caller's own borrowings and payments.
    pub fn visibility(&self) -> Option<i32> {
        (!self.is_staff).then_some(self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(is_staff: bool) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "reader@example.com".to_string(),
            user_id: 42,
            is_staff,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let claims = claims(true);
        let token = claims.create_token("test-secret").unwrap();
        let parsed = UserClaims::from_token(&token, "test-secret").unwrap();
        assert_eq!(parsed.sub, claims.sub);
        assert_eq!(parsed.user_id, 42);
        assert!(parsed.is_staff);
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let token = claims(false).create_token("test-secret").unwrap();
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_visibility_scope() {
        assert_eq!(claims(true).visibility(), None);
        assert_eq!(claims(false).visibility(), Some(42));
    }
}
