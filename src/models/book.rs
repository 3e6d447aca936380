//! Book model and related types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Cover type of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoverType {
    Hard,
    Soft,
}

impl CoverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverType::Hard => "HARD",
            CoverType::Soft => "SOFT",
        }
    }
}

impl std::fmt::Display for CoverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CoverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HARD" => Ok(CoverType::Hard),
            "SOFT" => Ok(CoverType::Soft),
            _ => Err(format!("Invalid cover type: {}", s)),
        }
    }
}

// SQLx conversions for CoverType (stored as VARCHAR)
impl sqlx::Type<Postgres> for CoverType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for CoverType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for CoverType {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Book model from database. Inventory is mutated only by the borrowing
/// lifecycle, inside the same transaction as the borrowing/payment writes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub cover: CoverType,
    pub inventory: i32,
    /// Rental fee per day, two fractional digits
    #[schema(value_type = String, example = "0.50")]
    pub daily_fee: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_type_round_trip() {
        assert_eq!("HARD".parse::<CoverType>(), Ok(CoverType::Hard));
        assert_eq!("SOFT".parse::<CoverType>(), Ok(CoverType::Soft));
        assert_eq!(CoverType::Hard.as_str(), "HARD");
        assert_eq!(CoverType::Soft.to_string(), "SOFT");
    }

    #[test]
    fn test_cover_type_rejects_free_form() {
        assert!("hard".parse::<CoverType>().is_err());
        assert!("PAPERBACK".parse::<CoverType>().is_err());
        assert!("".parse::<CoverType>().is_err());
    }
}
