//! Payment model and status/type enums

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Fines charge a premium over the regular daily fee.
pub const FINE_MULTIPLIER: Decimal = Decimal::TWO;

/// Payment lifecycle status.
///
/// Legal transitions: PENDING -> PAID, PENDING -> EXPIRED,
/// EXPIRED -> PENDING (renewal). PAID is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for PaymentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for PaymentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for PaymentStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// What a payment charges for: the rental period itself, or a late fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentKind {
    Payment,
    Fine,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Payment => "PAYMENT",
            PaymentKind::Fine => "FINE",
        }
    }
}

impl std::fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT" => Ok(PaymentKind::Payment),
            "FINE" => Ok(PaymentKind::Fine),
            _ => Err(format!("Invalid payment type: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for PaymentKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for PaymentKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for PaymentKind {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Fields for inserting a payment row
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub borrowing_id: i32,
    pub kind: PaymentKind,
    pub to_pay: Decimal,
    pub session_id: Option<String>,
    pub session_url: Option<String>,
}

/// Payment model from database.
///
/// Session fields are NULL when the checkout provider is disabled; such
/// payments carry the owed amount but cannot be settled online.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: i32,
    pub status: PaymentStatus,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: PaymentKind,
    pub borrowing_id: i32,
    pub session_url: Option<String>,
    pub session_id: Option<String>,
    /// Amount owed, computed from the book's daily fee
    #[schema(value_type = String, example = "1.50")]
    pub to_pay: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_status_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_payment_status_rejects_unknown() {
        assert!("pending".parse::<PaymentStatus>().is_err());
        assert!("CANCELLED".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_payment_kind_round_trip() {
        assert_eq!("PAYMENT".parse::<PaymentKind>(), Ok(PaymentKind::Payment));
        assert_eq!("FINE".parse::<PaymentKind>(), Ok(PaymentKind::Fine));
        assert!("REFUND".parse::<PaymentKind>().is_err());
    }

    #[test]
    fn test_fine_multiplier_value() {
        assert_eq!(FINE_MULTIPLIER, dec!(2));
    }

    #[test]
    fn test_payment_serializes_kind_as_type() {
        let payment = Payment {
            id: 1,
            status: PaymentStatus::Pending,
            kind: PaymentKind::Fine,
            borrowing_id: 7,
            session_url: None,
            session_id: None,
            to_pay: dec!(92.00),
        };
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["type"], "FINE");
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("kind").is_none());
    }
}
