//! Commission entities and computation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Commission settlement state
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "commission_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Earned,
    Paid,
}

/// Commission accrued to a connector for one application. Unique per
/// (application, connector); never re-earned once paid.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct CommissionRecord {
    pub id: Uuid,
    pub application_id: Uuid,
    pub connector_id: Uuid,
    pub commission_percent: Decimal,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request to settle a batch of earned commissions
#[derive(Debug, Deserialize, Validate)]
pub struct PayBatchRequest {
    #[validate(length(min = 1))]
    pub commission_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub payment_reference: String,
}

/// Outcome of a batch payment
#[derive(Debug, Serialize)]
pub struct PaymentResult {
    pub paid: Vec<CommissionRecord>,
    pub total_amount: Decimal,
    pub payment_reference: String,
    /// Requested ids that were not in `earned` state
    pub skipped: Vec<Uuid>,
}

/// Commission owed for an approved amount at the given percentage, rounded
/// to paise.
pub fn commission_amount(approved_amount: Decimal, percent: Decimal) -> Decimal {
    (approved_amount * percent / Decimal::ONE_HUNDRED).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_commission_amount() {
        assert_eq!(commission_amount(dec!(500000), dec!(1.0)), dec!(5000.00));
        assert_eq!(commission_amount(dec!(500000), dec!(0.75)), dec!(3750.00));
        assert_eq!(commission_amount(dec!(100000), dec!(2.5)), dec!(2500.00));
    }

    #[test]
    fn test_commission_amount_rounds_to_paise() {
        // 333333 * 1.1% = 3666.663
        assert_eq!(commission_amount(dec!(333333), dec!(1.1)), dec!(3666.66));
    }

    #[test]
    fn test_zero_percent_earns_nothing() {
        assert_eq!(commission_amount(dec!(500000), dec!(0)), dec!(0.00));
    }
}
