//! Loan application entity and lifecycle rules
//!
//! The status enums own the transition legality rules; services consult them
//! before every mutation so an illegal transition is refused without writes.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::DateTime;
use uuid::Uuid;
use validator::Validate;

use crate::error::{WorkflowError, WorkflowResult};

/// Main approval lifecycle
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderVerification,
    Verified,
    DocumentRequested,
    Approved,
    Disbursed,
    Rejected,
}

impl ApplicationStatus {
    /// States from which rejection is still possible
    pub fn is_pre_approval(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted
                | ApplicationStatus::UnderVerification
                | ApplicationStatus::Verified
                | ApplicationStatus::DocumentRequested
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Disbursed | ApplicationStatus::Rejected)
    }

    /// Legality of a single transition
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        match (*self, next) {
            (Submitted, UnderVerification) => true,
            (UnderVerification, Verified) => true,
            (Verified, DocumentRequested) => true,
            // Re-requesting while already waiting only amends the remarks.
            (DocumentRequested, DocumentRequested) => true,
            (DocumentRequested, Verified) => true,
            (Verified, Approved) => true,
            (Approved, Disbursed) => true,
            (from, Rejected) => from.is_pre_approval(),
            _ => false,
        }
    }

    /// Refuse an illegal transition with a `Conflict`.
    pub fn ensure_transition_to(&self, next: ApplicationStatus) -> WorkflowResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(WorkflowError::Conflict(format!(
                "application cannot move from {:?} to {:?}",
                self, next
            )))
        }
    }
}

/// Distribution sub-lifecycle, orthogonal to the approval status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "marketplace_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MarketplaceStatus {
    Pending,
    Distributed,
    OffersOpen,
    OfferSelected,
}

impl MarketplaceStatus {
    /// Whether further banks may still be added to the distribution set
    pub fn accepts_distribution(&self) -> bool {
        matches!(
            self,
            MarketplaceStatus::Pending
                | MarketplaceStatus::Distributed
                | MarketplaceStatus::OffersOpen
        )
    }

    /// Whether bankers may still submit offers
    pub fn accepts_offers(&self) -> bool {
        matches!(
            self,
            MarketplaceStatus::Distributed | MarketplaceStatus::OffersOpen
        )
    }
}

/// Loan application model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct LoanApplication {
    pub id: Uuid,
    pub application_number: String,
    pub customer_id: Uuid,
    pub connector_id: Uuid,
    pub loan_category_id: Uuid,
    pub requested_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub approved_interest_rate: Option<Decimal>,
    pub approved_tenure_months: Option<i32>,
    pub disbursed_amount: Option<Decimal>,
    pub status: ApplicationStatus,
    pub marketplace_status: MarketplaceStatus,
    pub selected_offer_id: Option<Uuid>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
}

/// Request to submit a new application
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitApplicationRequest {
    pub customer_id: Uuid,
    pub loan_category_id: Uuid,
    pub requested_amount: Decimal,
    #[validate(length(max = 500))]
    pub purpose: Option<String>,
}

/// Request to record a disbursal against an approved application
#[derive(Debug, Deserialize)]
pub struct DisburseRequest {
    pub amount: Decimal,
}

/// Query for listing applications
#[derive(Debug, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<ApplicationStatus>,
    pub connector_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Generate a human-facing application number, unique by construction plus a
/// store-level unique constraint.
pub fn generate_application_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();

    format!("LA-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use ApplicationStatus::*;

        assert!(Submitted.can_transition_to(UnderVerification));
        assert!(UnderVerification.can_transition_to(Verified));
        assert!(Verified.can_transition_to(DocumentRequested));
        assert!(DocumentRequested.can_transition_to(Verified));
        assert!(Verified.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Disbursed));
    }

    #[test]
    fn test_rejection_only_before_approval() {
        use ApplicationStatus::*;

        for state in [Submitted, UnderVerification, Verified, DocumentRequested] {
            assert!(state.can_transition_to(Rejected), "{state:?}");
        }
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Disbursed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Rejected));
    }

    #[test]
    fn test_illegal_shortcuts_refused() {
        use ApplicationStatus::*;

        assert!(!Submitted.can_transition_to(Verified));
        assert!(!Submitted.can_transition_to(Approved));
        assert!(!UnderVerification.can_transition_to(Approved));
        assert!(!DocumentRequested.can_transition_to(Approved));
        assert!(!Verified.can_transition_to(Disbursed));
        assert!(!Rejected.can_transition_to(UnderVerification));
        assert!(!Disbursed.can_transition_to(Approved));
    }

    #[test]
    fn test_ensure_transition_reports_conflict() {
        let err = ApplicationStatus::Submitted
            .ensure_transition_to(ApplicationStatus::Approved)
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");

        assert!(ApplicationStatus::Verified
            .ensure_transition_to(ApplicationStatus::Approved)
            .is_ok());
    }

    #[test]
    fn test_marketplace_gating() {
        assert!(MarketplaceStatus::Pending.accepts_distribution());
        assert!(MarketplaceStatus::Distributed.accepts_distribution());
        assert!(MarketplaceStatus::OffersOpen.accepts_distribution());
        assert!(!MarketplaceStatus::OfferSelected.accepts_distribution());

        assert!(!MarketplaceStatus::Pending.accepts_offers());
        assert!(MarketplaceStatus::Distributed.accepts_offers());
        assert!(MarketplaceStatus::OffersOpen.accepts_offers());
        assert!(!MarketplaceStatus::OfferSelected.accepts_offers());
    }

    #[test]
    fn test_application_number_shape() {
        let number = generate_application_number();
        assert!(number.starts_with("LA-"));
        assert_eq!(number.len(), "LA-".len() + 8 + 1 + 6);

        let other = generate_application_number();
        // Six random alphanumerics make a same-millisecond clash implausible.
        assert_ne!(number, other);
    }
}
