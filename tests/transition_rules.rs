//! Workflow rule tests
//!
//! These tests exercise the pure transition and capability rules through the
//! public API, without a database.

use lendmarket::actor::{ActorContext, Role, WorkflowAction};
use lendmarket::application::{ApplicationStatus, MarketplaceStatus};
use lendmarket::commission::commission_amount;
use lendmarket::error::WorkflowError;
use rust_decimal_macros::dec;
use uuid::Uuid;

// ============================================================================
// Application lifecycle
// ============================================================================

#[test]
fn test_full_lifecycle_is_legal() {
    use ApplicationStatus::*;

    let path = [
        Submitted,
        UnderVerification,
        Verified,
        DocumentRequested,
        Verified,
        Approved,
        Disbursed,
    ];

    for pair in path.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "{:?} -> {:?} should be legal",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_no_transition_leaves_terminal_states() {
    use ApplicationStatus::*;

    let all = [
        Submitted,
        UnderVerification,
        Verified,
        DocumentRequested,
        Approved,
        Disbursed,
        Rejected,
    ];

    for next in all {
        assert!(!Disbursed.can_transition_to(next), "Disbursed -> {next:?}");
        assert!(!Rejected.can_transition_to(next), "Rejected -> {next:?}");
    }
}

#[test]
fn test_approval_requires_verified() {
    use ApplicationStatus::*;

    for from in [Submitted, UnderVerification, DocumentRequested, Rejected] {
        assert!(!from.can_transition_to(Approved), "{from:?} -> Approved");
    }
    assert!(Verified.can_transition_to(Approved));
}

#[test]
fn test_marketplace_closes_after_selection() {
    assert!(MarketplaceStatus::OffersOpen.accepts_offers());
    assert!(!MarketplaceStatus::OfferSelected.accepts_offers());
    assert!(!MarketplaceStatus::OfferSelected.accepts_distribution());
}

// ============================================================================
// Capability matrix
// ============================================================================

#[test]
fn test_every_action_has_an_authorized_role() {
    use WorkflowAction::*;

    let roles = [
        Role::Connector,
        Role::Operator,
        Role::Banker,
        Role::Admin,
        Role::SuperAdmin,
    ];
    let actions = [
        SubmitApplication,
        AttachDocument,
        BeginVerification,
        VerifyDocument,
        MarkVerified,
        RequestDocuments,
        RejectApplication,
        Distribute,
        RecordOfferView,
        SubmitOffer,
        SelectOffer,
        Disburse,
        AccrueCommission,
        PayCommissions,
    ];

    for action in actions {
        assert!(
            roles.iter().any(|role| role.may(action)),
            "{action:?} has no authorized role"
        );
    }
}

#[test]
fn test_marketplace_separation_of_duties() {
    // The party bidding never picks the winner, and the party picking the
    // winner never bids.
    assert!(Role::Banker.may(WorkflowAction::SubmitOffer));
    assert!(!Role::Banker.may(WorkflowAction::SelectOffer));
    assert!(Role::Operator.may(WorkflowAction::SelectOffer));
    assert!(!Role::Operator.may(WorkflowAction::SubmitOffer));

    // Connectors earn commissions; only admins settle them.
    assert!(!Role::Connector.may(WorkflowAction::PayCommissions));
    assert!(!Role::Operator.may(WorkflowAction::PayCommissions));
    assert!(Role::Admin.may(WorkflowAction::PayCommissions));
}

#[test]
fn test_denied_capability_reports_access_denied() {
    let banker = ActorContext::new(Uuid::new_v4(), Role::Banker);
    let err = banker.require(WorkflowAction::SelectOffer).unwrap_err();
    assert!(matches!(err, WorkflowError::AccessDenied(_)));
    assert_eq!(err.error_code(), "ACCESS_DENIED");
}

// ============================================================================
// Commission arithmetic
// ============================================================================

#[test]
fn test_commission_for_standard_loan() {
    // ₹500,000 at the 1% default earns ₹5,000.
    assert_eq!(commission_amount(dec!(500000), dec!(1.0)), dec!(5000.00));
}

#[test]
fn test_commission_uses_category_percentage() {
    assert_eq!(commission_amount(dec!(750000), dec!(0.5)), dec!(3750.00));
    assert_eq!(commission_amount(dec!(1250000), dec!(1.25)), dec!(15625.00));
}
