//! Actor identity and capability checks
//!
//! The auth collaborator hands every request a verified `(actor_id, role)`
//! pair; the workflow trusts that pair and enforces only role capability and
//! row-level ownership. The context is passed explicitly into every workflow
//! call, never read from ambient state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};

/// Closed set of marketplace roles
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Commission-earning agent who originates customers and applications
    Connector,
    /// Verifies documents and distributes applications to banks
    Operator,
    /// Represents one bank; submits competing offers
    Banker,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Connector => "connector",
            Role::Operator => "operator",
            Role::Banker => "banker",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

/// Every state-changing workflow transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowAction {
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
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAction::SubmitApplication => "submit application",
            WorkflowAction::AttachDocument => "attach document",
            WorkflowAction::BeginVerification => "begin verification",
            WorkflowAction::VerifyDocument => "verify document",
            WorkflowAction::MarkVerified => "mark verified",
            WorkflowAction::RequestDocuments => "request documents",
            WorkflowAction::RejectApplication => "reject application",
            WorkflowAction::Distribute => "distribute application",
            WorkflowAction::RecordOfferView => "record offer view",
            WorkflowAction::SubmitOffer => "submit offer",
            WorkflowAction::SelectOffer => "select offer",
            WorkflowAction::Disburse => "disburse loan",
            WorkflowAction::AccrueCommission => "accrue commission",
            WorkflowAction::PayCommissions => "pay commissions",
        }
    }
}

impl Role {
    /// Capability check: may this role trigger the given transition?
    ///
    /// Row-level ownership (connector owns the customer, banker's bank owns
    /// the distribution) is checked separately by each service.
    pub fn may(&self, action: WorkflowAction) -> bool {
        use WorkflowAction::*;

        match action {
            SubmitApplication => matches!(self, Role::Connector),
            AttachDocument => matches!(self, Role::Connector | Role::Operator),
            BeginVerification | VerifyDocument | MarkVerified => {
                matches!(self, Role::Operator)
            }
            RequestDocuments => matches!(self, Role::Operator | Role::Banker),
            RejectApplication => {
                matches!(self, Role::Operator | Role::Admin | Role::SuperAdmin)
            }
            Distribute | SelectOffer => matches!(self, Role::Operator),
            RecordOfferView | SubmitOffer => matches!(self, Role::Banker),
            Disburse => matches!(self, Role::Banker | Role::Admin | Role::SuperAdmin),
            AccrueCommission | PayCommissions => {
                matches!(self, Role::Admin | Role::SuperAdmin)
            }
        }
    }
}

/// Verified caller identity attached to every workflow call
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub role: Role,
    /// Request origin recorded into the audit log
    pub source_addr: Option<String>,
}

impl ActorContext {
    pub fn new(actor_id: Uuid, role: Role) -> Self {
        Self {
            actor_id,
            role,
            source_addr: None,
        }
    }

    pub fn with_source(actor_id: Uuid, role: Role, source_addr: impl Into<String>) -> Self {
        Self {
            actor_id,
            role,
            source_addr: Some(source_addr.into()),
        }
    }

    /// Enforce the capability matrix; performs no writes on failure.
    pub fn require(&self, action: WorkflowAction) -> WorkflowResult<()> {
        if self.role.may(action) {
            Ok(())
        } else {
            Err(WorkflowError::AccessDenied(format!(
                "role '{}' may not {}",
                self.role.as_str(),
                action.as_str()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_capabilities() {
        assert!(Role::Connector.may(WorkflowAction::SubmitApplication));
        assert!(Role::Connector.may(WorkflowAction::AttachDocument));
        assert!(!Role::Connector.may(WorkflowAction::Distribute));
        assert!(!Role::Connector.may(WorkflowAction::SelectOffer));
        assert!(!Role::Connector.may(WorkflowAction::PayCommissions));
    }

    #[test]
    fn test_operator_capabilities() {
        assert!(Role::Operator.may(WorkflowAction::VerifyDocument));
        assert!(Role::Operator.may(WorkflowAction::Distribute));
        assert!(Role::Operator.may(WorkflowAction::SelectOffer));
        assert!(Role::Operator.may(WorkflowAction::RejectApplication));
        assert!(!Role::Operator.may(WorkflowAction::SubmitApplication));
        assert!(!Role::Operator.may(WorkflowAction::SubmitOffer));
        assert!(!Role::Operator.may(WorkflowAction::PayCommissions));
    }

    #[test]
    fn test_banker_capabilities() {
        assert!(Role::Banker.may(WorkflowAction::SubmitOffer));
        assert!(Role::Banker.may(WorkflowAction::RecordOfferView));
        assert!(Role::Banker.may(WorkflowAction::RequestDocuments));
        assert!(Role::Banker.may(WorkflowAction::Disburse));
        assert!(!Role::Banker.may(WorkflowAction::SelectOffer));
        assert!(!Role::Banker.may(WorkflowAction::VerifyDocument));
    }

    #[test]
    fn test_admin_capabilities() {
        for role in [Role::Admin, Role::SuperAdmin] {
            assert!(role.may(WorkflowAction::PayCommissions));
            assert!(role.may(WorkflowAction::AccrueCommission));
            assert!(role.may(WorkflowAction::RejectApplication));
            assert!(role.may(WorkflowAction::Disburse));
            assert!(!role.may(WorkflowAction::SubmitOffer));
            assert!(!role.may(WorkflowAction::SubmitApplication));
        }
    }

    #[test]
    fn test_require_returns_access_denied() {
        let actor = ActorContext::new(Uuid::new_v4(), Role::Connector);
        let err = actor.require(WorkflowAction::PayCommissions).unwrap_err();
        assert_eq!(err.error_code(), "ACCESS_DENIED");

        let actor = ActorContext::new(Uuid::new_v4(), Role::Admin);
        assert!(actor.require(WorkflowAction::PayCommissions).is_ok());
    }
}
