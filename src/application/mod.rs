//! Application workflow state machine.

mod model;
mod service;

pub use model::{
    generate_application_number, ApplicationListQuery, ApplicationStatus, DisburseRequest,
    LoanApplication, MarketplaceStatus, SubmitApplicationRequest,
};
pub use service::ApplicationService;
