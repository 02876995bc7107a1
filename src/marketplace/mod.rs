//! Distribution & offer marketplace.

mod model;
mod service;

pub use model::{
    ApplicationDistribution, ApprovalResult, AssignedApplication, DistributeRequest,
    DistributionBatchResult, DistributionStatus, LoanOffer, OfferRequest, OfferStatus,
};
pub use service::MarketplaceService;
