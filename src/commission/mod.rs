//! Commission engine.

mod model;
mod service;

pub use model::{
    commission_amount, CommissionRecord, CommissionStatus, PayBatchRequest, PaymentResult,
};
pub use service::CommissionService;
