//! Directory of banks, customers, loan categories and document types.

mod model;
mod service;

pub use model::{Bank, Customer, DocumentType, LoanCategory};
pub use service::DirectoryService;
