//! lendmarket - loan origination marketplace workflow engine
//!
//! Connectors submit customer loan applications, operators verify documents
//! and distribute applications to banks, bankers submit competing offers,
//! and a winning offer is selected, approved and disbursed. Commission is
//! computed for connectors and settled in batches.
//!
//! This crate is the workflow core: request handling, authentication token
//! issuance, file uploads and outbound delivery live in separate layers
//! behind the contracts in [`actor`] and [`notify`].

pub mod actor;
pub mod application;
pub mod audit;
pub mod commission;
pub mod config;
pub mod db;
pub mod directory;
pub mod document;
pub mod error;
pub mod marketplace;
pub mod notify;
pub mod state;
pub mod telemetry;
