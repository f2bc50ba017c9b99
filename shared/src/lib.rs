//! Shared types and models for the PharmStock platform
//!
//! This crate contains the persistence-free parts of the stock core: domain
//! models, the FEFO allocation planner, the purchase order state machine,
//! and validation helpers shared between the backend services and tests.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
