//! Programmatic access tokens for service users

pub mod sql;
pub mod workflow;

pub use workflow::{IssuedPat, PatAction, PatConfig, PatManager, PatResources, RemoveOutcome};
