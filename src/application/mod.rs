//! Application services (use cases).
//!
//! These services coordinate the domain types and the collaborator ports to
//! turn marketplace events into gift deliveries.

pub mod fulfillment;
pub mod limiter;
pub mod lots;
pub mod orchestrator;
pub mod recovery;
pub mod session;
