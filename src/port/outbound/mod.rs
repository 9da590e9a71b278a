//! Outbound ports: collaborators the delivery engine calls.

pub mod marketplace;
pub mod messenger;
