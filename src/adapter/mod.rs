//! Adapters at the edge of the engine.

pub mod inbound;
