//! Inbound ports: events fed into the orchestrator.

pub mod event;
