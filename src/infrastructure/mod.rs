//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! business logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`catalog`] - Gift and bundle files
//! - [`config`] - Configuration loading and validation
//! - [`raise`] - Periodic listing raise timer
//! - [`templates`] - Buyer-facing message templates

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod raise;
pub mod templates;
