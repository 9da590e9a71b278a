//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`marketplace`] - `RecordingMarketplace`, an in-memory [`Marketplace`](crate::port::Marketplace)
//! - [`messenger`] - `ScriptedMessenger`, a scripted [`MessengerClient`](crate::port::MessengerClient)
//! - [`domain`] - Canonical catalog, orders and chat events
//! - [`config`] - Canonical test configurations with delays disabled

pub mod config;
pub mod domain;
pub mod marketplace;
pub mod messenger;
