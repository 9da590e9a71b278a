//! Giftcourier - marketplace gift order fulfillment.
//!
//! Watches paid marketplace orders, collects recipients from the buyer in
//! chat and delivers gifts through a pool of messaging accounts, with
//! per-account send pacing, failover, refunds and listing deactivation.
//!
//! # Architecture
//!
//! - [`domain`] - catalog plans, recipients, order state, failure categories
//! - [`port`] - marketplace and messenger collaborator traits, inbound events
//! - [`application`] - rate limiter, session pool, recovery, fulfillment,
//!   orchestrator, listing management
//! - [`infrastructure`] - configuration, logging, data files, templates,
//!   raise timer and the composition root
//! - [`adapter`] - operator CLI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::mpsc;
//! # use std::sync::Arc;
//! use giftcourier::infrastructure::bootstrap::Engine;
//! use giftcourier::infrastructure::config::settings::Config;
//! # fn clients() -> (Arc<dyn giftcourier::port::Marketplace>, Vec<Arc<dyn giftcourier::port::MessengerClient>>) { unimplemented!() }
//!
//! # fn main() -> giftcourier::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let (market, sessions) = clients();
//! let mut engine = Engine::builder(config).market(market).sessions(sessions).build()?;
//! let (events, rx) = mpsc::channel();
//! # drop(events);
//! engine.orchestrator.run(rx);
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
