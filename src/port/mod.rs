//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!     MarketEvent ──▶│      Application        │
//!                    │  Orchestrator + Pool    │
//!                    └───────────┬─────────────┘
//!                ┌───────────────┴──────────────┐
//!                ▼                              ▼
//!         ┌─────────────┐               ┌───────────────┐
//!         │ Marketplace │               │MessengerClient│
//!         │  (blocking) │               │ (async, x N)  │
//!         └─────────────┘               └───────────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`Marketplace`] - orders, chat, refunds, listings
//! - [`MessengerClient`] - one messaging account: identity, balance, lookup, gift send
//! - [`MarketEvent`] - inbound order and chat events

pub mod inbound;
pub mod outbound;

pub use inbound::event::{ChatMessage, MarketEvent};
pub use outbound::marketplace::{LotFields, LotSummary, MarketOrder, Marketplace};
pub use outbound::messenger::{
    send_gift_with_variants, AccountIdentity, GiftRequest, MessengerClient, RequestVariant,
};
