//! Marketplace- and platform-agnostic domain types.

pub mod catalog;
pub mod failure;
pub mod id;
pub mod order;
pub mod recipient;

pub use catalog::{Bundle, BundleItem, Catalog, ChoiceOption, ChoicePlan, FixedPlan, Gift, GiftPlan};
pub use failure::{classify, FailureCategory, SendFailure};
pub use id::{BuyerId, CategoryId, ChatId, GiftId, LotId, OrderId, PeerId};
pub use order::{AnonymityMode, MarkerParser, OrderState, PendingOrder};
pub use recipient::{expand_assignment, parse_recipients, Handle};
