//! Order handling configuration.

use std::time::Duration;

use serde::Deserialize;

use super::limiter::secs;
use crate::domain::{AnonymityMode, CategoryId};

/// How orders are accepted, confirmed and settled.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderConfig {
    /// Refund automatically when an order cannot be fulfilled.
    #[serde(default = "default_true")]
    pub auto_refund: bool,
    /// Deactivate listings the sessions cannot afford.
    #[serde(default = "default_true")]
    pub auto_deactivate: bool,
    /// Seller-side anonymity flag used by [`AnonymityMode::Seller`].
    #[serde(default)]
    pub anonymous_gifts: bool,
    #[serde(default)]
    pub anonymity_mode: AnonymityMode,
    /// Marketplace subcategories handled automatically.
    #[serde(default = "default_category_ids")]
    pub category_ids: Vec<u32>,
    /// Per-buyer debounce window (seconds).
    #[serde(default = "default_reply_cooldown")]
    pub reply_cooldown_secs: f64,
    /// Check the session balance before asking for recipients.
    #[serde(default = "default_true")]
    pub precheck_balance: bool,
    /// Require the buyer to confirm the plan before delivery.
    #[serde(default = "default_true")]
    pub require_confirmation: bool,
    #[serde(default = "default_confirm_token")]
    pub confirm_token: String,
    /// Keyword of the catalog marker in listing descriptions.
    #[serde(default = "default_marker_key")]
    pub marker_key: String,
    /// Minimum spacing of the manual-handling notice per buyer (seconds).
    #[serde(default = "default_manual_notice_cooldown")]
    pub manual_notice_cooldown_secs: u64,
    /// Base URL of order pages used in review requests.
    #[serde(default = "default_order_url_base")]
    pub order_url_base: String,
}

const fn default_true() -> bool {
    true
}

pub(crate) fn default_category_ids() -> Vec<u32> {
    vec![3064, 2418]
}

const fn default_reply_cooldown() -> f64 {
    1.0
}

fn default_confirm_token() -> String {
    "+".into()
}

fn default_marker_key() -> String {
    "gift_tg".into()
}

const fn default_manual_notice_cooldown() -> u64 {
    60
}

fn default_order_url_base() -> String {
    "https://funpay.com/orders/".into()
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            auto_refund: true,
            auto_deactivate: true,
            anonymous_gifts: false,
            anonymity_mode: AnonymityMode::Seller,
            category_ids: default_category_ids(),
            reply_cooldown_secs: default_reply_cooldown(),
            precheck_balance: true,
            require_confirmation: true,
            confirm_token: default_confirm_token(),
            marker_key: default_marker_key(),
            manual_notice_cooldown_secs: default_manual_notice_cooldown(),
            order_url_base: default_order_url_base(),
        }
    }
}

impl OrderConfig {
    #[must_use]
    pub fn categories(&self) -> Vec<CategoryId> {
        self.category_ids.iter().copied().map(CategoryId::new).collect()
    }

    #[must_use]
    pub fn reply_cooldown(&self) -> Duration {
        secs(self.reply_cooldown_secs)
    }

    #[must_use]
    pub const fn manual_notice_cooldown(&self) -> Duration {
        Duration::from_secs(self.manual_notice_cooldown_secs)
    }
}
