//! Buyer-facing message templates.
//!
//! A built-in table provides every message; `messages.json` may override any
//! key. Templates use `{name}` placeholders. Placeholders without a value
//! are kept verbatim, and an unknown key renders as empty text.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::StoreError;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").ok());

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    (
        "order_start_choice",
        "✅ Thank you for your purchase!\n🧾 Item: {item_title} ×{qty} (gift of your choice)\n\n👤 Send the recipient's username (@username).",
    ),
    (
        "order_start_normal",
        "✅ Thank you for your purchase!\n🧾 To deliver: {item_title} ×{qty} at {shown_price}.\n\n👤 Send the recipients' usernames:\n• one @username to send everything to one person\n• or a list separated by commas, spaces or new lines: @u1, @u2, @u3",
    ),
    (
        "gift_not_found",
        "Code {gift_param_key}:{gift_num} does not exist. Please contact the seller.",
    ),
    ("bad_quantity", "❌ Invalid quantity. Please contact the seller."),
    (
        "precheck_balance_low_refund",
        "❌ The seller does not have enough stars.\nA full refund is being issued now.",
    ),
    (
        "precheck_balance_low_wait",
        "❌ The seller does not have enough stars.\nPlease wait for the seller to respond.",
    ),
    (
        "stars_check_unavailable",
        "⚠️ The stars balance cannot be checked right now. Your order continues; if stars run out during sending you will be told separately.",
    ),
    (
        "awaiting_nicks_bad_format",
        "❌ Invalid format. Send one @username or a list separated by commas or spaces.",
    ),
    ("awaiting_choice_one_nick", "❌ Send exactly ONE username (@username)."),
    (
        "choice_menu",
        "🎁 Choose the gift you want.\nReply with a number from the list:\n\n{menu}",
    ),
    ("choice_bad_number", "❌ Invalid number. Choose 1-{max_n}:\n\n{menu}"),
    (
        "choice_confirm",
        "✅ You picked: {gift_title}\n👤 Recipient: {recipient}\n📦 Quantity: {qty}\n\nIf everything is right, send «{confirm_token}».\nSend another number to change your pick.",
    ),
    (
        "normal_plan_confirm",
        "📦 Delivery plan: {item_title} - {plan}.\n✅ If this is right, send «{confirm_token}». Or send a new list of recipients.",
    ),
    ("normal_plan_info", "📦 Delivery plan: {item_title} - {plan}."),
    (
        "normal_plan_updated",
        "✅ Plan updated: {plan}. Send «{confirm_token}» to confirm.",
    ),
    (
        "need_plus_or_update",
        "Send «{confirm_token}» to confirm, or send a new list of recipients.",
    ),
    ("deliver_start_normal", "🚚 Sending {item_title}, {qty} in total."),
    ("deliver_start_choice", "🚚 Sending: {gift_title} ×{qty} → {recipient}"),
    (
        "send_err_balance_low",
        "⚠️ The seller ran out of stars. Delivery stopped.",
    ),
    ("send_err_flood", "⚠️ Too many requests. Please try again later."),
    (
        "send_err_spam_block",
        "⚠️ The sending account is temporarily restricted. Please try again later.",
    ),
    (
        "send_err_network",
        "⚠️ Connection problem with the messaging platform. Please try again later.",
    ),
    (
        "send_err_network_choice",
        "⚠️ Connection problem with the messaging platform. Please try again later.",
    ),
    (
        "send_err_username_not_found",
        "❌ Username not found: {recipient}. Please check the @username.",
    ),
    (
        "send_err_generic",
        "⚠️ Sending failed. Please try again later or contact the seller.",
    ),
    ("sent_success", "🎉 Sent successfully: {sent_units}."),
    ("sent_failed", "⚠️ Failed to send: {failed_units}. Reasons: {reasons}"),
    (
        "request_review",
        "🙏 Please confirm the order and leave a review: {order_url}",
    ),
    ("refund_done", "✅ Your payment has been refunded."),
    ("refund_fail", "❌ The refund failed. Please contact the seller."),
    (
        "partial_refund_amount",
        "✅ Refund for undelivered items: {units} → {stars}⭐.",
    ),
    ("partial_refund_units", "✅ Refund for {units} item(s) issued."),
    (
        "partial_refund_manual",
        "⚠️ An automatic partial refund is not available. Please contact the seller about the remainder.",
    ),
    (
        "choice_recipient_updated_with_selected",
        "✅ Recipient updated: {recipient}\n🎁 Selected: {gift_title} ×{qty}\nIf everything is right, send «{confirm_token}».",
    ),
    (
        "choice_recipient_updated_no_selected",
        "✅ Recipient: {recipient}\nNow choose the gift number.",
    ),
    (
        "choice_pick_need_recipient",
        "❌ Send the recipient's username (@username) first.",
    ),
    (
        "choice_confirm_need_plus",
        "Send «{confirm_token}» to confirm, or a number to change your pick.",
    ),
    (
        "choice_confirm_updated",
        "✅ Pick updated: {gift_title}\n👤 Recipient: {recipient}\n📦 Quantity: {qty}\n\nConfirm with «{confirm_token}».",
    ),
    ("choice_choose_first", "❌ Choose a gift first:\n\n{menu}"),
    (
        "choice_error_empty_options",
        "❌ Error: the option list is empty. Please contact the seller.",
    ),
    (
        "choice_error_gift_missing",
        "❌ Error: the selected gift is missing from the catalog. Please contact the seller.",
    ),
    (
        "choice_state_error",
        "❌ Choice state error. Please contact the seller.",
    ),
    (
        "anon_choose_prompt",
        "✅ Thank you for your purchase!\n🧾 To deliver: {item_title} ×{qty}.\n{shown_price}\n\nSend the gift anonymously?\n1) Yes (anonymous)\n2) No (show the sender)\n\nReply 1 or 2.",
    ),
    (
        "anon_choose_bad",
        "❌ Not understood. Reply 1 (anonymous) or 2 (show the sender).",
    ),
    ("anon_chosen", "✅ OK, sending: {mode}."),
    (
        "manual_override_notice",
        "👋 The seller is handling your order personally and will reply soon.",
    ),
];

/// Message table with optional overrides.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    overrides: BTreeMap<String, String>,
}

impl Templates {
    /// Built-in messages only.
    #[must_use]
    pub fn defaults() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_overrides(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Load overrides from a JSON object of key to text. A missing file
    /// means no overrides.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No message overrides");
                return Ok(Self::defaults());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let overrides = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { overrides })
    }

    /// Raw template text for `key`.
    #[must_use]
    pub fn template(&self, key: &str) -> &str {
        self.overrides
            .get(key)
            .map(String::as_str)
            .or_else(|| default_template(key))
            .unwrap_or("")
    }

    /// Render `key` with `{name}` placeholders filled from `vars`.
    #[must_use]
    pub fn render(&self, key: &str, vars: &[(&str, String)]) -> String {
        fill(self.template(key), vars)
    }

    /// Every known key with whether it is overridden.
    #[must_use]
    pub fn keys(&self) -> Vec<(String, bool)> {
        let keys: BTreeSet<&str> = DEFAULT_MESSAGES
            .iter()
            .map(|(key, _)| *key)
            .chain(self.overrides.keys().map(String::as_str))
            .collect();
        keys.into_iter()
            .map(|key| (key.to_string(), self.overrides.contains_key(key)))
            .collect()
    }

    /// Override keys that the built-in table does not know.
    #[must_use]
    pub fn unknown_overrides(&self) -> Vec<&str> {
        self.overrides
            .keys()
            .map(String::as_str)
            .filter(|key| default_template(key).is_none())
            .collect()
    }
}

fn default_template(key: &str) -> Option<&'static str> {
    DEFAULT_MESSAGES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, text)| *text)
}

/// Substitute `{name}` placeholders, keeping unknown ones as written.
#[must_use]
pub fn fill(template: &str, vars: &[(&str, String)]) -> String {
    let Some(placeholder) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    placeholder
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map_or_else(|| caps[0].to_string(), |(_, value)| value.clone())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_keeps_unknown_placeholders() {
        assert_eq!(
            fill("{a} and {b}", &[("a", "1".to_string())]),
            "1 and {b}"
        );
    }

    #[test]
    fn test_unknown_key_is_empty() {
        assert_eq!(Templates::defaults().render("no_such_key", &[]), "");
    }

    #[test]
    fn test_override_wins() {
        let templates = Templates::with_overrides(BTreeMap::from([(
            "sent_success".to_string(),
            "done: {sent_units}".to_string(),
        )]));
        assert_eq!(
            templates.render("sent_success", &[("sent_units", "3".to_string())]),
            "done: 3"
        );
    }

    #[test]
    fn test_keys_mark_overrides() {
        let templates = Templates::with_overrides(BTreeMap::from([(
            "refund_done".to_string(),
            "ok".to_string(),
        )]));
        let keys = templates.keys();
        assert!(keys.contains(&("refund_done".to_string(), true)));
        assert!(keys.contains(&("refund_fail".to_string(), false)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let templates = Templates::load(&dir.path().join("messages.json")).unwrap();
        assert!(!templates.template("request_review").is_empty());
        assert!(templates.unknown_overrides().is_empty());
    }
}
