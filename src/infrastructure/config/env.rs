//! Environment variable overrides.
//!
//! Deployments configure the bot through a `.env` file with flat upper-case
//! keys. Every key present in the environment replaces the matching file
//! value; malformed values are logged and ignored.

use tracing::warn;

use super::order::default_category_ids;
use super::settings::Config;
use crate::domain::AnonymityMode;

/// Parse a boolean flag. `1`, `true`, `yes`, `y` and `on` are true.
#[must_use]
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Parse a category id list split on commas, semicolons or whitespace.
///
/// Returns the ids and the rejected tokens. An empty id list falls back to
/// the default categories.
#[must_use]
pub fn parse_id_list(raw: &str) -> (Vec<u32>, Vec<String>) {
    let mut ids = Vec::new();
    let mut rejected = Vec::new();
    for token in raw
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match token.parse::<u32>() {
            Ok(id) => ids.push(id),
            Err(_) => rejected.push(token.to_string()),
        }
    }
    if ids.is_empty() {
        ids = default_category_ids();
    }
    (ids, rejected)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn number<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        warn!(key, value = raw, "Ignoring malformed environment value");
    }
    parsed
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let orders = &mut config.orders;
    if let Some(v) = lookup("AUTO_REFUND") {
        orders.auto_refund = parse_bool(&v);
    }
    if let Some(v) = lookup("AUTO_DEACTIVATE") {
        orders.auto_deactivate = parse_bool(&v);
    }
    if let Some(v) = lookup("ANONYMOUS_GIFTS") {
        orders.anonymous_gifts = parse_bool(&v);
    }
    if let Some(v) = lookup("ANONYMOUS_MODE") {
        orders.anonymity_mode = AnonymityMode::parse_lenient(&v);
    }
    if let Some(v) = lookup("CATEGORY_IDS").or_else(|| lookup("CATEGORY_ID")) {
        let (ids, rejected) = parse_id_list(&v);
        if !rejected.is_empty() {
            warn!(?rejected, "Category list contains non-numeric tokens");
        }
        orders.category_ids = ids;
    }
    if let Some(v) = lookup("REPLY_COOLDOWN_SECONDS").and_then(|v| number("REPLY_COOLDOWN_SECONDS", &v)) {
        orders.reply_cooldown_secs = v;
    }
    if let Some(v) = lookup("PRECHECK_BALANCE") {
        orders.precheck_balance = parse_bool(&v);
    }
    if let Some(v) = lookup("REQUIRE_PLUS_CONFIRMATION") {
        orders.require_confirmation = parse_bool(&v);
    }
    if let Some(v) = lookup("GIFT_PARAM_KEY") {
        orders.marker_key = v.trim().to_string();
    }

    let limits = &mut config.limits;
    if let Some(v) = lookup("MIN_SEND_DELAY").and_then(|v| number("MIN_SEND_DELAY", &v)) {
        limits.min_send_delay_secs = v;
    }
    if let Some(v) = lookup("PER_RECIPIENT_DELAY").and_then(|v| number("PER_RECIPIENT_DELAY", &v)) {
        limits.per_recipient_delay_secs = v;
    }
    if let Some(v) = lookup("BURST_WINDOW_SECONDS").and_then(|v| number("BURST_WINDOW_SECONDS", &v)) {
        limits.burst_window_secs = v;
    }
    if let Some(v) = lookup("BURST_MAX_SENDS").and_then(|v| number("BURST_MAX_SENDS", &v)) {
        limits.burst_max_sends = v;
    }
    if let Some(v) = lookup("SEND_JITTER").and_then(|v| number("SEND_JITTER", &v)) {
        limits.send_jitter_secs = v;
    }

    let recovery = &mut config.recovery;
    if let Some(v) = lookup("FLOODWAIT_EXTRA_SLEEP").and_then(|v| number("FLOODWAIT_EXTRA_SLEEP", &v)) {
        recovery.flood_extra_secs = v;
    }
    if let Some(v) = lookup("SPAMBLOCK_PAUSE_SECONDS").and_then(|v| number("SPAMBLOCK_PAUSE_SECONDS", &v)) {
        recovery.spam_block_pause_secs = v;
    }
    if let Some(v) = lookup("AUTO_DEACTIVATE_ON_FLOODWAIT") {
        recovery.deactivate_on_flood = parse_bool(&v);
    }
    if let Some(v) = lookup("FLOOD_DEACTIVATE_COOLDOWN").and_then(|v| number("FLOOD_DEACTIVATE_COOLDOWN", &v)) {
        recovery.flood_deactivate_cooldown_secs = v;
    }
    if let Some(v) = lookup("TG_FAILOVER_NETWORK_PAUSE").and_then(|v| number("TG_FAILOVER_NETWORK_PAUSE", &v)) {
        recovery.network_pause_secs = v;
    }

    let sessions = &mut config.sessions;
    if let Some(v) = lookup("TG_SESSIONS") {
        sessions.sessions = parse_list(&v);
    }
    if let Some(v) = lookup("TG_PRIMARY_SESSION").filter(|v| !v.trim().is_empty()) {
        sessions.primary = v.trim().to_string();
    }
    if let Some(v) = lookup("TG_AUTO_SWITCH") {
        sessions.auto_switch = parse_bool(&v);
    }
    if let Some(v) = lookup("TG_AUTO_SELECT_FOR_PRECHECK") {
        sessions.auto_select_for_precheck = parse_bool(&v);
    }
    if let Some(v) = lookup("TG_BALANCE_CACHE_SECONDS").and_then(|v| number("TG_BALANCE_CACHE_SECONDS", &v)) {
        sessions.balance_cache_secs = v;
    }
    if let Some(v) = lookup("USERNAME_CACHE_TTL").and_then(|v| number("USERNAME_CACHE_TTL", &v)) {
        sessions.username_cache_ttl_secs = v;
    }
}
