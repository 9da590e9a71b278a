//! Send failures and their classification.
//!
//! Messaging adapters report failures as a typed [`SendFailure`]. The
//! delivery engine only reasons about the six [`FailureCategory`] values;
//! [`SendFailure::category`] maps structured variants directly and falls
//! back to [`classify`] for raw text carried by [`SendFailure::Other`].

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

/// Failure category driving recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureCategory {
    BalanceLow,
    UsernameNotFound,
    Flood,
    SpamBlock,
    Network,
    Other,
}

impl FailureCategory {
    /// Transient categories stop the current delivery loop but leave other
    /// sessions worth trying.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::BalanceLow | Self::Flood | Self::SpamBlock | Self::Network
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BalanceLow => "balance_low",
            Self::UsernameNotFound => "username_not_found",
            Self::Flood => "flood",
            Self::SpamBlock => "spam_block",
            Self::Network => "network",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a messaging client or by the session worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// Platform flood control. `retry_after` is set when the platform said
    /// how long to wait.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The platform refuses to deliver to peers from this account.
    #[error("peer rejected by anti-spam")]
    PeerRejected,

    #[error("account restricted")]
    AccountRestricted,

    #[error("not enough stars")]
    InsufficientBalance,

    #[error("recipient not found")]
    RecipientNotFound,

    #[error("network error: {0}")]
    Network(String),

    /// The session worker did not answer in time.
    #[error("session call timed out")]
    Timeout,

    /// No session could be tried.
    #[error("no usable session")]
    Unavailable,

    /// The client does not accept this request shape.
    #[error("unsupported request: {0}")]
    Unsupported(String),

    #[error("{raw}")]
    Other { raw: String },
}

impl SendFailure {
    pub fn other(raw: impl Into<String>) -> Self {
        Self::Other { raw: raw.into() }
    }

    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::RateLimited { .. } => FailureCategory::Flood,
            Self::PeerRejected | Self::AccountRestricted => FailureCategory::SpamBlock,
            Self::InsufficientBalance => FailureCategory::BalanceLow,
            Self::RecipientNotFound => FailureCategory::UsernameNotFound,
            Self::Network(_) | Self::Timeout | Self::Unavailable => FailureCategory::Network,
            Self::Unsupported(_) => FailureCategory::Other,
            Self::Other { raw } => classify(raw),
        }
    }

    /// Platform-requested wait, from the structured payload or the raw text.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Other { raw } => extract_wait(raw),
            _ => None,
        }
    }
}

const SPAM_BLOCK_SIGNS: &[&str] = &["peer_flood", "peerflood", "spam", "user_restricted"];
const FLOOD_SIGNS: &[&str] = &["flood", "too many requests", "slowmode", "slow_mode"];
const BALANCE_SIGNS: &[&str] = &[
    "balance_too_low",
    "balance too low",
    "not enough stars",
    "insufficient",
    "payments.sendstarsform",
    "недостат",
];
const NOT_FOUND_SIGNS: &[&str] = &[
    "username_not_occupied",
    "username_invalid",
    "provided username is not occupied",
    "contacts.resolveusername",
    "peer_id_invalid",
    "user not found",
];
const NETWORK_SIGNS: &[&str] = &[
    "connection lost",
    "connection reset",
    "connection refused",
    "socket.send()",
    "timed out",
    "timeout",
    "network",
    "nonetype' object has no attribute 'read'",
    "read() called while another coroutine",
];

/// Classify raw failure text.
///
/// Total over all inputs: unmatched text, including the empty string, is
/// [`FailureCategory::Other`].
#[must_use]
pub fn classify(raw: &str) -> FailureCategory {
    let lower = raw.to_lowercase();
    let any = |signs: &[&str]| signs.iter().any(|sign| lower.contains(sign));

    if any(SPAM_BLOCK_SIGNS) {
        FailureCategory::SpamBlock
    } else if any(FLOOD_SIGNS) {
        FailureCategory::Flood
    } else if any(BALANCE_SIGNS) {
        FailureCategory::BalanceLow
    } else if any(NOT_FOUND_SIGNS) {
        FailureCategory::UsernameNotFound
    } else if any(NETWORK_SIGNS) {
        FailureCategory::Network
    } else {
        FailureCategory::Other
    }
}

static WAIT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)flood_wait_(\d+)",
        r"(?i)wait of (\d+) seconds",
        r"(?i)retry after (\d+)",
        r"(?i)wait (\d+) ?s",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Extract an explicit wait in seconds from failure text.
#[must_use]
pub fn extract_wait(raw: &str) -> Option<Duration> {
    WAIT_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .map(Duration::from_secs)
    })
}
