//! Messaging-platform port: one authenticated account per client.
//!
//! Clients are only ever called from the session pool's worker runtime.
//! Failures cross this boundary as [`SendFailure`] so the delivery engine
//! never inspects library-specific error text directly.

use async_trait::async_trait;

use crate::domain::{GiftId, PeerId, SendFailure};

/// Identity returned by a liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub id: i64,
    pub username: Option<String>,
}

/// Request shapes accepted by different platform library builds.
///
/// Tried in [`RequestVariant::ALL`] order until one is not rejected as
/// [`SendFailure::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVariant {
    GiftId,
    StarGiftId,
}

impl RequestVariant {
    pub const ALL: [Self; 2] = [Self::GiftId, Self::StarGiftId];

    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::GiftId => "gift_id",
            Self::StarGiftId => "star_gift_id",
        }
    }
}

/// A single gift send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GiftRequest {
    pub peer: PeerId,
    pub gift: GiftId,
    pub hide_name: bool,
    pub variant: RequestVariant,
}

/// Messaging-platform account client.
#[async_trait]
pub trait MessengerClient: Send + Sync {
    /// Session name used for logging and configuration.
    fn name(&self) -> &str;

    /// Open a connection without any interactive login.
    async fn connect(&self) -> Result<(), SendFailure>;

    async fn start(&self) -> Result<(), SendFailure>;

    async fn stop(&self) -> Result<(), SendFailure>;

    /// Identity call; fails when the session is not authorized.
    async fn get_me(&self) -> Result<AccountIdentity, SendFailure>;

    async fn stars_balance(&self) -> Result<u64, SendFailure>;

    async fn resolve_user(&self, username: &str) -> Result<PeerId, SendFailure>;

    /// Send one gift. `Ok(false)` means the platform accepted the call but
    /// reported no delivery.
    async fn send_gift(&self, request: &GiftRequest) -> Result<bool, SendFailure>;
}

/// Send a gift trying each request variant in order.
///
/// Only [`SendFailure::Unsupported`] moves on to the next variant; any other
/// failure is returned as is.
pub async fn send_gift_with_variants(
    client: &dyn MessengerClient,
    peer: PeerId,
    gift: GiftId,
    hide_name: bool,
) -> Result<(), SendFailure> {
    let mut last = SendFailure::Unsupported("no request variant accepted".to_string());
    for variant in RequestVariant::ALL {
        let request = GiftRequest {
            peer,
            gift,
            hide_name,
            variant,
        };
        match client.send_gift(&request).await {
            Ok(true) => return Ok(()),
            Ok(false) => return Err(SendFailure::other("gift send returned false")),
            Err(SendFailure::Unsupported(reason)) => {
                tracing::debug!(
                    session = client.name(),
                    variant = variant.field_name(),
                    %reason,
                    "Gift request variant rejected, trying next"
                );
                last = SendFailure::Unsupported(reason);
            }
            Err(failure) => return Err(failure),
        }
    }
    Err(last)
}
