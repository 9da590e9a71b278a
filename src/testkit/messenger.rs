//! Scripted [`MessengerClient`] for session pool and delivery tests.
//!
//! Authorization, balance and per-call send results are scripted up front.
//! Every accepted gift is recorded with the username it was resolved from,
//! so tests can assert who received what.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{GiftId, PeerId, SendFailure};
use crate::port::{AccountIdentity, GiftRequest, MessengerClient, RequestVariant};

/// One gift the scripted client accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentGift {
    pub username: String,
    pub gift: GiftId,
    pub hide_name: bool,
    pub variant: RequestVariant,
}

#[derive(Default)]
struct Directory {
    by_name: HashMap<String, PeerId>,
    by_peer: HashMap<PeerId, String>,
}

// ---------------------------------------------------------------------------
// ScriptedMessenger
// ---------------------------------------------------------------------------

/// A messaging account with scripted behavior.
///
/// Send results are popped per call from a queue and default to success
/// when it is exhausted.
pub struct ScriptedMessenger {
    name: String,
    authorized: AtomicBool,
    balance: Mutex<Option<u64>>,
    accepted_variant: Option<RequestVariant>,
    unknown_users: HashSet<String>,
    send_results: Mutex<VecDeque<Result<(), SendFailure>>>,
    directory: Mutex<Directory>,
    sent: Mutex<Vec<SentGift>>,
    resolve_count: AtomicU32,
    stop_count: AtomicU32,
}

impl ScriptedMessenger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorized: AtomicBool::new(true),
            balance: Mutex::new(Some(10_000)),
            accepted_variant: None,
            unknown_users: HashSet::new(),
            send_results: Mutex::new(VecDeque::new()),
            directory: Mutex::new(Directory::default()),
            sent: Mutex::new(Vec::new()),
            resolve_count: AtomicU32::new(0),
            stop_count: AtomicU32::new(0),
        }
    }

    /// Fail every identity check.
    #[must_use]
    pub fn unauthorized(self) -> Self {
        self.authorized.store(false, Ordering::SeqCst);
        self
    }

    #[must_use]
    pub fn with_balance(self, balance: u64) -> Self {
        *self.balance.lock() = Some(balance);
        self
    }

    /// Fail every balance query.
    #[must_use]
    pub fn without_balance(self) -> Self {
        *self.balance.lock() = None;
        self
    }

    /// Only accept this request variant; others fail as unsupported.
    #[must_use]
    pub fn accepting_only(mut self, variant: RequestVariant) -> Self {
        self.accepted_variant = Some(variant);
        self
    }

    /// Usernames that fail to resolve.
    #[must_use]
    pub fn with_unknown_users(mut self, usernames: &[&str]) -> Self {
        self.unknown_users = usernames.iter().map(|u| u.to_ascii_lowercase()).collect();
        self
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    pub fn set_balance(&self, balance: Option<u64>) {
        *self.balance.lock() = balance;
    }

    /// Queue the result of the next send call.
    pub fn push_send(&self, result: Result<(), SendFailure>) {
        self.send_results.lock().push_back(result);
    }

    /// Gifts accepted so far.
    pub fn sent(&self) -> Vec<SentGift> {
        self.sent.lock().clone()
    }

    pub fn resolve_count(&self) -> u32 {
        self.resolve_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::SeqCst)
    }

    fn check_authorized(&self) -> Result<(), SendFailure> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SendFailure::other("AUTH_KEY_UNREGISTERED"))
        }
    }
}

#[async_trait]
impl MessengerClient for ScriptedMessenger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), SendFailure> {
        Ok(())
    }

    async fn start(&self) -> Result<(), SendFailure> {
        self.check_authorized()
    }

    async fn stop(&self) -> Result<(), SendFailure> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_me(&self) -> Result<AccountIdentity, SendFailure> {
        self.check_authorized()?;
        Ok(AccountIdentity {
            id: 1,
            username: Some(self.name.clone()),
        })
    }

    async fn stars_balance(&self) -> Result<u64, SendFailure> {
        self.check_authorized()?;
        (*self.balance.lock()).ok_or_else(|| SendFailure::Network("balance unavailable".into()))
    }

    async fn resolve_user(&self, username: &str) -> Result<PeerId, SendFailure> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);
        let key = username.to_ascii_lowercase();
        if self.unknown_users.contains(&key) {
            return Err(SendFailure::RecipientNotFound);
        }
        let mut directory = self.directory.lock();
        let next = PeerId::new(1_000 + directory.by_name.len() as i64);
        let peer = *directory.by_name.entry(key.clone()).or_insert(next);
        directory.by_peer.insert(peer, key);
        Ok(peer)
    }

    async fn send_gift(&self, request: &GiftRequest) -> Result<bool, SendFailure> {
        if self
            .accepted_variant
            .is_some_and(|accepted| accepted != request.variant)
        {
            return Err(SendFailure::Unsupported(request.variant.field_name().into()));
        }
        if let Some(result) = self.send_results.lock().pop_front() {
            result?;
        }
        let username = self
            .directory
            .lock()
            .by_peer
            .get(&request.peer)
            .cloned()
            .unwrap_or_default();
        self.sent.lock().push(SentGift {
            username,
            gift: request.gift,
            hide_name: request.hide_name,
            variant: request.variant,
        });
        Ok(true)
    }
}
