//! Session worker: the pool's own single-threaded runtime.
//!
//! Messaging clients live only here. Callers talk to the worker through
//! [`Request`] messages carrying a reply channel; every request runs as its
//! own task and takes the global admission permit before touching a client,
//! so at most one platform call is in flight pool-wide.

use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use super::slot::SessionSlot;
use crate::domain::{GiftId, Handle, SendFailure};
use crate::error::SessionError;
use crate::port::{send_gift_with_variants, MessengerClient};

/// Work submitted to the session worker.
pub(crate) enum Request {
    /// Non-interactive authorization check followed by start.
    Probe {
        idx: usize,
        reply: SyncSender<bool>,
    },
    Ping {
        idx: usize,
        reply: SyncSender<bool>,
    },
    Restart {
        idx: usize,
        reply: SyncSender<bool>,
    },
    Balance {
        idx: usize,
        reply: SyncSender<Result<u64, SendFailure>>,
    },
    Send {
        idx: usize,
        recipient: Handle,
        gift: GiftId,
        hide_name: bool,
        reply: SyncSender<Result<(), SendFailure>>,
    },
    /// Stop every client and exit the worker loop.
    Shutdown { reply: SyncSender<()> },
}

/// Deadlines and cache lifetimes the worker applies to client calls.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    pub ping: Duration,
    pub restart: Duration,
    pub restart_pause: Duration,
    pub send: Duration,
    pub balance: Duration,
    pub username_ttl: Duration,
}

struct Shared {
    clients: Vec<Arc<dyn MessengerClient>>,
    slots: Arc<Vec<SessionSlot>>,
    gate: Semaphore,
    settings: WorkerSettings,
}

/// Spawn the worker thread and its runtime.
pub(crate) fn spawn(
    clients: Vec<Arc<dyn MessengerClient>>,
    slots: Arc<Vec<SessionSlot>>,
    settings: WorkerSettings,
) -> Result<(mpsc::UnboundedSender<Request>, JoinHandle<()>), SessionError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .thread_name("session-worker")
        .build()
        .map_err(SessionError::Runtime)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        clients,
        slots,
        gate: Semaphore::new(1),
        settings,
    });

    let handle = std::thread::Builder::new()
        .name("session-pool".into())
        .spawn(move || runtime.block_on(run(rx, shared)))
        .map_err(SessionError::Runtime)?;

    Ok((tx, handle))
}

async fn run(mut rx: mpsc::UnboundedReceiver<Request>, shared: Arc<Shared>) {
    debug!(sessions = shared.clients.len(), "Session worker started");
    while let Some(request) = rx.recv().await {
        if let Request::Shutdown { reply } = request {
            shutdown(&shared).await;
            let _ = reply.send(());
            break;
        }
        tokio::spawn(serve(request, Arc::clone(&shared)));
    }
    debug!("Session worker stopped");
}

async fn shutdown(shared: &Shared) {
    let _permit = shared.gate.acquire().await;
    for client in &shared.clients {
        if let Err(err) = tokio::time::timeout(shared.settings.ping, client.stop()).await {
            debug!(session = client.name(), error = %err, "Stop timed out during shutdown");
        }
    }
}

async fn serve(request: Request, shared: Arc<Shared>) {
    // Closed only if the semaphore is dropped, which cannot happen while
    // `shared` is alive.
    let Ok(_permit) = shared.gate.acquire().await else {
        return;
    };

    match request {
        Request::Probe { idx, reply } => {
            let alive = probe(&shared, idx).await;
            let _ = reply.send(alive);
        }
        Request::Ping { idx, reply } => {
            let alive = ping(&shared, idx).await;
            let _ = reply.send(alive);
        }
        Request::Restart { idx, reply } => {
            let alive = restart(&shared, idx).await;
            let _ = reply.send(alive);
        }
        Request::Balance { idx, reply } => {
            let result = balance(&shared, idx).await;
            let _ = reply.send(result);
        }
        Request::Send {
            idx,
            recipient,
            gift,
            hide_name,
            reply,
        } => {
            let result = send(&shared, idx, &recipient, gift, hide_name).await;
            let _ = reply.send(result);
        }
        Request::Shutdown { reply } => {
            let _ = reply.send(());
        }
    }
}

fn client(shared: &Shared, idx: usize) -> Option<(&dyn MessengerClient, &SessionSlot)> {
    let client = shared.clients.get(idx)?;
    let slot = shared.slots.get(idx)?;
    Some((client.as_ref(), slot))
}

async fn probe(shared: &Shared, idx: usize) -> bool {
    let Some((client, slot)) = client(shared, idx) else {
        return false;
    };
    let attempt = async {
        client.connect().await?;
        let me = client.get_me().await?;
        client.start().await?;
        Ok::<_, SendFailure>(me)
    };
    let alive = match tokio::time::timeout(shared.settings.restart, attempt).await {
        Ok(Ok(me)) => {
            info!(session = client.name(), account = me.id, "Session authorized");
            true
        }
        Ok(Err(failure)) => {
            warn!(session = client.name(), %failure, "Session failed authorization probe");
            let _ = tokio::time::timeout(shared.settings.ping, client.stop()).await;
            false
        }
        Err(_) => {
            warn!(session = client.name(), "Session probe timed out");
            false
        }
    };
    slot.set_alive(alive);
    alive
}

async fn ping(shared: &Shared, idx: usize) -> bool {
    let Some((client, _)) = client(shared, idx) else {
        return false;
    };
    matches!(
        tokio::time::timeout(shared.settings.ping, client.get_me()).await,
        Ok(Ok(_))
    )
}

async fn restart(shared: &Shared, idx: usize) -> bool {
    let Some((client, slot)) = client(shared, idx) else {
        return false;
    };
    let pause = shared.settings.restart_pause;
    let attempt = async {
        if let Err(failure) = client.stop().await {
            debug!(session = client.name(), %failure, "Stop before restart failed");
        }
        tokio::time::sleep(pause).await;
        client.connect().await?;
        client.get_me().await?;
        client.start().await
    };
    let alive = matches!(
        tokio::time::timeout(shared.settings.restart, attempt).await,
        Ok(Ok(()))
    );
    if alive {
        warn!(session = client.name(), "Session restarted");
    } else {
        warn!(session = client.name(), "Session restart failed, marking dead");
    }
    slot.set_alive(alive);
    alive
}

async fn balance(shared: &Shared, idx: usize) -> Result<u64, SendFailure> {
    let Some((client, _)) = client(shared, idx) else {
        return Err(SendFailure::Unavailable);
    };
    tokio::time::timeout(shared.settings.balance, client.stars_balance())
        .await
        .unwrap_or(Err(SendFailure::Timeout))
}

async fn send(
    shared: &Shared,
    idx: usize,
    recipient: &Handle,
    gift: GiftId,
    hide_name: bool,
) -> Result<(), SendFailure> {
    let Some((client, slot)) = client(shared, idx) else {
        return Err(SendFailure::Unavailable);
    };
    let settings = shared.settings;
    let attempt = async {
        slot.limiter().wait(&recipient.key()).await;
        let username = recipient.username();
        let peer = match slot.cached_peer(username, Instant::now()) {
            Some(peer) => peer,
            None => {
                let peer = client.resolve_user(username).await?;
                slot.store_peer(username, peer, settings.username_ttl, Instant::now());
                peer
            }
        };
        send_gift_with_variants(client, peer, gift, hide_name).await
    };
    tokio::time::timeout(settings.send, attempt)
        .await
        .unwrap_or(Err(SendFailure::Timeout))
}
