//! Engine harness: a wired engine over the in-memory collaborators.

use std::sync::Arc;
use std::time::Instant;

use giftcourier::domain::{BuyerId, PendingOrder};
use giftcourier::infrastructure::bootstrap::Engine;
use giftcourier::infrastructure::config::settings::Config;
use giftcourier::infrastructure::templates::Templates;
use giftcourier::port::{MarketEvent, Marketplace, MessengerClient};
use giftcourier::testkit::config;
use giftcourier::testkit::domain::{chat, sample_catalog};
use giftcourier::testkit::marketplace::RecordingMarketplace;
use giftcourier::testkit::messenger::ScriptedMessenger;

pub struct TestEngine {
    pub engine: Engine,
    pub market: Arc<RecordingMarketplace>,
    pub sessions: Vec<Arc<ScriptedMessenger>>,
}

impl TestEngine {
    /// One session named `main` with the given balance.
    pub fn single(balance: u64) -> Self {
        Self::build(
            config::app(&["main"], false),
            vec![ScriptedMessenger::new("main").with_balance(balance)],
            RecordingMarketplace::new(),
        )
    }

    pub fn build(
        config: Config,
        sessions: Vec<ScriptedMessenger>,
        market: RecordingMarketplace,
    ) -> Self {
        let market = Arc::new(market);
        let sessions: Vec<Arc<ScriptedMessenger>> = sessions.into_iter().map(Arc::new).collect();
        let clients = sessions
            .iter()
            .map(|session| Arc::clone(session) as Arc<dyn MessengerClient>)
            .collect();
        let engine = Engine::builder(config)
            .market(Arc::clone(&market) as Arc<dyn Marketplace>)
            .sessions(clients)
            .catalog(sample_catalog())
            .templates(Templates::defaults())
            .build()
            .expect("engine builds");
        Self {
            engine,
            market,
            sessions,
        }
    }

    pub fn handle(&mut self, event: MarketEvent) {
        self.engine.orchestrator.handle(event);
    }

    pub fn handle_at(&mut self, event: MarketEvent, now: Instant) {
        self.engine.orchestrator.handle_at(event, now);
    }

    /// Everything sent to `buyer`'s chat.
    pub fn chat(&self, buyer: u64) -> Vec<String> {
        self.market.messages_to(&chat(buyer))
    }

    pub fn last_message(&self, buyer: u64) -> String {
        self.chat(buyer).pop().unwrap_or_default()
    }

    pub fn pending(&self, buyer: u64) -> Option<&PendingOrder> {
        self.engine.orchestrator.pending(BuyerId::new(buyer))
    }

    pub fn completed(&self, buyer: u64) -> bool {
        self.engine.orchestrator.is_completed(BuyerId::new(buyer))
    }

    /// Gifts accepted across every session.
    pub fn sent_count(&self) -> usize {
        self.sessions.iter().map(|session| session.sent().len()).sum()
    }
}

impl Drop for TestEngine {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}
