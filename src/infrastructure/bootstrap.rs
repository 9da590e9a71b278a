//! Composition root for the delivery engine.
//!
//! Wires the marketplace and messaging collaborators together with the
//! catalog, templates, session pool, listing manager and orchestrator.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::fulfillment::FulfillmentService;
use crate::application::limiter::RateLimits;
use crate::application::lots::LotManager;
use crate::application::orchestrator::Orchestrator;
use crate::application::recovery::RecoveryPolicy;
use crate::application::session::SessionPool;
use crate::domain::{Catalog, MarkerParser};
use crate::error::Result;
use crate::infrastructure::catalog::load_catalog;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::raise::Raiser;
use crate::infrastructure::templates::Templates;
use crate::port::{Marketplace, MessengerClient};

/// A wired engine ready to consume events.
pub struct Engine {
    pub orchestrator: Orchestrator,
    pool: Arc<SessionPool>,
    raiser: Option<Raiser>,
}

impl Engine {
    #[must_use]
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Stop the raise timer and the session worker.
    pub fn shutdown(&mut self) {
        if let Some(mut raiser) = self.raiser.take() {
            raiser.stop();
        }
        self.pool.shutdown();
    }
}

/// Builder for [`Engine`].
///
/// Catalog and templates are loaded from the configured data files unless
/// set explicitly.
pub struct EngineBuilder {
    config: Config,
    market: Option<Arc<dyn Marketplace>>,
    clients: Vec<Arc<dyn MessengerClient>>,
    catalog: Option<Catalog>,
    templates: Option<Templates>,
}

impl EngineBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            market: None,
            clients: Vec::new(),
            catalog: None,
            templates: None,
        }
    }

    #[must_use]
    pub fn market(mut self, market: Arc<dyn Marketplace>) -> Self {
        self.market = Some(market);
        self
    }

    /// Messaging clients, one per configured session name, in order.
    #[must_use]
    pub fn sessions(mut self, clients: Vec<Arc<dyn MessengerClient>>) -> Self {
        self.clients = clients;
        self
    }

    #[must_use]
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn templates(mut self, templates: Templates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.config;
        config.validate()?;
        let market = self.market.ok_or(crate::error::ConfigError::MissingField {
            field: "marketplace client",
        })?;

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => load_catalog(&config.data)?,
        };
        let catalog = Arc::new(catalog);
        let templates = match self.templates {
            Some(templates) => templates,
            None => Templates::load(&config.data.messages)?,
        };
        for key in templates.unknown_overrides() {
            warn!(key, "Message override has no built-in counterpart");
        }
        let templates = Arc::new(templates);

        if self.clients.len() != config.sessions.sessions.len() {
            warn!(
                clients = self.clients.len(),
                configured = config.sessions.sessions.len(),
                "Session client count differs from configured session names"
            );
        }
        let pool = Arc::new(SessionPool::start(
            self.clients,
            &config.sessions,
            RateLimits::from(&config.limits),
        )?);

        let marker = MarkerParser::new(&config.orders.marker_key)?;
        let categories = config.orders.categories();
        let lots = Arc::new(LotManager::new(
            Arc::clone(&market),
            Arc::clone(&catalog),
            marker.clone(),
            categories.clone(),
            config.lots.clone(),
        ));

        let fulfillment = FulfillmentService::new(
            Arc::clone(&market),
            Arc::clone(&pool),
            catalog,
            Arc::clone(&templates),
            lots,
            RecoveryPolicy::new(config.recovery.clone()),
            marker,
            config.orders.clone(),
        );
        let orchestrator = Orchestrator::new(fulfillment, Arc::clone(&market), templates);

        let raiser = if config.lots.auto_raise {
            Some(Raiser::spawn(
                market,
                categories,
                config.lots.raise_interval(),
            )?)
        } else {
            None
        };

        info!(
            sessions = pool.len(),
            active = pool.name(pool.get_active()),
            auto_raise = raiser.is_some(),
            "Engine ready"
        );
        Ok(Engine {
            orchestrator,
            pool,
            raiser,
        })
    }
}
