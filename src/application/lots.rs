//! Listing management: toggling the seller's own lots.
//!
//! Calls are blocking marketplace requests made from the order thread.
//! Retries back off with short sleeps; failures are logged and never
//! abort the caller.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::{CategoryId, Catalog, LotId, MarkerParser};
use crate::error::MarketError;
use crate::infrastructure::config::lots::LotConfig;
use crate::port::{LotFields, LotSummary, Marketplace};

/// Result of a single listing update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotUpdate {
    Changed,
    /// The listing already had the wanted state.
    Unchanged,
}

/// Deactivates and lists the seller's lots in the handled categories.
pub struct LotManager {
    market: Arc<dyn Marketplace>,
    catalog: Arc<Catalog>,
    marker: MarkerParser,
    categories: Vec<CategoryId>,
    config: LotConfig,
}

impl LotManager {
    pub fn new(
        market: Arc<dyn Marketplace>,
        catalog: Arc<Catalog>,
        marker: MarkerParser,
        categories: Vec<CategoryId>,
        config: LotConfig,
    ) -> Self {
        Self {
            market,
            catalog,
            marker,
            categories,
            config,
        }
    }

    /// Own lots in a subcategory, falling back to a category scan.
    pub fn list_lots(&self, category: CategoryId) -> Vec<LotSummary> {
        match self.market.get_my_subcategory_lots(category) {
            Ok(lots) => {
                debug!(%category, count = lots.len(), "Listed own lots");
                return lots;
            }
            Err(err) => {
                debug!(%category, error = %err, "Subcategory listing failed, scanning categories");
            }
        }
        match self.market.scan_category_lots(category) {
            Ok(lots) => {
                debug!(%category, count = lots.len(), "Listed own lots by category scan");
                lots
            }
            Err(err) => {
                error!(%category, error = %err, "Failed to list own lots");
                Vec::new()
            }
        }
    }

    /// Set a listing's active flag, retrying with backoff.
    pub fn update_lot_state(&self, lot: LotId, active: bool) -> Result<LotUpdate, MarketError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_update(lot, active) {
                Ok(update) => return Ok(update),
                Err(err) if attempt >= self.config.update_attempts => {
                    error!(%lot, active, attempts = attempt, error = %err, "Giving up on lot update");
                    return Err(err);
                }
                Err(err) => {
                    warn!(%lot, active, attempt, error = %err, "Lot update failed, retrying");
                    std::thread::sleep(self.config.retry_backoff(attempt));
                }
            }
        }
    }

    fn try_update(&self, lot: LotId, active: bool) -> Result<LotUpdate, MarketError> {
        let fields = self.market.get_lot_fields(lot)?;
        if fields.active == active {
            return Ok(LotUpdate::Unchanged);
        }
        self.market.save_lot(&LotFields { active, ..fields })?;
        info!(%lot, active, "Lot state changed");
        Ok(LotUpdate::Changed)
    }

    /// Deactivate every active lot in the handled categories.
    pub fn deactivate_all(&self) -> Vec<LotId> {
        self.deactivate_where(|_| true)
    }

    /// Deactivate lots whose catalog price per unit exceeds `balance`.
    ///
    /// Lots without a resolvable marker are left alone.
    pub fn deactivate_above(&self, balance: u64) -> Vec<LotId> {
        self.deactivate_where(|lot| self.lot_price(lot).is_some_and(|price| price > balance))
    }

    /// Precheck price of the catalog entry a listing sells.
    #[must_use]
    pub fn lot_price(&self, lot: &LotSummary) -> Option<u64> {
        let code = self.marker.code(&lot.description)?;
        self.catalog
            .resolve(&code)
            .ok()
            .map(|plan| plan.precheck_price())
    }

    fn deactivate_where(&self, wanted: impl Fn(&LotSummary) -> bool) -> Vec<LotId> {
        let mut affected = Vec::new();
        for &category in &self.categories {
            warn!(%category, "Deactivating lots");
            let mut errors = 0u32;
            for lot in self.list_lots(category).iter().filter(|lot| wanted(lot)) {
                match self.update_lot_state(lot.id, false) {
                    Ok(LotUpdate::Changed) => {
                        affected.push(lot.id);
                        errors = 0;
                    }
                    Ok(LotUpdate::Unchanged) => {
                        debug!(lot = %lot.id, title = %lot.title, "Lot already inactive");
                    }
                    Err(_) => errors += 1,
                }
                if errors > 0 {
                    std::thread::sleep(self.config.error_backoff(errors));
                }
            }
        }
        if affected.is_empty() {
            info!("No active lots needed deactivation");
        } else {
            warn!(count = affected.len(), lots = ?affected, "Lots deactivated");
        }
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::config;
    use crate::testkit::domain::sample_catalog;
    use crate::testkit::marketplace::RecordingMarketplace;

    fn manager(market: &Arc<RecordingMarketplace>) -> LotManager {
        LotManager::new(
            Arc::clone(market) as Arc<dyn Marketplace>,
            Arc::new(sample_catalog()),
            MarkerParser::new("gift_tg").unwrap(),
            vec![CategoryId::new(3064)],
            config::lots(),
        )
    }

    #[test]
    fn test_update_is_noop_when_already_in_state() {
        let market = Arc::new(RecordingMarketplace::new());
        market.add_lot(CategoryId::new(3064), 1, "gift_tg:1", false);
        let lots = manager(&market);

        assert_eq!(
            lots.update_lot_state(LotId::new(1), false),
            Ok(LotUpdate::Unchanged)
        );
        assert!(market.saved_lots().is_empty());
    }

    #[test]
    fn test_update_retries_then_succeeds() {
        let market = Arc::new(RecordingMarketplace::new());
        market.add_lot(CategoryId::new(3064), 1, "gift_tg:1", true);
        market.fail_next_saves(2);
        let lots = manager(&market);

        assert_eq!(
            lots.update_lot_state(LotId::new(1), false),
            Ok(LotUpdate::Changed)
        );
        assert!(!market.lot_active(LotId::new(1)));
    }

    #[test]
    fn test_update_gives_up_after_attempts() {
        let market = Arc::new(RecordingMarketplace::new());
        market.add_lot(CategoryId::new(3064), 1, "gift_tg:1", true);
        market.fail_next_saves(3);
        let lots = manager(&market);

        assert!(lots.update_lot_state(LotId::new(1), false).is_err());
        assert!(market.lot_active(LotId::new(1)));
    }

    #[test]
    fn test_deactivate_above_uses_catalog_price() {
        let market = Arc::new(RecordingMarketplace::new());
        // sample catalog: code 1 costs 15, code 5 costs 50, "101" is a 2x15 + 1x25 bundle
        market.add_lot(CategoryId::new(3064), 1, "gift_tg:1", true);
        market.add_lot(CategoryId::new(3064), 2, "gift_tg:5", true);
        market.add_lot(CategoryId::new(3064), 3, "gift_tg:101", true);
        market.add_lot(CategoryId::new(3064), 4, "no marker here", true);
        let lots = manager(&market);

        let affected = lots.deactivate_above(40);

        assert_eq!(affected, vec![LotId::new(2), LotId::new(3)]);
        assert!(market.lot_active(LotId::new(1)));
        assert!(market.lot_active(LotId::new(4)));
    }

    #[test]
    fn test_deactivate_all_skips_inactive() {
        let market = Arc::new(RecordingMarketplace::new());
        market.add_lot(CategoryId::new(3064), 1, "gift_tg:1", true);
        market.add_lot(CategoryId::new(3064), 2, "gift_tg:2", false);
        let lots = manager(&market);

        assert_eq!(lots.deactivate_all(), vec![LotId::new(1)]);
    }

    #[test]
    fn test_listing_falls_back_to_category_scan() {
        let market = Arc::new(RecordingMarketplace::new());
        market.add_lot(CategoryId::new(3064), 1, "gift_tg:1", true);
        market.fail_subcategory_listing();
        let lots = manager(&market);

        assert_eq!(lots.list_lots(CategoryId::new(3064)).len(), 1);
    }
}
