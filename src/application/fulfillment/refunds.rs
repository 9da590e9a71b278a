//! Refund chain.
//!
//! Full refunds go straight to the marketplace. Partial refunds try a
//! refund by amount, then a refund by units, and finally ask the buyer to
//! contact the seller. Each step returns the buyer-facing note to include
//! in the order summary.

use tracing::{error, info, warn};

use crate::domain::OrderId;
use crate::infrastructure::templates::Templates;
use crate::port::Marketplace;

pub(crate) fn full(market: &dyn Marketplace, templates: &Templates, order: &OrderId) -> String {
    match market.refund(order, None) {
        Ok(()) => {
            info!(%order, "Order refunded");
            templates.render("refund_done", &[])
        }
        Err(err) => {
            error!(%order, error = %err, "Refund failed");
            templates.render("refund_fail", &[])
        }
    }
}

/// Refund `stars` for `units` partly or wholly undelivered units.
pub(crate) fn partial(
    market: &dyn Marketplace,
    templates: &Templates,
    order: &OrderId,
    units: u32,
    stars: u64,
) -> String {
    if units == 0 || stars == 0 {
        return String::new();
    }

    match market.refund(order, Some(stars)) {
        Ok(()) => {
            info!(%order, units, stars, "Partial refund by amount");
            return templates.render(
                "partial_refund_amount",
                &[("units", units.to_string()), ("stars", stars.to_string())],
            );
        }
        Err(err) => warn!(%order, error = %err, "Partial refund by amount failed"),
    }

    match market.refund_partial(order, units) {
        Ok(()) => {
            info!(%order, units, "Partial refund by units");
            templates.render("partial_refund_units", &[("units", units.to_string())])
        }
        Err(err) => {
            error!(%order, units, error = %err, "Partial refund not available");
            templates.render("partial_refund_manual", &[])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::marketplace::{RecordingMarketplace, RefundCall};

    fn order() -> OrderId {
        OrderId::from("ORD1")
    }

    #[test]
    fn test_partial_prefers_amount() {
        let market = RecordingMarketplace::new();
        let note = partial(&market, &Templates::defaults(), &order(), 2, 30);

        assert_eq!(market.refunds(), vec![RefundCall::Amount(order(), 30)]);
        assert!(note.contains("30"));
    }

    #[test]
    fn test_partial_falls_back_to_units() {
        let market = RecordingMarketplace::new();
        market.refuse_amount_refunds();
        let note = partial(&market, &Templates::defaults(), &order(), 2, 30);

        assert_eq!(market.refunds(), vec![RefundCall::Units(order(), 2)]);
        assert_eq!(
            note,
            Templates::defaults().render("partial_refund_units", &[("units", "2".into())])
        );
    }

    #[test]
    fn test_partial_ends_with_manual_notice() {
        let market = RecordingMarketplace::new();
        market.refuse_amount_refunds();
        market.fail_unit_refunds();
        let note = partial(&market, &Templates::defaults(), &order(), 1, 15);

        assert!(market.refunds().is_empty());
        assert_eq!(note, Templates::defaults().render("partial_refund_manual", &[]));
    }

    #[test]
    fn test_full_refund_failure_is_reported() {
        let market = RecordingMarketplace::new();
        market.fail_refunds();
        let note = full(&market, &Templates::defaults(), &order());
        assert_eq!(note, Templates::defaults().render("refund_fail", &[]));
    }
}
