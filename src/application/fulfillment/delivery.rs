//! Delivery loop and the order summary.
//!
//! Every ordered unit is sent to its assigned recipient, one failover-aware
//! send per gift of the unit. The loop keeps per-unit results so that
//! refunds and the summary message can be derived once it ends.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::{refunds, FulfillmentService};
use crate::application::recovery::UnitEffect;
use crate::domain::{
    expand_assignment, FailureCategory, Gift, GiftPlan, Handle, OrderState, PendingOrder,
};

/// Outcome of one order's delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Gifts delivered.
    pub sent: u32,
    /// Gifts not delivered, attempted or not.
    pub failed: u32,
    /// Distinct failure categories seen.
    pub reasons: BTreeSet<FailureCategory>,
    /// Category that stopped the loop early.
    pub stopped_by: Option<FailureCategory>,
    /// Recipients whose remaining units were skipped.
    pub not_found: Vec<Handle>,
    /// Units refunded (fully or partially).
    pub refunded_units: u32,
}

impl DeliveryReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.sent > 0
    }
}

impl FulfillmentService {
    /// Deliver a confirmed order and send its single summary message.
    pub(crate) fn deliver(&self, order: &mut PendingOrder) -> DeliveryReport {
        order.state = OrderState::Delivering;
        let hide_name = order.anonymous.unwrap_or(self.config.anonymous_gifts);

        let Some((gifts, start_text)) = self.unit_gifts(order) else {
            self.say(&order.chat_id, &self.templates.render("choice_state_error", &[]));
            return DeliveryReport::default();
        };
        self.say(&order.chat_id, &start_text);

        let assignment = expand_assignment(&order.recipients, order.quantity as usize);
        // Gifts delivered per unit. Gifts of a unit go out in order, so the
        // undelivered ones are always the tail.
        let mut delivered = vec![0usize; assignment.len()];
        let mut report = DeliveryReport::default();
        let mut blocked: BTreeSet<String> = BTreeSet::new();
        let mut generic_failure = false;

        info!(
            order = %order.order_id,
            buyer = %order.buyer,
            units = assignment.len(),
            gifts_per_unit = gifts.len(),
            hide_name,
            "Delivery started"
        );

        'units: for (unit, recipient) in assignment.iter().enumerate() {
            if blocked.contains(&recipient.key()) {
                continue;
            }
            for gift in &gifts {
                let outcome = self.pool.send_with_failover(recipient, gift.id, hide_name);
                let actions = self.recovery.apply(&self.pool, &outcome);
                if actions.deactivate_lots {
                    self.lots.deactivate_all();
                }

                if outcome.is_delivered() {
                    delivered[unit] += 1;
                    report.sent += 1;
                    continue;
                }

                let category = outcome
                    .last_failure()
                    .map_or(FailureCategory::Network, |failure| failure.category);
                report.reasons.insert(category);
                warn!(
                    order = %order.order_id,
                    %recipient,
                    unit = unit + 1,
                    %category,
                    "Unit failed"
                );
                match UnitEffect::for_category(category) {
                    UnitEffect::Stop => {
                        report.stopped_by = Some(category);
                        break 'units;
                    }
                    UnitEffect::SkipRecipient => {
                        blocked.insert(recipient.key());
                        report.not_found.push(recipient.clone());
                        continue 'units;
                    }
                    UnitEffect::Fail => {
                        generic_failure = true;
                        continue 'units;
                    }
                }
            }
        }

        let total = u32::try_from(assignment.len() * gifts.len()).unwrap_or(u32::MAX);
        report.failed = total.saturating_sub(report.sent);

        let mut notes = Vec::new();
        if let Some(category) = report.stopped_by {
            notes.push(self.stop_notice(category, order.plan.is_choice()));
            if category == FailureCategory::BalanceLow && self.config.auto_deactivate {
                let session = self.pool.get_active();
                match self.pool.get_balance(session) {
                    Some(balance) => self.lots.deactivate_above(balance),
                    None => self.lots.deactivate_all(),
                };
            }
        }
        if !report.not_found.is_empty() {
            let handles: Vec<&str> = report.not_found.iter().map(Handle::as_str).collect();
            notes.push(self.templates.render(
                "send_err_username_not_found",
                &[("recipient", handles.join(", "))],
            ));
        }
        if generic_failure {
            notes.push(self.templates.render("send_err_generic", &[]));
        }

        if self.config.auto_refund {
            let refund_all = report.stopped_by == Some(FailureCategory::BalanceLow);
            let undelivered: Vec<&[Gift]> = assignment
                .iter()
                .zip(&delivered)
                .filter(|(recipient, sent)| {
                    **sent < gifts.len() && (refund_all || blocked.contains(&recipient.key()))
                })
                .map(|(_, sent)| &gifts[*sent..])
                .collect();
            let units = u32::try_from(undelivered.len()).unwrap_or(u32::MAX);
            if units > 0 {
                report.refunded_units = units;
                let stars: u64 = undelivered
                    .iter()
                    .flat_map(|rest| rest.iter())
                    .map(|gift| gift.price)
                    .sum();
                let note = if report.sent == 0 && units == order.quantity {
                    refunds::full(self.market.as_ref(), &self.templates, &order.order_id)
                } else {
                    refunds::partial(
                        self.market.as_ref(),
                        &self.templates,
                        &order.order_id,
                        units,
                        stars,
                    )
                };
                notes.push(note);
            }
        }

        let summary = self.summary(order, &report, notes);
        self.say(&order.chat_id, &summary);

        if report.is_complete() {
            order.state = OrderState::Complete;
        }
        info!(
            order = %order.order_id,
            buyer = %order.buyer,
            sent = report.sent,
            failed = report.failed,
            refunded_units = report.refunded_units,
            complete = report.is_complete(),
            "Delivery finished"
        );
        report
    }

    /// Gifts sent per ordered unit and the delivery start message.
    fn unit_gifts(&self, order: &PendingOrder) -> Option<(Vec<Gift>, String)> {
        let recipient = order.recipients.first()?;
        match &order.plan {
            GiftPlan::Fixed(plan) => {
                let text = self.templates.render(
                    "deliver_start_normal",
                    &[
                        ("item_title", plan.title.clone()),
                        ("qty", order.quantity.to_string()),
                    ],
                );
                Some((plan.expand().into_iter().cloned().collect(), text))
            }
            GiftPlan::Choice(_) => {
                let option = order.selected_option()?;
                let text = self.templates.render(
                    "deliver_start_choice",
                    &[
                        ("gift_title", option.gift.title.clone()),
                        ("qty", order.quantity.to_string()),
                        ("recipient", recipient.to_string()),
                    ],
                );
                Some((vec![option.gift.clone()], text))
            }
        }
    }

    fn stop_notice(&self, category: FailureCategory, choice: bool) -> String {
        let key = match category {
            FailureCategory::BalanceLow => "send_err_balance_low",
            FailureCategory::Flood => "send_err_flood",
            FailureCategory::SpamBlock => "send_err_spam_block",
            FailureCategory::Network if choice => "send_err_network_choice",
            FailureCategory::Network => "send_err_network",
            FailureCategory::UsernameNotFound | FailureCategory::Other => "send_err_generic",
        };
        self.templates.render(key, &[])
    }

    fn summary(&self, order: &PendingOrder, report: &DeliveryReport, notes: Vec<String>) -> String {
        let mut parts = Vec::new();
        if report.sent > 0 {
            parts.push(
                self.templates
                    .render("sent_success", &[("sent_units", report.sent.to_string())]),
            );
        }
        if report.failed > 0 {
            let reasons: Vec<&str> = report.reasons.iter().map(|c| c.as_str()).collect();
            parts.push(self.templates.render(
                "sent_failed",
                &[
                    ("failed_units", report.failed.to_string()),
                    ("reasons", reasons.join(", ")),
                ],
            ));
        }
        parts.extend(notes);
        if report.is_complete() {
            parts.push(self.templates.render(
                "request_review",
                &[("order_url", self.review_url(order))],
            ));
        }
        parts.retain(|part| !part.trim().is_empty());
        parts.join("\n\n")
    }

    fn review_url(&self, order: &PendingOrder) -> String {
        let path = format!("{}/", order.order_id);
        url::Url::parse(&self.config.order_url_base)
            .and_then(|base| base.join(&path))
            .map_or_else(
                |_| format!("{}{path}", self.config.order_url_base),
                |url| url.to_string(),
            )
    }
}
