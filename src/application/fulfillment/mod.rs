//! Per-buyer order fulfillment.
//!
//! [`FulfillmentService::open`] turns a paid marketplace order into a
//! [`PendingOrder`] (or rejects it), and [`FulfillmentService::handle_message`]
//! advances that order with each chat message from its buyer until delivery
//! finishes. The service holds no per-order state; the orchestrator owns the
//! orders and passes them in.

mod delivery;
mod refunds;
pub mod repository;

use std::sync::Arc;

use tracing::{debug, info, warn};

pub use delivery::DeliveryReport;

use crate::application::lots::LotManager;
use crate::application::recovery::RecoveryPolicy;
use crate::application::session::SessionPool;
use crate::domain::order::parse_anonymity_reply;
use crate::domain::recipient::plan_preview;
use crate::domain::{
    expand_assignment, parse_recipients, Catalog, ChatId, GiftPlan, Handle, MarkerParser,
    OrderState, PendingOrder,
};
use crate::error::CatalogError;
use crate::infrastructure::config::order::OrderConfig;
use crate::infrastructure::templates::Templates;
use crate::port::{MarketOrder, Marketplace};

/// Result of opening a paid order.
#[derive(Debug)]
pub enum OpenOutcome {
    /// The order carries no catalog marker; it is not ours to handle.
    Skipped,
    /// The buyer was told why the order cannot proceed.
    Rejected,
    Pending(PendingOrder),
}

/// What the orchestrator should do with an order after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep the order and wait for the next message.
    Continue,
    /// Delivery ran; drop the order.
    Finished { completed: bool },
}

/// Drives orders from opening to delivery.
pub struct FulfillmentService {
    market: Arc<dyn Marketplace>,
    pool: Arc<SessionPool>,
    catalog: Arc<Catalog>,
    templates: Arc<Templates>,
    lots: Arc<LotManager>,
    recovery: RecoveryPolicy,
    marker: MarkerParser,
    config: OrderConfig,
}

impl FulfillmentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: Arc<dyn Marketplace>,
        pool: Arc<SessionPool>,
        catalog: Arc<Catalog>,
        templates: Arc<Templates>,
        lots: Arc<LotManager>,
        recovery: RecoveryPolicy,
        marker: MarkerParser,
        config: OrderConfig,
    ) -> Self {
        Self {
            market,
            pool,
            catalog,
            templates,
            lots,
            recovery,
            marker,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &OrderConfig {
        &self.config
    }

    /// Resolve, precheck and greet a new paid order.
    pub fn open(&self, order: &MarketOrder) -> OpenOutcome {
        let Some(code) = self.marker.code(&order.description) else {
            debug!(order = %order.id, buyer = %order.buyer, "No catalog marker, skipping order");
            return OpenOutcome::Skipped;
        };

        let plan = match self.catalog.resolve(&code) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(order = %order.id, %code, error = %err, "Order code does not resolve");
                let text = match err {
                    CatalogError::EmptyChoice(_) => {
                        self.templates.render("choice_error_empty_options", &[])
                    }
                    CatalogError::UnknownCode(_) | CatalogError::Unpriced(_) => {
                        self.templates.render(
                            "gift_not_found",
                            &[
                                ("gift_param_key", self.marker.key().to_string()),
                                ("gift_num", code),
                            ],
                        )
                    }
                };
                self.say(&order.chat, &text);
                return OpenOutcome::Rejected;
            }
        };

        let quantity = self.marker.quantity(order.amount, &order.description);
        info!(
            order = %order.id,
            buyer = %order.buyer,
            code = plan.code(),
            title = plan.title(),
            quantity,
            "Order opened"
        );

        let mut prefix = Vec::new();
        if self.config.precheck_balance {
            let need = plan.precheck_price().saturating_mul(u64::from(quantity));
            let pick = self.pool.pick_for_required_balance(need);
            match pick.balance {
                Some(balance) if balance < need => {
                    self.reject_for_balance(order, need, balance);
                    return OpenOutcome::Rejected;
                }
                Some(balance) => {
                    debug!(order = %order.id, need, balance, session = pick.session, "Balance precheck passed");
                }
                None => {
                    warn!(order = %order.id, need, "Balance unavailable, continuing without precheck");
                    prefix.push(self.templates.render("stars_check_unavailable", &[]));
                }
            }
            self.pool.set_active(pick.session);
        }

        let mut pending = PendingOrder::new(
            order.id.clone(),
            order.chat.clone(),
            order.buyer,
            quantity,
            plan,
        );
        pending.category = order.category;

        match self
            .config
            .anonymity_mode
            .fixed_flag(self.config.anonymous_gifts)
        {
            Some(flag) => {
                pending.anonymous = Some(flag);
                prefix.push(self.start_prompt(&mut pending));
            }
            None => {
                pending.state = OrderState::AwaitingAnon;
                prefix.push(self.templates.render(
                    "anon_choose_prompt",
                    &[
                        ("item_title", pending.plan.title().to_string()),
                        ("qty", quantity.to_string()),
                        ("shown_price", self.shown_price(&pending)),
                    ],
                ));
            }
        }
        self.say(&order.chat, &prefix.join("\n\n"));
        OpenOutcome::Pending(pending)
    }

    fn reject_for_balance(&self, order: &MarketOrder, need: u64, balance: u64) {
        warn!(order = %order.id, buyer = %order.buyer, need, balance, "Balance too low for order");
        let key = if self.config.auto_refund {
            "precheck_balance_low_refund"
        } else {
            "precheck_balance_low_wait"
        };
        let mut parts = vec![self.templates.render(key, &[])];
        if self.config.auto_deactivate {
            self.lots.deactivate_above(balance);
        }
        if self.config.auto_refund {
            parts.push(refunds::full(
                self.market.as_ref(),
                &self.templates,
                &order.id,
            ));
        }
        self.say(&order.chat, &parts.join("\n"));
    }

    /// Move the order to recipient collection and return the greeting.
    fn start_prompt(&self, order: &mut PendingOrder) -> String {
        let (key, state) = if order.plan.is_choice() {
            ("order_start_choice", OrderState::AwaitingChoiceNick)
        } else {
            ("order_start_normal", OrderState::AwaitingRecipients)
        };
        order.state = state;
        self.templates.render(
            key,
            &[
                ("item_title", order.plan.title().to_string()),
                ("qty", order.quantity.to_string()),
                ("shown_price", self.shown_price(order)),
            ],
        )
    }

    fn shown_price(&self, order: &PendingOrder) -> String {
        let total = order
            .plan
            .precheck_price()
            .saturating_mul(u64::from(order.quantity));
        if order.plan.is_choice() {
            format!("up to {total}⭐")
        } else {
            format!("{total}⭐")
        }
    }

    /// Advance `order` with one buyer message.
    pub fn handle_message(&self, order: &mut PendingOrder, text: &str) -> Step {
        debug!(order = %order.order_id, buyer = %order.buyer, state = %order.state, "Buyer message");
        match order.state {
            OrderState::AwaitingAnon => self.on_anonymity(order, text),
            OrderState::AwaitingRecipients => self.on_recipients(order, text),
            OrderState::AwaitingConfirmation => self.on_confirmation(order, text),
            OrderState::AwaitingChoiceNick => self.on_choice_nick(order, text),
            OrderState::AwaitingChoicePick => self.on_choice_pick(order, text),
            OrderState::AwaitingChoiceConfirmation => self.on_choice_confirmation(order, text),
            OrderState::New | OrderState::Delivering | OrderState::Complete => Step::Continue,
        }
    }

    fn on_anonymity(&self, order: &mut PendingOrder, text: &str) -> Step {
        let Some(anonymous) = parse_anonymity_reply(text) else {
            self.say(&order.chat_id, &self.templates.render("anon_choose_bad", &[]));
            return Step::Continue;
        };
        order.anonymous = Some(anonymous);
        info!(order = %order.order_id, anonymous, "Anonymity chosen");
        let mode = if anonymous {
            "anonymous"
        } else {
            "sender shown"
        };
        let chosen = self
            .templates
            .render("anon_chosen", &[("mode", mode.to_string())]);
        let prompt = self.start_prompt(order);
        self.say(&order.chat_id, &format!("{chosen}\n\n{prompt}"));
        Step::Continue
    }

    fn on_recipients(&self, order: &mut PendingOrder, text: &str) -> Step {
        let recipients = parse_recipients(text);
        if recipients.is_empty() {
            self.say(
                &order.chat_id,
                &self.templates.render("awaiting_nicks_bad_format", &[]),
            );
            return Step::Continue;
        }
        order.recipients = recipients;
        let plan = self.plan_text(order);

        if self.config.require_confirmation {
            order.state = OrderState::AwaitingConfirmation;
            let text = self.templates.render(
                "normal_plan_confirm",
                &[
                    ("item_title", order.plan.title().to_string()),
                    ("plan", plan),
                    ("confirm_token", self.config.confirm_token.clone()),
                ],
            );
            self.say(&order.chat_id, &text);
            return Step::Continue;
        }

        let text = self.templates.render(
            "normal_plan_info",
            &[("item_title", order.plan.title().to_string()), ("plan", plan)],
        );
        self.say(&order.chat_id, &text);
        self.finish(order)
    }

    fn on_confirmation(&self, order: &mut PendingOrder, text: &str) -> Step {
        if self.is_confirm(text) {
            return self.finish(order);
        }
        let recipients = parse_recipients(text);
        if recipients.is_empty() {
            let text = self.templates.render(
                "need_plus_or_update",
                &[("confirm_token", self.config.confirm_token.clone())],
            );
            self.say(&order.chat_id, &text);
            return Step::Continue;
        }
        order.recipients = recipients;
        let text = self.templates.render(
            "normal_plan_updated",
            &[
                ("plan", self.plan_text(order)),
                ("confirm_token", self.config.confirm_token.clone()),
            ],
        );
        self.say(&order.chat_id, &text);
        Step::Continue
    }

    fn on_choice_nick(&self, order: &mut PendingOrder, text: &str) -> Step {
        let Some(handle) = single_handle(text) else {
            self.say(
                &order.chat_id,
                &self.templates.render("awaiting_choice_one_nick", &[]),
            );
            return Step::Continue;
        };
        let GiftPlan::Choice(choice) = &order.plan else {
            return self.choice_state_error(order);
        };
        let menu = choice.menu();
        order.recipients = vec![handle];
        order.state = OrderState::AwaitingChoicePick;
        self.say(
            &order.chat_id,
            &self.templates.render("choice_menu", &[("menu", menu)]),
        );
        Step::Continue
    }

    fn on_choice_pick(&self, order: &mut PendingOrder, text: &str) -> Step {
        if order.recipients.is_empty() {
            order.state = OrderState::AwaitingChoiceNick;
            self.say(
                &order.chat_id,
                &self.templates.render("choice_pick_need_recipient", &[]),
            );
            return Step::Continue;
        }
        if let Some(handle) = replacement_handle(text) {
            order.recipients = vec![handle.clone()];
            let text = self.templates.render(
                "choice_recipient_updated_no_selected",
                &[("recipient", handle.to_string())],
            );
            self.say(&order.chat_id, &text);
            return Step::Continue;
        }
        match self.pick_option(order, text) {
            Some(()) if self.config.require_confirmation => {
                order.state = OrderState::AwaitingChoiceConfirmation;
                let text = self.choice_summary(order, "choice_confirm");
                self.say(&order.chat_id, &text);
                Step::Continue
            }
            Some(()) => self.finish(order),
            None => Step::Continue,
        }
    }

    fn on_choice_confirmation(&self, order: &mut PendingOrder, text: &str) -> Step {
        if order.selected_option().is_none() {
            return self.choice_state_error(order);
        }
        if self.is_confirm(text) {
            return self.finish(order);
        }
        if let Some(handle) = replacement_handle(text) {
            order.recipients = vec![handle];
            let text = self.choice_summary(order, "choice_recipient_updated_with_selected");
            self.say(&order.chat_id, &text);
            return Step::Continue;
        }
        if menu_number(text).is_some() {
            if self.pick_option(order, text).is_some() {
                let text = self.choice_summary(order, "choice_confirm_updated");
                self.say(&order.chat_id, &text);
            }
            return Step::Continue;
        }
        let text = self.templates.render(
            "choice_confirm_need_plus",
            &[("confirm_token", self.config.confirm_token.clone())],
        );
        self.say(&order.chat_id, &text);
        Step::Continue
    }

    /// Apply a menu pick, telling the buyer when it is invalid.
    fn pick_option(&self, order: &mut PendingOrder, text: &str) -> Option<()> {
        let GiftPlan::Choice(choice) = &order.plan else {
            self.choice_state_error(order);
            return None;
        };
        let picked = menu_number(text).filter(|n| choice.pick(*n).is_some());
        let Some(number) = picked else {
            let text = self.templates.render(
                "choice_bad_number",
                &[
                    ("max_n", choice.options.len().to_string()),
                    ("menu", choice.menu()),
                ],
            );
            self.say(&order.chat_id, &text);
            return None;
        };
        order.selected = Some(number - 1);
        info!(order = %order.order_id, option = number, "Choice picked");
        Some(())
    }

    fn choice_summary(&self, order: &PendingOrder, key: &str) -> String {
        let gift_title = order
            .selected_option()
            .map(|option| option.gift.title.clone())
            .unwrap_or_default();
        let recipient = order
            .recipients
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        self.templates.render(
            key,
            &[
                ("gift_title", gift_title),
                ("recipient", recipient),
                ("qty", order.quantity.to_string()),
                ("confirm_token", self.config.confirm_token.clone()),
            ],
        )
    }

    fn choice_state_error(&self, order: &PendingOrder) -> Step {
        warn!(order = %order.order_id, state = %order.state, "Choice order in inconsistent state");
        self.say(&order.chat_id, &self.templates.render("choice_state_error", &[]));
        Step::Continue
    }

    fn plan_text(&self, order: &PendingOrder) -> String {
        plan_preview(&expand_assignment(
            &order.recipients,
            order.quantity as usize,
        ))
    }

    fn is_confirm(&self, text: &str) -> bool {
        text.trim() == self.config.confirm_token.trim()
    }

    fn finish(&self, order: &mut PendingOrder) -> Step {
        let report = self.deliver(order);
        Step::Finished {
            completed: report.is_complete(),
        }
    }

    /// Send a chat message, logging failures.
    pub(crate) fn say(&self, chat: &ChatId, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if let Err(err) = self.market.send_message(chat, text) {
            warn!(%chat, error = %err, "Failed to send chat message");
        }
    }
}

/// 1-based menu number such as `2` or `2)`.
fn menu_number(text: &str) -> Option<usize> {
    text.trim().trim_end_matches(')').trim().parse().ok()
}

/// Exactly one valid handle in the message.
fn single_handle(text: &str) -> Option<Handle> {
    let mut handles = parse_recipients(text);
    (handles.len() == 1).then(|| handles.remove(0))
}

/// A handle sent to replace the choice recipient. Bare numbers are menu
/// picks, never handles.
fn replacement_handle(text: &str) -> Option<Handle> {
    if menu_number(text).is_some() {
        return None;
    }
    single_handle(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_number_accepts_paren() {
        assert_eq!(menu_number(" 2) "), Some(2));
        assert_eq!(menu_number("3"), Some(3));
        assert_eq!(menu_number("two"), None);
    }

    #[test]
    fn test_numbers_are_not_replacement_handles() {
        assert!(replacement_handle("12345").is_none());
        assert_eq!(
            replacement_handle("@carol_99").map(|h| h.to_string()),
            Some("@carol_99".to_string())
        );
        assert!(replacement_handle("@carol_99 @dave_123").is_none());
    }
}
