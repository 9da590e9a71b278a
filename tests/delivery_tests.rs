//! End-to-end order flows through the orchestrator.

mod harness;

use std::time::{Duration, Instant};

use giftcourier::domain::{AnonymityMode, BuyerId, CategoryId, LotId, OrderState, SendFailure};
use giftcourier::port::MarketEvent;
use giftcourier::testkit::config;
use giftcourier::testkit::domain::{message, new_order, order, order_with_amount, sample_catalog};
use giftcourier::testkit::marketplace::{RecordingMarketplace, RefundCall};
use giftcourier::testkit::messenger::ScriptedMessenger;
use harness::TestEngine;

const BUYER: u64 = 7;

#[test]
fn test_happy_path_delivers_and_requests_review() {
    let mut t = TestEngine::single(100);

    t.handle(new_order(order_with_amount("o1", BUYER, "Heart gift_tg:1", 3)));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingRecipients));
    assert!(t.last_message(BUYER).contains("Thank you for your purchase"));

    t.handle(message(BUYER, "@alice_01"));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingConfirmation));
    assert!(t.last_message(BUYER).contains("@alice_01 ×3"));

    t.handle(message(BUYER, "+"));

    let sent = t.sessions[0].sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|gift| gift.username == "alice_01"));
    assert!(t.pending(BUYER).is_none());
    assert!(t.completed(BUYER));

    let summary = t.last_message(BUYER);
    assert!(summary.contains("Sent successfully: 3"));
    assert!(summary.contains("https://funpay.com/orders/o1/"));
    assert!(t.market.refunds().is_empty());
}

#[test]
fn test_precheck_rejection_refunds_and_deactivates() {
    let market = RecordingMarketplace::new();
    market.add_lot(CategoryId::new(3064), 11, "gift_tg:1", true);
    market.add_lot(CategoryId::new(3064), 12, "gift_tg:8", true);
    let mut t = TestEngine::build(
        config::app(&["main"], false),
        vec![ScriptedMessenger::new("main").with_balance(60)],
        market,
    );

    t.handle(new_order(order_with_amount("o2", BUYER, "Cake gift_tg:5", 2)));

    assert!(t.pending(BUYER).is_none());
    let chat = t.chat(BUYER);
    assert_eq!(chat.len(), 1);
    assert!(chat[0].contains("does not have enough stars"));
    assert!(chat[0].contains("refunded"));
    assert_eq!(t.market.refunds(), vec![RefundCall::Full("o2".into())]);
    assert!(t.market.lot_active(LotId::new(11)));
    assert!(!t.market.lot_active(LotId::new(12)));
    assert_eq!(t.sent_count(), 0);
}

#[test]
fn test_precheck_without_refund_asks_to_wait() {
    let mut config = config::app(&["main"], false);
    config.orders.auto_refund = false;
    let mut t = TestEngine::build(
        config,
        vec![ScriptedMessenger::new("main").with_balance(10)],
        RecordingMarketplace::new(),
    );

    t.handle(new_order(order("o3", BUYER, "gift_tg:1")));

    assert!(t.last_message(BUYER).contains("wait for the seller"));
    assert!(t.market.refunds().is_empty());
}

#[test]
fn test_flood_fails_over_without_buyer_error() {
    let flooded = ScriptedMessenger::new("first");
    flooded.push_send(Err(SendFailure::RateLimited {
        retry_after: Some(Duration::from_secs(30)),
    }));
    let mut t = TestEngine::build(
        config::app(&["first", "second"], true),
        vec![flooded, ScriptedMessenger::new("second")],
        RecordingMarketplace::new(),
    );

    t.handle(new_order(order("o4", BUYER, "gift_tg:2")));
    t.handle(message(BUYER, "@alice_01"));
    let before = Instant::now();
    t.handle(message(BUYER, "+"));

    assert!(t.sessions[0].sent().is_empty());
    assert_eq!(t.sessions[1].sent().len(), 1);
    assert!(t.completed(BUYER));
    assert!(!t.last_message(BUYER).contains("Too many requests"));

    let pool = t.engine.pool();
    let until = pool.cooldown_until(0).expect("flooded session cools down");
    assert!(until.duration_since(before) >= Duration::from_millis(30_300));
    assert!(!pool.is_usable(0));
    assert_eq!(pool.get_active(), 1);
}

#[test]
fn test_bad_handle_keeps_state_until_valid() {
    let mut t = TestEngine::single(1_000);
    t.handle(new_order(order("o5", BUYER, "gift_tg:1")));

    t.handle(message(BUYER, "@ab"));
    assert!(t.last_message(BUYER).contains("Invalid format"));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingRecipients));

    t.handle(message(BUYER, "@bob_smith"));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingConfirmation));
}

#[test]
fn test_new_list_while_confirming_replaces_plan() {
    let mut t = TestEngine::single(1_000);
    t.handle(new_order(order_with_amount("o6", BUYER, "gift_tg:1", 3)));
    t.handle(message(BUYER, "@alice_01"));

    t.handle(message(BUYER, "@bob_smith, @carol_99"));
    assert!(t.last_message(BUYER).contains("@bob_smith ×2, @carol_99 ×1"));

    t.handle(message(BUYER, "ok?"));
    assert!(t.last_message(BUYER).contains("Send «+» to confirm"));

    t.handle(message(BUYER, "+"));
    let names: Vec<String> = t.sessions[0].sent().into_iter().map(|g| g.username).collect();
    assert_eq!(names, vec!["bob_smith", "carol_99", "bob_smith"]);
}

#[test]
fn test_fixed_bundle_sends_every_item() {
    let mut t = TestEngine::single(1_000);
    t.handle(new_order(order_with_amount("o7", BUYER, "Duo gift_tg:101", 2)));
    t.handle(message(BUYER, "@alice_01"));
    t.handle(message(BUYER, "+"));

    let catalog = sample_catalog();
    let heart = catalog.gift("1").unwrap().id;
    let present = catalog.gift("3").unwrap().id;
    let gifts: Vec<_> = t.sessions[0].sent().into_iter().map(|g| g.gift).collect();
    assert_eq!(gifts, vec![heart, heart, present, heart, heart, present]);
    assert!(t.last_message(BUYER).contains("Sent successfully: 6"));
}

#[test]
fn test_choice_flow_picks_and_confirms() {
    let mut t = TestEngine::single(1_000);
    t.handle(new_order(order("o8", BUYER, "gift_tg:201")));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingChoiceNick));

    t.handle(message(BUYER, "@alice_01 @bob_smith"));
    assert!(t.last_message(BUYER).contains("exactly ONE"));

    t.handle(message(BUYER, "@carol_99"));
    assert!(t.last_message(BUYER).contains("1) "));

    t.handle(message(BUYER, "9"));
    assert!(t.last_message(BUYER).contains("Choose 1-3"));

    t.handle(message(BUYER, "2"));
    assert_eq!(
        t.pending(BUYER).map(|o| o.state),
        Some(OrderState::AwaitingChoiceConfirmation)
    );

    t.handle(message(BUYER, "3)"));
    assert!(t.last_message(BUYER).contains("Pick updated"));

    t.handle(message(BUYER, "@dave_123"));
    assert!(t.last_message(BUYER).contains("Recipient updated: @dave_123"));

    t.handle(message(BUYER, "+"));
    let sent = t.sessions[0].sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].gift, sample_catalog().gift("8").unwrap().id);
    assert_eq!(sent[0].username, "dave_123");
    assert!(t.completed(BUYER));
}

#[test]
fn test_unknown_recipient_skips_units_and_refunds_them() {
    let mut t = TestEngine::build(
        config::app(&["main"], false),
        vec![ScriptedMessenger::new("main").with_unknown_users(&["ghost_user"])],
        RecordingMarketplace::new(),
    );
    t.handle(new_order(order_with_amount("o9", BUYER, "gift_tg:1", 4)));
    t.handle(message(BUYER, "@alice_01 @ghost_user"));
    t.handle(message(BUYER, "+"));

    assert_eq!(t.sessions[0].sent().len(), 2);
    assert_eq!(t.market.refunds(), vec![RefundCall::Amount("o9".into(), 30)]);
    assert!(!t.completed(BUYER));
    assert!(t.pending(BUYER).is_none());

    let summary = t.last_message(BUYER);
    assert!(summary.contains("Sent successfully: 2"));
    assert!(summary.contains("Failed to send: 2"));
    assert!(summary.contains("username_not_found"));
    assert!(summary.contains("Username not found: @ghost_user"));
    assert!(!summary.contains("review"));
}

#[test]
fn test_recipient_lost_mid_bundle_refunds_only_unsent_items() {
    let session = ScriptedMessenger::new("main");
    session.push_send(Ok(()));
    session.push_send(Ok(()));
    session.push_send(Err(SendFailure::RecipientNotFound));
    let mut t = TestEngine::build(
        config::app(&["main"], false),
        vec![session],
        RecordingMarketplace::new(),
    );
    t.handle(new_order(order("o25", BUYER, "Duo gift_tg:101")));
    t.handle(message(BUYER, "@alice_01"));
    t.handle(message(BUYER, "+"));

    assert_eq!(t.sessions[0].sent().len(), 2);
    // two hearts went out, only the 25 star present is owed
    assert_eq!(t.market.refunds(), vec![RefundCall::Amount("o25".into(), 25)]);
    let summary = t.last_message(BUYER);
    assert!(summary.contains("Sent successfully: 2"));
    assert!(summary.contains("Failed to send: 1"));
}

#[test]
fn test_balance_running_out_stops_and_refunds_rest() {
    let session = ScriptedMessenger::new("main");
    session.push_send(Ok(()));
    session.push_send(Err(SendFailure::InsufficientBalance));
    let mut t = TestEngine::build(
        config::app(&["main"], false),
        vec![session],
        RecordingMarketplace::new(),
    );
    t.handle(new_order(order_with_amount("o10", BUYER, "gift_tg:1", 3)));
    t.handle(message(BUYER, "@alice_01"));
    t.handle(message(BUYER, "+"));

    assert_eq!(t.sessions[0].sent().len(), 1);
    assert_eq!(t.market.refunds(), vec![RefundCall::Amount("o10".into(), 30)]);
    let summary = t.last_message(BUYER);
    assert!(summary.contains("ran out of stars"));
    assert!(summary.contains("balance_low"));
    assert_eq!(t.chat(BUYER).iter().filter(|m| m.contains("Failed to send")).count(), 1);
}

#[test]
fn test_nothing_sent_refunds_in_full() {
    let session = ScriptedMessenger::new("main");
    session.push_send(Err(SendFailure::InsufficientBalance));
    let mut t = TestEngine::build(
        config::app(&["main"], false),
        vec![session],
        RecordingMarketplace::new(),
    );
    t.handle(new_order(order_with_amount("o11", BUYER, "gift_tg:1", 2)));
    t.handle(message(BUYER, "@alice_01"));
    t.handle(message(BUYER, "+"));

    assert_eq!(t.market.refunds(), vec![RefundCall::Full("o11".into())]);
    assert!(t.last_message(BUYER).contains("Your payment has been refunded"));
}

#[test]
fn test_buyer_chooses_anonymity() {
    let mut config = config::app(&["main"], false);
    config.orders.anonymity_mode = AnonymityMode::Buyer;
    let mut t = TestEngine::build(config, vec![ScriptedMessenger::new("main")], RecordingMarketplace::new());

    t.handle(new_order(order("o12", BUYER, "gift_tg:1")));
    assert!(t.last_message(BUYER).contains("anonymously"));

    t.handle(message(BUYER, "maybe"));
    assert!(t.last_message(BUYER).contains("Not understood"));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingAnon));

    t.handle(message(BUYER, "1"));
    assert_eq!(t.pending(BUYER).and_then(|o| o.anonymous), Some(true));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingRecipients));

    t.handle(message(BUYER, "@alice_01"));
    t.handle(message(BUYER, "+"));
    assert!(t.sessions[0].sent()[0].hide_name);
}

#[test]
fn test_without_confirmation_delivers_immediately() {
    let mut config = config::app(&["main"], false);
    config.orders.require_confirmation = false;
    let mut t = TestEngine::build(config, vec![ScriptedMessenger::new("main")], RecordingMarketplace::new());

    t.handle(new_order(order("o13", BUYER, "gift_tg:1")));
    t.handle(message(BUYER, "@alice_01"));

    assert_eq!(t.sessions[0].sent().len(), 1);
    assert!(t.completed(BUYER));
}

#[test]
fn test_missing_balance_warns_and_continues() {
    let mut t = TestEngine::build(
        config::app(&["main"], false),
        vec![ScriptedMessenger::new("main").without_balance()],
        RecordingMarketplace::new(),
    );
    t.handle(new_order(order("o14", BUYER, "gift_tg:1")));

    let greeting = t.last_message(BUYER);
    assert!(greeting.contains("cannot be checked"));
    assert!(greeting.contains("Thank you for your purchase"));
    assert!(t.pending(BUYER).is_some());
}

#[test]
fn test_orders_are_gated() {
    let mut t = TestEngine::single(1_000);

    // no marker
    t.handle(new_order(order("o15", BUYER, "plain listing")));
    // other category
    let mut foreign = order("o16", BUYER, "gift_tg:1");
    foreign.category = Some(CategoryId::new(999));
    t.handle(new_order(foreign));
    assert!(t.chat(BUYER).is_empty());
    assert!(t.pending(BUYER).is_none());

    t.handle(new_order(order("o17", BUYER, "gift_tg:77")));
    assert!(t.last_message(BUYER).contains("Code gift_tg:77 does not exist"));
    assert!(t.pending(BUYER).is_none());
}

#[test]
fn test_missing_category_is_fetched() {
    let market = RecordingMarketplace::new();
    market.add_order(order("o18", BUYER, "gift_tg:1"));
    let mut t = TestEngine::build(config::app(&["main"], false), vec![ScriptedMessenger::new("main")], market);

    let mut partial = order("o18", BUYER, "gift_tg:1");
    partial.category = None;
    t.handle(new_order(partial));

    assert!(t.pending(BUYER).is_some());
}

#[test]
fn test_new_order_replaces_pending_one() {
    let mut t = TestEngine::single(1_000);
    t.handle(new_order(order("o19", BUYER, "gift_tg:1")));
    t.handle(new_order(order("o20", BUYER, "gift_tg:2")));

    assert_eq!(t.engine.orchestrator.pending_count(), 1);
    assert_eq!(t.pending(BUYER).map(|o| o.order_id.to_string()), Some("o20".to_string()));
}

#[test]
fn test_seller_messages_are_ignored() {
    let mut t = TestEngine::single(1_000);
    t.handle(new_order(order("o21", BUYER, "gift_tg:1")));
    let before = t.market.messages().len();

    t.handle(MarketEvent::NewMessage(giftcourier::port::ChatMessage {
        chat: giftcourier::testkit::domain::chat(BUYER),
        author: BuyerId::new(1),
        text: "@alice_01".into(),
    }));

    assert_eq!(t.market.messages().len(), before);
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingRecipients));
}

#[test]
fn test_reply_cooldown_drops_rapid_messages() {
    let mut config = config::app(&["main"], false);
    config.orders.reply_cooldown_secs = 1.0;
    let mut t = TestEngine::build(config, vec![ScriptedMessenger::new("main")], RecordingMarketplace::new());
    let now = Instant::now();
    t.handle_at(new_order(order("o22", BUYER, "gift_tg:1")), now);

    t.handle_at(message(BUYER, "@alice_01"), now + Duration::from_millis(500));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingRecipients));

    t.handle_at(message(BUYER, "@ab"), now + Duration::from_secs(2));
    assert!(t.last_message(BUYER).contains("Invalid format"));
    t.handle_at(message(BUYER, "@alice_01"), now + Duration::from_millis(2_200));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingRecipients));

    t.handle_at(message(BUYER, "@alice_01"), now + Duration::from_secs(4));
    assert_eq!(t.pending(BUYER).map(|o| o.state), Some(OrderState::AwaitingConfirmation));
}

#[test]
fn test_reply_cooldown_drops_repeated_orders() {
    let mut config = config::app(&["main"], false);
    config.orders.reply_cooldown_secs = 5.0;
    let mut t = TestEngine::build(config, vec![ScriptedMessenger::new("main")], RecordingMarketplace::new());
    let greetings = |t: &TestEngine| {
        t.chat(BUYER)
            .iter()
            .filter(|m| m.contains("Thank you for your purchase"))
            .count()
    };

    let now = Instant::now();
    t.handle_at(new_order(order("o26", BUYER, "gift_tg:1")), now);
    t.handle_at(new_order(order("o27", BUYER, "gift_tg:2")), now + Duration::from_millis(100));

    assert_eq!(t.pending(BUYER).map(|o| o.order_id.to_string()), Some("o26".to_string()));
    assert_eq!(greetings(&t), 1);

    t.handle_at(new_order(order("o28", BUYER, "gift_tg:2")), now + Duration::from_secs(6));
    assert_eq!(t.pending(BUYER).map(|o| o.order_id.to_string()), Some("o28".to_string()));
    assert_eq!(greetings(&t), 2);
}

#[test]
fn test_skipped_order_still_starts_cooldown() {
    let mut config = config::app(&["main"], false);
    config.orders.reply_cooldown_secs = 5.0;
    let mut t = TestEngine::build(config, vec![ScriptedMessenger::new("main")], RecordingMarketplace::new());

    let now = Instant::now();
    t.handle_at(new_order(order("o29", BUYER, "no marker here")), now);
    t.handle_at(new_order(order("o30", BUYER, "gift_tg:1")), now + Duration::from_secs(1));
    assert!(t.pending(BUYER).is_none());

    t.handle_at(new_order(order("o31", BUYER, "gift_tg:1")), now + Duration::from_secs(5));
    assert!(t.pending(BUYER).is_some());
}

#[test]
fn test_manual_override_suppresses_automation() {
    let mut t = TestEngine::single(1_000);
    t.handle(new_order(order("o23", BUYER, "gift_tg:1")));
    t.handle(MarketEvent::ManualOverride {
        buyer: BuyerId::new(BUYER),
        enabled: true,
    });
    assert!(t.pending(BUYER).is_none());
    assert!(t.engine.orchestrator.is_manual(BuyerId::new(BUYER)));

    let now = Instant::now();
    t.handle_at(message(BUYER, "@alice_01"), now);
    t.handle_at(message(BUYER, "hello?"), now + Duration::from_secs(10));
    let notices = |t: &TestEngine| {
        t.chat(BUYER)
            .iter()
            .filter(|m| m.contains("handling your order personally"))
            .count()
    };
    assert_eq!(notices(&t), 1);

    t.handle_at(message(BUYER, "hello?"), now + Duration::from_secs(61));
    assert_eq!(notices(&t), 2);
    assert_eq!(t.sent_count(), 0);

    t.handle(MarketEvent::ManualOverride {
        buyer: BuyerId::new(BUYER),
        enabled: false,
    });
    t.handle(new_order(order("o24", BUYER, "gift_tg:1")));
    assert!(t.pending(BUYER).is_some());
}
