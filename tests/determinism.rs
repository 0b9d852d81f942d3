//! Determinism and replay guarantees.
//!
//! Two engines fed the same sequence must produce identical trade
//! streams and identical final state, and a recorded journal must
//! survive a save / clear / load-and-replay round trip bit-for-bit.

use bitlob::{Engine, EngineConfig, MsgKind, OrderMessage, Side, Trade};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

fn engine() -> Engine {
    Engine::new(EngineConfig::new(50_000, 1, 200_000)).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("bitlob-determinism-{}-{}", std::process::id(), name))
}

/// Deterministic mixed workload: adds, cancels, modifies, market and IOC
/// sweeps, all priced inside the default ladder window.
fn generate_messages(seed: u64, count: usize) -> Vec<OrderMessage> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut messages = Vec::with_capacity(count);
    let mut live: Vec<u64> = Vec::new();
    let mut next_id = 1u64;

    for ts in 0..count as u64 {
        let roll = rng.gen_range(0..100);
        if roll < 60 || live.is_empty() {
            let id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let price = match side {
                Side::Buy => rng.gen_range(49_500..50_400),
                Side::Sell => rng.gen_range(50_000..50_900),
            };
            messages.push(OrderMessage::add(id, side, price, rng.gen_range(1..400), ts));
            live.push(id);
        } else if roll < 75 {
            let idx = rng.gen_range(0..live.len());
            messages.push(OrderMessage::cancel(live.swap_remove(idx), ts));
        } else if roll < 85 {
            let idx = rng.gen_range(0..live.len());
            let id = live[idx];
            messages.push(OrderMessage::modify(
                id,
                rng.gen_range(49_500..50_900),
                rng.gen_range(1..400),
                ts,
            ));
        } else {
            let id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            if rng.gen_bool(0.5) {
                messages.push(OrderMessage::market(id, side, rng.gen_range(1..600), ts));
            } else {
                let limit = rng.gen_range(49_800..50_600);
                messages.push(OrderMessage::ioc(id, side, limit, rng.gen_range(1..600), ts));
            }
        }
    }

    messages
}

struct Run {
    trades: Vec<Trade>,
    successes: usize,
    best_bid: u32,
    best_ask: u32,
    best_bid_qty: u32,
    best_ask_qty: u32,
    total_orders: u64,
    total_trades: u64,
    total_volume: u64,
    order_count: usize,
}

fn run(messages: &[OrderMessage]) -> Run {
    let mut engine = engine();
    let trades: Rc<RefCell<Vec<Trade>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = trades.clone();
    engine.set_trade_callback(move |t| sink.borrow_mut().push(*t));

    let successes = engine.process_batch(messages);
    assert!(engine.validate_state(), "integrity violated after workload");

    let trades = trades.borrow().clone();
    Run {
        trades,
        successes,
        best_bid: engine.best_bid(),
        best_ask: engine.best_ask(),
        best_bid_qty: engine.best_bid_quantity(),
        best_ask_qty: engine.best_ask_quantity(),
        total_orders: engine.total_orders(),
        total_trades: engine.total_trades(),
        total_volume: engine.total_volume(),
        order_count: engine.order_count(),
    }
}

#[test]
fn identical_inputs_produce_identical_runs() {
    let messages = generate_messages(0xDEADBEEF, 20_000);

    let first = run(&messages);
    for attempt in 1..4 {
        let other = run(&messages);
        assert_eq!(other.trades, first.trades, "trade stream diverged on run {attempt}");
        assert_eq!(other.successes, first.successes);
        assert_eq!(other.best_bid, first.best_bid);
        assert_eq!(other.best_ask, first.best_ask);
        assert_eq!(other.best_bid_qty, first.best_bid_qty);
        assert_eq!(other.best_ask_qty, first.best_ask_qty);
        assert_eq!(other.total_orders, first.total_orders);
        assert_eq!(other.total_trades, first.total_trades);
        assert_eq!(other.total_volume, first.total_volume);
        assert_eq!(other.order_count, first.order_count);
    }
}

#[test]
fn different_seeds_diverge() {
    let a = run(&generate_messages(1, 5_000));
    let b = run(&generate_messages(2, 5_000));
    assert_ne!(
        (a.best_bid, a.best_ask, a.total_volume, a.trades.len()),
        (b.best_bid, b.best_ask, b.total_volume, b.trades.len())
    );
}

#[test]
fn in_memory_replay_matches_live_run() {
    let messages = generate_messages(0xCAFED00D, 10_000);

    let mut engine = engine();
    engine.enable_history_recording(true);
    engine.process_batch(&messages);

    let bid = engine.best_bid();
    let ask = engine.best_ask();
    let volume = engine.total_volume();
    let orders = engine.total_orders();
    let resting = engine.order_count();

    assert!(engine.replay_history(), "every journaled message must replay cleanly");

    assert_eq!(engine.best_bid(), bid);
    assert_eq!(engine.best_ask(), ask);
    assert_eq!(engine.total_volume(), volume);
    assert_eq!(engine.total_orders(), orders);
    assert_eq!(engine.order_count(), resting);
    assert!(engine.validate_state());
}

#[test]
fn journal_round_trip_law() {
    let path = temp_path("roundtrip.journal");
    let messages = generate_messages(0xFEEDFACE, 8_000);

    let mut engine = engine();
    engine.enable_history_recording(true);
    engine.process_batch(&messages);

    let bid = engine.best_bid();
    let ask = engine.best_ask();
    let bid_qty = engine.best_bid_quantity();
    let ask_qty = engine.best_ask_quantity();
    let orders = engine.total_orders();
    let trades = engine.total_trades();
    let volume = engine.total_volume();
    let journaled = engine.history_len();

    assert!(engine.save_history(&path));
    engine.reset();
    assert_eq!(engine.order_count(), 0);

    assert!(engine.load_and_replay_history(&path));
    assert_eq!(engine.history_len(), journaled);
    assert_eq!(engine.best_bid(), bid);
    assert_eq!(engine.best_ask(), ask);
    assert_eq!(engine.best_bid_quantity(), bid_qty);
    assert_eq!(engine.best_ask_quantity(), ask_qty);
    assert_eq!(engine.total_orders(), orders);
    assert_eq!(engine.total_trades(), trades);
    assert_eq!(engine.total_volume(), volume);
    assert!(engine.validate_state());

    std::fs::remove_file(&path).ok();
}

#[test]
fn journal_replays_only_successful_messages() {
    let mut engine = engine();
    engine.enable_history_recording(true);

    engine.process_message(&OrderMessage::add(1, Side::Buy, 50_000, 100, 1));
    engine.process_message(&OrderMessage::cancel(999, 2)); // rejected
    engine.process_message(&OrderMessage::add(1, Side::Buy, 50_000, 50, 3)); // duplicate
    engine.process_message(&OrderMessage::cancel(1, 4));

    assert_eq!(engine.history_len(), 2);
    assert!(engine.replay_history());
}

#[test]
fn load_failure_clears_journal() {
    let mut engine = engine();
    engine.enable_history_recording(true);
    engine.process_message(&OrderMessage::add(1, Side::Buy, 50_000, 100, 1));
    assert_eq!(engine.history_len(), 1);

    assert!(!engine.load_and_replay_history(temp_path("missing.journal")));
    assert_eq!(engine.history_len(), 0, "failed load must clear the journal");
}

#[test]
fn truncated_journal_fails_to_load() {
    let path = temp_path("truncated.journal");

    let mut engine = engine();
    engine.enable_history_recording(true);
    engine.process_batch(&generate_messages(0xBAD5EED, 100));
    assert!(engine.save_history(&path));

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(!engine.load_and_replay_history(&path));
    assert_eq!(engine.history_len(), 0);

    std::fs::remove_file(&path).ok();
}

#[test]
fn journal_preserves_wire_kinds() {
    let path = temp_path("kinds.journal");

    let mut engine = engine();
    engine.enable_history_recording(true);
    engine.process_message(&OrderMessage::add(1, Side::Sell, 50_100, 100, 1));
    engine.process_message(&OrderMessage::add(2, Side::Buy, 50_000, 100, 2));
    engine.process_message(&OrderMessage::modify(2, 50_050, 80, 3));
    engine.process_message(&OrderMessage::ioc(3, Side::Buy, 50_100, 30, 4));
    engine.process_message(&OrderMessage::market(4, Side::Sell, 20, 5));
    engine.process_message(&OrderMessage::cancel(1, 6));
    assert!(engine.save_history(&path));

    let loaded = bitlob::journal::read_journal(&path).unwrap();
    let kinds: Vec<MsgKind> = loaded.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MsgKind::AddOrder,
            MsgKind::AddOrder,
            MsgKind::ModifyOrder,
            MsgKind::IocOrder,
            MsgKind::MarketOrder,
            MsgKind::CancelOrder,
        ]
    );

    std::fs::remove_file(&path).ok();
}
