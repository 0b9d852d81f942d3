//! Randomized comparison against a naive reference book.
//!
//! The reference uses BTreeMap levels and VecDeque FIFOs - slow but
//! obviously correct - and mirrors the engine's semantics: limit orders
//! always rest, market/IOC sweeps take liquidity best-outward.

use bitlob::{Engine, EngineConfig, OrderMessage, Side};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap, VecDeque};

#[derive(Default)]
struct ReferenceBook {
    bids: BTreeMap<u32, VecDeque<(u64, u32)>>,
    asks: BTreeMap<u32, VecDeque<(u64, u32)>>,
    orders: HashMap<u64, (Side, u32)>,
}

impl ReferenceBook {
    fn add(&mut self, id: u64, side: Side, price: u32, qty: u32) -> bool {
        if qty == 0 || self.orders.contains_key(&id) {
            return false;
        }
        let book = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        book.entry(price).or_default().push_back((id, qty));
        self.orders.insert(id, (side, price));
        true
    }

    fn cancel(&mut self, id: u64) -> bool {
        let Some((side, price)) = self.orders.remove(&id) else {
            return false;
        };
        let book = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(queue) = book.get_mut(&price) {
            queue.retain(|(order_id, _)| *order_id != id);
            if queue.is_empty() {
                book.remove(&price);
            }
        }
        true
    }

    fn modify(&mut self, id: u64, new_price: u32, new_qty: u32) -> bool {
        if new_qty == 0 || !self.orders.contains_key(&id) {
            return false;
        }
        let side = self.orders[&id].0;
        self.cancel(id);
        self.add(id, side, new_price, new_qty)
    }

    fn sweep(&mut self, taker_side: Side, limit: Option<u32>, mut qty: u32) -> u32 {
        let mut filled = 0u32;
        loop {
            if qty == 0 {
                break;
            }
            let best = match taker_side {
                Side::Buy => self.asks.keys().next().copied(),
                Side::Sell => self.bids.keys().next_back().copied(),
            };
            let Some(price) = best else { break };
            if let Some(limit) = limit {
                let beyond = match taker_side {
                    Side::Buy => price > limit,
                    Side::Sell => price < limit,
                };
                if beyond {
                    break;
                }
            }

            let book = match taker_side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            let queue = book.get_mut(&price).unwrap();
            while qty > 0 && !queue.is_empty() {
                let (maker_id, maker_qty) = queue[0];
                let exec = qty.min(maker_qty);
                qty -= exec;
                filled += exec;
                if exec == maker_qty {
                    queue.pop_front();
                    self.orders.remove(&maker_id);
                } else {
                    queue[0].1 = maker_qty - exec;
                }
            }
            if queue.is_empty() {
                book.remove(&price);
            }
        }
        filled
    }

    fn best_bid(&self) -> u32 {
        self.bids.keys().next_back().copied().unwrap_or(0)
    }

    fn best_ask(&self) -> u32 {
        self.asks.keys().next().copied().unwrap_or(u32::MAX)
    }

    fn best_bid_qty(&self) -> u64 {
        self.bids
            .values()
            .next_back()
            .map(|q| q.iter().map(|(_, qty)| *qty as u64).sum())
            .unwrap_or(0)
    }

    fn best_ask_qty(&self) -> u64 {
        self.asks
            .values()
            .next()
            .map(|q| q.iter().map(|(_, qty)| *qty as u64).sum())
            .unwrap_or(0)
    }

    fn order_count(&self) -> usize {
        self.orders.len()
    }
}

fn fuzz_round(seed: u64, ops: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut engine = Engine::new(EngineConfig::new(50_000, 1, 200_000)).unwrap();
    let mut reference = ReferenceBook::default();

    let mut next_id = 1u64;
    let mut live: Vec<u64> = Vec::new();

    for ts in 0..ops as u64 {
        let op = rng.gen_range(0..100);

        if op < 55 || live.is_empty() {
            let id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            // Inside the ladder window on both sides, so no clamping
            let price = match side {
                Side::Buy => rng.gen_range(49_000..51_000),
                Side::Sell => rng.gen_range(50_000..52_000),
            };
            let qty = rng.gen_range(1..400);

            let engine_ok = engine.process_message(&OrderMessage::add(id, side, price, qty, ts));
            let reference_ok = reference.add(id, side, price, qty);
            assert_eq!(engine_ok, reference_ok, "add diverged at op {ts}");
            if engine_ok {
                live.push(id);
            }
        } else if op < 75 {
            let idx = rng.gen_range(0..live.len());
            let id = live.swap_remove(idx);
            let engine_ok = engine.process_message(&OrderMessage::cancel(id, ts));
            let reference_ok = reference.cancel(id);
            assert_eq!(engine_ok, reference_ok, "cancel diverged at op {ts}");
        } else if op < 85 {
            let idx = rng.gen_range(0..live.len());
            let id = live[idx];
            let price = rng.gen_range(50_000..51_000);
            let qty = rng.gen_range(1..400);
            let engine_ok = engine.process_message(&OrderMessage::modify(id, price, qty, ts));
            let reference_ok = reference.modify(id, price, qty);
            assert_eq!(engine_ok, reference_ok, "modify diverged at op {ts}");
        } else {
            let id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let qty = rng.gen_range(1..700);
            let (engine_ok, reference_filled) = if rng.gen_bool(0.5) {
                (
                    engine.process_message(&OrderMessage::market(id, side, qty, ts)),
                    reference.sweep(side, None, qty),
                )
            } else {
                let limit = rng.gen_range(49_500..51_500);
                (
                    engine.process_message(&OrderMessage::ioc(id, side, limit, qty, ts)),
                    reference.sweep(side, Some(limit), qty),
                )
            };
            assert_eq!(engine_ok, reference_filled > 0, "sweep outcome diverged at op {ts}");
            // Filled makers may have left the live set; prune lazily
            live.retain(|id| reference.orders.contains_key(id));
        }

        assert_eq!(engine.best_bid(), reference.best_bid(), "best bid diverged at op {ts}");
        assert_eq!(engine.best_ask(), reference.best_ask(), "best ask diverged at op {ts}");
        assert_eq!(
            engine.best_bid_quantity() as u64,
            reference.best_bid_qty(),
            "bid depth diverged at op {ts}"
        );
        assert_eq!(
            engine.best_ask_quantity() as u64,
            reference.best_ask_qty(),
            "ask depth diverged at op {ts}"
        );
        assert_eq!(engine.order_count(), reference.order_count(), "order count diverged at op {ts}");
    }

    assert!(engine.validate_state());
}

#[test]
fn test_fuzz_against_reference() {
    fuzz_round(0xFEEDFACE, 10_000);
}

#[test]
fn test_fuzz_against_reference_more_seeds() {
    for seed in [0xBADC0DE, 0x12345678, 0xA5A5A5A5] {
        fuzz_round(seed, 3_000);
    }
}

#[test]
fn test_fuzz_with_modify_heavy_flow() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x1DEA);
    let mut engine = Engine::new(EngineConfig::new(50_000, 1, 50_000)).unwrap();
    let mut reference = ReferenceBook::default();

    for id in 1..=500u64 {
        let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = if id % 2 == 0 { 49_900 } else { 50_100 };
        engine.process_message(&OrderMessage::add(id, side, price, 100, id));
        reference.add(id, side, price, 100);
    }

    for ts in 0..5_000u64 {
        let id = rng.gen_range(1..=500);
        let price = rng.gen_range(50_000..50_500);
        let qty = rng.gen_range(1..200);
        let engine_ok = engine.process_message(&OrderMessage::modify(id, price, qty, ts));
        let reference_ok = reference.modify(id, price, qty);
        assert_eq!(engine_ok, reference_ok);
        assert_eq!(engine.best_bid(), reference.best_bid());
        assert_eq!(engine.best_ask(), reference.best_ask());
    }

    assert!(engine.validate_state());
}
