//! Per-message latency percentiles under a synthetic mixed workload.

use bitlob::{Engine, EngineConfig, OrderMessage, Side};
use hdrhistogram::Histogram;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

const ITERATIONS: usize = 1_000_000;
const WARMUP: usize = 10_000;

/// 70% add / 20% cancel / 10% market, prices inside the default ladder
fn generate_messages(seed: u64, count: usize) -> Vec<OrderMessage> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut messages = Vec::with_capacity(count);
    let mut live_ids: Vec<u64> = Vec::new();
    let mut next_id = 1u64;

    for i in 0..count {
        let roll = rng.gen_range(0..100);
        if roll < 70 || live_ids.is_empty() {
            let id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let price = match side {
                Side::Buy => rng.gen_range(49_500..50_000),
                Side::Sell => rng.gen_range(50_000..50_500),
            };
            messages.push(OrderMessage::add(id, side, price, rng.gen_range(1..500), i as u64));
            live_ids.push(id);
        } else if roll < 90 {
            let idx = rng.gen_range(0..live_ids.len());
            let id = live_ids.swap_remove(idx);
            messages.push(OrderMessage::cancel(id, i as u64));
        } else {
            let id = next_id;
            next_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            messages.push(OrderMessage::market(id, side, rng.gen_range(1..300), i as u64));
        }
    }

    messages
}

fn main() {
    println!("Preparing latency benchmark...");

    let mut engine = Engine::new(EngineConfig::default()).expect("default config");
    engine.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3).unwrap();

    println!("Pre-generating {} messages...", ITERATIONS + WARMUP);
    let messages = generate_messages(0xB17B0B, ITERATIONS + WARMUP);

    println!("Warming up branch predictors ({WARMUP} ops)...");
    for msg in &messages[..WARMUP] {
        std::hint::black_box(engine.process_message(msg));
    }

    println!("Running {ITERATIONS} iterations...");
    let run_start = Instant::now();
    for msg in &messages[WARMUP..] {
        let start = Instant::now();
        std::hint::black_box(engine.process_message(msg));
        let elapsed = start.elapsed();
        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
    }
    let total = run_start.elapsed();

    println!();
    println!("=== Latency Report (ns) ===");
    println!("Total ops:  {ITERATIONS}");
    println!("Throughput: {:.2} M ops/sec", ITERATIONS as f64 / total.as_secs_f64() / 1e6);
    println!("---------------------------");
    println!("Min:    {:7}", histogram.min());
    println!("P50:    {:7}", histogram.value_at_quantile(0.50));
    println!("P90:    {:7}", histogram.value_at_quantile(0.90));
    println!("P99:    {:7}", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:7}", histogram.value_at_quantile(0.999));
    println!("Max:    {:7}", histogram.max());
    println!("---------------------------");
    println!(
        "Book: {} resting orders, {} executions, {} volume",
        engine.order_count(),
        engine.total_trades(),
        engine.total_volume()
    );
    assert!(engine.validate_state(), "integrity check failed after benchmark");
}
