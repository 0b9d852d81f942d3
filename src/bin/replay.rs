//! Replay a recorded message journal through the engine.
//!
//! Usage: `replay <journal-path> [max-events]`
//!
//! `.csv` inputs are decoded as normalized tapes (see `bitlob::tape`);
//! anything else is read as a binary journal. Exit code 0 on success.

use std::fs::File;
use std::process::ExitCode;
use std::time::Instant;

use bitlob::{journal, tape, Engine, EngineConfig, OrderMessage};

fn load_messages(path: &str) -> Result<Vec<OrderMessage>, String> {
    if path.ends_with(".csv") {
        let file = File::open(path).map_err(|e| format!("cannot open {path}: {e}"))?;
        tape::read_tape(file, 1).map_err(|e| format!("cannot decode tape {path}: {e}"))
    } else {
        journal::read_journal(path.as_ref()).map_err(|e| format!("cannot read journal {path}: {e}"))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: replay <journal-path> [max-events]");
        return ExitCode::FAILURE;
    };
    let max_events = match args.next() {
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) => Some(n),
            Err(_) => {
                eprintln!("max-events must be an integer, got '{raw}'");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let mut messages = match load_messages(&path) {
        Ok(messages) => messages,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(max) = max_events {
        messages.truncate(max);
    }

    let mut engine = match Engine::new(EngineConfig::default()) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("bad engine config: {err}");
            return ExitCode::FAILURE;
        }
    };
    engine.warm_up();

    let started = Instant::now();
    let succeeded = engine.process_batch(&messages);
    let elapsed = started.elapsed();

    println!("=== Replay Summary ===");
    println!("Messages:   {} ({} succeeded)", messages.len(), succeeded);
    println!(
        "Elapsed:    {:.3} ms ({:.0} msg/sec)",
        elapsed.as_secs_f64() * 1e3,
        messages.len() as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    println!("Avg ticks:  {:.0}", engine.average_latency_ticks());
    println!();

    let bid = engine.best_bid();
    let ask = engine.best_ask();
    println!("Best bid:   {}", if bid == 0 { "-".to_string() } else { bid.to_string() });
    println!("Best ask:   {}", if ask == u32::MAX { "-".to_string() } else { ask.to_string() });
    println!(
        "Totals:     {} orders, {} executions, {} volume",
        engine.total_orders(),
        engine.total_trades(),
        engine.total_volume()
    );

    let (bids, asks) = engine.market_depth(5);
    println!();
    println!("Depth (top 5):");
    for (price, qty) in &bids {
        println!("  bid {price:>8} x {qty}");
    }
    for (price, qty) in &asks {
        println!("  ask {price:>8} x {qty}");
    }

    if !engine.validate_state() {
        eprintln!("book integrity check FAILED after replay");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
