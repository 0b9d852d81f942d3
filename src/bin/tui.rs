//! Terminal book viewer: a worker thread drives the engine with a
//! synthetic random-walk flow while the UI thread renders depth bars and
//! engine telemetry. Press 'q' to quit.
//!
//! The engine is owned by exactly one thread; the UI only ever sees
//! copied depth snapshots and atomic counters.

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::{io, time::Duration};

use bitlob::{Engine, EngineConfig, OrderMessage, Side};

#[derive(Default, Clone)]
struct DepthSnapshot {
    bids: Vec<(u32, u32)>,
    asks: Vec<(u32, u32)>,
}

struct SharedStats {
    ops_count: AtomicU64,
    avg_latency_ns: AtomicU64,
    resting_orders: AtomicU64,
    pool_capacity: AtomicU64,
    executions: AtomicU64,
    depth: RwLock<DepthSnapshot>,
}

impl SharedStats {
    fn new(capacity: u64) -> Self {
        Self {
            ops_count: AtomicU64::new(0),
            avg_latency_ns: AtomicU64::new(0),
            resting_orders: AtomicU64::new(0),
            pool_capacity: AtomicU64::new(capacity),
            executions: AtomicU64::new(0),
            depth: RwLock::new(DepthSnapshot::default()),
        }
    }
}

fn render_level_bars(levels: &[(u32, u32)]) -> String {
    let mut out = String::new();
    let max_qty = levels.iter().map(|(_, q)| *q).max().unwrap_or(1) as f32;

    for (price, qty) in levels.iter().take(15) {
        let price_fmt = format!("{:.2}", *price as f64 / 100.0);
        let bar_len = ((*qty as f32 / max_qty) * 20.0) as usize;
        let bar = "█".repeat(bar_len);
        out.push_str(&format!("{price_fmt:>9} {bar} {qty:<6}\n"));
    }
    out
}

fn spawn_engine_thread(stats: Arc<SharedStats>, capacity: u32) {
    thread::spawn(move || {
        let config = EngineConfig::new(50_000, 1, capacity);
        let mut engine = Engine::new(config).expect("tui config");
        engine.warm_up();

        let mut order_id = 1u64;
        let mut rng = 12345u64; // LCG is plenty for synthetic flow
        let mut loop_count = 0u64;
        let mut mid_price = 50_800u32;

        loop {
            const BATCH_SIZE: u64 = 1000;
            let start_batch = std::time::Instant::now();

            for _ in 0..BATCH_SIZE {
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
                order_id = order_id.wrapping_add(1);
                let r = rng >> 32; // low LCG bits are weak

                // Random-walk drift, bounded so flow stays inside both
                // sides of the centered ladder
                if r % 100 == 0 {
                    let drift = (r % 11) as i64 - 5;
                    mid_price = (mid_price as i64 + drift).clamp(50_300, 51_800) as u32;
                }

                let side = if r % 2 == 0 { Side::Buy } else { Side::Sell };
                let spread_offset = (50 + (r % 400) / 2) as u32;
                let noise = ((r >> 8) % 20) as i64 - 10;
                let base = match side {
                    Side::Buy => mid_price - spread_offset,
                    Side::Sell => mid_price + spread_offset,
                };
                let price = (base as i64 + noise).max(1) as u32;
                let qty = 1 + (rng % 100) as u32;

                let msg = match r % 10 {
                    // A slice of taker flow keeps the book from growing forever
                    0 => OrderMessage::market(order_id, side, qty * 3, order_id),
                    1 => OrderMessage::ioc(order_id, side, price, qty * 2, order_id),
                    _ => OrderMessage::add(order_id, side, price, qty, order_id),
                };
                engine.process_message(&msg);
            }

            loop_count += 1;

            stats.ops_count.fetch_add(BATCH_SIZE, Ordering::Relaxed);
            let ns_per_op = start_batch.elapsed().as_nanos() as u64 / BATCH_SIZE;
            stats.avg_latency_ns.store(ns_per_op, Ordering::Relaxed);
            stats.resting_orders.store(engine.order_count() as u64, Ordering::Relaxed);
            stats.executions.store(engine.total_trades(), Ordering::Relaxed);

            if loop_count % 50 == 0 {
                let (bids, asks) = engine.market_depth(15);
                if let Ok(mut snapshot) = stats.depth.write() {
                    snapshot.bids = bids;
                    snapshot.asks = asks;
                }
            }

            // Hard reset when the pool nears exhaustion (demo loop)
            if engine.order_count() > (capacity as usize) * 9 / 10 {
                engine.reset();
            }
        }
    });
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let capacity = 1_000_000u32;
    let stats = Arc::new(SharedStats::new(capacity as u64));
    spawn_engine_thread(stats.clone(), capacity);

    let mut last_ops = 0;
    let mut last_time = std::time::Instant::now();
    let mut throughput = 0.0;

    loop {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    break;
                }
            }
        }

        let now = std::time::Instant::now();
        if now.duration_since(last_time).as_secs_f64() >= 1.0 {
            let current_ops = stats.ops_count.load(Ordering::Relaxed);
            throughput = (current_ops - last_ops) as f64;
            last_ops = current_ops;
            last_time = now;
        }

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(10),
                    Constraint::Length(7),
                ])
                .split(f.size());

            let header = Block::default().borders(Borders::ALL).title("bitlob ladder viewer");
            let title = Paragraph::new("synthetic flow | press 'q' to quit")
                .block(header)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(title, chunks[0]);

            let book_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[1]);

            let snapshot = stats.depth.read().unwrap().clone();
            let bids_widget = Paragraph::new(render_level_bars(&snapshot.bids)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("BIDS")
                    .style(Style::default().fg(Color::Green)),
            );
            let asks_widget = Paragraph::new(render_level_bars(&snapshot.asks)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("ASKS")
                    .style(Style::default().fg(Color::Red)),
            );
            f.render_widget(bids_widget, book_chunks[0]);
            f.render_widget(asks_widget, book_chunks[1]);

            let ops_fmt = if throughput > 1_000_000.0 {
                format!("{:.2} M", throughput / 1_000_000.0)
            } else {
                format!("{:.0} k", throughput / 1_000.0)
            };
            let resting = stats.resting_orders.load(Ordering::Relaxed);
            let pool_cap = stats.pool_capacity.load(Ordering::Relaxed);
            let pool_pct = (resting as f64 / pool_cap as f64) * 100.0;
            let latency = stats.avg_latency_ns.load(Ordering::Relaxed);
            let executions = stats.executions.load(Ordering::Relaxed);

            let stats_text = format!(
                "Throughput: {ops_fmt} msg/sec\nLatency (batch avg): {latency} ns\nPool: {resting} / {pool_cap} ({pool_pct:.1}%)\nExecutions: {executions}",
            );
            let stats_block = Paragraph::new(stats_text)
                .block(Block::default().borders(Borders::ALL).title("Engine Telemetry"))
                .style(Style::default().fg(Color::Yellow));
            f.render_widget(stats_block, chunks[2]);
        })?;
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}
