//! Engine - message dispatch, callbacks, counters, and replay.
//!
//! Strictly synchronous: each message is processed to completion on the
//! caller's thread before the next is accepted, and callbacks fire
//! inline. Callbacks must be non-blocking and must not re-enter the
//! engine.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use tracing::{debug, warn};

use crate::book::OrderBook;
use crate::config::{ConfigError, EngineConfig, TRADE_BUFFER_RATIO};
use crate::journal;
use crate::message::{MsgKind, OrderMessage, OrderType, Trade};
use crate::pool::Order;

/// Invoked once per emitted trade, in emission order.
pub type TradeCallback = Box<dyn FnMut(&Trade)>;

/// Invoked after a successful ADD/CANCEL/MODIFY with the event tag
/// `"added"`, `"cancelled"` or `"modified"`.
pub type OrderCallback = Box<dyn FnMut(&Order, &str)>;

/// Monotonic tick source for the latency counters. Ticks are opaque to
/// the engine; only differences are accumulated.
pub type TickSource = fn() -> u64;

/// Default tick source: nanoseconds since the first call in this process.
pub fn monotonic_ns() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// The matching engine: an [`OrderBook`] plus dispatch, observation and
/// deterministic replay machinery.
pub struct Engine {
    book: OrderBook,

    trade_callback: Option<TradeCallback>,
    order_callback: Option<OrderCallback>,

    messages_processed: u64,
    processing_ticks: u64,

    /// In-memory journal for deterministic replay
    history: Vec<OrderMessage>,
    record_history: bool,

    clock: TickSource,

    // Reused per message to keep the hot path allocation-free
    trades: Vec<Trade>,
}

impl Engine {
    /// Build an engine, allocating the pool and ladders up front.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, monotonic_ns)
    }

    /// Build an engine with a custom tick source (tests, deterministic
    /// latency accounting, platform counters).
    pub fn with_clock(config: EngineConfig, clock: TickSource) -> Result<Self, ConfigError> {
        let book = OrderBook::new(config)?;
        Ok(Self {
            book,
            trade_callback: None,
            order_callback: None,
            messages_processed: 0,
            processing_ticks: 0,
            history: Vec::with_capacity(config.pool_capacity as usize),
            record_history: false,
            clock,
            trades: Vec::with_capacity((config.pool_capacity / TRADE_BUFFER_RATIO).max(16) as usize),
        })
    }

    // ========================================================================
    // Message processing
    // ========================================================================

    /// Dispatch one message. Returns `true` if it executed, `false` if it
    /// was rejected; rejected messages leave no trace on the book but
    /// still count as processed.
    pub fn process_message(&mut self, msg: &OrderMessage) -> bool {
        let start = (self.clock)();
        self.trades.clear();

        let success = match msg.kind {
            MsgKind::AddOrder => {
                let ok = self.book.add_limit_order(
                    msg.order_id,
                    msg.side,
                    msg.price,
                    msg.quantity,
                    msg.timestamp,
                );
                if ok {
                    self.notify_order(msg, "added");
                }
                ok
            }
            MsgKind::CancelOrder => {
                let ok = self.book.cancel_order(msg.order_id);
                if ok {
                    self.notify_order(msg, "cancelled");
                }
                ok
            }
            MsgKind::ModifyOrder => {
                let ok =
                    self.book.modify_order(msg.order_id, msg.price, msg.quantity, msg.timestamp);
                if ok {
                    self.notify_order(msg, "modified");
                }
                ok
            }
            MsgKind::MarketOrder => {
                let filled = self.book.execute_market_order(
                    msg.side,
                    msg.order_id,
                    msg.quantity,
                    msg.timestamp,
                    &mut self.trades,
                );
                filled > 0
            }
            MsgKind::IocOrder => {
                let filled = self.book.execute_ioc_order(
                    msg.side,
                    msg.order_id,
                    msg.price,
                    msg.quantity,
                    msg.timestamp,
                    &mut self.trades,
                );
                filled > 0
            }
        };

        if !self.trades.is_empty() {
            if let Some(callback) = self.trade_callback.as_mut() {
                for trade in &self.trades {
                    callback(trade);
                }
            }
        }

        if self.record_history && success {
            self.history.push(*msg);
        }

        self.processing_ticks += (self.clock)().saturating_sub(start);
        self.messages_processed += 1;

        success
    }

    /// Process a sequence; returns how many messages succeeded.
    pub fn process_batch(&mut self, messages: &[OrderMessage]) -> usize {
        let mut processed = 0;
        for msg in messages {
            if self.process_message(msg) {
                processed += 1;
            }
        }
        processed
    }

    fn notify_order(&mut self, msg: &OrderMessage, event: &str) {
        if let Some(callback) = self.order_callback.as_mut() {
            // Synthesized from the message to avoid a book lookup
            let mut order = Order::empty();
            order.reset(
                msg.order_id,
                msg.price,
                msg.quantity,
                msg.side,
                OrderType::Limit,
                msg.timestamp,
            );
            callback(&order, event);
        }
    }

    // ========================================================================
    // Callback registration
    // ========================================================================

    pub fn set_trade_callback(&mut self, callback: impl FnMut(&Trade) + 'static) {
        self.trade_callback = Some(Box::new(callback));
    }

    pub fn set_order_callback(&mut self, callback: impl FnMut(&Order, &str) + 'static) {
        self.order_callback = Some(Box::new(callback));
    }

    // ========================================================================
    // Book queries (direct delegation)
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> u32 {
        self.book.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> u32 {
        self.book.best_ask()
    }

    #[inline]
    pub fn best_bid_quantity(&self) -> u32 {
        self.book.best_bid_quantity()
    }

    #[inline]
    pub fn best_ask_quantity(&self) -> u32 {
        self.book.best_ask_quantity()
    }

    #[inline]
    pub fn is_crossed(&self) -> bool {
        self.book.is_crossed()
    }

    pub fn market_depth(&self, levels: u32) -> (Vec<(u32, u32)>, Vec<(u32, u32)>) {
        self.book.market_depth(levels)
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.book.order_count()
    }

    #[inline]
    pub fn total_orders(&self) -> u64 {
        self.book.total_orders()
    }

    #[inline]
    pub fn total_trades(&self) -> u64 {
        self.book.total_trades()
    }

    #[inline]
    pub fn total_volume(&self) -> u64 {
        self.book.total_volume()
    }

    // ========================================================================
    // State management
    // ========================================================================

    /// Clear the book, the journal and the performance counters.
    pub fn reset(&mut self) {
        self.book.clear();
        self.history.clear();
        self.reset_performance_counters();
        debug!("engine reset");
    }

    /// Run the full structural audit on the book.
    pub fn validate_state(&self) -> bool {
        self.book.validate_integrity()
    }

    /// Pre-fault pool pages before entering the hot path.
    pub fn warm_up(&mut self) {
        self.book.warm_up();
    }

    // ========================================================================
    // Deterministic replay
    // ========================================================================

    /// Start or stop appending successful messages to the in-memory
    /// journal. The journal grows without bound while enabled.
    pub fn enable_history_recording(&mut self, enable: bool) {
        self.record_history = enable;
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Clear the book and re-apply the recorded journal in order.
    /// Recording stays suspended for the duration so the journal is not
    /// duplicated. Returns `true` iff every recorded message succeeded.
    pub fn replay_history(&mut self) -> bool {
        if self.history.is_empty() {
            return true;
        }

        self.book.clear();
        self.reset_performance_counters();

        let prior_recording = self.record_history;
        self.record_history = false;

        let history = std::mem::take(&mut self.history);
        let mut processed = 0;
        for msg in &history {
            if self.process_message(msg) {
                processed += 1;
            }
        }
        let total = history.len();
        self.history = history;
        self.record_history = prior_recording;

        debug!(replayed = processed, total, "history replay finished");
        processed == total
    }

    /// Persist the recorded journal. Returns `false` on any I/O failure.
    pub fn save_history(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match journal::write_journal(path, &self.history) {
            Ok(()) => {
                debug!(?path, records = self.history.len(), "journal saved");
                true
            }
            Err(error) => {
                warn!(?path, %error, "journal save failed");
                false
            }
        }
    }

    /// Load a journal from disk and replay it. On any failure (missing
    /// file, short read, corrupt record, zero count) the in-memory
    /// journal is cleared and `false` returned.
    pub fn load_and_replay_history(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match journal::read_journal(path) {
            Ok(messages) => {
                debug!(?path, records = messages.len(), "journal loaded");
                self.history = messages;
                self.replay_history()
            }
            Err(error) => {
                warn!(?path, %error, "journal load failed");
                self.history.clear();
                false
            }
        }
    }

    // ========================================================================
    // Performance counters
    // ========================================================================

    #[inline]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed
    }

    #[inline]
    pub fn total_processing_ticks(&self) -> u64 {
        self.processing_ticks
    }

    /// Mean ticks per processed message.
    pub fn average_latency_ticks(&self) -> f64 {
        if self.messages_processed == 0 {
            return 0.0;
        }
        self.processing_ticks as f64 / self.messages_processed as f64
    }

    pub fn reset_performance_counters(&mut self) {
        self.messages_processed = 0;
        self.processing_ticks = 0;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default()).expect("default config is valid")
    }
}
