//! Order book - the central fixed-ladder matching structure.
//!
//! Two 4096-slot price ladders (one per side), each shadowed by a bitset
//! directory for O(1) best-price discovery, plus an id map for O(1)
//! cancel/modify lookup. Prices map onto a centered ladder around the
//! configured base price:
//!
//! - sell side: slot `(p - base) / tick`, ascending slot = ascending price
//! - buy side: slot `(base + (N/2 - 1)*tick - p) / tick`, ascending slot
//!   = descending price
//!
//! so on BOTH sides the best level is the lowest non-empty slot and
//! sweeps walk `find_lowest` then `find_next_higher`. Prices outside the
//! representable window are clamped to the edge slot before anything is
//! stored, keeping stored prices consistent with their slots.
//!
//! `add_limit_order` never matches: a crossing limit rests and the book
//! reports `is_crossed()`. Taker flow goes through market or IOC
//! execution.

use std::cell::Cell;
use std::ops::{Index, IndexMut};

use rustc_hash::FxHashMap;

use crate::config::{ConfigError, EngineConfig, MAX_PRICE_LEVELS, TRADE_BUFFER_RATIO};
use crate::directory::BitsetDirectory;
use crate::level::PriceLevel;
use crate::message::{OrderType, Side, Trade};
use crate::pool::{OrderPool, PoolIndex};

/// Order ID to pool handle mapping for O(1) cancel lookup
pub type OrderMap = FxHashMap<u64, PoolIndex>;

/// One side's array of price levels, aligned to a cache-line boundary so
/// level N never straddles a line shared with unrelated state.
#[repr(C, align(64))]
struct Ladder {
    levels: [PriceLevel; MAX_PRICE_LEVELS as usize],
}

impl Ladder {
    fn new() -> Box<Self> {
        Box::new(Ladder { levels: [PriceLevel::new(); MAX_PRICE_LEVELS as usize] })
    }

    fn clear(&mut self) {
        for level in self.levels.iter_mut() {
            level.clear();
        }
    }
}

impl Index<u32> for Ladder {
    type Output = PriceLevel;

    #[inline]
    fn index(&self, slot: u32) -> &PriceLevel {
        &self.levels[slot as usize]
    }
}

impl IndexMut<u32> for Ladder {
    #[inline]
    fn index_mut(&mut self, slot: u32) -> &mut PriceLevel {
        &mut self.levels[slot as usize]
    }
}

#[inline]
fn buy_price_ceiling(cfg: &EngineConfig) -> u32 {
    cfg.base_price.saturating_add((MAX_PRICE_LEVELS / 2 - 1).saturating_mul(cfg.price_tick))
}

#[inline]
fn buy_price_floor(cfg: &EngineConfig) -> u32 {
    // Validated at construction: base_price covers the buy half-span
    cfg.base_price - (MAX_PRICE_LEVELS / 2) * cfg.price_tick
}

#[inline]
fn sell_price_ceiling(cfg: &EngineConfig) -> u32 {
    cfg.base_price.saturating_add((MAX_PRICE_LEVELS - 1).saturating_mul(cfg.price_tick))
}

#[inline]
fn buy_slot(cfg: &EngineConfig, price: u32) -> u32 {
    (buy_price_ceiling(cfg) - price) / cfg.price_tick
}

#[inline]
fn sell_slot(cfg: &EngineConfig, price: u32) -> u32 {
    (price - cfg.base_price) / cfg.price_tick
}

#[inline]
fn buy_slot_price(cfg: &EngineConfig, slot: u32) -> u32 {
    buy_price_ceiling(cfg) - slot * cfg.price_tick
}

#[inline]
fn sell_slot_price(cfg: &EngineConfig, slot: u32) -> u32 {
    cfg.base_price + slot * cfg.price_tick
}

/// The limit order book.
pub struct OrderBook {
    buy_levels: Box<Ladder>,
    sell_levels: Box<Ladder>,

    buy_directory: BitsetDirectory,
    sell_directory: BitsetDirectory,

    pool: OrderPool,
    order_map: OrderMap,

    config: EngineConfig,

    // Lazily refreshed best-slot caches; Cell because best-price queries
    // take &self
    cached_best_bid_idx: Cell<u32>,
    cached_best_ask_idx: Cell<u32>,
    best_bid_valid: Cell<bool>,
    best_ask_valid: Cell<bool>,

    total_orders: u64,
    total_trades: u64,
    total_volume: u64,

    // Reused between executions: ids of fully filled resting orders
    // pending removal from the id map
    filled_scratch: Vec<u64>,
}

impl OrderBook {
    /// Build a book for the given ladder parameters. Allocates the pool
    /// slab and both ladders up front.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            buy_levels: Ladder::new(),
            sell_levels: Ladder::new(),
            buy_directory: BitsetDirectory::new(),
            sell_directory: BitsetDirectory::new(),
            pool: OrderPool::new(config.pool_capacity),
            order_map: OrderMap::with_capacity_and_hasher(
                config.pool_capacity as usize,
                Default::default(),
            ),
            config,
            cached_best_bid_idx: Cell::new(0),
            cached_best_ask_idx: Cell::new(0),
            best_bid_valid: Cell::new(false),
            best_ask_valid: Cell::new(false),
            total_orders: 0,
            total_trades: 0,
            total_volume: 0,
            filled_scratch: Vec::with_capacity(
                (config.pool_capacity / TRADE_BUFFER_RATIO).max(16) as usize,
            ),
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Core order operations
    // ========================================================================

    /// Rest a limit order on the book.
    ///
    /// Rejects (returns `false`, no side effects) on zero quantity or a
    /// duplicate id. Out-of-window prices are clamped to the edge slot.
    ///
    /// Never matches, even at a crossing price; takers use
    /// [`Self::execute_market_order`] / [`Self::execute_ioc_order`].
    pub fn add_limit_order(
        &mut self,
        order_id: u64,
        side: Side,
        price: u32,
        quantity: u32,
        timestamp: u64,
    ) -> bool {
        if quantity == 0 || self.order_map.contains_key(&order_id) {
            return false;
        }

        let (slot, price) = self.ladder_slot(side, price);

        // Exhaustion is a sizing error, not a business rejection: the pool
        // capacity is a construction-time commitment
        let index = self.pool.acquire().expect("order pool exhausted");
        self.pool
            .get_mut(index)
            .reset(order_id, price, quantity, side, OrderType::Limit, timestamp);
        self.order_map.insert(order_id, index);

        match side {
            Side::Buy => {
                let level = &mut self.buy_levels[slot];
                level.set_price(price);
                level.push_back(&mut self.pool, index);
                self.buy_directory.set(slot);
                self.best_bid_valid.set(false);
            }
            Side::Sell => {
                let level = &mut self.sell_levels[slot];
                level.set_price(price);
                level.push_back(&mut self.pool, index);
                self.sell_directory.set(slot);
                self.best_ask_valid.set(false);
            }
        }

        self.total_orders += 1;
        true
    }

    /// Remove a resting order. Unknown ids fail with no side effects.
    pub fn cancel_order(&mut self, order_id: u64) -> bool {
        let Some(index) = self.order_map.remove(&order_id) else {
            return false;
        };

        let order = self.pool.get(index);
        let side = order.side;
        let price = order.price;

        match side {
            Side::Buy => {
                let slot = buy_slot(&self.config, price);
                if self.buy_levels[slot].unlink(&mut self.pool, index) {
                    self.buy_directory.clear(slot);
                }
                self.best_bid_valid.set(false);
            }
            Side::Sell => {
                let slot = sell_slot(&self.config, price);
                if self.sell_levels[slot].unlink(&mut self.pool, index) {
                    self.sell_directory.clear(slot);
                }
                self.best_ask_valid.set(false);
            }
        }

        self.pool.release(index);
        true
    }

    /// Cancel-replace: the order keeps its id and side but loses time
    /// priority. Fails on unknown id or zero replacement quantity.
    pub fn modify_order(
        &mut self,
        order_id: u64,
        new_price: u32,
        new_quantity: u32,
        timestamp: u64,
    ) -> bool {
        if new_quantity == 0 {
            return false;
        }
        let Some(&index) = self.order_map.get(&order_id) else {
            return false;
        };
        let side = self.pool.get(index).side;

        if !self.cancel_order(order_id) {
            return false;
        }
        self.add_limit_order(order_id, side, new_price, new_quantity, timestamp)
    }

    /// Sweep the opposite side from the best price outward until `quantity`
    /// is filled or the book is exhausted. The unfilled remainder is
    /// discarded - market orders never rest.
    ///
    /// `taker_id` identifies the aggressor in the emitted trades.
    /// Returns the total quantity filled.
    pub fn execute_market_order(
        &mut self,
        side: Side,
        taker_id: u64,
        quantity: u32,
        timestamp: u64,
        trades: &mut Vec<Trade>,
    ) -> u32 {
        self.sweep(side, taker_id, None, quantity, timestamp, trades)
    }

    /// Market sweep with a price barrier: a BUY stops before any level
    /// priced above `limit_price`, a SELL before any level below it.
    /// The unfilled remainder is discarded.
    pub fn execute_ioc_order(
        &mut self,
        side: Side,
        taker_id: u64,
        limit_price: u32,
        quantity: u32,
        timestamp: u64,
        trades: &mut Vec<Trade>,
    ) -> u32 {
        self.sweep(side, taker_id, Some(limit_price), quantity, timestamp, trades)
    }

    fn sweep(
        &mut self,
        taker_side: Side,
        taker_id: u64,
        limit_price: Option<u32>,
        quantity: u32,
        timestamp: u64,
        trades: &mut Vec<Trade>,
    ) -> u32 {
        let cfg = self.config;
        let (ladder, directory) = match taker_side {
            Side::Buy => (&mut self.sell_levels, &mut self.sell_directory),
            Side::Sell => (&mut self.buy_levels, &mut self.buy_directory),
        };

        let mut remaining = quantity;
        let mut total_filled = 0u32;
        let mut slot = directory.find_lowest();

        while remaining > 0 && slot < MAX_PRICE_LEVELS {
            if let Some(limit) = limit_price {
                let level_price = match taker_side {
                    Side::Buy => sell_slot_price(&cfg, slot),
                    Side::Sell => buy_slot_price(&cfg, slot),
                };
                let beyond_limit = match taker_side {
                    Side::Buy => level_price > limit,
                    Side::Sell => level_price < limit,
                };
                if beyond_limit {
                    break;
                }
            }

            let level = &mut ladder[slot];
            if level.has_orders() {
                let filled = level.execute(
                    &mut self.pool,
                    remaining,
                    taker_side,
                    taker_id,
                    timestamp,
                    trades,
                    &mut self.filled_scratch,
                );
                total_filled += filled;
                remaining -= filled;
                self.total_volume += filled as u64;

                if level.is_empty() {
                    directory.clear(slot);
                }
            }

            slot = directory.find_next_higher(slot);
        }

        for order_id in self.filled_scratch.drain(..) {
            self.order_map.remove(&order_id);
        }

        if total_filled > 0 {
            self.total_trades += 1;
            match taker_side {
                Side::Buy => self.best_ask_valid.set(false),
                Side::Sell => self.best_bid_valid.set(false),
            }
        }

        total_filled
    }

    // ========================================================================
    // Best price queries (O(1) with the cached directory scan)
    // ========================================================================

    #[inline]
    fn refresh_best_bid(&self) {
        if !self.best_bid_valid.get() {
            self.cached_best_bid_idx.set(self.buy_directory.find_lowest());
            self.best_bid_valid.set(true);
        }
    }

    #[inline]
    fn refresh_best_ask(&self) {
        if !self.best_ask_valid.get() {
            self.cached_best_ask_idx.set(self.sell_directory.find_lowest());
            self.best_ask_valid.set(true);
        }
    }

    /// Highest resting buy price, or `0` when the buy side is empty.
    #[inline]
    pub fn best_bid(&self) -> u32 {
        self.refresh_best_bid();
        let slot = self.cached_best_bid_idx.get();
        if slot >= MAX_PRICE_LEVELS {
            return 0;
        }
        buy_slot_price(&self.config, slot)
    }

    /// Lowest resting sell price, or `u32::MAX` when the sell side is empty.
    #[inline]
    pub fn best_ask(&self) -> u32 {
        self.refresh_best_ask();
        let slot = self.cached_best_ask_idx.get();
        if slot >= MAX_PRICE_LEVELS {
            return u32::MAX;
        }
        sell_slot_price(&self.config, slot)
    }

    /// Aggregate resting quantity at the best bid (0 when empty).
    #[inline]
    pub fn best_bid_quantity(&self) -> u32 {
        self.refresh_best_bid();
        let slot = self.cached_best_bid_idx.get();
        if slot >= MAX_PRICE_LEVELS {
            return 0;
        }
        self.buy_levels[slot].total_quantity().min(u32::MAX as u64) as u32
    }

    /// Aggregate resting quantity at the best ask (0 when empty).
    #[inline]
    pub fn best_ask_quantity(&self) -> u32 {
        self.refresh_best_ask();
        let slot = self.cached_best_ask_idx.get();
        if slot >= MAX_PRICE_LEVELS {
            return 0;
        }
        self.sell_levels[slot].total_quantity().min(u32::MAX as u64) as u32
    }

    /// Whether best_bid >= best_ask. Observable state, not an error:
    /// crossing limits rest by design.
    pub fn is_crossed(&self) -> bool {
        let bid = self.best_bid();
        let ask = self.best_ask();
        bid != 0 && ask != u32::MAX && bid >= ask
    }

    // ========================================================================
    // Market data access
    // ========================================================================

    /// Up to `levels` non-empty levels per side as `(price, quantity)`
    /// pairs: bids highest price first, asks lowest price first.
    pub fn market_depth(&self, levels: u32) -> (Vec<(u32, u32)>, Vec<(u32, u32)>) {
        let mut bids = Vec::with_capacity(levels as usize);
        let mut asks = Vec::with_capacity(levels as usize);

        let mut slot = self.buy_directory.find_lowest();
        while slot < MAX_PRICE_LEVELS && (bids.len() as u32) < levels {
            let level = &self.buy_levels[slot];
            if level.has_orders() {
                bids.push((level.price(), level.total_quantity().min(u32::MAX as u64) as u32));
            }
            slot = self.buy_directory.find_next_higher(slot);
        }

        let mut slot = self.sell_directory.find_lowest();
        while slot < MAX_PRICE_LEVELS && (asks.len() as u32) < levels {
            let level = &self.sell_levels[slot];
            if level.has_orders() {
                asks.push((level.price(), level.total_quantity().min(u32::MAX as u64) as u32));
            }
            slot = self.sell_directory.find_next_higher(slot);
        }

        (bids, asks)
    }

    /// Aggregate quantity and order count resting at a price.
    pub fn depth_at(&self, side: Side, price: u32) -> (u64, u32) {
        let (slot, _) = self.ladder_slot(side, price);
        let level = match side {
            Side::Buy => &self.buy_levels[slot],
            Side::Sell => &self.sell_levels[slot],
        };
        if level.has_orders() {
            (level.total_quantity(), level.order_count())
        } else {
            (0, 0)
        }
    }

    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.order_map.contains_key(&order_id)
    }

    /// Number of live resting orders.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.order_map.len()
    }

    // ========================================================================
    // State management
    // ========================================================================

    /// Drop every resting order and zero the statistics. Pool slots are
    /// reclaimed wholesale.
    pub fn clear(&mut self) {
        self.buy_levels.clear();
        self.sell_levels.clear();
        self.buy_directory.clear_all();
        self.sell_directory.clear_all();
        self.order_map.clear();
        self.pool.reset();
        self.filled_scratch.clear();
        self.best_bid_valid.set(false);
        self.best_ask_valid.set(false);
        self.reset_statistics();
    }

    /// Full structural audit: directory consistency, per-level walks,
    /// directory-bit/level agreement, and id-map/book agreement.
    pub fn validate_integrity(&self) -> bool {
        if !self.buy_directory.validate_consistency() || !self.sell_directory.validate_consistency()
        {
            return false;
        }

        let mut linked = 0u64;
        for slot in 0..MAX_PRICE_LEVELS {
            let buy_level = &self.buy_levels[slot];
            let sell_level = &self.sell_levels[slot];

            if !buy_level.validate_integrity(&self.pool)
                || !sell_level.validate_integrity(&self.pool)
            {
                return false;
            }
            if self.buy_directory.test(slot) != buy_level.has_orders()
                || self.sell_directory.test(slot) != sell_level.has_orders()
            {
                return false;
            }
            linked += buy_level.order_count() as u64 + sell_level.order_count() as u64;
        }

        if linked != self.order_map.len() as u64 {
            return false;
        }

        // Every mapped order must be the slot its stored price points at
        for (&order_id, &index) in &self.order_map {
            let order = self.pool.get(index);
            if order.order_id != order_id {
                return false;
            }
            let bit_set = match order.side {
                Side::Buy => self.buy_directory.test(buy_slot(&self.config, order.price)),
                Side::Sell => self.sell_directory.test(sell_slot(&self.config, order.price)),
            };
            if !bit_set {
                return false;
            }
        }

        true
    }

    /// Pre-fault the pool slab.
    pub fn warm_up(&mut self) {
        self.pool.warm_up();
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Limit orders accepted since construction or the last clear.
    #[inline]
    pub fn total_orders(&self) -> u64 {
        self.total_orders
    }

    /// Market/IOC executions that filled at least one share.
    #[inline]
    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    /// Total matched quantity.
    #[inline]
    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    pub fn reset_statistics(&mut self) {
        self.total_orders = 0;
        self.total_trades = 0;
        self.total_volume = 0;
    }

    // ========================================================================
    // Price <-> slot mapping
    // ========================================================================

    /// Map a price to its ladder slot and the slot's canonical price.
    ///
    /// Out-of-window prices clamp to the edge slot; prices off the tick
    /// grid quantize to the slot they land in. The canonical price is
    /// what orders and levels store, so stored prices always map back to
    /// their slot.
    #[inline]
    fn ladder_slot(&self, side: Side, price: u32) -> (u32, u32) {
        match side {
            Side::Buy => {
                let clamped =
                    price.clamp(buy_price_floor(&self.config), buy_price_ceiling(&self.config));
                let slot = buy_slot(&self.config, clamped);
                (slot, buy_slot_price(&self.config, slot))
            }
            Side::Sell => {
                let clamped = price.clamp(self.config.base_price, sell_price_ceiling(&self.config));
                let slot = sell_slot(&self.config, clamped);
                (slot, sell_slot_price(&self.config, slot))
            }
        }
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("order_count", &self.order_map.len())
            .field("total_orders", &self.total_orders)
            .field("total_trades", &self.total_trades)
            .field("total_volume", &self.total_volume)
            .finish()
    }
}
