//! Price level - a FIFO queue of orders resting at one price.
//!
//! Doubly-linked intrusive list over pool indices: O(1) append at the
//! tail, O(1) unlink from any position. One extra u32 per order buys
//! constant-time cancels, which dominate real order flow.

use crate::message::{Side, Trade};
use crate::pool::{OrderPool, PoolIndex, NULL_INDEX};

/// A queue of orders at one price, oldest at the head.
#[derive(Clone, Copy, Debug)]
pub struct PriceLevel {
    /// Oldest order (first to match)
    head: PoolIndex,
    /// Newest order (last to match)
    tail: PoolIndex,
    /// Price shared by every linked order
    price: u32,
    /// Sum of remaining quantity across linked orders
    total_qty: u64,
    /// Number of linked orders
    count: u32,
}

impl PriceLevel {
    #[inline]
    pub const fn new() -> Self {
        Self { head: NULL_INDEX, tail: NULL_INDEX, price: 0, total_qty: 0, count: 0 }
    }

    #[inline]
    pub const fn has_orders(&self) -> bool {
        self.head != NULL_INDEX
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub const fn price(&self) -> u32 {
        self.price
    }

    #[inline]
    pub fn set_price(&mut self, price: u32) {
        self.price = price;
    }

    #[inline]
    pub const fn total_quantity(&self) -> u64 {
        self.total_qty
    }

    #[inline]
    pub const fn order_count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub const fn front(&self) -> PoolIndex {
        self.head
    }

    /// Append an order at the tail (lowest time priority).
    ///
    /// The order must already be initialized; its remaining quantity joins
    /// the level aggregate.
    #[inline]
    pub fn push_back(&mut self, pool: &mut OrderPool, index: PoolIndex) {
        let qty = pool.get(index).remaining_qty;

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
            self.tail = index;
            let order = pool.get_mut(index);
            order.prev = NULL_INDEX;
            order.next = NULL_INDEX;
        } else {
            pool.get_mut(self.tail).next = index;
            let order = pool.get_mut(index);
            order.prev = self.tail;
            order.next = NULL_INDEX;
            self.tail = index;
        }

        self.count += 1;
        self.total_qty += qty as u64;
    }

    /// Unlink an order from anywhere in the queue.
    ///
    /// Returns `true` if the level is now empty. The slot is NOT released;
    /// the caller owns that.
    #[inline]
    pub fn unlink(&mut self, pool: &mut OrderPool, index: PoolIndex) -> bool {
        let order = pool.get(index);
        let prev = order.prev;
        let next = order.next;
        let qty = order.remaining_qty;

        if prev == NULL_INDEX && next == NULL_INDEX {
            debug_assert!(self.head == index && self.tail == index);
            self.head = NULL_INDEX;
            self.tail = NULL_INDEX;
        } else if prev == NULL_INDEX {
            debug_assert!(self.head == index);
            self.head = next;
            pool.get_mut(next).prev = NULL_INDEX;
        } else if next == NULL_INDEX {
            debug_assert!(self.tail == index);
            self.tail = prev;
            pool.get_mut(prev).next = NULL_INDEX;
        } else {
            pool.get_mut(prev).next = next;
            pool.get_mut(next).prev = prev;
        }

        self.count -= 1;
        self.total_qty -= qty as u64;

        let order = pool.get_mut(index);
        order.prev = NULL_INDEX;
        order.next = NULL_INDEX;

        self.count == 0
    }

    /// Fill up to `qty` against this level, head forward.
    ///
    /// Emits one [`Trade`] per non-zero fill at this level's price, with
    /// buyer/seller resolved from the aggressor's side and id. Fully
    /// filled orders are unlinked, released back to the pool, and their
    /// ids appended to `filled` so the caller can drop them from its id
    /// map. Stops when `qty` is exhausted or the queue empties.
    ///
    /// Returns the total quantity filled.
    pub fn execute(
        &mut self,
        pool: &mut OrderPool,
        qty: u32,
        taker_side: Side,
        taker_id: u64,
        timestamp: u64,
        trades: &mut Vec<Trade>,
        filled: &mut Vec<u64>,
    ) -> u32 {
        let mut remaining = qty;
        let mut executed = 0u32;

        while remaining > 0 && self.head != NULL_INDEX {
            let head = self.head;
            let order = pool.get_mut(head);
            debug_assert!(order.remaining_qty > 0, "filled order linked in level");

            let exec_qty = order.fill(remaining);
            let resting_id = order.order_id;
            let fully_filled = order.is_filled();

            remaining -= exec_qty;
            executed += exec_qty;
            self.total_qty -= exec_qty as u64;

            let (buy_id, sell_id) = match taker_side {
                Side::Buy => (taker_id, resting_id),
                Side::Sell => (resting_id, taker_id),
            };
            trades.push(Trade::new(buy_id, sell_id, self.price, exec_qty, timestamp));

            if fully_filled {
                // remaining_qty is zero, so unlink adjusts only the links
                self.unlink(pool, head);
                pool.release(head);
                filled.push(resting_id);
            }
        }

        executed
    }

    /// Forget all linkage. Orders are NOT released; callers resetting the
    /// whole book reset the pool wholesale instead.
    pub fn clear(&mut self) {
        self.head = NULL_INDEX;
        self.tail = NULL_INDEX;
        self.total_qty = 0;
        self.count = 0;
    }

    /// Walk head to tail and recheck the stored aggregates.
    pub fn validate_integrity(&self, pool: &OrderPool) -> bool {
        if (self.head == NULL_INDEX) != (self.tail == NULL_INDEX) {
            return false;
        }
        if self.head == NULL_INDEX {
            return self.count == 0 && self.total_qty == 0;
        }

        let mut visited = 0u32;
        let mut qty_sum = 0u64;
        let mut prev = NULL_INDEX;
        let mut current = self.head;

        while current != NULL_INDEX {
            let order = pool.get(current);
            if order.prev != prev || order.price != self.price || order.remaining_qty == 0 {
                return false;
            }
            visited += 1;
            qty_sum += order.remaining_qty as u64;
            if visited > self.count {
                return false;
            }
            prev = current;
            current = order.next;
        }

        prev == self.tail && visited == self.count && qty_sum == self.total_qty
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}
