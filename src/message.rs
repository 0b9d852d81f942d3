//! Message and Trade types for the matching engine.
//!
//! Messages are the normalized order events produced by an external feed
//! decoder. Trades are the outputs handed to market data consumers.
//!
//! `OrderMessage` doubles as the journal record: it has a fixed 26-byte
//! little-endian wire layout (see [`OrderMessage::encode`]) so a recorded
//! session can be persisted and replayed byte-for-byte. Interoperability
//! across hosts with different endianness is not a goal.

/// Order side (buy = bid, sell = ask)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    #[inline]
    fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Side::Buy),
            1 => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Order type determines matching behavior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Limit order - rests in the book until matched or cancelled (default)
    #[default]
    Limit = 0,
    /// Market order - sweeps best prices, never rests
    Market = 1,
    /// Immediate-Or-Cancel - market sweep with a price barrier, never rests
    Ioc = 2,
}

/// Message kind dispatch tags. The discriminants are the wire bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgKind {
    AddOrder = b'A',
    CancelOrder = b'C',
    ModifyOrder = b'M',
    MarketOrder = b'X',
    IocOrder = b'I',
}

impl MsgKind {
    #[inline]
    fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(MsgKind::AddOrder),
            b'C' => Some(MsgKind::CancelOrder),
            b'M' => Some(MsgKind::ModifyOrder),
            b'X' => Some(MsgKind::MarketOrder),
            b'I' => Some(MsgKind::IocOrder),
            _ => None,
        }
    }
}

/// Serialized size of one [`OrderMessage`] record.
pub const MESSAGE_WIRE_SIZE: usize = 26;

/// A normalized order event.
///
/// Fields not used by a given kind are carried but ignored: `price` for
/// CANCEL and MARKET, `quantity` for CANCEL. For MODIFY, `price` and
/// `quantity` are the replacement values. For MARKET and IOC, `order_id`
/// identifies the aggressor in the resulting trades.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderMessage {
    pub kind: MsgKind,
    pub order_id: u64,
    pub side: Side,
    pub price: u32,
    pub quantity: u32,
    pub timestamp: u64,
}

impl OrderMessage {
    #[inline]
    pub const fn add(order_id: u64, side: Side, price: u32, quantity: u32, timestamp: u64) -> Self {
        Self { kind: MsgKind::AddOrder, order_id, side, price, quantity, timestamp }
    }

    #[inline]
    pub const fn cancel(order_id: u64, timestamp: u64) -> Self {
        Self { kind: MsgKind::CancelOrder, order_id, side: Side::Buy, price: 0, quantity: 0, timestamp }
    }

    #[inline]
    pub const fn modify(order_id: u64, new_price: u32, new_quantity: u32, timestamp: u64) -> Self {
        Self {
            kind: MsgKind::ModifyOrder,
            order_id,
            side: Side::Buy,
            price: new_price,
            quantity: new_quantity,
            timestamp,
        }
    }

    #[inline]
    pub const fn market(order_id: u64, side: Side, quantity: u32, timestamp: u64) -> Self {
        Self { kind: MsgKind::MarketOrder, order_id, side, price: 0, quantity, timestamp }
    }

    #[inline]
    pub const fn ioc(order_id: u64, side: Side, limit_price: u32, quantity: u32, timestamp: u64) -> Self {
        Self { kind: MsgKind::IocOrder, order_id, side, price: limit_price, quantity, timestamp }
    }

    /// Serialize to the fixed little-endian wire layout.
    ///
    /// ```text
    /// | Field     | Type | Offset | Size |
    /// |-----------|------|--------|------|
    /// | msg_type  | u8   | 0      | 1    |
    /// | order_id  | u64  | 1      | 8    |
    /// | side      | u8   | 9      | 1    |
    /// | price     | u32  | 10     | 4    |
    /// | quantity  | u32  | 14     | 4    |
    /// | timestamp | u64  | 18     | 8    |
    /// ```
    pub fn encode(&self) -> [u8; MESSAGE_WIRE_SIZE] {
        let mut buf = [0u8; MESSAGE_WIRE_SIZE];
        buf[0] = self.kind as u8;
        buf[1..9].copy_from_slice(&self.order_id.to_le_bytes());
        buf[9] = self.side as u8;
        buf[10..14].copy_from_slice(&self.price.to_le_bytes());
        buf[14..18].copy_from_slice(&self.quantity.to_le_bytes());
        buf[18..26].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    /// Deserialize from the wire layout. Returns `None` for an unknown
    /// kind or side byte (a corrupt or truncated journal).
    pub fn decode(buf: &[u8; MESSAGE_WIRE_SIZE]) -> Option<Self> {
        let kind = MsgKind::from_wire(buf[0])?;
        let side = Side::from_wire(buf[9])?;
        Some(Self {
            kind,
            order_id: u64::from_le_bytes(buf[1..9].try_into().unwrap()),
            side,
            price: u32::from_le_bytes(buf[10..14].try_into().unwrap()),
            quantity: u32::from_le_bytes(buf[14..18].try_into().unwrap()),
            timestamp: u64::from_le_bytes(buf[18..26].try_into().unwrap()),
        })
    }
}

/// A trade produced by a match.
///
/// Both resting and aggressor identities are carried: for a buy-side
/// aggressor `buy_order_id` is the taker, for a sell-side aggressor
/// `sell_order_id` is. The price is always the resting level's price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trade {
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub price: u32,
    pub quantity: u32,
    pub timestamp: u64,
}

impl Trade {
    #[inline]
    pub const fn new(buy_order_id: u64, sell_order_id: u64, price: u32, quantity: u32, timestamp: u64) -> Self {
        Self { buy_order_id, sell_order_id, price, quantity, timestamp }
    }
}
