//! CSV tape decoding - normalized order events from offline captures.
//!
//! The core only understands [`OrderMessage`]; this module turns one row
//! of a recorded CSV tape (decimal prices, RFC 3339 timestamps) into that
//! fixed-point form. Feed decoding stays outside the matching hot path:
//! tapes are converted up front and then batched into the engine.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::message::{MsgKind, OrderMessage, Side};

/// One row of a normalized tape.
///
/// `kind` is one of `add`, `cancel`, `modify`, `market`, `ioc`. Columns
/// that a kind does not use may be empty.
#[derive(Debug, Deserialize)]
pub struct TapeRow {
    pub kind: String,
    pub order_id: u64,
    pub side: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TapeRow {
    /// Convert to the engine's fixed-point message form.
    ///
    /// `price_mult` scales decimal prices into integer ticks (e.g. 100
    /// for cent ticks on a dollar-quoted tape). Rows with an unknown
    /// kind, an unrepresentable price, or a bad side string are dropped.
    pub fn to_message(&self, price_mult: u32) -> Option<OrderMessage> {
        let kind = match self.kind.as_str() {
            "add" => MsgKind::AddOrder,
            "cancel" => MsgKind::CancelOrder,
            "modify" => MsgKind::ModifyOrder,
            "market" => MsgKind::MarketOrder,
            "ioc" => MsgKind::IocOrder,
            _ => return None,
        };

        let side = match self.side.as_deref() {
            Some("buy") | Some("bid") => Side::Buy,
            Some("sell") | Some("ask") => Side::Sell,
            // CANCEL/MODIFY rows may omit the side
            None | Some("") => Side::Buy,
            _ => return None,
        };

        let price = match self.price {
            Some(p) => (p * Decimal::from(price_mult)).to_u32()?,
            None => 0,
        };

        let timestamp = self
            .timestamp
            .and_then(|ts| ts.timestamp_nanos_opt())
            .map(|ns| ns as u64)
            .unwrap_or(0);

        Some(OrderMessage {
            kind,
            order_id: self.order_id,
            side,
            price,
            quantity: self.quantity.unwrap_or(0),
            timestamp,
        })
    }
}

/// Decode a whole CSV tape. Undecodable rows are skipped, matching live
/// feed handling where malformed events are dropped rather than fatal.
pub fn read_tape<R: std::io::Read>(reader: R, price_mult: u32) -> csv::Result<Vec<OrderMessage>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut messages = Vec::new();
    for row in csv_reader.deserialize::<TapeRow>() {
        if let Some(msg) = row?.to_message(price_mult) {
            messages.push(msg);
        }
    }
    Ok(messages)
}
