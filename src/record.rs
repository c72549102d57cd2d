use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire indicator: `B` or `S`.
    pub fn indicator(self) -> u8 {
        match self {
            Side::Buy => b'B',
            Side::Sell => b'S',
        }
    }

    pub fn from_indicator(b: u8) -> Option<Self> {
        match b {
            b'B' => Some(Side::Buy),
            b'S' => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.pad("Buy"),
            Side::Sell => f.pad("Sell"),
        }
    }
}

/// One trade event from the feed.
///
/// Integers are held in host order; byte-order conversion happens once in
/// [`crate::codec::decode_record`]. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    symbol: String,
    side: Side,
    quantity: i32,
    price: i32,
    sequence_number: i32,
}

impl Record {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        quantity: i32,
        price: i32,
        sequence_number: i32,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price,
            sequence_number,
        }
    }

    /// Ticker with trailing padding stripped.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    /// Exchange fixed-point units, unscaled.
    pub fn price(&self) -> i32 {
        self.price
    }

    pub fn sequence_number(&self) -> i32 {
        self.sequence_number
    }
}

/// Outbound control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFrame {
    /// Ask the server to stream every record it holds, then close.
    StreamAll,
    /// Ask for a single record by sequence number.
    Resend { sequence_number: i32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureHeader {
    pub version: u16,
    pub created_unix_ns: u128,
    pub server: String,
    pub max_sequence: i32,
    pub record_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaptureFrame {
    Header(CaptureHeader),
    Record(Record),
    /// Sequence number that stayed missing after backfill.
    Unrecovered { sequence: i32, reason: String },
}
