//! Error taxonomy for the feed client.
use std::io;

use thiserror::Error;

/// Errors raised while decoding frames or talking to the exchange.
#[derive(Error, Debug)]
pub enum AbxError {
    /// Decode was handed a buffer that is not exactly one wire record.
    #[error("malformed record: expected 17 bytes, got {len}")]
    MalformedRecord { len: usize },

    /// Side indicator byte is neither `B` nor `S`.
    #[error("unknown side indicator {0:#04x}")]
    UnknownSide(u8),

    /// End of stream reached after a partial record.
    #[error("stream ended mid-record after {received} of 17 bytes")]
    TruncatedRecord { received: usize },

    /// Read or write failure other than a clean end of stream.
    #[error("channel error: {0}")]
    Channel(#[from] io::Error),

    /// Resend requested for a non-positive sequence number.
    #[error("invalid resend sequence number {sequence}, must be >= 1")]
    InvalidArgument { sequence: i32 },

    /// The server answered a resend with a different record.
    #[error("resend for sequence {requested} answered with sequence {received}")]
    UnexpectedSequence { requested: i32, received: i32 },
}

/// One backfill attempt that could not recover its sequence number.
#[derive(Error, Debug)]
#[error("sequence {sequence} not recovered: {cause}")]
pub struct ResendFailure {
    pub sequence: i32,
    #[source]
    pub cause: AbxError,
}
