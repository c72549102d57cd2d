//! ABX exchange feed client library.
//!
//! This crate provides the core types and logic used by the `abx_client`
//! binary and the `player` tool:
//!
//! - `record`: trade record model and the on-disk capture frames
//! - `codec`: field-by-field encode/decode of the 17-byte wire record and the
//!   two outbound request frames
//! - `channel`: the duplex byte-stream seam plus the exact-read primitive
//! - `collector`: drains the stream-all response and detects sequence gaps
//! - `backfill`: re-requests each missing sequence number, one at a time
//! - `export`: ordered view of the merged records and JSON rendering
//! - `session`: ties the phases together over one connection
//! - `capture`: CRC-framed bincode capture files read back by `player`
pub mod backfill;
pub mod capture;
pub mod channel;
pub mod codec;
pub mod collector;
pub mod error;
pub mod export;
pub mod record;
pub mod session;

pub use error::{AbxError, ResendFailure};
pub use record::{Record, Side};
pub use session::{Session, SessionConfig, SessionReport};
