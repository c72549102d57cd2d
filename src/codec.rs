//! Wire codec for the ABX feed.
//!
//! All multi-byte integers are big-endian. Layouts:
//!
//! ```text
//! StreamAll  (2 bytes)  [call_type=1 u8][pad=0 u8]
//! Resend     (5 bytes)  [call_type=2 u8][sequence i32]
//! Record    (17 bytes)  [symbol 4][side u8][quantity i32][price i32][sequence i32]
//! ```
//!
//! Every field is read and written explicitly from a byte slice; nothing is
//! overlaid on a struct layout.
use crate::error::AbxError;
use crate::record::{Record, RequestFrame, Side};

/// Size of one inbound wire record.
pub const RECORD_LEN: usize = 17;
pub const STREAM_ALL_LEN: usize = 2;
pub const RESEND_LEN: usize = 5;

pub const CALL_STREAM_ALL: u8 = 1;
pub const CALL_RESEND: u8 = 2;

const OFF_SYMBOL: usize = 0;
const SYMBOL_LEN: usize = 4;
const OFF_SIDE: usize = 4;
const OFF_QUANTITY: usize = 5;
const OFF_PRICE: usize = 9;
const OFF_SEQUENCE: usize = 13;

fn read_i32_be(b: &[u8], off: usize) -> i32 {
    let mut tmp = [0u8; 4];
    tmp.copy_from_slice(&b[off..off + 4]);
    i32::from_be_bytes(tmp)
}

/// Decode one wire record. `bytes` must be exactly [`RECORD_LEN`] long.
///
/// The symbol is cut at the first NUL byte; a symbol with no NUL uses all four
/// characters and a leading NUL gives an empty symbol.
pub fn decode_record(bytes: &[u8]) -> Result<Record, AbxError> {
    if bytes.len() != RECORD_LEN {
        return Err(AbxError::MalformedRecord { len: bytes.len() });
    }
    let raw_symbol = &bytes[OFF_SYMBOL..OFF_SYMBOL + SYMBOL_LEN];
    let end = raw_symbol.iter().position(|&c| c == 0).unwrap_or(SYMBOL_LEN);
    let symbol = String::from_utf8_lossy(&raw_symbol[..end]).into_owned();
    let side_byte = bytes[OFF_SIDE];
    let side = Side::from_indicator(side_byte).ok_or(AbxError::UnknownSide(side_byte))?;
    Ok(Record::new(
        symbol,
        side,
        read_i32_be(bytes, OFF_QUANTITY),
        read_i32_be(bytes, OFF_PRICE),
        read_i32_be(bytes, OFF_SEQUENCE),
    ))
}

/// Encode a record in wire form. Symbols longer than four bytes are cut,
/// shorter ones are NUL-padded.
pub fn encode_record(record: &Record) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    let sym = record.symbol().as_bytes();
    let n = sym.len().min(SYMBOL_LEN);
    out[OFF_SYMBOL..OFF_SYMBOL + n].copy_from_slice(&sym[..n]);
    out[OFF_SIDE] = record.side().indicator();
    out[OFF_QUANTITY..OFF_QUANTITY + 4].copy_from_slice(&record.quantity().to_be_bytes());
    out[OFF_PRICE..OFF_PRICE + 4].copy_from_slice(&record.price().to_be_bytes());
    out[OFF_SEQUENCE..OFF_SEQUENCE + 4].copy_from_slice(&record.sequence_number().to_be_bytes());
    out
}

pub fn encode_stream_all_request() -> [u8; STREAM_ALL_LEN] {
    [CALL_STREAM_ALL, 0]
}

/// Encode a resend request. Rejects `seq < 1` before any I/O can happen.
pub fn encode_resend_request(seq: i32) -> Result<[u8; RESEND_LEN], AbxError> {
    if seq < 1 {
        return Err(AbxError::InvalidArgument { sequence: seq });
    }
    let mut out = [0u8; RESEND_LEN];
    out[0] = CALL_RESEND;
    out[1..].copy_from_slice(&seq.to_be_bytes());
    Ok(out)
}

impl RequestFrame {
    pub fn encode(&self) -> Result<Vec<u8>, AbxError> {
        match *self {
            RequestFrame::StreamAll => Ok(encode_stream_all_request().to_vec()),
            RequestFrame::Resend { sequence_number } => {
                Ok(encode_resend_request(sequence_number)?.to_vec())
            }
        }
    }
}
