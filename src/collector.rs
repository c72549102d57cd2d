//! Gap-aware collection of the stream-all response.
//!
//! [`Collector`] owns the single record store for a session. The drain phase
//! and the backfill driver both write into it; the exporter only reads it.
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::channel::{read_exact_or_eof, Channel};
use crate::codec::{decode_record, RECORD_LEN};
use crate::error::AbxError;
use crate::record::Record;

#[derive(Debug, Default)]
pub struct Collector {
    store: BTreeMap<i32, Record>,
    max_sequence: i32,
    unexpected: Vec<i32>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read records until the server closes the stream.
    ///
    /// Clean end of stream at a record boundary is the normal exit. A stream
    /// that ends mid-record or any other read failure aborts the drain; records
    /// stored before the failure stay in place.
    pub fn drain_all<C: Channel + ?Sized>(&mut self, channel: &mut C) -> Result<(), AbxError> {
        let mut buf = [0u8; RECORD_LEN];
        let mut count = 0usize;
        while read_exact_or_eof(channel, &mut buf)? {
            let record = decode_record(&buf)?;
            self.accept(record);
            count += 1;
        }
        info!(count, max_sequence = self.max_sequence, "stream drained");
        Ok(())
    }

    /// Store a record from the initial stream and advance the running maximum.
    ///
    /// Non-positive sequence numbers are kept and reported through
    /// [`Collector::unexpected_sequences`]; they never move the maximum.
    pub fn accept(&mut self, record: Record) {
        let seq = record.sequence_number();
        if seq >= 1 {
            self.max_sequence = self.max_sequence.max(seq);
        }
        self.merge(record);
    }

    /// Store a backfilled record. Last write wins and the maximum never moves.
    pub(crate) fn merge(&mut self, record: Record) {
        let seq = record.sequence_number();
        if seq < 1 {
            warn!(seq, symbol = record.symbol(), "non-positive sequence number received");
            self.unexpected.push(seq);
        }
        debug!(seq, symbol = record.symbol(), side = %record.side(), "record stored");
        if self.store.insert(seq, record).is_some() {
            debug!(seq, "replaced existing record");
        }
    }

    /// Every sequence number in `[1, max]` with no stored record, ascending.
    pub fn missing_sequences(&self) -> Vec<i32> {
        if self.max_sequence < 1 {
            return Vec::new();
        }
        (1..=self.max_sequence).filter(|s| !self.store.contains_key(s)).collect()
    }

    pub fn contains(&self, sequence: i32) -> bool {
        self.store.contains_key(&sequence)
    }

    pub fn get(&self, sequence: i32) -> Option<&Record> {
        self.store.get(&sequence)
    }

    pub fn max_sequence(&self) -> i32 {
        self.max_sequence
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn unexpected_sequences(&self) -> &[i32] {
        &self.unexpected
    }

    /// Stored records in ascending sequence order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.store.values()
    }
}
