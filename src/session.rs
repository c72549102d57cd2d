//! One client session over one connection: stream-all, drain, backfill, export.
use tracing::{info, warn};

use crate::backfill::backfill;
use crate::channel::Channel;
use crate::codec::encode_stream_all_request;
use crate::collector::Collector;
use crate::error::{AbxError, ResendFailure};
use crate::export::export_ordered;
use crate::record::Record;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Backfill passes to run, at least one. Each pass retries whatever the
    /// previous one left missing.
    pub backfill_passes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { backfill_passes: 1 }
    }
}

/// Best-effort result of a session.
#[derive(Debug)]
pub struct SessionReport {
    /// Ascending by sequence number, no duplicates.
    pub records: Vec<Record>,
    /// Sequence numbers still missing after the last backfill pass.
    pub unrecovered: Vec<ResendFailure>,
    /// Non-positive sequence numbers seen in the stream.
    pub unexpected_sequences: Vec<i32>,
    pub max_sequence: i32,
}

impl SessionReport {
    pub fn is_complete(&self) -> bool {
        self.unrecovered.is_empty()
    }

    pub fn missing(&self) -> Vec<i32> {
        self.unrecovered.iter().map(|f| f.sequence).collect()
    }
}

/// Owns the channel for the whole session. Dropping the session drops the
/// channel, which closes a socket on every exit path.
pub struct Session<C: Channel> {
    channel: C,
    collector: Collector,
    config: SessionConfig,
}

impl<C: Channel> Session<C> {
    pub fn new(channel: C, config: SessionConfig) -> Self {
        Self { channel, collector: Collector::new(), config }
    }

    /// Run all phases. Failures while requesting or draining the stream are
    /// fatal and returned; backfill failures end up in the report.
    pub fn run(&mut self) -> Result<SessionReport, AbxError> {
        self.channel.send(&encode_stream_all_request())?;
        info!("stream-all requested");
        self.collector.drain_all(&mut self.channel)?;

        let mut unrecovered = Vec::new();
        for pass in 1..=self.config.backfill_passes.max(1) {
            let missing = self.collector.missing_sequences();
            if missing.is_empty() {
                unrecovered.clear();
                break;
            }
            warn!(pass, gaps = missing.len(), "sequence gaps detected");
            unrecovered = backfill(&mut self.channel, &missing, &mut self.collector);
        }

        let records = export_ordered(&self.collector);
        info!(records = records.len(), unrecovered = unrecovered.len(), "session finished");
        Ok(SessionReport {
            records,
            unrecovered,
            unexpected_sequences: self.collector.unexpected_sequences().to_vec(),
            max_sequence: self.collector.max_sequence(),
        })
    }

    /// Store as it stands, including records decoded before a fatal error.
    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn into_inner(self) -> C {
        self.channel
    }
}
