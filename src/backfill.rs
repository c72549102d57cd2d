//! Per-sequence resend of records missing after the initial stream.
//!
//! The protocol is strictly request/response: one resend frame out, one
//! record back, before the next request is written. Requests are never
//! pipelined.
use tracing::{debug, info, warn};

use crate::channel::{read_exact_or_eof, Channel};
use crate::codec::{decode_record, encode_resend_request, RECORD_LEN};
use crate::collector::Collector;
use crate::error::{AbxError, ResendFailure};

/// Request every sequence number in `missing` once, in ascending order.
///
/// The target set is fixed before the first request: sequence numbers already
/// stored at call time are skipped, and records that arrive during the pass
/// do not change which requests are sent. A failed send, read or decode is
/// recorded for that sequence number and the pass moves on. On return every
/// target is either stored or listed in the returned failures.
pub fn backfill<C: Channel + ?Sized>(
    channel: &mut C,
    missing: &[i32],
    collector: &mut Collector,
) -> Vec<ResendFailure> {
    let mut targets: Vec<i32> = missing
        .iter()
        .copied()
        .filter(|&s| !collector.contains(s))
        .collect();
    targets.sort_unstable();
    targets.dedup();

    let mut failures = Vec::new();
    for &seq in &targets {
        if let Err(cause) = resend_one(channel, seq, collector) {
            warn!(seq, error = %cause, "resend failed");
            failures.push(ResendFailure { sequence: seq, cause });
        }
    }
    // a mismatched answer to one request can carry the record another request missed
    failures.retain(|f| !collector.contains(f.sequence));
    info!(requested = targets.len(), failed = failures.len(), "backfill pass finished");
    failures
}

fn resend_one<C: Channel + ?Sized>(
    channel: &mut C,
    seq: i32,
    collector: &mut Collector,
) -> Result<(), AbxError> {
    let frame = encode_resend_request(seq)?;
    debug!(seq, "requesting resend");
    channel.send(&frame)?;

    let mut buf = [0u8; RECORD_LEN];
    if !read_exact_or_eof(channel, &mut buf)? {
        return Err(AbxError::TruncatedRecord { received: 0 });
    }
    let record = decode_record(&buf)?;
    let received = record.sequence_number();
    collector.merge(record);
    if received != seq {
        return Err(AbxError::UnexpectedSequence { requested: seq, received });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{ScriptedChannel, Step};
    use crate::codec::encode_record;
    use crate::record::{Record, Side};
    use std::io::ErrorKind;

    fn rec(seq: i32) -> Record {
        Record::new("AAPL", Side::Buy, 10, 500 + seq, seq)
    }

    fn collector_with(seqs: &[i32]) -> Collector {
        let mut c = Collector::new();
        for &s in seqs {
            c.accept(rec(s));
        }
        c
    }

    fn resend_frame(seq: i32) -> Vec<u8> {
        encode_resend_request(seq).unwrap().to_vec()
    }

    #[test]
    fn fills_single_gap() {
        let mut c = collector_with(&[1, 2, 4, 5]);
        let missing = c.missing_sequences();
        let mut ch = ScriptedChannel::new(vec![Step::Data(encode_record(&rec(3)).to_vec())]);
        let failures = backfill(&mut ch, &missing, &mut c);
        assert!(failures.is_empty());
        assert_eq!(ch.written, resend_frame(3));
        assert!(c.missing_sequences().is_empty());
        assert_eq!(c.len(), 5);
    }

    #[test]
    fn requests_in_ascending_order_one_at_a_time() {
        let mut c = collector_with(&[1, 5]);
        let steps = [2, 3, 4]
            .iter()
            .map(|&s| Step::Data(encode_record(&rec(s)).to_vec()))
            .collect();
        let mut ch = ScriptedChannel::new(steps);
        let failures = backfill(&mut ch, &[4, 2, 3, 2], &mut c);
        assert!(failures.is_empty());
        let expected: Vec<u8> = [2, 3, 4].iter().flat_map(|&s| resend_frame(s)).collect();
        assert_eq!(ch.written, expected);
    }

    #[test]
    fn send_failure_is_isolated() {
        let mut c = collector_with(&[1, 3]);
        let mut ch = ScriptedChannel::new(vec![]);
        ch.fail_writes = vec![0];
        let failures = backfill(&mut ch, &[2], &mut c);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].sequence, 2);
        assert!(matches!(failures[0].cause, AbxError::Channel(_)));
        assert_eq!(c.len(), 2);
        assert!(ch.written.is_empty());
    }

    #[test]
    fn one_failure_does_not_stop_the_pass() {
        let mut c = collector_with(&[1, 4]);
        let mut ch = ScriptedChannel::new(vec![
            Step::ReadError(ErrorKind::ConnectionReset),
            Step::Data(encode_record(&rec(3)).to_vec()),
        ]);
        let failures = backfill(&mut ch, &[2, 3], &mut c);
        assert_eq!(failures.iter().map(|f| f.sequence).collect::<Vec<_>>(), vec![2]);
        assert!(c.contains(3));
        assert!(!c.contains(2));
    }

    #[test]
    fn truncated_and_closed_responses_fail() {
        let mut c = collector_with(&[3]);
        let partial = encode_record(&rec(1))[..9].to_vec();
        let mut ch = ScriptedChannel::new(vec![Step::Data(partial), Step::Eof, Step::Eof]);
        let failures = backfill(&mut ch, &[1, 2], &mut c);
        assert!(matches!(failures[0].cause, AbxError::TruncatedRecord { received: 9 }));
        assert!(matches!(failures[1].cause, AbxError::TruncatedRecord { received: 0 }));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn mismatched_response_is_stored_but_target_reported() {
        let mut c = collector_with(&[1, 3]);
        let mut ch = ScriptedChannel::new(vec![Step::Data(encode_record(&rec(3)).to_vec())]);
        let failures = backfill(&mut ch, &[2], &mut c);
        assert!(matches!(
            failures[0].cause,
            AbxError::UnexpectedSequence { requested: 2, received: 3 }
        ));
        assert!(!c.contains(2));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn swapped_responses_are_not_reported_twice() {
        let mut c = collector_with(&[1, 4]);
        let mut ch = ScriptedChannel::new(vec![
            Step::Data(encode_record(&rec(3)).to_vec()),
            Step::Data(encode_record(&rec(2)).to_vec()),
        ]);
        let failures = backfill(&mut ch, &[2, 3], &mut c);
        assert!(failures.is_empty());
        assert!(c.missing_sequences().is_empty());
    }

    #[test]
    fn already_present_targets_are_skipped() {
        let mut c = collector_with(&[1, 2, 3]);
        let mut ch = ScriptedChannel::new(vec![]);
        let failures = backfill(&mut ch, &[2, 3], &mut c);
        assert!(failures.is_empty());
        assert!(ch.written.is_empty());
    }

    #[test]
    fn non_positive_target_rejected_before_io() {
        let mut c = collector_with(&[1]);
        let mut ch = ScriptedChannel::new(vec![]);
        let failures = backfill(&mut ch, &[0], &mut c);
        assert!(matches!(failures[0].cause, AbxError::InvalidArgument { sequence: 0 }));
        assert!(ch.written.is_empty());
    }

    #[test]
    fn backfilled_duplicate_replaces_stored_record() {
        let mut c = collector_with(&[1, 3]);
        // the answer for 2 carries 3 again, with different fields
        let newer = Record::new("MSFT", Side::Sell, 77, 4_200, 3);
        let mut ch = ScriptedChannel::new(vec![Step::Data(encode_record(&newer).to_vec())]);
        let failures = backfill(&mut ch, &[2], &mut c);
        assert_eq!(failures.len(), 1);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(3), Some(&newer));
        assert_ne!(c.get(3), Some(&rec(3)));
    }

    #[test]
    fn non_positive_response_is_reported_as_unexpected() {
        let mut c = collector_with(&[1, 3]);
        let mut ch = ScriptedChannel::new(vec![Step::Data(encode_record(&rec(0)).to_vec())]);
        let failures = backfill(&mut ch, &[2], &mut c);
        assert!(matches!(
            failures[0].cause,
            AbxError::UnexpectedSequence { requested: 2, received: 0 }
        ));
        assert!(c.contains(0));
        assert_eq!(c.unexpected_sequences(), &[0]);
        assert_eq!(c.max_sequence(), 3);
    }

    #[test]
    fn every_target_is_stored_or_failed() {
        let mut c = collector_with(&[1, 6]);
        let before = c.missing_sequences();
        let mut ch = ScriptedChannel::new(vec![
            Step::Data(encode_record(&rec(2)).to_vec()),
            Step::ReadError(ErrorKind::TimedOut),
            Step::Data(encode_record(&rec(4)).to_vec()),
            Step::Data(encode_record(&rec(9)).to_vec()),
        ]);
        let failures = backfill(&mut ch, &before, &mut c);
        for s in before {
            let failed = failures.iter().any(|f| f.sequence == s);
            let stored = c.contains(s);
            assert!(stored != failed, "sequence {s} stored={stored} failed={failed}");
        }
    }
}
