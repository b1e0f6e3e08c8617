//! Receiver, dedupe, and bounded history.
//!
//! Records may arrive over any of the three delivery channels, so the
//! receiver assumes nothing about arrival order: the same logical sample
//! can show up twice (interactive retry via the queued channel) and a
//! newer sample can land before an older one. Acceptance is keyed on the
//! per-origin sequence number, never on arrival time.
//!
//! The history buffer keeps the most recent samples ordered by sequence
//! number (sort-on-insert) because it feeds trail display, where sequence
//! order is what matters. Duplicate `(origin, seq)` records are discarded
//! outright - both the latest slot and the history treat them as no-ops.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::metrics::MetricsClient;
use crate::sample::{Origin, PositionSample};
use crate::wire::{decode, DecodeError};

/// Default bound on retained history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// How an accepted record related to what was already known.
#[derive(Debug, Clone, PartialEq)]
pub enum Accepted {
    /// Newest sample yet from its origin; the latest slot was updated.
    Fresh(PositionSample),
    /// Valid but older than the latest slot; recorded in history only.
    OutOfOrder(PositionSample),
    /// Already-seen `(origin, seq)`; discarded entirely.
    Duplicate,
}

/// Bounded window of recent samples, ordered by sequence number.
#[derive(Debug)]
pub struct HistoryBuffer {
    samples: VecDeque<PositionSample>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over samples, lowest sequence first.
    pub fn iter(&self) -> impl Iterator<Item = &PositionSample> {
        self.samples.iter()
    }

    /// Whether a sample with this `(origin, seq)` is retained.
    pub fn contains(&self, origin: Origin, seq: u64) -> bool {
        self.samples
            .iter()
            .any(|s| s.origin == origin && s.seq == seq)
    }

    /// Insert a sample at its sequence position, evicting the oldest
    /// (lowest-sequence) entry if the buffer is full.
    pub fn insert(&mut self, sample: PositionSample) {
        // Out-of-order arrivals are the exception; scanning from the back
        // finds the slot in one step for the common in-order case.
        let mut index = self.samples.len();
        while index > 0 && self.samples[index - 1].seq > sample.seq {
            index -= 1;
        }
        self.samples.insert(index, sample);

        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Remove all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Decodes incoming payloads and maintains the latest slot plus history.
///
/// Owned exclusively by the receiving device's actor; no cross-device
/// shared state exists.
pub struct Receiver {
    history: HistoryBuffer,
    latest: HashMap<Origin, PositionSample>,
    metrics: MetricsClient,
}

impl Receiver {
    /// Create a receiver with the given history bound.
    pub fn new(history_capacity: usize, metrics: MetricsClient) -> Self {
        Self {
            history: HistoryBuffer::new(history_capacity),
            latest: HashMap::new(),
            metrics,
        }
    }

    /// Decode, validate, and fold one incoming payload into state.
    ///
    /// Malformed payloads return an error without disturbing existing
    /// state - the receive loop carries on.
    pub fn accept(&mut self, payload: &[u8]) -> Result<Accepted, DecodeError> {
        let sample = match decode(payload) {
            Ok(sample) => sample,
            Err(e) => {
                debug!(error = %e, "Rejected malformed record");
                self.metrics.record_rejected();
                return Err(e);
            }
        };

        if self.is_duplicate(&sample) {
            trace!(seq = sample.seq, "Duplicate record discarded");
            self.metrics.duplicate_discarded();
            return Ok(Accepted::Duplicate);
        }

        self.metrics.record_accepted(sample.seq);
        self.history.insert(sample.clone());

        let is_fresh = match self.latest.get(&sample.origin) {
            // Ties cannot reach here (caught as duplicates); strictly
            // greater keeps the latest-slot sequence non-decreasing.
            Some(current) => sample.seq > current.seq,
            None => true,
        };

        if is_fresh {
            self.latest.insert(sample.origin, sample.clone());
            Ok(Accepted::Fresh(sample))
        } else {
            trace!(seq = sample.seq, "Out-of-order record kept in history only");
            Ok(Accepted::OutOfOrder(sample))
        }
    }

    /// The highest-sequence sample accepted from an origin, if any.
    pub fn latest(&self, origin: Origin) -> Option<&PositionSample> {
        self.latest.get(&origin)
    }

    /// The retained history window.
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    fn is_duplicate(&self, sample: &PositionSample) -> bool {
        if let Some(current) = self.latest.get(&sample.origin) {
            if current.seq == sample.seq {
                return true;
            }
        }
        // The history window bounds dedupe memory: a duplicate older than
        // the oldest retained sample is indistinguishable from a late
        // original, and both are harmless to re-record.
        self.history.contains(sample.origin, sample.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use uuid::Uuid;

    fn sample(seq: u64) -> PositionSample {
        sample_from(Origin::Subject, seq)
    }

    fn sample_from(origin: Origin, seq: u64) -> PositionSample {
        PositionSample {
            id: Uuid::new_v4(),
            origin,
            timestamp: UNIX_EPOCH + Duration::from_millis(1_700_000_000_000 + seq * 500),
            latitude: 53.5 + seq as f64 * 0.0001,
            longitude: 10.0,
            altitude_m: None,
            h_accuracy_m: 5.0,
            v_accuracy_m: 8.0,
            speed_mps: 1.0,
            course_deg: 0.0,
            heading_deg: None,
            battery_fraction: 0.8,
            seq,
        }
    }

    fn receiver() -> Receiver {
        let (metrics, _rx) = crate::metrics::channel();
        Receiver::new(DEFAULT_HISTORY_CAPACITY, metrics)
    }

    #[test]
    fn test_accept_updates_latest() {
        let mut rx = receiver();
        let result = rx.accept(&encode(&sample(1))).unwrap();
        assert!(matches!(result, Accepted::Fresh(_)));
        assert_eq!(rx.latest(Origin::Subject).unwrap().seq, 1);
    }

    #[test]
    fn test_latest_sequence_is_non_decreasing() {
        let mut rx = receiver();
        for seq in [1, 3, 2, 5, 4] {
            rx.accept(&encode(&sample(seq))).unwrap();
        }
        assert_eq!(rx.latest(Origin::Subject).unwrap().seq, 5);
    }

    #[test]
    fn test_out_of_order_goes_to_history_only() {
        let mut rx = receiver();
        rx.accept(&encode(&sample(5))).unwrap();

        let result = rx.accept(&encode(&sample(3))).unwrap();
        assert!(matches!(result, Accepted::OutOfOrder(_)));
        assert_eq!(rx.latest(Origin::Subject).unwrap().seq, 5);
        assert_eq!(rx.history().len(), 2);
    }

    #[test]
    fn test_history_is_sequence_ordered() {
        let mut rx = receiver();
        for seq in [2, 5, 1, 4, 3] {
            rx.accept(&encode(&sample(seq))).unwrap();
        }
        let seqs: Vec<u64> = rx.history().iter().map(|s| s.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_duplicate_is_full_no_op() {
        let mut rx = receiver();
        rx.accept(&encode(&sample(1))).unwrap();
        rx.accept(&encode(&sample(2))).unwrap();

        // Same logical sample retried via another channel.
        let result = rx.accept(&encode(&sample(2))).unwrap();
        assert_eq!(result, Accepted::Duplicate);
        assert_eq!(rx.history().len(), 2);
        assert_eq!(rx.latest(Origin::Subject).unwrap().seq, 2);

        // Duplicate of an older, non-latest sample too.
        let result = rx.accept(&encode(&sample(1))).unwrap();
        assert_eq!(result, Accepted::Duplicate);
        assert_eq!(rx.history().len(), 2);
    }

    #[test]
    fn test_capacity_eviction() {
        let (metrics, _mrx) = crate::metrics::channel();
        let mut rx = Receiver::new(100, metrics);

        for seq in 1..=101 {
            rx.accept(&encode(&sample(seq))).unwrap();
        }

        assert_eq!(rx.history().len(), 100);
        // The first (oldest by sequence) sample is gone.
        assert!(!rx.history().contains(Origin::Subject, 1));
        assert!(rx.history().contains(Origin::Subject, 2));
        assert!(rx.history().contains(Origin::Subject, 101));
    }

    #[test]
    fn test_window_after_150_samples() {
        let mut rx = receiver();
        for seq in 1..=150 {
            rx.accept(&encode(&sample(seq))).unwrap();
        }

        let seqs: Vec<u64> = rx.history().iter().map(|s| s.seq).collect();
        let expected: Vec<u64> = (51..=150).collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn test_malformed_record_does_not_disturb_state() {
        let mut rx = receiver();
        rx.accept(&encode(&sample(1))).unwrap();

        assert!(rx.accept(b"{\"broken\":").is_err());
        assert!(rx.accept(b"").is_err());

        // The loop carries on: state intact, next record accepted.
        assert_eq!(rx.history().len(), 1);
        assert_eq!(rx.latest(Origin::Subject).unwrap().seq, 1);
        rx.accept(&encode(&sample(2))).unwrap();
        assert_eq!(rx.latest(Origin::Subject).unwrap().seq, 2);
    }

    #[test]
    fn test_origins_tracked_independently() {
        let mut rx = receiver();
        rx.accept(&encode(&sample_from(Origin::Subject, 10))).unwrap();
        rx.accept(&encode(&sample_from(Origin::Observer, 3))).unwrap();

        assert_eq!(rx.latest(Origin::Subject).unwrap().seq, 10);
        assert_eq!(rx.latest(Origin::Observer).unwrap().seq, 3);

        // Same seq on the other origin is not a duplicate.
        let result = rx.accept(&encode(&sample_from(Origin::Observer, 10))).unwrap();
        assert!(matches!(result, Accepted::Fresh(_)));
    }

    #[test]
    fn test_duplicate_emits_metric() {
        let (metrics, mut events) = crate::metrics::channel();
        let mut rx = Receiver::new(100, metrics);
        rx.accept(&encode(&sample(1))).unwrap();
        rx.accept(&encode(&sample(1))).unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event.event_type());
        }
        assert_eq!(seen, vec!["record_accepted", "duplicate_discarded"]);
    }
}
