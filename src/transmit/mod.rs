//! Triple-path transmitter.
//!
//! The pairing link offers three delivery mechanisms with different
//! guarantees:
//!
//! | Channel | Guarantee | Latency |
//! |---|---|---|
//! | Latest-only background | newest unsent value wins | seconds-minutes |
//! | Immediate interactive | delivered now or fails now | sub-second |
//! | Guaranteed queued | at-least-once, survives disconnection | variable |
//!
//! Per accepted sample the transmitter always feeds the latest-only
//! channel, then picks interactive when the peer is reachable (falling
//! back to queued on an explicit send failure) or queued directly when it
//! is not. Send attempts are fire-and-forget: a failure is logged and
//! counted, never allowed to block the next sample.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::metrics::MetricsClient;
use crate::wire::WireRecord;

/// Failures reported by the pairing-link collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel reported an explicit send failure.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The peer is not reachable for low-latency delivery.
    #[error("Peer not reachable")]
    NotReachable,

    /// The link session is not active.
    #[error("Link session not active")]
    NotActive,

    /// This device has no pairing-link support at all.
    #[error("Pairing link not supported on this device")]
    NotSupported,
}

/// Delivery interface provided by the pairing-link collaborator.
///
/// Implementations must be cheap to call from the tracker's actor context;
/// sends hand the record to the platform and return, they do not wait for
/// the peer.
pub trait LinkTransport: Send + Sync {
    /// Whether the link session is currently active.
    fn is_session_active(&self) -> bool;

    /// Whether the peer can take low-latency messages right now.
    fn is_reachable(&self) -> bool;

    /// Latest-only background channel: overwrites any previous unsent value.
    fn send_latest_only(&self, record: &WireRecord) -> Result<(), TransportError>;

    /// Immediate interactive channel: delivered within ~100ms or fails.
    fn send_interactive(&self, record: &WireRecord) -> Result<(), TransportError>;

    /// Guaranteed queued channel: eventual, at-least-once delivery.
    fn send_queued(&self, record: &WireRecord) -> Result<(), TransportError>;
}

/// How a sample left the transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Session inactive: dropped, a fresher sample will supersede it.
    DroppedInactive,
    /// Delivered via the immediate interactive channel.
    Interactive,
    /// Handed to the guaranteed queued channel.
    Queued,
    /// Every applicable channel reported failure.
    Failed,
}

/// Relays encoded records onto the link, choosing among the three channels.
pub struct Transmitter<T: LinkTransport> {
    transport: Arc<T>,
    metrics: MetricsClient,
}

impl<T: LinkTransport> Transmitter<T> {
    /// Create a transmitter over the given transport and metrics sink.
    pub fn new(transport: Arc<T>, metrics: MetricsClient) -> Self {
        Self { transport, metrics }
    }

    /// Relay one record.
    pub fn relay(&self, record: &WireRecord) -> SendOutcome {
        if !self.transport.is_session_active() {
            debug!(seq = record.seq, "Session inactive, dropping sample");
            self.metrics.sample_dropped_inactive();
            return SendOutcome::DroppedInactive;
        }

        // The latest-only channel is fed regardless of reachability; the
        // upstream throttle is its only rate limit.
        match self.transport.send_latest_only(record) {
            Ok(()) => {
                trace!(seq = record.seq, "Latest-only channel updated");
                self.metrics.latest_only_sent();
            }
            Err(e) => warn!(seq = record.seq, error = %e, "Latest-only send failed"),
        }

        if self.transport.is_reachable() {
            match self.transport.send_interactive(record) {
                Ok(()) => {
                    trace!(seq = record.seq, "Interactive send");
                    self.metrics.interactive_sent();
                    SendOutcome::Interactive
                }
                Err(e) => {
                    warn!(seq = record.seq, error = %e, "Interactive send failed, queueing");
                    self.metrics.interactive_failed();
                    self.metrics.queued_fallback();
                    self.send_queued(record)
                }
            }
        } else {
            self.send_queued(record)
        }
    }

    fn send_queued(&self, record: &WireRecord) -> SendOutcome {
        match self.transport.send_queued(record) {
            Ok(()) => {
                trace!(seq = record.seq, "Queued send");
                self.metrics.queued_sent();
                SendOutcome::Queued
            }
            Err(e) => {
                // Non-fatal: the next accepted sample gets a fresh attempt.
                warn!(seq = record.seq, error = %e, "Queued send failed");
                self.metrics.queued_failed();
                SendOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricEvent;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Scriptable in-memory transport.
    #[derive(Default)]
    struct MockTransport {
        active: AtomicBool,
        reachable: AtomicBool,
        fail_interactive: AtomicBool,
        fail_queued: AtomicBool,
        latest_only: Mutex<Vec<WireRecord>>,
        interactive: Mutex<Vec<WireRecord>>,
        queued: Mutex<Vec<WireRecord>>,
    }

    impl MockTransport {
        fn active_reachable() -> Arc<Self> {
            let t = Self::default();
            t.active.store(true, Ordering::SeqCst);
            t.reachable.store(true, Ordering::SeqCst);
            Arc::new(t)
        }

        fn active_unreachable() -> Arc<Self> {
            let t = Self::default();
            t.active.store(true, Ordering::SeqCst);
            Arc::new(t)
        }
    }

    impl LinkTransport for MockTransport {
        fn is_session_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn is_reachable(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }

        fn send_latest_only(&self, record: &WireRecord) -> Result<(), TransportError> {
            let mut slot = self.latest_only.lock().unwrap();
            // Latest-only semantics: previous unsent value is superseded.
            slot.clear();
            slot.push(record.clone());
            Ok(())
        }

        fn send_interactive(&self, record: &WireRecord) -> Result<(), TransportError> {
            if self.fail_interactive.load(Ordering::SeqCst) {
                return Err(TransportError::SendFailed("peer went away".into()));
            }
            self.interactive.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn send_queued(&self, record: &WireRecord) -> Result<(), TransportError> {
            if self.fail_queued.load(Ordering::SeqCst) {
                return Err(TransportError::SendFailed("queue full".into()));
            }
            self.queued.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn record(seq: u64) -> WireRecord {
        let sample = crate::sample::PositionSample {
            id: uuid::Uuid::new_v4(),
            origin: crate::sample::Origin::Subject,
            timestamp: std::time::SystemTime::now(),
            latitude: 53.5,
            longitude: 10.0,
            altitude_m: None,
            h_accuracy_m: 5.0,
            v_accuracy_m: 8.0,
            speed_mps: 1.0,
            course_deg: 45.0,
            heading_deg: None,
            battery_fraction: 0.8,
            seq,
        };
        WireRecord::from_sample(&sample)
    }

    fn transmitter(transport: Arc<MockTransport>) -> Transmitter<MockTransport> {
        let (metrics, _rx) = crate::metrics::channel();
        Transmitter::new(transport, metrics)
    }

    #[test]
    fn test_inactive_session_drops() {
        let transport = Arc::new(MockTransport::default());
        let tx = transmitter(Arc::clone(&transport));

        assert_eq!(tx.relay(&record(1)), SendOutcome::DroppedInactive);
        assert!(transport.latest_only.lock().unwrap().is_empty());
        assert!(transport.queued.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reachable_uses_interactive() {
        let transport = MockTransport::active_reachable();
        let tx = transmitter(Arc::clone(&transport));

        assert_eq!(tx.relay(&record(1)), SendOutcome::Interactive);
        assert_eq!(transport.interactive.lock().unwrap().len(), 1);
        assert!(transport.queued.lock().unwrap().is_empty());
    }

    #[test]
    fn test_latest_only_always_fed_when_active() {
        let reachable = MockTransport::active_reachable();
        let tx = transmitter(Arc::clone(&reachable));
        tx.relay(&record(1));
        assert_eq!(reachable.latest_only.lock().unwrap().len(), 1);

        let unreachable = MockTransport::active_unreachable();
        let tx = transmitter(Arc::clone(&unreachable));
        tx.relay(&record(2));
        assert_eq!(unreachable.latest_only.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_latest_only_supersedes_previous() {
        let transport = MockTransport::active_unreachable();
        let tx = transmitter(Arc::clone(&transport));

        tx.relay(&record(1));
        tx.relay(&record(2));

        let slot = transport.latest_only.lock().unwrap();
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].seq, 2);
    }

    #[test]
    fn test_interactive_failure_falls_back_to_queued() {
        let transport = MockTransport::active_reachable();
        transport.fail_interactive.store(true, Ordering::SeqCst);
        let tx = transmitter(Arc::clone(&transport));

        let rec = record(7);
        assert_eq!(tx.relay(&rec), SendOutcome::Queued);

        // The queued channel received the very same record.
        let queued = transport.queued.lock().unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0], rec);
    }

    #[test]
    fn test_unreachable_goes_straight_to_queued() {
        let transport = MockTransport::active_unreachable();
        let tx = transmitter(Arc::clone(&transport));

        assert_eq!(tx.relay(&record(3)), SendOutcome::Queued);
        assert!(transport.interactive.lock().unwrap().is_empty());
        assert_eq!(transport.queued.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_total_failure_is_non_fatal() {
        let transport = MockTransport::active_unreachable();
        transport.fail_queued.store(true, Ordering::SeqCst);
        let tx = transmitter(Arc::clone(&transport));

        assert_eq!(tx.relay(&record(1)), SendOutcome::Failed);

        // A later sample still gets a fresh attempt.
        transport.fail_queued.store(false, Ordering::SeqCst);
        assert_eq!(tx.relay(&record(2)), SendOutcome::Queued);
    }

    #[test]
    fn test_queued_failure_emits_metric() {
        let transport = MockTransport::active_unreachable();
        transport.fail_queued.store(true, Ordering::SeqCst);
        let (metrics, mut rx) = crate::metrics::channel();
        let tx = Transmitter::new(Arc::clone(&transport), metrics);

        assert_eq!(tx.relay(&record(1)), SendOutcome::Failed);

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        // Every attempt is observable: the failed queued send too.
        assert!(seen.contains(&MetricEvent::LatestOnlySent));
        assert!(seen.contains(&MetricEvent::QueuedFailed));
        assert!(!seen.contains(&MetricEvent::QueuedSent));
    }

    #[test]
    fn test_fallback_metrics() {
        let transport = MockTransport::active_reachable();
        transport.fail_interactive.store(true, Ordering::SeqCst);
        let (metrics, mut rx) = crate::metrics::channel();
        let tx = Transmitter::new(Arc::clone(&transport), metrics);

        tx.relay(&record(1));

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&MetricEvent::LatestOnlySent));
        assert!(seen.contains(&MetricEvent::InteractiveFailed));
        assert!(seen.contains(&MetricEvent::QueuedFallback));
        assert!(seen.contains(&MetricEvent::QueuedSent));
    }
}
