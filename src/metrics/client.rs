//! Metrics emission layer.
//!
//! The [`MetricsClient`] provides a fire-and-forget interface for emitting
//! metric events. It is:
//!
//! - **Cheap to clone**: backed by a channel sender
//! - **Fire-and-forget**: never blocks, silently drops if the sink is gone
//! - **Type-safe**: convenience methods for each event type

use tokio::sync::mpsc;

use super::event::MetricEvent;

/// Client for emitting metric events to the metrics sink.
///
/// All methods are fire-and-forget: they never block and silently ignore
/// failures (e.g. the sink has shut down), so metrics collection never
/// impacts sample delivery.
#[derive(Clone)]
pub struct MetricsClient {
    tx: mpsc::UnboundedSender<MetricEvent>,
}

impl MetricsClient {
    /// Creates a new metrics client with the given channel sender.
    pub fn new(tx: mpsc::UnboundedSender<MetricEvent>) -> Self {
        Self { tx }
    }

    /// Sends an event to the sink (fire-and-forget).
    #[inline]
    fn send(&self, event: MetricEvent) {
        // Ignore send errors - the sink may have shut down.
        let _ = self.tx.send(event);
    }

    /// Records a raw fix being sequenced and encoded.
    #[inline]
    pub fn sample_encoded(&self, seq: u64) {
        self.send(MetricEvent::SampleEncoded { seq });
    }

    /// Records the throttle suppressing a sample.
    #[inline]
    pub fn sample_suppressed(&self) {
        self.send(MetricEvent::SampleSuppressed);
    }

    /// Records a sample dropped because the session is inactive.
    #[inline]
    pub fn sample_dropped_inactive(&self) {
        self.send(MetricEvent::SampleDroppedInactive);
    }

    /// Records a latest-only channel handoff.
    #[inline]
    pub fn latest_only_sent(&self) {
        self.send(MetricEvent::LatestOnlySent);
    }

    /// Records an interactive channel delivery.
    #[inline]
    pub fn interactive_sent(&self) {
        self.send(MetricEvent::InteractiveSent);
    }

    /// Records an interactive channel send failure.
    #[inline]
    pub fn interactive_failed(&self) {
        self.send(MetricEvent::InteractiveFailed);
    }

    /// Records a queued channel handoff.
    #[inline]
    pub fn queued_sent(&self) {
        self.send(MetricEvent::QueuedSent);
    }

    /// Records a fallback from the interactive to the queued channel.
    #[inline]
    pub fn queued_fallback(&self) {
        self.send(MetricEvent::QueuedFallback);
    }

    /// Records a queued channel send failure.
    #[inline]
    pub fn queued_failed(&self) {
        self.send(MetricEvent::QueuedFailed);
    }

    /// Records acceptance of an incoming record.
    #[inline]
    pub fn record_accepted(&self, seq: u64) {
        self.send(MetricEvent::RecordAccepted { seq });
    }

    /// Records rejection of a malformed incoming record.
    #[inline]
    pub fn record_rejected(&self) {
        self.send(MetricEvent::RecordRejected);
    }

    /// Records a duplicate record being discarded.
    #[inline]
    pub fn duplicate_discarded(&self) {
        self.send(MetricEvent::DuplicateDiscarded);
    }

    /// Records a session state transition.
    #[inline]
    pub fn session_state_changed(&self, state: &'static str) {
        self.send(MetricEvent::SessionStateChanged { state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_the_sink() {
        let (client, mut rx) = crate::metrics::channel();

        client.sample_encoded(1);
        client.interactive_failed();
        client.queued_fallback();

        assert_eq!(rx.try_recv().unwrap(), MetricEvent::SampleEncoded { seq: 1 });
        assert_eq!(rx.try_recv().unwrap(), MetricEvent::InteractiveFailed);
        assert_eq!(rx.try_recv().unwrap(), MetricEvent::QueuedFallback);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_sink_dropped_is_silent() {
        let (client, rx) = crate::metrics::channel();
        drop(rx);

        // Must not panic or block.
        client.sample_suppressed();
        client.record_rejected();
    }
}
