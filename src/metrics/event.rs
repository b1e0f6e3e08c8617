//! Metric events for the relay pipeline.
//!
//! Events are fire-and-forget - producers send them to the sink without
//! waiting for acknowledgment, and a full or closed channel never blocks
//! the pipeline.

/// Events emitted by relay components to the metrics sink.
///
/// Each event represents an atomic occurrence; consumers process them
/// sequentially to keep counters consistent.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricEvent {
    // =========================================================================
    // Transmit-side events
    // =========================================================================
    /// A raw fix was sequenced and encoded.
    SampleEncoded {
        /// Sequence number assigned to the sample.
        seq: u64,
    },

    /// The throttle controller suppressed a sample.
    SampleSuppressed,

    /// A sample was dropped because the link session is not active.
    SampleDroppedInactive,

    /// A record was handed to the latest-only background channel.
    LatestOnlySent,

    /// A record was delivered via the immediate interactive channel.
    InteractiveSent,

    /// The interactive channel reported a send failure.
    InteractiveFailed,

    /// A record was handed to the guaranteed queued channel.
    QueuedSent,

    /// A record fell back from interactive to the queued channel.
    QueuedFallback,

    /// The queued channel reported a send failure.
    QueuedFailed,

    // =========================================================================
    // Receive-side events
    // =========================================================================
    /// An incoming record decoded and was accepted.
    RecordAccepted {
        /// Sequence number of the accepted sample.
        seq: u64,
    },

    /// An incoming record failed to decode.
    RecordRejected,

    /// A duplicate (origin, seq) record was discarded.
    DuplicateDiscarded,

    // =========================================================================
    // Session events
    // =========================================================================
    /// The link session state machine transitioned.
    SessionStateChanged {
        /// Name of the new state.
        state: &'static str,
    },
}

impl MetricEvent {
    /// Returns a short name for this event type (useful for debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SampleEncoded { .. } => "sample_encoded",
            Self::SampleSuppressed => "sample_suppressed",
            Self::SampleDroppedInactive => "sample_dropped_inactive",
            Self::LatestOnlySent => "latest_only_sent",
            Self::InteractiveSent => "interactive_sent",
            Self::InteractiveFailed => "interactive_failed",
            Self::QueuedSent => "queued_sent",
            Self::QueuedFallback => "queued_fallback",
            Self::QueuedFailed => "queued_failed",
            Self::RecordAccepted { .. } => "record_accepted",
            Self::RecordRejected => "record_rejected",
            Self::DuplicateDiscarded => "duplicate_discarded",
            Self::SessionStateChanged { .. } => "session_state_changed",
        }
    }
}
