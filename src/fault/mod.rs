//! Error classification.
//!
//! Raw transport, positioning, and decode errors are classified into a
//! small taxonomy at the boundary where they are first observed; nothing
//! past the classifier ever sees a platform error. Each taxonomy entry
//! fixes a severity and whether retrying without external action can
//! help - the presentation layer keys entirely off those two facts.
//!
//! Classification is idempotent: classifying the same underlying error
//! twice yields the same entry.

use std::fmt;

use crate::link::LinkError;
use crate::tracker::PositioningError;
use crate::transmit::TransportError;
use crate::wire::DecodeError;

/// How loudly a fault should surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// The fault taxonomy consumed by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Location permission denied; requires a settings change.
    PermissionDenied,
    /// The positioning service is switched off on the device.
    PositioningDisabled,
    /// This device has no pairing-link support.
    LinkNotSupported,
    /// The link session is not active yet.
    LinkNotActive,
    /// Session activation did not complete within the bounded wait.
    LinkActivationTimeout,
    /// The peer is not reachable for low-latency delivery.
    LinkNotReachable,
    /// A send attempt failed.
    SendFailed,
    /// An incoming record could not be decoded.
    DecodeFailed,
    /// No sample has been received yet.
    NoSampleYet,
    /// The latest sample is older than the staleness threshold.
    StaleSample,
    /// Anything unmatched, carrying the original description.
    Unknown,
}

impl FaultKind {
    /// Fixed severity of this kind.
    pub fn severity(&self) -> Severity {
        match self {
            Self::PermissionDenied | Self::PositioningDisabled | Self::LinkNotSupported => {
                Severity::Critical
            }
            Self::LinkNotActive | Self::LinkActivationTimeout | Self::LinkNotReachable => {
                Severity::Warning
            }
            Self::SendFailed | Self::DecodeFailed | Self::Unknown => Severity::Error,
            Self::NoSampleYet | Self::StaleSample => Severity::Info,
        }
    }

    /// Whether retrying without external action is meaningful.
    ///
    /// Non-retryable kinds need a settings change (or a different device)
    /// before another attempt can succeed; the core must not loop on them.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            Self::PermissionDenied | Self::PositioningDisabled | Self::LinkNotSupported
        )
    }

    /// Stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::PositioningDisabled => "positioning_disabled",
            Self::LinkNotSupported => "link_not_supported",
            Self::LinkNotActive => "link_not_active",
            Self::LinkActivationTimeout => "link_activation_timeout",
            Self::LinkNotReachable => "link_not_reachable",
            Self::SendFailed => "send_failed",
            Self::DecodeFailed => "decode_failed",
            Self::NoSampleYet => "no_sample_yet",
            Self::StaleSample => "stale_sample",
            Self::Unknown => "unknown",
        }
    }
}

/// A classified fault: taxonomy entry plus the original description.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    kind: FaultKind,
    detail: String,
}

impl Fault {
    /// Build a fault of a known kind.
    pub fn new(kind: FaultKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// The taxonomy entry.
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Severity, fixed per kind.
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Whether retrying can help.
    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    /// The original error description.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.detail)
    }
}

impl std::error::Error for Fault {}

impl From<&TransportError> for Fault {
    fn from(e: &TransportError) -> Self {
        let kind = match e {
            TransportError::SendFailed(_) => FaultKind::SendFailed,
            TransportError::NotReachable => FaultKind::LinkNotReachable,
            TransportError::NotActive => FaultKind::LinkNotActive,
            TransportError::NotSupported => FaultKind::LinkNotSupported,
        };
        Fault::new(kind, e.to_string())
    }
}

impl From<&DecodeError> for Fault {
    fn from(e: &DecodeError) -> Self {
        Fault::new(FaultKind::DecodeFailed, e.to_string())
    }
}

impl From<&LinkError> for Fault {
    fn from(e: &LinkError) -> Self {
        match e {
            LinkError::ActivationTimeout(_) => {
                Fault::new(FaultKind::LinkActivationTimeout, e.to_string())
            }
        }
    }
}

impl From<&PositioningError> for Fault {
    fn from(e: &PositioningError) -> Self {
        let kind = match e {
            PositioningError::PermissionDenied => FaultKind::PermissionDenied,
            PositioningError::ServiceDisabled => FaultKind::PositioningDisabled,
            PositioningError::Runtime(_) => FaultKind::Unknown,
        };
        Fault::new(kind, e.to_string())
    }
}

/// Classify a foreign error description by signature matching.
///
/// Used for platform errors that arrive as bare strings. Anything
/// unmatched becomes [`FaultKind::Unknown`] with the description intact.
pub fn classify_message(message: &str) -> Fault {
    let lower = message.to_ascii_lowercase();
    let kind = if lower.contains("permission") || lower.contains("not authorized") {
        FaultKind::PermissionDenied
    } else if lower.contains("location services disabled") || lower.contains("positioning disabled")
    {
        FaultKind::PositioningDisabled
    } else if lower.contains("not supported") {
        FaultKind::LinkNotSupported
    } else if lower.contains("not reachable") {
        FaultKind::LinkNotReachable
    } else if lower.contains("not active") {
        FaultKind::LinkNotActive
    } else if lower.contains("send failed") {
        FaultKind::SendFailed
    } else {
        FaultKind::Unknown
    };
    Fault::new(kind, message)
}
