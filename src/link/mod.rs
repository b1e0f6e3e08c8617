//! Link session state machine.
//!
//! Tracks the logical pairing session between the two devices:
//!
//! ```text
//! Inactive -> Activating -> Active-Unreachable <-> Active-Reachable
//!                 ^                  |
//!                 '--- invalidated --'
//! ```
//!
//! Transitions are driven by externally delivered events from the pairing
//! layer. Invalidation and resignation are auto-recovered by immediately
//! re-requesting activation; activation failure is retryable and never
//! escalates to a fatal condition. Callers that need the session up (for
//! example at tracking start) wait on the published state with a bounded
//! timeout instead of blocking indefinitely.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::metrics::MetricsClient;

/// Default bound for session-activation waits.
pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(1);

/// State of the pairing session on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSessionState {
    /// No session; nothing can be sent.
    Inactive,
    /// Activation requested, completion pending.
    Activating,
    /// Session active but the peer cannot take low-latency messages.
    ActiveUnreachable,
    /// Session active and the peer is reachable right now.
    ActiveReachable,
}

impl LinkSessionState {
    /// Whether the session can carry any channel at all.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::ActiveUnreachable | Self::ActiveReachable)
    }

    /// Whether the low-latency interactive channel is available.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::ActiveReachable)
    }

    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::ActiveUnreachable => "active_unreachable",
            Self::ActiveReachable => "active_reachable",
        }
    }
}

/// Session lifecycle events delivered by the pairing layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Activation finished, successfully or not.
    ActivationCompleted {
        /// Platform error description on failure.
        error: Option<String>,
    },
    /// Peer reachability flipped.
    ReachabilityChanged(bool),
    /// The platform invalidated the session.
    SessionInvalidated,
    /// The platform asked this side to resign the session (peer switch).
    SessionResigned,
}

/// Follow-up the caller must perform after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Re-issue the activation request (auto-recovery).
    Reactivate,
}

/// Errors surfaced by session waits.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The session did not become active within the bounded wait.
    #[error("Link not ready: activation did not complete within {0:?}")]
    ActivationTimeout(Duration),
}

/// The pairing session state machine, one per device.
///
/// Mutated only by session-lifecycle calls; the current state is published
/// over a `watch` channel for waiters and UI status.
pub struct LinkSession {
    state: LinkSessionState,
    last_activation_error: Option<String>,
    consecutive_activation_failures: u32,
    last_reachability_change: Option<Instant>,
    state_tx: watch::Sender<LinkSessionState>,
    metrics: MetricsClient,
}

impl LinkSession {
    /// Create a session in `Inactive` and a receiver for state updates.
    pub fn new(metrics: MetricsClient) -> (Self, watch::Receiver<LinkSessionState>) {
        let (state_tx, state_rx) = watch::channel(LinkSessionState::Inactive);
        (
            Self {
                state: LinkSessionState::Inactive,
                last_activation_error: None,
                consecutive_activation_failures: 0,
                last_reachability_change: None,
                state_tx,
                metrics,
            },
            state_rx,
        )
    }

    /// Current state.
    pub fn state(&self) -> LinkSessionState {
        self.state
    }

    /// Most recent activation failure, if any.
    pub fn last_activation_error(&self) -> Option<&str> {
        self.last_activation_error.as_deref()
    }

    /// Activation failures since the last successful activation.
    pub fn consecutive_activation_failures(&self) -> u32 {
        self.consecutive_activation_failures
    }

    /// When reachability last changed.
    pub fn last_reachability_change(&self) -> Option<Instant> {
        self.last_reachability_change
    }

    /// Request activation of the session.
    ///
    /// No-op while already activating or active.
    pub fn request_activation(&mut self) {
        match self.state {
            LinkSessionState::Inactive => {
                info!("Requesting link session activation");
                self.transition(LinkSessionState::Activating);
            }
            _ => debug!(state = self.state.name(), "Activation already in progress"),
        }
    }

    /// Apply a lifecycle event, returning any required follow-up action.
    pub fn apply(&mut self, event: LinkEvent, now: Instant) -> Option<LinkAction> {
        match event {
            LinkEvent::ActivationCompleted { error: None } => {
                self.last_activation_error = None;
                self.consecutive_activation_failures = 0;
                if self.state == LinkSessionState::Activating {
                    info!("Link session activated");
                    // Reachability is reported separately; start pessimistic.
                    self.transition(LinkSessionState::ActiveUnreachable);
                } else {
                    debug!(state = self.state.name(), "Stale activation completion");
                }
                None
            }
            LinkEvent::ActivationCompleted { error: Some(message) } => {
                self.consecutive_activation_failures += 1;
                warn!(
                    error = %message,
                    failures = self.consecutive_activation_failures,
                    "Link session activation failed, will retry"
                );
                self.last_activation_error = Some(message);
                self.transition(LinkSessionState::Inactive);
                Some(LinkAction::Reactivate)
            }
            LinkEvent::ReachabilityChanged(reachable) => {
                if !self.state.is_active() {
                    debug!(reachable, "Reachability change while session not active");
                    return None;
                }
                self.last_reachability_change = Some(now);
                let next = if reachable {
                    LinkSessionState::ActiveReachable
                } else {
                    LinkSessionState::ActiveUnreachable
                };
                if next != self.state {
                    info!(reachable, "Peer reachability changed");
                    self.transition(next);
                }
                None
            }
            LinkEvent::SessionInvalidated => {
                warn!("Link session invalidated, re-activating");
                self.transition(LinkSessionState::Inactive);
                Some(LinkAction::Reactivate)
            }
            LinkEvent::SessionResigned => {
                // Expected during peer device switch; not an error.
                debug!("Link session resigned, re-activating");
                self.transition(LinkSessionState::Inactive);
                Some(LinkAction::Reactivate)
            }
        }
    }

    fn transition(&mut self, next: LinkSessionState) {
        if next == self.state {
            return;
        }
        debug!(from = self.state.name(), to = next.name(), "Session transition");
        self.state = next;
        self.metrics.session_state_changed(next.name());
        let _ = self.state_tx.send(next);
    }
}

/// Wait until the session reports an active state.
///
/// Bounded: resolves with [`LinkError::ActivationTimeout`] instead of
/// blocking indefinitely. Used at tracking start, not per sample.
pub async fn wait_until_active(
    state_rx: &mut watch::Receiver<LinkSessionState>,
    timeout: Duration,
) -> Result<(), LinkError> {
    let wait = async {
        loop {
            if state_rx.borrow().is_active() {
                return;
            }
            if state_rx.changed().await.is_err() {
                // Session dropped; the timeout will surface the condition.
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| LinkError::ActivationTimeout(timeout))
}
