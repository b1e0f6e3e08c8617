//! The tracker actor - single owner of all mutable relay state.
//!
//! Platform callbacks (new fixes, session lifecycle, incoming records)
//! arrive on arbitrary threads; they are re-dispatched as [`TrackerEvent`]s
//! onto one channel that the actor drains sequentially, so the throttle
//! state, link session, history buffer and latest slot are only ever
//! touched from one execution context.
//!
//! Nothing in the event loop blocks: transmits are fire-and-forget and the
//! only bounded wait in the system - session activation at tracking start -
//! happens on the caller's side of the [`TrackerHandle`], not inside the
//! loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::TetherConfig;
use crate::fault::{classify_message, Fault, FaultKind};
use crate::geo;
use crate::link::{wait_until_active, LinkAction, LinkEvent, LinkSession, LinkSessionState};
use crate::metrics::MetricsClient;
use crate::receive::{Accepted, Receiver};
use crate::sample::{Origin, PositionSample, RawFix};
use crate::throttle::{ThrottleController, ThrottleDecision};
use crate::transmit::{LinkTransport, Transmitter};
use crate::wire::{SampleEncoder, WireRecord};

/// Errors from the positioning collaborator.
#[derive(Debug, Error)]
pub enum PositioningError {
    /// Location permission denied by the user.
    #[error("Location permission denied")]
    PermissionDenied,

    /// Positioning is switched off on the device.
    #[error("Positioning service disabled")]
    ServiceDisabled,

    /// Anything else the platform reports.
    #[error("Positioning runtime error: {0}")]
    Runtime(String),
}

/// Background-runtime collaborator keeping the positioning stream alive.
///
/// Opaque to the core beyond success or failure.
pub trait BackgroundRuntime: Send + Sync {
    /// Start the extended background session.
    fn start(&self) -> Result<(), PositioningError>;

    /// Stop it. Failures are logged by the tracker, never surfaced.
    fn stop(&self) -> Result<(), PositioningError>;
}

/// Inbound events, re-dispatched from platform callbacks.
#[derive(Debug)]
pub enum TrackerEvent {
    /// Begin tracking: activate the session, start the background runtime.
    StartTracking,
    /// Stop tracking and tear down the positioning subscription.
    StopTracking,
    /// A raw fix from the positioning collaborator.
    Fix(RawFix),
    /// A session lifecycle event from the pairing layer.
    Link(LinkEvent),
    /// An incoming record payload from any delivery channel.
    Inbound(Vec<u8>),
}

/// Snapshot of tracker state for UI consumption.
#[derive(Debug, Clone, Default)]
pub struct TrackerStatus {
    /// Current link session state.
    pub session: Option<LinkSessionState>,
    /// Whether tracking is running.
    pub is_tracking: bool,
    /// Highest-sequence sample accepted from the peer.
    pub peer_latest: Option<PositionSample>,
    /// Distance to the peer in meters, when both fixes exist.
    pub distance_m: Option<f64>,
    /// Age of the peer's latest sample.
    pub peer_sample_age: Option<Duration>,
    /// Number of samples in the history window.
    pub history_len: usize,
    /// Freshness condition of the peer sample, if any.
    pub freshness: Option<Fault>,
    /// Most recent classified failure, if any.
    pub last_fault: Option<Fault>,
}

/// Cloneable handle for submitting events and reading state.
#[derive(Clone)]
pub struct TrackerHandle {
    events_tx: mpsc::Sender<TrackerEvent>,
    is_tracking: Arc<AtomicBool>,
    session_rx: watch::Receiver<LinkSessionState>,
    status_rx: watch::Receiver<TrackerStatus>,
    cancel: CancellationToken,
    activation_timeout: Duration,
}

impl TrackerHandle {
    /// Begin tracking, waiting (bounded) for the session to come up.
    ///
    /// The wait is used only here, never per sample. On timeout a
    /// retryable link-not-ready fault is returned instead of blocking.
    pub async fn start_tracking(&self) -> Result<(), Fault> {
        self.events_tx
            .send(TrackerEvent::StartTracking)
            .await
            .map_err(|_| Fault::new(FaultKind::Unknown, "tracker has shut down"))?;

        let mut session_rx = self.session_rx.clone();
        wait_until_active(&mut session_rx, self.activation_timeout)
            .await
            .map_err(|e| Fault::from(&e))
    }

    /// Stop tracking.
    ///
    /// Flips the externally visible tracking flag immediately so dependent
    /// logic reacts without waiting for teardown, then hands the
    /// asynchronous teardown to the actor.
    pub fn stop_tracking(&self) {
        self.is_tracking.store(false, Ordering::SeqCst);
        if self.events_tx.try_send(TrackerEvent::StopTracking).is_err() {
            debug!("Tracker queue unavailable for stop event");
        }
    }

    /// Whether tracking is currently on.
    pub fn is_tracking(&self) -> bool {
        self.is_tracking.load(Ordering::SeqCst)
    }

    /// Submit a raw fix (fire-and-forget).
    pub fn submit_fix(&self, fix: RawFix) {
        if self.events_tx.try_send(TrackerEvent::Fix(fix)).is_err() {
            // A fresher fix will supersede this one.
            debug!("Tracker queue full, dropping fix");
        }
    }

    /// Submit a session lifecycle event (fire-and-forget).
    pub fn submit_link_event(&self, event: LinkEvent) {
        if self.events_tx.try_send(TrackerEvent::Link(event)).is_err() {
            warn!("Tracker queue full, dropping link event");
        }
    }

    /// Submit an incoming record payload (fire-and-forget).
    pub fn submit_inbound(&self, payload: Vec<u8>) {
        if self
            .events_tx
            .try_send(TrackerEvent::Inbound(payload))
            .is_err()
        {
            warn!("Tracker queue full, dropping inbound record");
        }
    }

    /// Current session state.
    pub fn session_state(&self) -> LinkSessionState {
        *self.session_rx.borrow()
    }

    /// Subscribe to session state changes.
    pub fn subscribe_session(&self) -> watch::Receiver<LinkSessionState> {
        self.session_rx.clone()
    }

    /// Latest published status snapshot.
    pub fn status(&self) -> TrackerStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to status snapshots.
    pub fn subscribe_status(&self) -> watch::Receiver<TrackerStatus> {
        self.status_rx.clone()
    }

    /// Shut the actor down entirely (process teardown).
    pub fn shutdown(&self) {
        self.is_tracking.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

/// The relay core for one device.
pub struct Tracker<T: LinkTransport, R: BackgroundRuntime, C: Clock> {
    config: TetherConfig,
    events_rx: mpsc::Receiver<TrackerEvent>,
    encoder: SampleEncoder,
    throttle: ThrottleController,
    transmitter: Transmitter<T>,
    session: LinkSession,
    receiver: Receiver,
    runtime: Arc<R>,
    clock: Arc<C>,
    metrics: MetricsClient,
    is_tracking: Arc<AtomicBool>,
    own_fix: Option<PositionSample>,
    last_fault: Option<Fault>,
    status_tx: watch::Sender<TrackerStatus>,
    cancel: CancellationToken,
}

impl<T, R, C> Tracker<T, R, C>
where
    T: LinkTransport + 'static,
    R: BackgroundRuntime + 'static,
    C: Clock + 'static,
{
    /// Assemble a tracker and its handle.
    pub fn new(
        origin: Origin,
        transport: Arc<T>,
        runtime: Arc<R>,
        clock: Arc<C>,
        metrics: MetricsClient,
        config: TetherConfig,
    ) -> (Self, TrackerHandle) {
        let (events_tx, events_rx) = mpsc::channel(config.event_queue_depth);
        let (session, session_rx) = LinkSession::new(metrics.clone());
        let (status_tx, status_rx) = watch::channel(TrackerStatus::default());
        let is_tracking = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let handle = TrackerHandle {
            events_tx,
            is_tracking: Arc::clone(&is_tracking),
            session_rx,
            status_rx,
            cancel: cancel.clone(),
            activation_timeout: config.activation_timeout,
        };

        let tracker = Self {
            encoder: SampleEncoder::new(origin),
            throttle: ThrottleController::new(config.throttle.clone(), metrics.clone()),
            transmitter: Transmitter::new(transport, metrics.clone()),
            session,
            receiver: Receiver::new(config.history_capacity, metrics.clone()),
            runtime,
            clock,
            metrics,
            is_tracking,
            own_fix: None,
            last_fault: None,
            status_tx,
            cancel,
            config,
            events_rx,
        };

        (tracker, handle)
    }

    /// Spawn the actor onto the runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drain events until shutdown.
    pub async fn run(mut self) {
        info!(origin = self.encoder.origin().wire_name(), "Tracker started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
        self.teardown();
        info!("Tracker stopped");
    }

    fn handle_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::StartTracking => self.handle_start(),
            TrackerEvent::StopTracking => self.handle_stop(),
            TrackerEvent::Fix(fix) => self.handle_fix(fix),
            TrackerEvent::Link(link_event) => self.handle_link(link_event),
            TrackerEvent::Inbound(payload) => self.handle_inbound(&payload),
        }
        self.publish_status();
    }

    fn handle_start(&mut self) {
        self.session.request_activation();

        match self.runtime.start() {
            Ok(()) => {
                self.is_tracking.store(true, Ordering::SeqCst);
                info!("Tracking started");
            }
            Err(e) => {
                let fault = Fault::from(&e);
                if fault.retryable() {
                    warn!(fault = %fault, "Background runtime start failed, retryable");
                } else {
                    // Needs a settings change; surface once, do not loop.
                    warn!(fault = %fault, "Background runtime start failed, requires user action");
                }
                self.last_fault = Some(fault);
            }
        }
    }

    fn handle_stop(&mut self) {
        // The handle already flipped the flag; keep it authoritative here
        // for events that arrive through other paths.
        self.is_tracking.store(false, Ordering::SeqCst);
        if let Err(e) = self.runtime.stop() {
            // Teardown failures are logged, never user-facing.
            warn!(error = %e, "Background runtime teardown failed");
        }
        info!("Tracking stopped");
    }

    fn handle_fix(&mut self, fix: RawFix) {
        if !self.is_tracking.load(Ordering::SeqCst) {
            debug!("Fix while not tracking, ignoring");
            return;
        }

        let sample = self.encoder.encode_fix(fix);
        self.metrics.sample_encoded(sample.seq);
        self.own_fix = Some(sample.clone());

        match self.throttle.decide(&sample, self.clock.now()) {
            ThrottleDecision::Send => {
                let record = WireRecord::from_sample(&sample);
                self.transmitter.relay(&record);
            }
            ThrottleDecision::Suppress => {
                debug!(seq = sample.seq, "Sample suppressed by throttle");
            }
        }
    }

    fn handle_link(&mut self, event: LinkEvent) {
        if let Some(LinkAction::Reactivate) = self.session.apply(event, self.clock.now()) {
            // Auto-recovery is silent for isolated failures; a streak of
            // them becomes user-visible.
            let failures = self.session.consecutive_activation_failures();
            if failures >= self.config.activation_failure_threshold {
                let detail = self
                    .session
                    .last_activation_error()
                    .unwrap_or("session activation keeps failing");
                warn!(failures, "Activation failure streak surfaced as fault");
                self.last_fault = Some(classify_message(detail));
            }
            self.session.request_activation();
        }
    }

    fn handle_inbound(&mut self, payload: &[u8]) {
        match self.receiver.accept(payload) {
            Ok(Accepted::Fresh(sample)) => {
                debug!(seq = sample.seq, "Fresh peer sample accepted");
            }
            Ok(Accepted::OutOfOrder(_)) | Ok(Accepted::Duplicate) => {}
            Err(e) => {
                self.last_fault = Some(Fault::from(&e));
            }
        }
    }

    fn peer_origin(&self) -> Origin {
        match self.encoder.origin() {
            Origin::Subject => Origin::Observer,
            Origin::Observer => Origin::Subject,
        }
    }

    fn publish_status(&mut self) {
        let peer_latest = self.receiver.latest(self.peer_origin()).cloned();
        let peer_sample_age = peer_latest
            .as_ref()
            .map(|s| geo::sample_age(s, self.clock.wall()));

        let freshness = match (&peer_latest, peer_sample_age) {
            (None, _) => Some(Fault::new(
                FaultKind::NoSampleYet,
                "no sample received from peer yet",
            )),
            (Some(_), Some(age)) if age > self.config.stale_after => Some(Fault::new(
                FaultKind::StaleSample,
                format!("latest peer sample is {}s old", age.as_secs()),
            )),
            _ => None,
        };

        let status = TrackerStatus {
            session: Some(self.session.state()),
            is_tracking: self.is_tracking.load(Ordering::SeqCst),
            distance_m: geo::distance_m(self.own_fix.as_ref(), peer_latest.as_ref()),
            peer_sample_age,
            history_len: self.receiver.history().len(),
            freshness,
            last_fault: self.last_fault.clone(),
            peer_latest,
        };
        let _ = self.status_tx.send(status);
    }

    fn teardown(&mut self) {
        if self.is_tracking.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.runtime.stop() {
                warn!(error = %e, "Background runtime teardown failed");
            }
        }
    }
}
