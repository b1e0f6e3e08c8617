//! Adaptive throttle controller.
//!
//! Decides, per incoming sample, whether it is worth spending radio and
//! battery on a transmit right now. The policy trades freshness against
//! battery: a healthy battery sends at up to 2 Hz, a low battery slows to
//! 1 Hz (or 0.5 Hz when the wearer is standing still), and a critical
//! battery drops to one sample every five seconds. A significant accuracy
//! change always goes out immediately so the observer is never left with a
//! confidently-wrong fix.
//!
//! The decision is a pure function of [`ThrottleState`], the new sample,
//! and an injected `now` - no hidden timers, fully testable without real
//! clocks.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::geo::haversine_m;
use crate::metrics::MetricsClient;
use crate::sample::PositionSample;

/// Battery-driven sending-rate tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryTier {
    /// Battery above 20% - full rate.
    Normal,
    /// Battery in (10%, 20%] - reduced rate.
    Low,
    /// Battery at or below 10% - aggressive conservation.
    Critical,
}

/// Throttle policy parameters.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Accuracy delta (meters) that bypasses all throttling.
    pub accuracy_bypass_delta_m: f64,

    /// Minimum send interval at the normal tier (~2 Hz ceiling).
    pub normal_interval: Duration,

    /// Minimum send interval at the low tier while moving.
    pub low_interval: Duration,

    /// Minimum send interval at the low tier while stationary.
    pub low_stationary_interval: Duration,

    /// Minimum send interval at the critical tier.
    pub critical_interval: Duration,

    /// Quiet window after which the device is judged stationary.
    pub stationary_window: Duration,

    /// Displacement (meters) that counts as movement.
    pub stationary_radius_m: f64,

    /// Battery fraction at or below which the tier is Low.
    pub low_battery_threshold: f64,

    /// Battery fraction at or below which the tier is Critical.
    pub critical_battery_threshold: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            accuracy_bypass_delta_m: 5.0,
            normal_interval: Duration::from_millis(500),
            low_interval: Duration::from_secs(1),
            low_stationary_interval: Duration::from_secs(2),
            critical_interval: Duration::from_secs(5),
            stationary_window: Duration::from_secs(30),
            stationary_radius_m: 5.0,
            low_battery_threshold: 0.20,
            critical_battery_threshold: 0.10,
        }
    }
}

impl ThrottleConfig {
    /// Tier for a battery fraction.
    pub fn tier_for(&self, battery_fraction: f64) -> BatteryTier {
        if battery_fraction <= self.critical_battery_threshold {
            BatteryTier::Critical
        } else if battery_fraction <= self.low_battery_threshold {
            BatteryTier::Low
        } else {
            BatteryTier::Normal
        }
    }
}

/// Outcome of a throttle evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Transmit this sample now.
    Send,
    /// Withhold this sample; a fresher one will supersede it.
    Suppress,
}

/// Mutable throttle bookkeeping, transmitter-side only.
#[derive(Debug, Default)]
pub struct ThrottleState {
    /// When the last sample was sent.
    last_sent_at: Option<Instant>,
    /// Horizontal accuracy of the last sent sample.
    last_sent_accuracy: Option<f64>,
    /// Anchor position for stationarity comparison.
    anchor: Option<(f64, f64)>,
    /// When displacement from the anchor last exceeded the radius.
    last_movement_at: Option<Instant>,
}

impl ThrottleState {
    /// Whether the device has been within the stationary radius of its
    /// anchor for the full quiet window.
    fn is_stationary(&self, now: Instant, window: Duration) -> bool {
        match self.last_movement_at {
            Some(at) => now.duration_since(at) >= window,
            None => false,
        }
    }
}

/// Battery- and motion-aware send/suppress policy.
pub struct ThrottleController {
    config: ThrottleConfig,
    state: ThrottleState,
    metrics: MetricsClient,
}

impl ThrottleController {
    /// Create a controller with the given policy and metrics sink.
    pub fn new(config: ThrottleConfig, metrics: MetricsClient) -> Self {
        Self {
            config,
            state: ThrottleState::default(),
            metrics,
        }
    }

    /// Evaluate one sample against the current state.
    ///
    /// Movement tracking updates on every evaluated sample; send
    /// bookkeeping updates only when the decision is [`ThrottleDecision::Send`].
    pub fn decide(&mut self, sample: &PositionSample, now: Instant) -> ThrottleDecision {
        self.track_movement(sample, now);

        let decision = self.evaluate(sample, now);

        match decision {
            ThrottleDecision::Send => {
                self.state.last_sent_at = Some(now);
                self.state.last_sent_accuracy = Some(sample.h_accuracy_m);
            }
            ThrottleDecision::Suppress => {
                self.metrics.sample_suppressed();
            }
        }
        decision
    }

    fn evaluate(&self, sample: &PositionSample, now: Instant) -> ThrottleDecision {
        // Rule 1: significant accuracy change bypasses all throttling.
        if let Some(last_accuracy) = self.state.last_sent_accuracy {
            if (sample.h_accuracy_m - last_accuracy).abs() > self.config.accuracy_bypass_delta_m {
                trace!(
                    seq = sample.seq,
                    accuracy = sample.h_accuracy_m,
                    last_accuracy,
                    "Accuracy change bypasses throttle"
                );
                return ThrottleDecision::Send;
            }
        }

        // Rules 2-3: interval from battery tier, tightened by stationarity.
        let tier = self.config.tier_for(sample.battery_fraction);
        let min_interval = self.min_interval(tier, now);

        // Rule 4: elapsed-time gate. Nothing sent yet means send.
        match self.state.last_sent_at {
            None => ThrottleDecision::Send,
            Some(last) if now.duration_since(last) >= min_interval => ThrottleDecision::Send,
            Some(_) => ThrottleDecision::Suppress,
        }
    }

    fn min_interval(&self, tier: BatteryTier, now: Instant) -> Duration {
        match tier {
            BatteryTier::Normal => self.config.normal_interval,
            BatteryTier::Low => {
                if self
                    .state
                    .is_stationary(now, self.config.stationary_window)
                {
                    self.config.low_stationary_interval
                } else {
                    self.config.low_interval
                }
            }
            BatteryTier::Critical => self.config.critical_interval,
        }
    }

    fn track_movement(&mut self, sample: &PositionSample, now: Instant) {
        match self.state.anchor {
            None => {
                self.state.anchor = Some((sample.latitude, sample.longitude));
                self.state.last_movement_at = Some(now);
            }
            Some((anchor_lat, anchor_lon)) => {
                let displacement =
                    haversine_m(anchor_lat, anchor_lon, sample.latitude, sample.longitude);
                if displacement > self.config.stationary_radius_m {
                    self.state.anchor = Some((sample.latitude, sample.longitude));
                    self.state.last_movement_at = Some(now);
                }
            }
        }
    }
}
