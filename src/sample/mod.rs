//! Position sample value types.
//!
//! A [`PositionSample`] is one timestamped GPS-like fix with accuracy and
//! motion metadata, stamped with an identity and a per-origin sequence
//! number. Samples are immutable once constructed; the receiving side keys
//! all dedupe/ordering decisions on `(origin, seq)`.
//!
//! # Invalid vs absent
//!
//! Numeric fields that have no natural absent representation on the wire
//! (horizontal/vertical accuracy, speed, course) use a negative sentinel to
//! mean "invalid", exactly as the positioning hardware reports them. Fields
//! that can be genuinely absent (altitude, heading) are `Option`s. The two
//! must never be conflated: a sample with `speed_mps = -1.0` round-trips
//! through encode/decode as `-1.0`, not `0.0` and not `None`.

use std::time::SystemTime;

use uuid::Uuid;

/// Valid latitude range in degrees.
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range in degrees.
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Which device produced a sample.
///
/// Wire names are `watch` (tracked subject) and `phone` (observer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The tracked subject's wearable.
    Subject,
    /// The observer's device.
    Observer,
}

impl Origin {
    /// Wire name for this origin.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Origin::Subject => "watch",
            Origin::Observer => "phone",
        }
    }
}

/// A raw fix as emitted by the positioning collaborator.
///
/// Carries no identity, origin, or sequence number - those are assigned by
/// the encoder when the fix enters the relay pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RawFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above sea level in meters, if the fix has one.
    pub altitude_m: Option<f64>,
    /// Horizontal accuracy radius in meters. Negative means invalid.
    pub h_accuracy_m: f64,
    /// Vertical accuracy in meters. Negative means invalid.
    pub v_accuracy_m: f64,
    /// Ground speed in meters per second. Negative means invalid.
    pub speed_mps: f64,
    /// Course over ground in degrees (0-360). Negative means invalid.
    pub course_deg: f64,
    /// Magnetic heading in degrees, if the device reports one.
    pub heading_deg: Option<f64>,
    /// Device battery level, 0.0-1.0.
    pub battery_fraction: f64,
    /// When the fix was taken.
    pub timestamp: SystemTime,
}

/// One position sample flowing through the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    /// Opaque identity, unique per sample.
    pub id: Uuid,
    /// Which device produced this sample.
    pub origin: Origin,
    /// When the underlying fix was taken (millisecond precision).
    pub timestamp: SystemTime,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters, if present.
    pub altitude_m: Option<f64>,
    /// Horizontal accuracy in meters. Negative means invalid.
    pub h_accuracy_m: f64,
    /// Vertical accuracy in meters. Negative means invalid.
    pub v_accuracy_m: f64,
    /// Speed in meters per second. Negative means invalid.
    pub speed_mps: f64,
    /// Course in degrees (0-360). Negative means invalid.
    pub course_deg: f64,
    /// Heading in degrees, if present.
    pub heading_deg: Option<f64>,
    /// Battery level, 0.0-1.0.
    pub battery_fraction: f64,
    /// Per-origin sequence number, starting at 1, strictly increasing.
    pub seq: u64,
}

impl PositionSample {
    /// Whether the horizontal accuracy field carries a usable value.
    pub fn has_valid_accuracy(&self) -> bool {
        self.h_accuracy_m >= 0.0
    }

    /// Whether the speed field carries a usable value.
    pub fn has_valid_speed(&self) -> bool {
        self.speed_mps >= 0.0
    }

    /// Whether the course field carries a usable value.
    pub fn has_valid_course(&self) -> bool {
        (0.0..=360.0).contains(&self.course_deg)
    }

    /// Whether the coordinate lies within valid lat/lon ranges.
    pub fn has_valid_coordinate(&self) -> bool {
        (MIN_LAT..=MAX_LAT).contains(&self.latitude)
            && (MIN_LON..=MAX_LON).contains(&self.longitude)
    }
}
