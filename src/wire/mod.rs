//! Wire record encoding and decoding.
//!
//! One compact JSON record is produced per position sample (~200-300 bytes).
//! Field names are abbreviated to minimize payload over the pairing link.
//! Records carry a version byte so either end can reject formats it does not
//! understand instead of misreading them.
//!
//! Decoding is defensive: a malformed record yields a [`DecodeError`] and
//! must never take down the receive loop. Null and invalid-sentinel fields
//! round-trip unchanged - an absent altitude stays absent, a `-1.0` speed
//! stays `-1.0`.

mod encoder;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::sample::{Origin, PositionSample, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

pub use encoder::SampleEncoder;

/// Current wire record version.
pub const WIRE_VERSION: u8 = 1;

fn default_version() -> u8 {
    WIRE_VERSION
}

/// Errors produced while decoding an incoming record.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was not valid JSON or was missing required fields.
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The record version is not one this build understands.
    #[error("Unsupported wire version {0}")]
    UnsupportedVersion(u8),

    /// The record id was not a valid UUID.
    #[error("Invalid record id: {0}")]
    InvalidId(String),

    /// The source field named neither peer.
    #[error("Unknown source {0:?}")]
    UnknownSource(String),

    /// The coordinate lies outside valid lat/lon ranges.
    #[error("Coordinate out of range: lat={lat}, lon={lon}")]
    CoordinateOutOfRange { lat: f64, lon: f64 },

    /// Sequence numbers start at 1; zero means a broken encoder.
    #[error("Invalid sequence number 0")]
    InvalidSequence,

    /// Battery percentage outside 0-100.
    #[error("Battery percentage out of range: {0}")]
    BatteryOutOfRange(f64),
}

/// Coordinate pair as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// The wire representation of one position sample.
///
/// Field names match the pairing-link payload format exactly; see the
/// module docs for the versioning policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    /// Record format version.
    #[serde(default = "default_version")]
    pub v: u8,
    /// Sample identity (UUID string).
    pub id: String,
    /// Fix timestamp, milliseconds since the Unix epoch.
    pub ts_unix_ms: u64,
    /// Producing device: `"watch"` or `"phone"`.
    pub source: String,
    /// Position coordinate.
    pub coordinate: WireCoordinate,
    /// Altitude in meters, or null.
    pub alt_m: Option<f64>,
    /// Horizontal accuracy in meters. Negative means invalid.
    pub h_accuracy_m: f64,
    /// Vertical accuracy in meters. Negative means invalid.
    pub v_accuracy_m: f64,
    /// Speed in meters per second. Negative means invalid.
    pub speed_mps: f64,
    /// Course in degrees. Negative means invalid.
    pub course_deg: f64,
    /// Heading in degrees, or null.
    pub heading_deg: Option<f64>,
    /// Battery level as a percentage (0-100).
    pub battery_pct: f64,
    /// Per-origin monotonic sequence number.
    pub seq: u64,
}

impl WireRecord {
    /// Build a wire record from a sample.
    pub fn from_sample(sample: &PositionSample) -> Self {
        Self {
            v: WIRE_VERSION,
            id: sample.id.to_string(),
            ts_unix_ms: unix_ms(sample.timestamp),
            source: sample.origin.wire_name().to_string(),
            coordinate: WireCoordinate {
                latitude: sample.latitude,
                longitude: sample.longitude,
            },
            alt_m: sample.altitude_m,
            h_accuracy_m: sample.h_accuracy_m,
            v_accuracy_m: sample.v_accuracy_m,
            speed_mps: sample.speed_mps,
            course_deg: sample.course_deg,
            heading_deg: sample.heading_deg,
            battery_pct: sample.battery_fraction * 100.0,
            seq: sample.seq,
        }
    }

    /// Validate and convert back into a sample.
    pub fn into_sample(self) -> Result<PositionSample, DecodeError> {
        if self.v != WIRE_VERSION {
            return Err(DecodeError::UnsupportedVersion(self.v));
        }
        let id = Uuid::parse_str(&self.id).map_err(|_| DecodeError::InvalidId(self.id.clone()))?;
        let origin = match self.source.as_str() {
            "watch" => Origin::Subject,
            "phone" => Origin::Observer,
            other => return Err(DecodeError::UnknownSource(other.to_string())),
        };
        let lat = self.coordinate.latitude;
        let lon = self.coordinate.longitude;
        if !(MIN_LAT..=MAX_LAT).contains(&lat) || !(MIN_LON..=MAX_LON).contains(&lon) {
            return Err(DecodeError::CoordinateOutOfRange { lat, lon });
        }
        if self.seq == 0 {
            return Err(DecodeError::InvalidSequence);
        }
        if !(0.0..=100.0).contains(&self.battery_pct) {
            return Err(DecodeError::BatteryOutOfRange(self.battery_pct));
        }

        Ok(PositionSample {
            id,
            origin,
            timestamp: UNIX_EPOCH + Duration::from_millis(self.ts_unix_ms),
            latitude: lat,
            longitude: lon,
            altitude_m: self.alt_m,
            h_accuracy_m: self.h_accuracy_m,
            v_accuracy_m: self.v_accuracy_m,
            speed_mps: self.speed_mps,
            course_deg: self.course_deg,
            heading_deg: self.heading_deg,
            battery_fraction: self.battery_pct / 100.0,
            seq: self.seq,
        })
    }
}

/// Serialize a sample to its wire payload.
pub fn encode(sample: &PositionSample) -> Vec<u8> {
    // WireRecord contains only JSON-safe types; serialization cannot fail.
    serde_json::to_vec(&WireRecord::from_sample(sample)).unwrap_or_default()
}

/// Parse and validate an incoming wire payload.
pub fn decode(payload: &[u8]) -> Result<PositionSample, DecodeError> {
    let record: WireRecord = serde_json::from_slice(payload)?;
    record.into_sample()
}

/// Milliseconds since the Unix epoch for a timestamp.
///
/// Timestamps before the epoch clamp to zero; the devices in this system
/// do not produce pre-1970 fixes.
pub fn unix_ms(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
