//! Distance and staleness calculations.
//!
//! The observer UI derives two values from the latest accepted sample: how
//! far away the subject is (great-circle distance to the observer's own
//! fix) and how old the sample is. Both live here as pure functions so the
//! UI layer carries no geodesy.

use std::time::{Duration, SystemTime};

use crate::sample::PositionSample;

/// Mean Earth radius in meters (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates, in meters.
///
/// Haversine formulation - accurate to the meter at the ranges this system
/// operates over (two paired devices within a few kilometers).
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Distance in meters between the observer's fix and the subject's fix.
///
/// Returns `None` if either fix is absent.
pub fn distance_m(
    observer: Option<&PositionSample>,
    subject: Option<&PositionSample>,
) -> Option<f64> {
    let observer = observer?;
    let subject = subject?;
    Some(haversine_m(
        observer.latitude,
        observer.longitude,
        subject.latitude,
        subject.longitude,
    ))
}

/// Age of a sample relative to the given wall-clock time.
///
/// Saturates at zero - a sample timestamped slightly ahead of the local
/// clock reports zero age rather than a negative one.
pub fn sample_age(sample: &PositionSample, now: SystemTime) -> Duration {
    now.duration_since(sample.timestamp)
        .unwrap_or(Duration::ZERO)
}
