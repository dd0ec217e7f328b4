//! Great-circle math for the proximity engine. Inputs are WGS84 degrees;
//! range validation is the caller's job.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two coordinates in meters.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Initial compass bearing from point 1 to point 2 in degrees, normalized to
/// `[0, 360)` with 0 = north, clockwise.
pub fn initial_bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Display band for a distance. Ordered so closer bands compare lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceBand {
    VeryClose,
    Close,
    Nearby,
    Far,
}

impl DistanceBand {
    pub fn for_distance(meters: f64) -> Self {
        if meters < 500.0 {
            DistanceBand::VeryClose
        } else if meters < 1000.0 {
            DistanceBand::Close
        } else if meters < 2000.0 {
            DistanceBand::Nearby
        } else {
            DistanceBand::Far
        }
    }
}
