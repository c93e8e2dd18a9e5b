//! Straight-line geography: coordinate validation, great-circle distance,
//! and radius queries. No routing; route density is approximated elsewhere
//! by the per-run mission budget.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DispatchError, Result};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(DispatchError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }
}

/// Haversine great-circle distance in kilometers.
///
/// Errors on out-of-range coordinates rather than returning NaN; callers
/// treat the affected target or agent as ineligible for the run.
pub fn distance_km(a: Coordinate, b: Coordinate) -> Result<f64> {
    a.validate()?;
    b.validate()?;

    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    Ok(2.0 * EARTH_RADIUS_KM * h.sqrt().asin())
}

/// Indices of `points` within `radius_km` of `center`. Invalid points are
/// skipped, not errors; a linear scan is adequate for fleet sizes of tens of
/// agents against thousands of targets.
pub fn within_radius(center: Coordinate, radius_km: f64, points: &[Coordinate]) -> Result<Vec<usize>> {
    center.validate()?;

    let mut hits = Vec::new();
    for (i, point) in points.iter().enumerate() {
        if !point.is_valid() {
            debug!(index = i, lat = point.lat, lon = point.lon, "Skipping invalid coordinate");
            continue;
        }
        if distance_km(center, *point)? <= radius_km {
            hits.push(i);
        }
    }
    Ok(hits)
}
