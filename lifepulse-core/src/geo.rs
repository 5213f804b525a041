//! Geographic math for proximity matching
//!
//! Distances use the haversine formula on a spherical Earth. Bounding boxes
//! are a cheap pre-filter: they always contain the full radius circle, so a
//! point outside the box is guaranteed to be out of range, while a point
//! inside still needs the exact distance check.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Fixed latitude approximation: one degree is about 111 km.
///
/// The exact figure for a 6371 km sphere is ~111.195 km, so dividing by 111
/// slightly overestimates the angular radius and keeps the box conservative.
pub const KM_PER_DEGREE: f64 = 111.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another coordinate in kilometers
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    /// Bounding box around this coordinate for the given radius
    pub fn bounding_box(&self, radius_km: f64) -> BoundingBox {
        bounding_box(self.latitude, self.longitude, radius_km)
    }
}

/// Haversine distance between two points, in kilometers.
///
/// Invalid input (NaN) propagates as NaN. Callers compare with `<=`, which
/// is false for NaN, so such points never match.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for antipodal points; NaN must survive
    let a = if a > 1.0 { 1.0 } else { a };

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// An axis-aligned latitude/longitude rectangle.
///
/// Longitude bounds are not normalized: a box centered near the antimeridian
/// may have `min_lon < -180` or `max_lon > 180`. Use [`BoundingBox::contains`]
/// or [`BoundingBox::longitude_ranges`] rather than comparing raw bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Box covering the whole longitude span between two latitudes
    fn full_width(min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }

    /// Whether the box covers every longitude
    pub fn spans_all_longitudes(&self) -> bool {
        self.max_lon - self.min_lon >= 360.0
            || (self.min_lon <= -180.0 && self.max_lon >= 180.0)
    }

    /// Check whether a point lies inside the box (wrapping at the antimeridian)
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if !(self.min_lat <= latitude && latitude <= self.max_lat) {
            return false;
        }
        if self.spans_all_longitudes() {
            return true;
        }
        [longitude, longitude - 360.0, longitude + 360.0]
            .iter()
            .any(|lon| self.min_lon <= *lon && *lon <= self.max_lon)
    }

    /// Longitude bounds split into one or two ranges within [-180, 180].
    ///
    /// Storage backends that filter with `BETWEEN` need this form, since a box
    /// crossing the antimeridian covers both ends of the longitude axis.
    pub fn longitude_ranges(&self) -> Vec<(f64, f64)> {
        if self.spans_all_longitudes() {
            vec![(-180.0, 180.0)]
        } else if self.min_lon < -180.0 {
            vec![(self.min_lon + 360.0, 180.0), (-180.0, self.max_lon)]
        } else if self.max_lon > 180.0 {
            vec![(self.min_lon, 180.0), (-180.0, self.max_lon - 360.0)]
        } else {
            vec![(self.min_lon, self.max_lon)]
        }
    }
}

/// Bounding box that contains every point within `radius_km` of the center.
///
/// Latitude half-height is `radius / 111` degrees. Longitude half-width is the
/// widest longitude offset of that cap on the sphere, `asin(sin(dlat) / cos(lat))`,
/// which for small radii is the familiar `dlat / cos(lat)` correction. When the
/// cap reaches a pole every longitude is in range.
pub fn bounding_box(latitude: f64, longitude: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let south = latitude - lat_delta;
    let north = latitude + lat_delta;
    let min_lat = south.max(-90.0);
    let max_lat = north.min(90.0);

    if south <= -90.0 || north >= 90.0 {
        return BoundingBox::full_width(min_lat, max_lat);
    }

    let ratio = lat_delta.to_radians().sin() / latitude.to_radians().cos();
    if ratio >= 1.0 {
        return BoundingBox::full_width(min_lat, max_lat);
    }

    let lon_delta = ratio.asin().to_degrees();
    BoundingBox {
        min_lat,
        max_lat,
        min_lon: longitude - lon_delta,
        max_lon: longitude + lon_delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANGALORE: (f64, f64) = (12.9716, 77.5946);

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_km(BANGALORE.0, BANGALORE.1, BANGALORE.0, BANGALORE.1), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // One degree of latitude along a meridian
        let d = distance_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.195).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_nan_distance_never_matches() {
        let d = distance_km(f64::NAN, 0.0, 1.0, 1.0);
        assert!(d.is_nan());
        assert!(!(d <= 5.0));
    }

    #[test]
    fn test_antipodal_distance_is_finite() {
        let d = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - EARTH_RADIUS_KM * std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_box_is_symmetric_around_center() {
        let b = bounding_box(BANGALORE.0, BANGALORE.1, 5.0);
        assert!((b.max_lat - BANGALORE.0 - 5.0 / 111.0).abs() < 1e-12);
        assert!((BANGALORE.0 - b.min_lat - 5.0 / 111.0).abs() < 1e-12);
        assert!((b.max_lon - BANGALORE.1 - (BANGALORE.1 - b.min_lon)).abs() < 1e-12);
        // Longitude span widens with latitude
        assert!(b.max_lon - b.min_lon > b.max_lat - b.min_lat);
    }

    #[test]
    fn test_box_near_pole_spans_all_longitudes() {
        let b = bounding_box(89.99, 10.0, 5.0);
        assert!(b.spans_all_longitudes());
        assert_eq!(b.max_lat, 90.0);
        assert!(b.contains(89.995, -170.0));
    }

    #[test]
    fn test_box_across_antimeridian() {
        let b = bounding_box(0.0, 179.99, 10.0);
        assert!(b.max_lon > 180.0);
        assert!(b.contains(0.0, -179.99));
        assert!(!b.contains(0.0, -170.0));

        let ranges = b.longitude_ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].1, 180.0);
        assert_eq!(ranges[1].0, -180.0);
    }

    #[test]
    fn test_longitude_ranges_single_when_inside() {
        let b = bounding_box(BANGALORE.0, BANGALORE.1, 5.0);
        assert_eq!(b.longitude_ranges(), vec![(b.min_lon, b.max_lon)]);
    }
}
