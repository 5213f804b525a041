//! Boundary validation for user-supplied values

use crate::geo::Coordinate;
use crate::{Error, Result};

/// Search radius applied when a request does not specify one
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// Maximum accepted length of an email address (RFC 5321 path limit)
const MAX_EMAIL_LENGTH: usize = 254;

/// Validate an email address and return its normalized (trimmed, lower-case) form.
///
/// This is a structural check, not deliverability: one `@`, a non-empty local
/// part, and a dotted domain without empty labels.
pub fn normalize_email(email: &str) -> Result<String> {
    let normalized = email.trim().to_lowercase();
    let invalid = || Error::InvalidEmail(email.to_string());

    if normalized.is_empty() || normalized.len() > MAX_EMAIL_LENGTH {
        return Err(invalid());
    }
    if normalized.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }

    let (local, domain) = normalized.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(normalized)
}

/// Validate a coordinate: finite, latitude in [-90, 90], longitude in [-180, 180]
pub fn validate_coordinate(latitude: f64, longitude: f64) -> Result<Coordinate> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);

    if valid {
        Ok(Coordinate::new(latitude, longitude))
    } else {
        Err(Error::InvalidCoordinate {
            latitude,
            longitude,
        })
    }
}

/// Build an optional coordinate from optional parts; both or neither must be given
pub fn coordinate_from_parts(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Coordinate>> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => validate_coordinate(lat, lon).map(Some),
        (None, None) => Ok(None),
        _ => Err(Error::IncompleteCoordinate),
    }
}

/// Resolve a search radius, applying the default and rejecting non-positive values
pub fn resolve_radius(radius_km: Option<f64>) -> Result<f64> {
    let radius = radius_km.unwrap_or(DEFAULT_RADIUS_KM);
    if radius.is_finite() && radius > 0.0 {
        Ok(radius)
    } else {
        Err(Error::InvalidRadius(radius))
    }
}

/// Require a non-blank text field, returning it trimmed
pub fn require_text(value: &str, field: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(
            normalize_email("  Donor@Example.COM ").unwrap(),
            "donor@example.com"
        );
    }

    #[test]
    fn test_invalid_emails() {
        for bad in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@localhost",
            "user@exa..mple.com",
            "us er@example.com",
            "a@b@example.com",
        ] {
            assert!(normalize_email(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(validate_coordinate(12.97, 77.59).is_ok());
        assert!(validate_coordinate(90.0, -180.0).is_ok());
        assert!(validate_coordinate(90.1, 0.0).is_err());
        assert!(validate_coordinate(0.0, 180.5).is_err());
        assert!(validate_coordinate(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinate_parts() {
        assert_eq!(coordinate_from_parts(None, None).unwrap(), None);
        assert_eq!(
            coordinate_from_parts(Some(1.0), None),
            Err(Error::IncompleteCoordinate)
        );
        assert_eq!(
            coordinate_from_parts(Some(1.0), Some(2.0)).unwrap(),
            Some(Coordinate::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_radius_default_and_bounds() {
        assert_eq!(resolve_radius(None).unwrap(), DEFAULT_RADIUS_KM);
        assert_eq!(resolve_radius(Some(12.5)).unwrap(), 12.5);
        assert!(resolve_radius(Some(0.0)).is_err());
        assert!(resolve_radius(Some(-3.0)).is_err());
        assert!(resolve_radius(Some(f64::INFINITY)).is_err());
    }
}
