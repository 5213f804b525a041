//! Error types for LifePulse domain validation

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Unknown blood group: {0}")]
    InvalidBloodGroup(String),

    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Coordinate requires both latitude and longitude")]
    IncompleteCoordinate,

    #[error("Invalid search radius: {0} km")]
    InvalidRadius(f64),

    #[error("Unknown donor status: {0}")]
    InvalidStatus(String),

    #[error("Unknown donor response: {0}")]
    InvalidResponse(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
