//! LifePulse Core Library
//!
//! Domain building blocks for matching blood donors to hospital requests:
//! - Great-circle distance and bounding-box pre-filters (`geo`)
//! - ABO/Rh blood groups (`blood`)
//! - Donor, request and notification lifecycle states (`status`)
//! - Boundary validation for emails, coordinates and radii (`validation`)

pub mod blood;
pub mod error;
pub mod geo;
pub mod status;
pub mod validation;

pub use blood::BloodGroup;
pub use error::Error;
pub use geo::{bounding_box, distance_km, BoundingBox, Coordinate};
pub use status::{DonorResponse, DonorStatus, RequestStatus};

/// Result type for lifepulse-core operations
pub type Result<T> = std::result::Result<T, Error>;
