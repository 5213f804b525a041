//! Caller identity asserted by the upstream authentication layer

use axum::http::HeaderMap;

use crate::error::{ServerError, ServerResult};
use crate::store::{DonorId, HospitalId};

pub const DONOR_ID_HEADER: &str = "x-donor-id";
pub const HOSPITAL_ID_HEADER: &str = "x-hospital-id";

/// Donor on whose behalf the request is made
pub fn donor_id(headers: &HeaderMap) -> ServerResult<DonorId> {
    header_id(headers, DONOR_ID_HEADER).map(DonorId)
}

/// Hospital on whose behalf the request is made
pub fn hospital_id(headers: &HeaderMap) -> ServerResult<HospitalId> {
    header_id(headers, HOSPITAL_ID_HEADER).map(HospitalId)
}

fn header_id(headers: &HeaderMap, name: &str) -> ServerResult<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or(ServerError::MissingIdentity)
}
