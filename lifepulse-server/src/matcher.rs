//! Selection of eligible donors for a blood request

use std::sync::Arc;

use crate::error::ServerResult;
use crate::store::{BloodRequest, Donor, DonorQuery, DonorStore};

/// Finds approved, available donors of the needed blood group near a request.
///
/// Read-only; stale availability data is tolerated.
pub struct DonorMatcher<D> {
    donors: Arc<D>,
}

impl<D: DonorStore> DonorMatcher<D> {
    pub fn new(donors: Arc<D>) -> Self {
        Self { donors }
    }

    /// Donors eligible for a request, in storage scan order.
    ///
    /// A request without a location matches every eligible donor. Otherwise
    /// the store pre-filters by bounding box and the exact haversine distance
    /// must be within the request radius. Donors without a location never
    /// match a located request.
    pub fn find_matches(&self, request: &BloodRequest) -> ServerResult<Vec<Donor>> {
        let query = DonorQuery::eligible(request.blood_group_needed);

        let center = match request.location {
            None => return self.donors.find_donors(&query),
            Some(center) => center,
        };

        let candidates = self
            .donors
            .find_donors(&query.within(center.bounding_box(request.radius_km)))?;

        Ok(candidates
            .into_iter()
            .filter(|donor| {
                donor
                    .location
                    .is_some_and(|loc| center.distance_to(&loc) <= request.radius_km)
            })
            .collect())
    }
}
