//! Storage abstractions for LifePulse

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use lifepulse_core::{DonorResponse, DonorStatus, RequestStatus};

use crate::error::ServerError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, ServerError>;

/// Trait for donor storage
pub trait DonorStore: Send + Sync {
    /// Create a donor in `PendingEmailVerification` state
    fn create_donor(&self, details: &DonorDetails) -> StoreResult<Donor>;

    /// Get a donor by ID
    fn get_donor(&self, donor_id: DonorId) -> StoreResult<Option<Donor>>;

    /// Get a donor by (normalized) email address
    fn get_donor_by_email(&self, email: &str) -> StoreResult<Option<Donor>>;

    /// Overwrite registration details and restart email verification
    fn update_registration(&self, donor_id: DonorId, details: &DonorDetails) -> StoreResult<Donor>;

    /// Set lifecycle status; the rejection reason is stored only for `Rejected`
    fn update_status(
        &self,
        donor_id: DonorId,
        status: DonorStatus,
        rejection_reason: Option<&str>,
    ) -> StoreResult<()>;

    /// Apply a partial profile update
    fn update_profile(&self, donor_id: DonorId, update: &ProfileUpdate) -> StoreResult<Donor>;

    /// Find donors matching a query, in storage scan order
    fn find_donors(&self, query: &DonorQuery) -> StoreResult<Vec<Donor>>;

    /// Count donors per status
    fn count_by_status(&self) -> StoreResult<DonorCounts>;
}

/// Trait for blood request storage
pub trait RequestStore: Send + Sync {
    /// Create an active blood request
    fn create_request(&self, request: &NewBloodRequest) -> StoreResult<BloodRequest>;

    /// Get a request by ID
    fn get_request(&self, request_id: RequestId) -> StoreResult<Option<BloodRequest>>;

    /// List requests created by a hospital
    fn list_requests_by_hospital(&self, hospital_id: HospitalId) -> StoreResult<Vec<BloodRequest>>;

    /// Change a request's status
    fn set_request_status(&self, request_id: RequestId, status: RequestStatus) -> StoreResult<()>;
}

/// Trait for notification record storage
pub trait NotificationStore: Send + Sync {
    /// Record that a donor was notified about a request
    fn create_notification(
        &self,
        request_id: RequestId,
        donor_id: DonorId,
        notified_at: DateTime<Utc>,
    ) -> StoreResult<NotificationRecord>;

    /// Get a notification, but only if it belongs to the given donor
    fn get_notification_for_donor(
        &self,
        notification_id: NotificationId,
        donor_id: DonorId,
    ) -> StoreResult<Option<NotificationRecord>>;

    /// Overwrite the donor's response. Fails with `NotificationNotFound` if the
    /// notification does not exist or belongs to another donor.
    fn set_response(
        &self,
        notification_id: NotificationId,
        donor_id: DonorId,
        response: DonorResponse,
        response_at: DateTime<Utc>,
    ) -> StoreResult<NotificationRecord>;

    /// List a donor's notifications, newest first
    fn list_notifications_for_donor(&self, donor_id: DonorId) -> StoreResult<Vec<NotificationRecord>>;

    /// List notifications sent for a request, in creation order
    fn list_notifications_for_request(
        &self,
        request_id: RequestId,
    ) -> StoreResult<Vec<NotificationRecord>>;
}

/// Trait for OTP challenge storage, keyed by email.
///
/// Writes are atomic per email. Verification reads a challenge, compares the
/// slow hash without holding any lock, then commits with a compare-and-swap
/// on the challenge ID (and attempt count), so concurrent verifications can
/// neither lose an attempt nor consume a replaced challenge.
pub trait OtpStore: Send + Sync {
    /// Insert a challenge, atomically replacing any existing one for the email
    fn put_challenge(&self, challenge: OtpChallenge) -> StoreResult<()>;

    /// Get the live challenge for an email
    fn get_challenge(&self, email: &str) -> StoreResult<Option<OtpChallenge>>;

    /// Increment the attempt counter if the stored challenge still has this ID
    /// and `seen_attempts` failures. Returns false if it changed meanwhile.
    fn increment_attempts(
        &self,
        email: &str,
        challenge_id: &ChallengeId,
        seen_attempts: u32,
    ) -> StoreResult<bool>;

    /// Delete the challenge if the stored one still has this ID.
    /// Returns false if it was already removed or replaced.
    fn remove_challenge(&self, email: &str, challenge_id: &ChallengeId) -> StoreResult<bool>;
}

/// Trait for the append-only audit trail
pub trait AuditStore: Send + Sync {
    /// Append an entry stamped with the current time
    fn record(
        &self,
        actor: AuditActor,
        actor_id: u64,
        action: AuditAction,
        entity: Option<&str>,
    ) -> StoreResult<AuditEntry>;

    /// List entries in the order they were recorded
    fn list_audit(&self) -> StoreResult<Vec<AuditEntry>>;
}

/// Everything the service needs from a storage backend
pub trait Store: DonorStore + RequestStore + NotificationStore + OtpStore + AuditStore {}

impl<T> Store for T where
    T: DonorStore + RequestStore + NotificationStore + OtpStore + AuditStore
{
}
