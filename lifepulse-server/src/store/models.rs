//! Data models for LifePulse storage

use chrono::{DateTime, Utc};
use lifepulse_core::{
    BloodGroup, BoundingBox, Coordinate, DonorResponse, DonorStatus, RequestStatus,
};
use serde::{Deserialize, Serialize};

/// Unique donor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DonorId(pub u64);

/// Hospital identifier (hospital accounts live outside this service)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HospitalId(pub u64);

/// Unique blood request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Unique notification record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

/// Identity of one issued OTP challenge, used for compare-and-swap updates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChallengeId(pub String);

impl ChallengeId {
    pub fn generate() -> Self {
        ChallengeId(uuid::Uuid::new_v4().to_string())
    }
}

/// A registered donor
#[derive(Debug, Clone, Serialize)]
pub struct Donor {
    pub id: DonorId,
    /// Short public reference shown to hospitals
    pub donor_code: String,
    pub full_name: String,
    /// Normalized (lower-case) email, unique across donors
    pub email: String,
    pub phone: String,
    pub blood_group: BloodGroup,
    pub area: Option<String>,
    /// Absent location means the donor is never geographically matchable
    pub location: Option<Coordinate>,
    pub status: DonorStatus,
    pub is_available: bool,
    /// Only present when `status` is `Rejected`
    pub rejection_reason: Option<String>,
    pub consent_given: bool,
    pub consent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration details supplied by a donor
#[derive(Debug, Clone)]
pub struct DonorDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub blood_group: BloodGroup,
    pub area: Option<String>,
    pub location: Option<Coordinate>,
    pub consent_given: bool,
}

/// Partial profile update; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub area: Option<String>,
    pub location: Option<Coordinate>,
    pub is_available: Option<bool>,
}

/// Filter for donor lookups
#[derive(Debug, Clone, Default)]
pub struct DonorQuery {
    pub status: Option<DonorStatus>,
    pub available: Option<bool>,
    pub blood_group: Option<BloodGroup>,
    /// When set, donors without a location or outside the box are excluded
    pub within: Option<BoundingBox>,
}

impl DonorQuery {
    /// Approved, available donors of the given blood group
    pub fn eligible(blood_group: BloodGroup) -> Self {
        Self {
            status: Some(DonorStatus::Approved),
            available: Some(true),
            blood_group: Some(blood_group),
            within: None,
        }
    }

    pub fn with_status(status: DonorStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn within(mut self, bounds: BoundingBox) -> Self {
        self.within = Some(bounds);
        self
    }

    /// Whether a donor satisfies this query
    pub fn matches(&self, donor: &Donor) -> bool {
        if self.status.is_some_and(|s| s != donor.status) {
            return false;
        }
        if self.available.is_some_and(|a| a != donor.is_available) {
            return false;
        }
        if self.blood_group.is_some_and(|g| g != donor.blood_group) {
            return false;
        }
        match (&self.within, &donor.location) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(bounds), Some(loc)) => bounds.contains(loc.latitude, loc.longitude),
        }
    }
}

/// Donor counts per lifecycle state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DonorCounts {
    pub total: u64,
    pub pending_email_verification: u64,
    pub pending_hospital_approval: u64,
    pub approved: u64,
    pub rejected: u64,
}

impl DonorCounts {
    pub fn add(&mut self, status: DonorStatus, count: u64) {
        self.total += count;
        match status {
            DonorStatus::PendingEmailVerification => self.pending_email_verification += count,
            DonorStatus::PendingHospitalApproval => self.pending_hospital_approval += count,
            DonorStatus::Approved => self.approved += count,
            DonorStatus::Rejected => self.rejected += count,
        }
    }
}

/// A hospital's request for blood
#[derive(Debug, Clone, Serialize)]
pub struct BloodRequest {
    pub id: RequestId,
    pub request_code: String,
    pub hospital_id: HospitalId,
    pub blood_group_needed: BloodGroup,
    /// Requests without a location match donors regardless of distance
    pub location: Option<Coordinate>,
    pub radius_km: f64,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a blood request
#[derive(Debug, Clone)]
pub struct NewBloodRequest {
    pub hospital_id: HospitalId,
    pub blood_group_needed: BloodGroup,
    pub location: Option<Coordinate>,
    pub radius_km: f64,
}

/// One attempt to alert a donor about a request
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub request_id: RequestId,
    pub donor_id: DonorId,
    pub notified_at: DateTime<Utc>,
    pub response: DonorResponse,
    pub response_at: Option<DateTime<Utc>>,
}

/// A pending email OTP challenge (at most one per email)
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub id: ChallengeId,
    pub email: String,
    /// Salted slow hash of the 6-digit code; the plaintext is never stored
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    /// Failed comparisons so far
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

/// Unique audit entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditId(pub u64);

/// Who performed an audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    Donor,
    Hospital,
}

impl AuditActor {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditActor::Donor => "donor",
            AuditActor::Hospital => "hospital",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "donor" => Some(AuditActor::Donor),
            "hospital" => Some(AuditActor::Hospital),
            _ => None,
        }
    }
}

/// State-changing actions recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Donor actions
    Registered,
    EmailVerified,
    ProfileUpdated,
    Responded,

    // Hospital actions
    DonorApproved,
    DonorRejected,
    RequestCreated,
    RequestClosed,
    DonorsNotified,
    UrgentAlertSent,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Registered => "registered",
            AuditAction::EmailVerified => "email_verified",
            AuditAction::ProfileUpdated => "profile_updated",
            AuditAction::Responded => "responded",
            AuditAction::DonorApproved => "donor_approved",
            AuditAction::DonorRejected => "donor_rejected",
            AuditAction::RequestCreated => "request_created",
            AuditAction::RequestClosed => "request_closed",
            AuditAction::DonorsNotified => "donors_notified",
            AuditAction::UrgentAlertSent => "urgent_alert_sent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(AuditAction::Registered),
            "email_verified" => Some(AuditAction::EmailVerified),
            "profile_updated" => Some(AuditAction::ProfileUpdated),
            "responded" => Some(AuditAction::Responded),
            "donor_approved" => Some(AuditAction::DonorApproved),
            "donor_rejected" => Some(AuditAction::DonorRejected),
            "request_created" => Some(AuditAction::RequestCreated),
            "request_closed" => Some(AuditAction::RequestClosed),
            "donors_notified" => Some(AuditAction::DonorsNotified),
            "urgent_alert_sent" => Some(AuditAction::UrgentAlertSent),
            _ => None,
        }
    }
}

/// One persisted audit trail entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: AuditId,
    pub actor: AuditActor,
    pub actor_id: u64,
    pub action: AuditAction,
    /// Target of the action, e.g. `donor:7` or `request:3`
    pub entity: Option<String>,
    pub created_at: DateTime<Utc>,
}
