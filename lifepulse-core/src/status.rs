//! Lifecycle states for donors, requests and notifications
//!
//! Older records stored upper-case status strings (`PENDING`, `APPROVED`,
//! `REJECTED`) next to the current snake_case values. Everything entering the
//! core goes through [`DonorStatus::parse`], which folds both spellings into
//! the closed enum; only canonical values are written back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Donor account lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonorStatus {
    /// Registered, waiting for the email OTP
    PendingEmailVerification,
    /// Email verified, waiting for a hospital decision
    PendingHospitalApproval,
    Approved,
    Rejected,
}

impl DonorStatus {
    pub const ALL: [DonorStatus; 4] = [
        DonorStatus::PendingEmailVerification,
        DonorStatus::PendingHospitalApproval,
        DonorStatus::Approved,
        DonorStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DonorStatus::PendingEmailVerification => "pending_email_verification",
            DonorStatus::PendingHospitalApproval => "pending_hospital_approval",
            DonorStatus::Approved => "approved",
            DonorStatus::Rejected => "rejected",
        }
    }

    /// Parse a canonical or legacy status string.
    ///
    /// The legacy bare `PENDING` predates email verification and always meant
    /// "waiting for the hospital".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending_email_verification" => Some(DonorStatus::PendingEmailVerification),
            "pending_hospital_approval" | "pending" => Some(DonorStatus::PendingHospitalApproval),
            "approved" => Some(DonorStatus::Approved),
            "rejected" => Some(DonorStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DonorStatus::Approved | DonorStatus::Rejected)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: DonorStatus) -> bool {
        matches!(
            (self, next),
            (
                DonorStatus::PendingEmailVerification,
                DonorStatus::PendingHospitalApproval
            ) | (DonorStatus::PendingHospitalApproval, DonorStatus::Approved)
                | (DonorStatus::PendingHospitalApproval, DonorStatus::Rejected)
                // Re-registration while still pending restarts email verification
                | (
                    DonorStatus::PendingHospitalApproval,
                    DonorStatus::PendingEmailVerification
                )
                | (
                    DonorStatus::PendingEmailVerification,
                    DonorStatus::PendingEmailVerification
                )
        )
    }
}

impl fmt::Display for DonorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DonorStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DonorStatus::parse(s).ok_or_else(|| Error::InvalidStatus(s.to_string()))
    }
}

/// Blood request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Active,
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(RequestStatus::Active),
            "closed" => Some(RequestStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A donor's answer to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonorResponse {
    #[serde(rename = "none")]
    NoResponse,
    Accept,
    Decline,
}

impl DonorResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonorResponse::NoResponse => "none",
            DonorResponse::Accept => "accept",
            DonorResponse::Decline => "decline",
        }
    }

    /// Parse a stored response; legacy rows used `PENDING` or NULL for no answer
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "pending" | "" => Some(DonorResponse::NoResponse),
            "accept" => Some(DonorResponse::Accept),
            "decline" => Some(DonorResponse::Decline),
            _ => None,
        }
    }

    /// Parse an answer submitted by a donor; only a real answer is accepted
    pub fn parse_answer(s: &str) -> Result<Self, Error> {
        match DonorResponse::parse(s) {
            Some(r @ (DonorResponse::Accept | DonorResponse::Decline)) => Ok(r),
            _ => Err(Error::InvalidResponse(s.to_string())),
        }
    }
}

impl fmt::Display for DonorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_status_values() {
        assert_eq!(DonorStatus::parse("PENDING"), Some(DonorStatus::PendingHospitalApproval));
        assert_eq!(DonorStatus::parse("APPROVED"), Some(DonorStatus::Approved));
        assert_eq!(DonorStatus::parse("REJECTED"), Some(DonorStatus::Rejected));
        assert_eq!(
            DonorStatus::parse("pending_email_verification"),
            Some(DonorStatus::PendingEmailVerification)
        );
        assert_eq!(DonorStatus::parse("suspended"), None);
    }

    #[test]
    fn test_canonical_round_trip() {
        for status in DonorStatus::ALL {
            assert_eq!(DonorStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_transitions() {
        use DonorStatus::*;
        assert!(PendingEmailVerification.can_transition_to(PendingHospitalApproval));
        assert!(PendingHospitalApproval.can_transition_to(Approved));
        assert!(PendingHospitalApproval.can_transition_to(Rejected));
        assert!(!PendingEmailVerification.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(PendingEmailVerification));
    }

    #[test]
    fn test_answer_must_be_accept_or_decline() {
        assert_eq!(DonorResponse::parse_answer("ACCEPT"), Ok(DonorResponse::Accept));
        assert_eq!(DonorResponse::parse_answer("decline"), Ok(DonorResponse::Decline));
        assert!(DonorResponse::parse_answer("none").is_err());
        assert!(DonorResponse::parse_answer("maybe").is_err());
    }
}
