//! Donor endpoints: registration, email verification, profile and responses

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use lifepulse_core::validation::{coordinate_from_parts, normalize_email, require_text};
use lifepulse_core::{BloodGroup, DonorResponse, DonorStatus};
use serde::{Deserialize, Serialize};

use super::{audit, identity};
use crate::email::Mailer;
use crate::error::{ServerError, ServerResult};
use crate::otp::IssuedChallenge;
use crate::state::AppState;
use crate::store::{
    AuditAction, AuditActor, Donor, DonorDetails, DonorId, NotificationId, NotificationRecord,
    ProfileUpdate, Store,
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub blood_group: String,
    pub area: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub consent_given: bool,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub donor_id: DonorId,
    pub donor_code: String,
    pub email: String,
    pub status: DonorStatus,
    pub requires_otp: bool,
    pub otp_expires_at: DateTime<Utc>,
    pub email_sent: bool,
}

/// POST /api/donors/register
/// Register a donor (or refresh a pending registration) and mail an OTP
pub async fn register<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Json(req): Json<RegisterRequest>,
) -> ServerResult<Json<RegisterResponse>>
where
    S: Store,
    M: Mailer,
{
    let email = normalize_email(&req.email)?;
    let details = DonorDetails {
        full_name: require_text(&req.full_name, "full_name")?,
        email: email.clone(),
        phone: require_text(&req.phone, "phone")?,
        blood_group: req.blood_group.parse::<BloodGroup>()?,
        area: optional_text(req.area),
        location: coordinate_from_parts(req.latitude, req.longitude)?,
        consent_given: req.consent_given,
    };

    let donor = match state.store.get_donor_by_email(&email)? {
        Some(existing) => match existing.status {
            DonorStatus::Approved => return Err(ServerError::EmailAlreadyRegistered),
            DonorStatus::Rejected => return Err(ServerError::AccountRejected),
            DonorStatus::PendingEmailVerification | DonorStatus::PendingHospitalApproval => {
                tracing::info!(donor_id = existing.id.0, "Refreshing pending registration");
                state.store.update_registration(existing.id, &details)?
            }
        },
        None => {
            let donor = state.store.create_donor(&details)?;
            tracing::info!(donor_id = donor.id.0, donor_code = %donor.donor_code, "Donor registered");
            donor
        }
    };

    audit(
        &*state.store,
        AuditActor::Donor,
        donor.id.0,
        AuditAction::Registered,
        Some(format!("donor:{}", donor.id.0)),
    );

    let issued = state.otp.issue(&email)?;
    log_delivery(&issued);

    Ok(Json(RegisterResponse {
        success: true,
        donor_id: donor.id,
        donor_code: donor.donor_code,
        email: donor.email,
        status: donor.status,
        requires_otp: true,
        otp_expires_at: issued.expires_at,
        email_sent: issued.delivered,
    }))
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: DonorStatus,
}

/// POST /api/donors/verify-email
/// Consume the OTP and hand the donor over for hospital approval
pub async fn verify_email<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Json(req): Json<VerifyEmailRequest>,
) -> ServerResult<Json<StatusResponse>>
where
    S: Store,
    M: Mailer,
{
    let email = normalize_email(&req.email)?;

    if let Err(err) = state.otp.verify(&email, &req.otp) {
        tracing::debug!(email = %email, error = %err, "OTP verification failed");
        return Err(err);
    }

    let donor = state
        .store
        .get_donor_by_email(&email)?
        .ok_or(ServerError::DonorNotFound)?;

    let status = if donor.status == DonorStatus::PendingEmailVerification {
        state
            .store
            .update_status(donor.id, DonorStatus::PendingHospitalApproval, None)?;
        tracing::info!(donor_id = donor.id.0, "Email verified, awaiting hospital approval");
        DonorStatus::PendingHospitalApproval
    } else {
        donor.status
    };
    audit(
        &*state.store,
        AuditActor::Donor,
        donor.id.0,
        AuditAction::EmailVerified,
        Some(format!("donor:{}", donor.id.0)),
    );

    Ok(Json(StatusResponse {
        success: true,
        status,
    }))
}

#[derive(Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct ResendOtpResponse {
    pub success: bool,
    pub otp_expires_at: DateTime<Utc>,
    pub email_sent: bool,
}

/// POST /api/donors/resend-otp
/// Replace the current challenge, also clearing an exhausted one
pub async fn resend_otp<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    Json(req): Json<ResendOtpRequest>,
) -> ServerResult<Json<ResendOtpResponse>>
where
    S: Store,
    M: Mailer,
{
    let email = normalize_email(&req.email)?;
    let donor = state
        .store
        .get_donor_by_email(&email)?
        .ok_or(ServerError::DonorNotFound)?;

    if donor.status != DonorStatus::PendingEmailVerification {
        return Err(ServerError::InvalidTransition {
            from: donor.status,
            to: DonorStatus::PendingEmailVerification,
        });
    }

    let issued = state.otp.issue(&email)?;
    log_delivery(&issued);

    Ok(Json(ResendOtpResponse {
        success: true,
        otp_expires_at: issued.expires_at,
        email_sent: issued.delivered,
    }))
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub donor: Donor,
}

/// GET /api/donors/profile
pub async fn get_profile<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
) -> ServerResult<Json<ProfileResponse>>
where
    S: Store,
    M: Mailer,
{
    let donor_id = identity::donor_id(&headers)?;
    let donor = state
        .store
        .get_donor(donor_id)?
        .ok_or(ServerError::DonorNotFound)?;

    Ok(Json(ProfileResponse {
        success: true,
        donor,
    }))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub phone: Option<String>,
    pub area: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_available: Option<bool>,
}

/// PATCH /api/donors/profile
/// Partial update; omitted fields keep their current value
pub async fn update_profile<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> ServerResult<Json<ProfileResponse>>
where
    S: Store,
    M: Mailer,
{
    let donor_id = identity::donor_id(&headers)?;

    let update = ProfileUpdate {
        phone: req
            .phone
            .as_deref()
            .map(|p| require_text(p, "phone"))
            .transpose()?,
        area: optional_text(req.area),
        location: coordinate_from_parts(req.latitude, req.longitude)?,
        is_available: req.is_available,
    };

    let donor = state.store.update_profile(donor_id, &update)?;
    tracing::debug!(donor_id = donor_id.0, available = donor.is_available, "Profile updated");
    audit(
        &*state.store,
        AuditActor::Donor,
        donor_id.0,
        AuditAction::ProfileUpdated,
        Some(format!("donor:{}", donor_id.0)),
    );

    Ok(Json(ProfileResponse {
        success: true,
        donor,
    }))
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub success: bool,
    pub notifications: Vec<NotificationRecord>,
}

/// GET /api/donors/notifications
/// The caller's notifications, newest first
pub async fn list_notifications<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
) -> ServerResult<Json<NotificationsResponse>>
where
    S: Store,
    M: Mailer,
{
    let donor_id = identity::donor_id(&headers)?;
    let notifications = state.store.list_notifications_for_donor(donor_id)?;

    Ok(Json(NotificationsResponse {
        success: true,
        notifications,
    }))
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub notification_id: NotificationId,
    pub response: String,
}

#[derive(Serialize)]
pub struct RespondResponse {
    pub success: bool,
    pub notification: NotificationRecord,
}

/// POST /api/donors/respond
/// Accept or decline a notification; a later answer overwrites an earlier one
pub async fn respond<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Json(req): Json<RespondRequest>,
) -> ServerResult<Json<RespondResponse>>
where
    S: Store,
    M: Mailer,
{
    let donor_id = identity::donor_id(&headers)?;
    let response = DonorResponse::parse_answer(&req.response)?;

    let notification = state
        .dispatcher
        .record_response(req.notification_id, donor_id, response)?;
    tracing::info!(
        donor_id = donor_id.0,
        notification_id = notification.id.0,
        response = %response,
        "Donor responded"
    );
    audit(
        &*state.store,
        AuditActor::Donor,
        donor_id.0,
        AuditAction::Responded,
        Some(format!("notification:{}", notification.id.0)),
    );

    Ok(Json(RespondResponse {
        success: true,
        notification,
    }))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn log_delivery(issued: &IssuedChallenge) {
    match &issued.delivery_error {
        None => tracing::debug!(email = %issued.email, "Verification code sent"),
        Some(err) => {
            tracing::warn!(email = %issued.email, error = %err, "Verification code not delivered")
        }
    }
}
