//! Hospital endpoints: donor approval, blood requests and notifications

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use lifepulse_core::validation::{coordinate_from_parts, require_text, resolve_radius};
use lifepulse_core::{BloodGroup, DonorStatus, RequestStatus};
use serde::{Deserialize, Serialize};

use super::{audit, identity};
use crate::dispatch::{AlertOutcome, DispatchOutcome};
use crate::email::Mailer;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use crate::store::{
    AuditAction, AuditActor, BloodRequest, Donor, DonorCounts, DonorId, DonorQuery, HospitalId, NewBloodRequest,
    NotificationRecord, RequestId, Store,
};

#[derive(Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub donors: DonorCounts,
}

/// GET /api/hospital/dashboard
pub async fn dashboard_stats<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
) -> ServerResult<Json<StatsResponse>>
where
    S: Store,
    M: Mailer,
{
    identity::hospital_id(&headers)?;
    let donors = state.store.count_by_status()?;

    Ok(Json(StatsResponse {
        success: true,
        donors,
    }))
}

#[derive(Serialize)]
pub struct DonorsResponse {
    pub success: bool,
    pub donors: Vec<Donor>,
}

/// GET /api/hospital/pending-donors
/// Donors with a verified email awaiting a decision
pub async fn pending_donors<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
) -> ServerResult<Json<DonorsResponse>>
where
    S: Store,
    M: Mailer,
{
    identity::hospital_id(&headers)?;
    let donors = state
        .store
        .find_donors(&DonorQuery::with_status(DonorStatus::PendingHospitalApproval))?;

    Ok(Json(DonorsResponse {
        success: true,
        donors,
    }))
}

/// GET /api/hospital/donors
pub async fn approved_donors<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
) -> ServerResult<Json<DonorsResponse>>
where
    S: Store,
    M: Mailer,
{
    identity::hospital_id(&headers)?;
    let donors = state
        .store
        .find_donors(&DonorQuery::with_status(DonorStatus::Approved))?;

    Ok(Json(DonorsResponse {
        success: true,
        donors,
    }))
}

#[derive(Serialize)]
pub struct DecisionResponse {
    pub success: bool,
    pub donor_id: DonorId,
    pub status: DonorStatus,
}

/// POST /api/hospital/approve/:id
pub async fn approve_donor<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Path(donor_id): Path<u64>,
) -> ServerResult<Json<DecisionResponse>>
where
    S: Store,
    M: Mailer,
{
    let hospital_id = identity::hospital_id(&headers)?;
    decide(&state, hospital_id, DonorId(donor_id), DonorStatus::Approved, None)
}

#[derive(Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

/// POST /api/hospital/reject/:id
/// A non-empty reason is required and kept on the donor record
pub async fn reject_donor<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Path(donor_id): Path<u64>,
    Json(req): Json<RejectRequest>,
) -> ServerResult<Json<DecisionResponse>>
where
    S: Store,
    M: Mailer,
{
    let hospital_id = identity::hospital_id(&headers)?;
    let reason = require_text(&req.reason, "reason")?;
    decide(
        &state,
        hospital_id,
        DonorId(donor_id),
        DonorStatus::Rejected,
        Some(&reason),
    )
}

fn decide<S, M>(
    state: &AppState<S, M>,
    hospital_id: HospitalId,
    donor_id: DonorId,
    status: DonorStatus,
    reason: Option<&str>,
) -> ServerResult<Json<DecisionResponse>>
where
    S: Store,
    M: Mailer,
{
    let donor = state
        .store
        .get_donor(donor_id)?
        .ok_or(ServerError::DonorNotFound)?;

    if donor.status != DonorStatus::PendingHospitalApproval
        || !donor.status.can_transition_to(status)
    {
        return Err(ServerError::InvalidTransition {
            from: donor.status,
            to: status,
        });
    }

    state.store.update_status(donor_id, status, reason)?;
    tracing::info!(
        hospital_id = hospital_id.0,
        donor_id = donor_id.0,
        status = %status,
        "Donor decision recorded"
    );
    let action = match status {
        DonorStatus::Rejected => AuditAction::DonorRejected,
        _ => AuditAction::DonorApproved,
    };
    audit(
        &*state.store,
        AuditActor::Hospital,
        hospital_id.0,
        action,
        Some(format!("donor:{}", donor_id.0)),
    );

    Ok(Json(DecisionResponse {
        success: true,
        donor_id,
        status,
    }))
}

#[derive(Serialize)]
pub struct AlertResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: AlertOutcome,
}

/// POST /api/hospital/alert/:id
/// Urgent alert to a single donor, not tied to any request
pub async fn alert_donor<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Path(donor_id): Path<u64>,
) -> ServerResult<Json<AlertResponse>>
where
    S: Store,
    M: Mailer,
{
    let hospital_id = identity::hospital_id(&headers)?;
    let outcome = state.dispatcher.alert(DonorId(donor_id))?;
    audit(
        &*state.store,
        AuditActor::Hospital,
        hospital_id.0,
        AuditAction::UrgentAlertSent,
        Some(format!("donor:{}", donor_id)),
    );

    match &outcome.error {
        None => tracing::info!(hospital_id = hospital_id.0, donor_id, "Urgent alert sent"),
        Some(err) => tracing::warn!(
            hospital_id = hospital_id.0,
            donor_id,
            error = %err,
            "Urgent alert not delivered"
        ),
    }

    Ok(Json(AlertResponse {
        success: true,
        outcome,
    }))
}

#[derive(Deserialize)]
pub struct CreateRequestRequest {
    pub blood_group_needed: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
}

#[derive(Serialize)]
pub struct RequestResponse {
    pub success: bool,
    pub request: BloodRequest,
}

/// POST /api/hospital/requests
/// Radius defaults to 5 km
pub async fn create_request<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Json(req): Json<CreateRequestRequest>,
) -> ServerResult<Json<RequestResponse>>
where
    S: Store,
    M: Mailer,
{
    let hospital_id = identity::hospital_id(&headers)?;

    let new_request = NewBloodRequest {
        hospital_id,
        blood_group_needed: req.blood_group_needed.parse::<BloodGroup>()?,
        location: coordinate_from_parts(req.latitude, req.longitude)?,
        radius_km: resolve_radius(req.radius_km)?,
    };

    let request = state.store.create_request(&new_request)?;
    tracing::info!(
        hospital_id = hospital_id.0,
        request_id = request.id.0,
        blood_group = %request.blood_group_needed,
        radius_km = request.radius_km,
        "Blood request created"
    );
    audit(
        &*state.store,
        AuditActor::Hospital,
        hospital_id.0,
        AuditAction::RequestCreated,
        Some(format!("request:{}", request.id.0)),
    );

    Ok(Json(RequestResponse {
        success: true,
        request,
    }))
}

#[derive(Serialize)]
pub struct RequestSummary {
    #[serde(flatten)]
    pub request: BloodRequest,
    pub notifications: Vec<NotificationRecord>,
}

#[derive(Serialize)]
pub struct RequestsResponse {
    pub success: bool,
    pub requests: Vec<RequestSummary>,
}

/// GET /api/hospital/requests
/// The caller's requests with the notifications sent for each
pub async fn list_requests<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
) -> ServerResult<Json<RequestsResponse>>
where
    S: Store,
    M: Mailer,
{
    let hospital_id = identity::hospital_id(&headers)?;

    let requests = state
        .store
        .list_requests_by_hospital(hospital_id)?
        .into_iter()
        .map(|request| -> ServerResult<RequestSummary> {
            let notifications = state.store.list_notifications_for_request(request.id)?;
            Ok(RequestSummary {
                request,
                notifications,
            })
        })
        .collect::<ServerResult<Vec<_>>>()?;

    Ok(Json(RequestsResponse {
        success: true,
        requests,
    }))
}

#[derive(Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub request_id: RequestId,
    pub matched: usize,
    pub delivered: usize,
    pub notifications: Vec<DispatchOutcome>,
}

/// POST /api/hospital/requests/:id/notify
/// Match eligible donors and alert each of them
pub async fn notify_donors<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
) -> ServerResult<Json<NotifyResponse>>
where
    S: Store,
    M: Mailer,
{
    let hospital_id = identity::hospital_id(&headers)?;
    let request = owned_request(&state, hospital_id, RequestId(request_id))?;

    if request.status == RequestStatus::Closed {
        return Err(ServerError::RequestClosed);
    }

    let donors = state.matcher.find_matches(&request)?;
    let donor_ids: Vec<DonorId> = donors.iter().map(|d| d.id).collect();
    let report = state.dispatcher.dispatch(request.id, &donor_ids)?;

    let delivered = report.delivered_count();
    tracing::info!(
        hospital_id = hospital_id.0,
        request_id,
        matched = donor_ids.len(),
        delivered,
        "Donors notified"
    );
    audit(
        &*state.store,
        AuditActor::Hospital,
        hospital_id.0,
        AuditAction::DonorsNotified,
        Some(format!("request:{}", request_id)),
    );
    for outcome in report.outcomes.iter().filter(|o| !o.delivered) {
        tracing::warn!(
            request_id,
            donor_id = outcome.record.donor_id.0,
            "Alert mail not delivered"
        );
    }

    Ok(Json(NotifyResponse {
        success: true,
        request_id: request.id,
        matched: donor_ids.len(),
        delivered,
        notifications: report.outcomes,
    }))
}

/// POST /api/hospital/requests/:id/close
pub async fn close_request<S, M>(
    State(state): State<Arc<AppState<S, M>>>,
    headers: HeaderMap,
    Path(request_id): Path<u64>,
) -> ServerResult<Json<RequestResponse>>
where
    S: Store,
    M: Mailer,
{
    let hospital_id = identity::hospital_id(&headers)?;
    let mut request = owned_request(&state, hospital_id, RequestId(request_id))?;

    if request.status != RequestStatus::Closed {
        state
            .store
            .set_request_status(request.id, RequestStatus::Closed)?;
        request.status = RequestStatus::Closed;
        tracing::info!(hospital_id = hospital_id.0, request_id, "Blood request closed");
        audit(
            &*state.store,
            AuditActor::Hospital,
            hospital_id.0,
            AuditAction::RequestClosed,
            Some(format!("request:{}", request_id)),
        );
    }

    Ok(Json(RequestResponse {
        success: true,
        request,
    }))
}

/// Load a request, hiding requests that belong to other hospitals
fn owned_request<S, M>(
    state: &AppState<S, M>,
    hospital_id: HospitalId,
    request_id: RequestId,
) -> ServerResult<BloodRequest>
where
    S: Store,
    M: Mailer,
{
    state
        .store
        .get_request(request_id)?
        .filter(|r| r.hospital_id == hospital_id)
        .ok_or(ServerError::RequestNotFound)
}
