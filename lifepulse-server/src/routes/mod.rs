//! HTTP routes for LifePulse

mod donor;
mod hospital;
pub mod identity;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::email::Mailer;
use crate::state::AppState;
use crate::store::{AuditAction, AuditActor, Store};

/// Create the router with all routes
pub fn create_router<S, M>(state: Arc<AppState<S, M>>) -> Router
where
    S: Store + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route("/api/donors/register", post(donor::register))
        .route("/api/donors/verify-email", post(donor::verify_email))
        .route("/api/donors/resend-otp", post(donor::resend_otp))
        .route(
            "/api/donors/profile",
            get(donor::get_profile).patch(donor::update_profile),
        )
        .route("/api/donors/notifications", get(donor::list_notifications))
        .route("/api/donors/respond", post(donor::respond))
        .route("/api/hospital/dashboard", get(hospital::dashboard_stats))
        .route("/api/hospital/pending-donors", get(hospital::pending_donors))
        .route("/api/hospital/donors", get(hospital::approved_donors))
        .route("/api/hospital/approve/:id", post(hospital::approve_donor))
        .route("/api/hospital/reject/:id", post(hospital::reject_donor))
        .route("/api/hospital/alert/:id", post(hospital::alert_donor))
        .route(
            "/api/hospital/requests",
            get(hospital::list_requests).post(hospital::create_request),
        )
        .route("/api/hospital/requests/:id/notify", post(hospital::notify_donors))
        .route("/api/hospital/requests/:id/close", post(hospital::close_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Append an entry to the audit trail. The action itself has already been
/// committed, so a failed write is logged and not returned.
fn audit<S: Store>(
    store: &S,
    actor: AuditActor,
    actor_id: u64,
    action: AuditAction,
    entity: Option<String>,
) {
    if let Err(err) = store.record(actor, actor_id, action, entity.as_deref()) {
        tracing::warn!(
            actor = actor.as_str(),
            actor_id,
            action = action.as_str(),
            error = %err,
            "Audit entry not recorded"
        );
    }
}
