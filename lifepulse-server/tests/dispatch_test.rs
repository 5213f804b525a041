//! Tests for notification dispatch and donor responses

mod common;

use std::sync::Arc;

use common::{seed_approved_donor, FailingMailer, MockMailer};
use lifepulse_core::{BloodGroup, DonorResponse};
use lifepulse_server::store::{
    BloodRequest, DonorId, HospitalId, NewBloodRequest, NotificationId, NotificationStore,
    RequestId, RequestStore,
};
use lifepulse_server::{AlertSettings, InMemoryStore, Mailer, NotificationDispatcher, ServerError};

fn setup<M: Mailer>(
    mailer: M,
) -> (NotificationDispatcher<InMemoryStore, M>, Arc<InMemoryStore>, BloodRequest, Vec<DonorId>) {
    let store = Arc::new(InMemoryStore::new());
    let donors: Vec<DonorId> = (1..=3)
        .map(|i| {
            seed_approved_donor(&*store, &format!("donor{}@example.com", i), BloodGroup::APositive, None).id
        })
        .collect();
    let request = store
        .create_request(&NewBloodRequest {
            hospital_id: HospitalId(1),
            blood_group_needed: BloodGroup::APositive,
            location: None,
            radius_km: 5.0,
        })
        .unwrap();

    let dispatcher = NotificationDispatcher::new(store.clone(), Arc::new(mailer), AlertSettings::default());
    (dispatcher, store, request, donors)
}

/// Test: one record per donor, each awaiting a response
#[test]
fn test_dispatch_creates_one_record_per_donor() {
    let mailer = MockMailer::new();
    let (dispatcher, store, request, donors) = setup(mailer.clone());

    let report = dispatcher.dispatch(request.id, &donors).unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.delivered_count(), 3);
    assert!(report.unknown_donors.is_empty());
    for outcome in &report.outcomes {
        assert_eq!(outcome.record.request_id, request.id);
        assert_eq!(outcome.record.response, DonorResponse::NoResponse);
        assert!(outcome.record.response_at.is_none());
    }

    let stored = store.list_notifications_for_request(request.id).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(
        mailer.subjects_for("donor1@example.com"),
        vec!["URGENT: Blood Donation Needed".to_string()]
    );
}

/// Test: repeated IDs in one call produce a single record
#[test]
fn test_duplicate_ids_collapsed_within_call() {
    let (dispatcher, _, request, donors) = setup(MockMailer::new());

    let report = dispatcher
        .dispatch(request.id, &[donors[0], donors[0], donors[1]])
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
}

/// Test: dispatching again records a second notification
#[test]
fn test_redispatch_creates_new_records() {
    let (dispatcher, store, request, donors) = setup(MockMailer::new());

    dispatcher.dispatch(request.id, &donors[..1]).unwrap();
    dispatcher.dispatch(request.id, &donors[..1]).unwrap();

    assert_eq!(store.list_notifications_for_donor(donors[0]).unwrap().len(), 2);
}

/// Test: mail failures do not stop the batch and every record is kept
#[test]
fn test_mail_failure_keeps_records() {
    let (dispatcher, store, request, donors) = setup(FailingMailer);

    let report = dispatcher.dispatch(request.id, &donors).unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.delivered_count(), 0);
    assert_eq!(store.list_notifications_for_request(request.id).unwrap().len(), 3);
}

/// Test: unknown donors are reported and skipped
#[test]
fn test_unknown_donor_skipped() {
    let (dispatcher, _, request, donors) = setup(MockMailer::new());

    let report = dispatcher
        .dispatch(request.id, &[donors[0], DonorId(999)])
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.unknown_donors, vec![DonorId(999)]);
}

/// Test: dispatch for a missing request
#[test]
fn test_unknown_request() {
    let (dispatcher, _, _, donors) = setup(MockMailer::new());
    assert!(matches!(
        dispatcher.dispatch(RequestId(999), &donors),
        Err(ServerError::RequestNotFound)
    ));
}

/// Test: responses overwrite each other and are scoped to the donor
#[test]
fn test_record_response() {
    let (dispatcher, _, request, donors) = setup(MockMailer::new());
    let report = dispatcher.dispatch(request.id, &donors[..1]).unwrap();
    let notification_id = report.outcomes[0].record.id;

    let record = dispatcher
        .record_response(notification_id, donors[0], DonorResponse::Accept)
        .unwrap();
    assert_eq!(record.response, DonorResponse::Accept);
    assert!(record.response_at.is_some());

    let record = dispatcher
        .record_response(notification_id, donors[0], DonorResponse::Decline)
        .unwrap();
    assert_eq!(record.response, DonorResponse::Decline);

    assert!(matches!(
        dispatcher.record_response(notification_id, donors[1], DonorResponse::Accept),
        Err(ServerError::NotificationNotFound)
    ));
    assert!(matches!(
        dispatcher.record_response(NotificationId(999), donors[0], DonorResponse::Accept),
        Err(ServerError::NotificationNotFound)
    ));
}

/// Test: clearing a response is not an answer
#[test]
fn test_no_response_is_rejected() {
    let (dispatcher, _, request, donors) = setup(MockMailer::new());
    let report = dispatcher.dispatch(request.id, &donors[..1]).unwrap();

    assert!(matches!(
        dispatcher.record_response(report.outcomes[0].record.id, donors[0], DonorResponse::NoResponse),
        Err(ServerError::Validation(_))
    ));
}

/// Test: request-less alerts send mail without creating records
#[test]
fn test_alert_creates_no_record() {
    let mailer = MockMailer::new();
    let (dispatcher, store, _, donors) = setup(mailer.clone());

    let outcome = dispatcher.alert(donors[2]).unwrap();

    assert!(outcome.delivered);
    assert!(outcome.error.is_none());
    assert_eq!(mailer.subjects_for("donor3@example.com").len(), 1);
    assert!(store.list_notifications_for_donor(donors[2]).unwrap().is_empty());

    assert!(matches!(dispatcher.alert(DonorId(999)), Err(ServerError::DonorNotFound)));
}
