//! Tests for the SQLite store: persistence, legacy data and OTP compare-and-swap

mod common;

use chrono::{Duration, Utc};
use common::seed_approved_donor;
use lifepulse_core::{BloodGroup, Coordinate, DonorResponse, DonorStatus, RequestStatus};
use lifepulse_server::store::{
    AuditAction, AuditActor, AuditStore, ChallengeId, DonorDetails, DonorQuery, DonorStore, HospitalId, NewBloodRequest,
    NotificationStore, OtpChallenge, OtpStore, ProfileUpdate, RequestStore,
};
use lifepulse_server::{ServerError, SqliteStore};
use rusqlite::Connection;
use tempfile::TempDir;

fn create_test_store() -> (SqliteStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
    (store, dir) // Return dir to keep it alive
}

fn details(email: &str) -> DonorDetails {
    DonorDetails {
        full_name: "Asha Rao".to_string(),
        email: email.to_string(),
        phone: "555-0100".to_string(),
        blood_group: BloodGroup::BNegative,
        area: Some("Jayanagar".to_string()),
        location: Some(Coordinate::new(12.93, 77.58)),
        consent_given: true,
    }
}

fn challenge(email: &str) -> OtpChallenge {
    let now = Utc::now();
    OtpChallenge {
        id: ChallengeId::generate(),
        email: email.to_string(),
        code_hash: "hash".to_string(),
        expires_at: now + Duration::minutes(10),
        attempts: 0,
        created_at: now,
    }
}

/// Test: a new donor round-trips through the database
#[test]
fn test_create_and_get_donor() {
    let (store, _dir) = create_test_store();

    let created = store.create_donor(&details("Asha@Example.com")).unwrap();
    assert_eq!(created.status, DonorStatus::PendingEmailVerification);
    assert_eq!(created.donor_code.len(), 8);
    assert!(created.consent_at.is_some());

    let loaded = store.get_donor_by_email("asha@example.com").unwrap().unwrap();
    assert_eq!(loaded.id, created.id);
    assert_eq!(loaded.email, "asha@example.com");
    assert_eq!(loaded.blood_group, BloodGroup::BNegative);
    assert_eq!(loaded.location, Some(Coordinate::new(12.93, 77.58)));
    assert!(loaded.is_available);
}

/// Test: emails are unique
#[test]
fn test_duplicate_email_rejected() {
    let (store, _dir) = create_test_store();

    store.create_donor(&details("asha@example.com")).unwrap();
    assert!(matches!(
        store.create_donor(&details("asha@example.com")),
        Err(ServerError::EmailAlreadyRegistered)
    ));
}

/// Test: data survives reopening the database file
#[test]
fn test_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    let donor_id = {
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        store.create_donor(&details("asha@example.com")).unwrap().id
    };

    let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
    assert!(store.get_donor(donor_id).unwrap().is_some());
}

/// Test: legacy upper-case statuses are rewritten on migration
#[test]
fn test_legacy_statuses_normalized() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    let donor_id = {
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        store.create_donor(&details("legacy@example.com")).unwrap().id
    };

    // Simulate a database written before status normalization
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "UPDATE donors SET status = 'PENDING', rejection_reason = 'stale';
             DELETE FROM schema_version;
             INSERT INTO schema_version (version) VALUES (1);",
        )
        .unwrap();
    }

    let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
    let donor = store.get_donor(donor_id).unwrap().unwrap();
    assert_eq!(donor.status, DonorStatus::PendingHospitalApproval);
    assert!(donor.rejection_reason.is_none());

    let pending = store
        .find_donors(&DonorQuery::with_status(DonorStatus::PendingHospitalApproval))
        .unwrap();
    assert_eq!(pending.len(), 1);

    let conn = Connection::open(&path).unwrap();
    let raw: String = conn
        .query_row("SELECT status FROM donors WHERE id = ?1", [donor_id.0 as i64], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(raw, "pending_hospital_approval");
}

/// Test: rejection reason is stored only on rejected donors
#[test]
fn test_rejection_reason_only_when_rejected() {
    let (store, _dir) = create_test_store();
    let donor = store.create_donor(&details("asha@example.com")).unwrap();

    store
        .update_status(donor.id, DonorStatus::Rejected, Some("Recent surgery"))
        .unwrap();
    let rejected = store.get_donor(donor.id).unwrap().unwrap();
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Recent surgery"));

    store
        .update_status(donor.id, DonorStatus::Approved, Some("ignored"))
        .unwrap();
    let approved = store.get_donor(donor.id).unwrap().unwrap();
    assert!(approved.rejection_reason.is_none());
}

/// Test: partial profile updates leave other fields untouched
#[test]
fn test_profile_update_is_partial() {
    let (store, _dir) = create_test_store();
    let donor = store.create_donor(&details("asha@example.com")).unwrap();

    let updated = store
        .update_profile(
            donor.id,
            &ProfileUpdate {
                is_available: Some(false),
                ..ProfileUpdate::default()
            },
        )
        .unwrap();

    assert!(!updated.is_available);
    assert_eq!(updated.phone, donor.phone);
    assert_eq!(updated.location, donor.location);
}

/// Test: counts per status add up
#[test]
fn test_count_by_status() {
    let (store, _dir) = create_test_store();
    store.create_donor(&details("one@example.com")).unwrap();
    seed_approved_donor(&store, "two@example.com", BloodGroup::APositive, None);
    seed_approved_donor(&store, "three@example.com", BloodGroup::APositive, None);

    let counts = store.count_by_status().unwrap();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.approved, 2);
    assert_eq!(counts.pending_email_verification, 1);
}

/// Test: requests and notifications, newest notification first
#[test]
fn test_requests_and_notifications() {
    let (store, _dir) = create_test_store();
    let donor = seed_approved_donor(&store, "d@example.com", BloodGroup::APositive, None);

    let request = store
        .create_request(&NewBloodRequest {
            hospital_id: HospitalId(7),
            blood_group_needed: BloodGroup::APositive,
            location: None,
            radius_km: 5.0,
        })
        .unwrap();
    assert_eq!(request.status, RequestStatus::Active);
    assert_eq!(store.list_requests_by_hospital(HospitalId(7)).unwrap().len(), 1);
    assert!(store.list_requests_by_hospital(HospitalId(8)).unwrap().is_empty());

    let first = store
        .create_notification(request.id, donor.id, Utc::now() - Duration::minutes(5))
        .unwrap();
    let second = store
        .create_notification(request.id, donor.id, Utc::now())
        .unwrap();

    let listed = store.list_notifications_for_donor(donor.id).unwrap();
    assert_eq!(listed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![second.id, first.id]);
    assert_eq!(listed[0].response, DonorResponse::NoResponse);

    let answered = store
        .set_response(first.id, donor.id, DonorResponse::Accept, Utc::now())
        .unwrap();
    assert_eq!(answered.response, DonorResponse::Accept);

    store
        .set_request_status(request.id, RequestStatus::Closed)
        .unwrap();
    assert_eq!(
        store.get_request(request.id).unwrap().unwrap().status,
        RequestStatus::Closed
    );
}

/// Test: compare-and-swap refuses stale challenge ids and attempt counts
#[test]
fn test_otp_compare_and_swap() {
    let (store, _dir) = create_test_store();
    let email = "asha@example.com";

    let old = challenge(email);
    store.put_challenge(old.clone()).unwrap();

    assert!(store.increment_attempts(email, &old.id, 0).unwrap());
    // Stale attempt count
    assert!(!store.increment_attempts(email, &old.id, 0).unwrap());
    assert_eq!(store.get_challenge(email).unwrap().unwrap().attempts, 1);

    let new = challenge(email);
    store.put_challenge(new.clone()).unwrap();
    let stored = store.get_challenge(email).unwrap().unwrap();
    assert_eq!(stored.id, new.id);
    assert_eq!(stored.attempts, 0);

    // The replaced challenge can no longer be consumed
    assert!(!store.remove_challenge(email, &old.id).unwrap());
    assert!(store.remove_challenge(email, &new.id).unwrap());
    assert!(store.get_challenge(email).unwrap().is_none());
}

/// Test: audit entries survive a reopen, in recording order
#[test]
fn test_audit_log_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    {
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        store
            .record(AuditActor::Donor, 4, AuditAction::Registered, Some("donor:4"))
            .unwrap();
        store
            .record(AuditActor::Hospital, 2, AuditAction::DonorRejected, Some("donor:4"))
            .unwrap();
        store
            .record(AuditActor::Hospital, 2, AuditAction::DonorsNotified, None)
            .unwrap();
    }

    let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
    let entries = store.list_audit().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].actor, AuditActor::Donor);
    assert_eq!(entries[0].actor_id, 4);
    assert_eq!(entries[1].action, AuditAction::DonorRejected);
    assert_eq!(entries[1].entity.as_deref(), Some("donor:4"));
    assert_eq!(entries[2].entity, None);
    assert!(entries[0].created_at <= entries[2].created_at);
}
