//! Tests for the email OTP state machine

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{FailingMailer, MockMailer};
use lifepulse_server::crypto::BcryptHasher;
use lifepulse_server::store::OtpStore;
use lifepulse_server::{InMemoryStore, OtpPolicy, OtpService, ServerError};

const EMAIL: &str = "donor@example.com";

fn service<M: lifepulse_server::Mailer>(
    mailer: M,
) -> (OtpService<InMemoryStore, BcryptHasher, M>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let otp = OtpService::new(
        store.clone(),
        Arc::new(BcryptHasher::new(4)),
        Arc::new(mailer),
        OtpPolicy::default(),
    );
    (otp, store)
}

/// Test: the mailed code verifies once
#[test]
fn test_issue_then_verify() {
    let mailer = MockMailer::new();
    let (otp, store) = service(mailer.clone());

    otp.issue(EMAIL).unwrap();
    let code = mailer.get_code(EMAIL).expect("code mailed");

    otp.verify(EMAIL, &code).unwrap();
    assert!(store.get_challenge(EMAIL).unwrap().is_none());
}

/// Test: re-issuing replaces the previous challenge
#[test]
fn test_reissue_overwrites_previous_code() {
    let mailer = MockMailer::new();
    let (otp, store) = service(mailer.clone());

    otp.issue(EMAIL).unwrap();
    let first = mailer.get_code(EMAIL).unwrap();
    otp.issue(EMAIL).unwrap();
    let second = mailer.get_code(EMAIL).unwrap();

    assert_eq!(store.challenge_count().unwrap(), 1);
    if first != second {
        assert!(matches!(otp.verify(EMAIL, &first), Err(ServerError::InvalidCode)));
    }
    otp.verify(EMAIL, &second).unwrap();
}

/// Test: after three wrong codes even the right code is refused
#[test]
fn test_too_many_attempts_blocks_correct_code() {
    let mailer = MockMailer::new();
    let (otp, store) = service(mailer.clone());

    otp.issue(EMAIL).unwrap();
    let code = mailer.get_code(EMAIL).unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 0..3 {
        assert!(matches!(otp.verify(EMAIL, wrong), Err(ServerError::InvalidCode)));
    }
    assert!(matches!(otp.verify(EMAIL, &code), Err(ServerError::TooManyAttempts)));

    // The exhausted challenge is kept until a new one is issued
    assert_eq!(store.get_challenge(EMAIL).unwrap().unwrap().attempts, 3);

    otp.issue(EMAIL).unwrap();
    let fresh = mailer.get_code(EMAIL).unwrap();
    otp.verify(EMAIL, &fresh).unwrap();
}

/// Test: an expired challenge reports Expired once, then NotFound
#[test]
fn test_expired_challenge_is_deleted() {
    let mailer = MockMailer::new();
    let (otp, store) = service(mailer.clone());

    otp.issue(EMAIL).unwrap();
    let code = mailer.get_code(EMAIL).unwrap();
    store
        .set_challenge_expiry(EMAIL, Utc::now() - Duration::seconds(1))
        .unwrap();

    assert!(matches!(otp.verify(EMAIL, &code), Err(ServerError::OtpExpired)));
    assert!(matches!(otp.verify(EMAIL, &code), Err(ServerError::OtpNotFound)));
}

/// Test: verification without any issued code
#[test]
fn test_verify_without_challenge() {
    let (otp, _) = service(MockMailer::new());
    assert!(matches!(otp.verify(EMAIL, "123456"), Err(ServerError::OtpNotFound)));
}

/// Test: a mail failure still leaves a verifiable challenge behind
#[test]
fn test_send_failure_keeps_challenge() {
    let (otp, store) = service(FailingMailer);

    let issued = otp.issue(EMAIL).unwrap();
    assert!(!issued.delivered);
    assert_eq!(issued.delivery_error.as_deref(), Some("connection refused"));
    assert!(store.get_challenge(EMAIL).unwrap().is_some());
}

/// Test: emails are matched case-insensitively
#[test]
fn test_email_case_is_ignored() {
    let mailer = MockMailer::new();
    let (otp, _) = service(mailer.clone());

    otp.issue("Donor@Example.COM").unwrap();
    let code = mailer.get_code(EMAIL).unwrap();
    otp.verify("DONOR@example.com", &code).unwrap();
}

/// Test: concurrent wrong guesses never lose an attempt
#[test]
fn test_concurrent_failures_are_all_counted() {
    let mailer = MockMailer::new();
    let store = Arc::new(InMemoryStore::new());
    let otp = Arc::new(OtpService::new(
        store.clone(),
        Arc::new(BcryptHasher::new(4)),
        Arc::new(mailer.clone()),
        OtpPolicy {
            max_attempts: 100,
            ..OtpPolicy::default()
        },
    ));

    otp.issue(EMAIL).unwrap();
    let code = mailer.get_code(EMAIL).unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let otp = otp.clone();
            std::thread::spawn(move || otp.verify(EMAIL, wrong))
        })
        .collect();
    for handle in handles {
        assert!(matches!(handle.join().unwrap(), Err(ServerError::InvalidCode)));
    }

    assert_eq!(store.get_challenge(EMAIL).unwrap().unwrap().attempts, 4);
}
