//! Common test utilities for LifePulse integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::RwLock;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use lifepulse_server::store::{Donor, DonorDetails, DonorStore};
use lifepulse_server::{routes, AppState, Config, InMemoryStore, Mailer};
use lifepulse_core::{BloodGroup, Coordinate, DonorStatus};
use serde_json::{json, Value};

/// Mock mailer that captures every message
#[derive(Default, Clone)]
pub struct MockMailer {
    /// Captured (to, subject, text body) triples
    pub sent: Arc<RwLock<Vec<(String, String, String)>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the last verification code mailed to an address
    pub fn get_code(&self, email: &str) -> Option<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, subject, _)| to == email && subject.contains("Verify"))
            .and_then(|(_, _, text)| {
                text.split_whitespace()
                    .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
                    .map(str::to_string)
            })
    }

    /// Subjects of all mail sent to an address
    pub fn subjects_for(&self, email: &str) -> Vec<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|(to, _, _)| to == email)
            .map(|(_, subject, _)| subject.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.read().unwrap().len()
    }
}

impl Mailer for MockMailer {
    fn send(&self, to: &str, subject: &str, text_body: &str, _html_body: &str) -> Result<(), String> {
        self.sent
            .write()
            .unwrap()
            .push((to.to_string(), subject.to_string(), text_body.to_string()));
        Ok(())
    }
}

/// Mailer whose every send fails
#[derive(Default, Clone)]
pub struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _to: &str, _subject: &str, _text: &str, _html: &str) -> Result<(), String> {
        Err("connection refused".to_string())
    }
}

/// Config with a cheap bcrypt cost
pub fn test_config() -> Config {
    Config {
        bcrypt_cost: 4,
        ..Config::default()
    }
}

/// Create a test server with a mock mailer, keeping a handle on the store
pub fn create_test_server() -> (TestServer, MockMailer, Arc<AppState<InMemoryStore, MockMailer>>) {
    let mailer = MockMailer::new();
    let state = Arc::new(AppState::new(
        InMemoryStore::new(),
        mailer.clone(),
        test_config(),
    ));

    let app = routes::create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, mailer, state)
}

pub fn donor_header(id: u64) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-donor-id"),
        HeaderValue::from_str(&id.to_string()).unwrap(),
    )
}

pub fn hospital_header(id: u64) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-hospital-id"),
        HeaderValue::from_str(&id.to_string()).unwrap(),
    )
}

/// Registration body for a donor near central Bangalore
pub fn registration(email: &str, blood_group: &str) -> Value {
    json!({
        "full_name": "Test Donor",
        "email": email,
        "phone": "+91 90000 00000",
        "blood_group": blood_group,
        "area": "Indiranagar",
        "latitude": 12.9716,
        "longitude": 77.5946,
        "consent_given": true
    })
}

/// Register and verify a donor over HTTP; returns the donor id
pub async fn register_verified_donor(
    server: &TestServer,
    mailer: &MockMailer,
    email: &str,
    blood_group: &str,
) -> u64 {
    let response = server
        .post("/api/donors/register")
        .json(&registration(email, blood_group))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let donor_id = body["donor_id"].as_u64().expect("donor_id");

    let code = mailer.get_code(email).expect("No code sent");
    let response = server
        .post("/api/donors/verify-email")
        .json(&json!({ "email": email, "otp": code }))
        .await;
    assert_eq!(response.status_code(), 200);

    donor_id
}

/// Register, verify and approve a donor over HTTP; returns the donor id
pub async fn register_approved_donor(
    server: &TestServer,
    mailer: &MockMailer,
    email: &str,
    blood_group: &str,
) -> u64 {
    let donor_id = register_verified_donor(server, mailer, email, blood_group).await;

    let (name, value) = hospital_header(1);
    let response = server
        .post(&format!("/api/hospital/approve/{}", donor_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), 200);

    donor_id
}

/// Insert an approved, available donor directly into a store
pub fn seed_approved_donor<S: DonorStore>(
    store: &S,
    email: &str,
    blood_group: BloodGroup,
    location: Option<Coordinate>,
) -> Donor {
    let donor = store
        .create_donor(&DonorDetails {
            full_name: format!("Donor {}", email),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            blood_group,
            area: None,
            location,
            consent_given: true,
        })
        .unwrap();
    store
        .update_status(donor.id, DonorStatus::Approved, None)
        .unwrap();
    store.get_donor(donor.id).unwrap().unwrap()
}
