//! In-memory storage implementation

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use lifepulse_core::{DonorResponse, DonorStatus, RequestStatus};

use super::{
    AuditAction, AuditActor, AuditEntry, AuditId, AuditStore, BloodRequest, ChallengeId, Donor, DonorCounts, DonorDetails, DonorId, DonorQuery, DonorStore,
    HospitalId, NewBloodRequest, NotificationId, NotificationRecord, NotificationStore,
    OtpChallenge, OtpStore, ProfileUpdate, RequestId, RequestStore, StoreResult,
};
use crate::crypto::generate_public_code;
use crate::error::ServerError;

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| ServerError::Dependency("store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| ServerError::Dependency("store lock poisoned".to_string()))
}

/// In-memory store implementing every storage trait.
///
/// Maps are ordered by ID so scans are deterministic.
pub struct InMemoryStore {
    donors: RwLock<BTreeMap<DonorId, Donor>>,
    donor_emails: RwLock<HashMap<String, DonorId>>,
    requests: RwLock<BTreeMap<u64, BloodRequest>>,
    notifications: RwLock<BTreeMap<u64, NotificationRecord>>,
    challenges: RwLock<HashMap<String, OtpChallenge>>,
    audit: RwLock<Vec<AuditEntry>>,
    next_donor_id: AtomicU64,
    next_request_id: AtomicU64,
    next_notification_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            donors: RwLock::new(BTreeMap::new()),
            donor_emails: RwLock::new(HashMap::new()),
            requests: RwLock::new(BTreeMap::new()),
            notifications: RwLock::new(BTreeMap::new()),
            challenges: RwLock::new(HashMap::new()),
            audit: RwLock::new(Vec::new()),
            next_donor_id: AtomicU64::new(1),
            next_request_id: AtomicU64::new(1),
            next_notification_id: AtomicU64::new(1),
        }
    }

    /// Set the expiry of a live challenge (for testing purposes)
    pub fn set_challenge_expiry(&self, email: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        let mut challenges = write(&self.challenges)?;
        match challenges.get_mut(&email.to_lowercase()) {
            Some(challenge) => {
                challenge.expires_at = expires_at;
                Ok(())
            }
            None => Err(ServerError::OtpNotFound),
        }
    }

    /// Number of live challenges across all emails (for testing purposes)
    pub fn challenge_count(&self) -> StoreResult<usize> {
        Ok(read(&self.challenges)?.len())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DonorStore for InMemoryStore {
    fn create_donor(&self, details: &DonorDetails) -> StoreResult<Donor> {
        let email = details.email.to_lowercase();
        let mut emails = write(&self.donor_emails)?;
        if emails.contains_key(&email) {
            return Err(ServerError::EmailAlreadyRegistered);
        }

        let id = DonorId(self.next_donor_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let donor = Donor {
            id,
            donor_code: generate_public_code(),
            full_name: details.full_name.clone(),
            email: email.clone(),
            phone: details.phone.clone(),
            blood_group: details.blood_group,
            area: details.area.clone(),
            location: details.location,
            status: DonorStatus::PendingEmailVerification,
            is_available: true,
            rejection_reason: None,
            consent_given: details.consent_given,
            consent_at: details.consent_given.then_some(now),
            created_at: now,
            updated_at: now,
        };

        emails.insert(email, id);
        write(&self.donors)?.insert(id, donor.clone());
        Ok(donor)
    }

    fn get_donor(&self, donor_id: DonorId) -> StoreResult<Option<Donor>> {
        Ok(read(&self.donors)?.get(&donor_id).cloned())
    }

    fn get_donor_by_email(&self, email: &str) -> StoreResult<Option<Donor>> {
        let id = read(&self.donor_emails)?.get(&email.to_lowercase()).copied();
        match id {
            Some(id) => self.get_donor(id),
            None => Ok(None),
        }
    }

    fn update_registration(&self, donor_id: DonorId, details: &DonorDetails) -> StoreResult<Donor> {
        let email = details.email.to_lowercase();
        let mut emails = write(&self.donor_emails)?;
        let mut donors = write(&self.donors)?;

        let donor = donors.get_mut(&donor_id).ok_or(ServerError::DonorNotFound)?;
        if donor.email != email {
            if emails.contains_key(&email) {
                return Err(ServerError::EmailAlreadyRegistered);
            }
            emails.remove(&donor.email);
            emails.insert(email.clone(), donor_id);
        }

        let now = Utc::now();
        donor.full_name = details.full_name.clone();
        donor.email = email;
        donor.phone = details.phone.clone();
        donor.blood_group = details.blood_group;
        donor.area = details.area.clone();
        donor.location = details.location;
        donor.status = DonorStatus::PendingEmailVerification;
        donor.rejection_reason = None;
        if details.consent_given && !donor.consent_given {
            donor.consent_at = Some(now);
        }
        donor.consent_given = details.consent_given;
        donor.updated_at = now;
        Ok(donor.clone())
    }

    fn update_status(
        &self,
        donor_id: DonorId,
        status: DonorStatus,
        rejection_reason: Option<&str>,
    ) -> StoreResult<()> {
        let mut donors = write(&self.donors)?;
        let donor = donors.get_mut(&donor_id).ok_or(ServerError::DonorNotFound)?;
        donor.status = status;
        donor.rejection_reason = match status {
            DonorStatus::Rejected => rejection_reason.map(str::to_string),
            _ => None,
        };
        donor.updated_at = Utc::now();
        Ok(())
    }

    fn update_profile(&self, donor_id: DonorId, update: &ProfileUpdate) -> StoreResult<Donor> {
        let mut donors = write(&self.donors)?;
        let donor = donors.get_mut(&donor_id).ok_or(ServerError::DonorNotFound)?;
        if let Some(phone) = &update.phone {
            donor.phone = phone.clone();
        }
        if let Some(area) = &update.area {
            donor.area = Some(area.clone());
        }
        if let Some(location) = update.location {
            donor.location = Some(location);
        }
        if let Some(available) = update.is_available {
            donor.is_available = available;
        }
        donor.updated_at = Utc::now();
        Ok(donor.clone())
    }

    fn find_donors(&self, query: &DonorQuery) -> StoreResult<Vec<Donor>> {
        Ok(read(&self.donors)?
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect())
    }

    fn count_by_status(&self) -> StoreResult<DonorCounts> {
        let mut counts = DonorCounts::default();
        for donor in read(&self.donors)?.values() {
            counts.add(donor.status, 1);
        }
        Ok(counts)
    }
}

impl RequestStore for InMemoryStore {
    fn create_request(&self, request: &NewBloodRequest) -> StoreResult<BloodRequest> {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let record = BloodRequest {
            id: RequestId(id),
            request_code: generate_public_code(),
            hospital_id: request.hospital_id,
            blood_group_needed: request.blood_group_needed,
            location: request.location,
            radius_km: request.radius_km,
            status: RequestStatus::Active,
            created_at: Utc::now(),
        };
        write(&self.requests)?.insert(id, record.clone());
        Ok(record)
    }

    fn get_request(&self, request_id: RequestId) -> StoreResult<Option<BloodRequest>> {
        Ok(read(&self.requests)?.get(&request_id.0).cloned())
    }

    fn list_requests_by_hospital(&self, hospital_id: HospitalId) -> StoreResult<Vec<BloodRequest>> {
        Ok(read(&self.requests)?
            .values()
            .filter(|r| r.hospital_id == hospital_id)
            .cloned()
            .collect())
    }

    fn set_request_status(&self, request_id: RequestId, status: RequestStatus) -> StoreResult<()> {
        let mut requests = write(&self.requests)?;
        let request = requests
            .get_mut(&request_id.0)
            .ok_or(ServerError::RequestNotFound)?;
        request.status = status;
        Ok(())
    }
}

impl NotificationStore for InMemoryStore {
    fn create_notification(
        &self,
        request_id: RequestId,
        donor_id: DonorId,
        notified_at: DateTime<Utc>,
    ) -> StoreResult<NotificationRecord> {
        let id = self.next_notification_id.fetch_add(1, Ordering::SeqCst);
        let record = NotificationRecord {
            id: NotificationId(id),
            request_id,
            donor_id,
            notified_at,
            response: DonorResponse::NoResponse,
            response_at: None,
        };
        write(&self.notifications)?.insert(id, record.clone());
        Ok(record)
    }

    fn get_notification_for_donor(
        &self,
        notification_id: NotificationId,
        donor_id: DonorId,
    ) -> StoreResult<Option<NotificationRecord>> {
        Ok(read(&self.notifications)?
            .get(&notification_id.0)
            .filter(|n| n.donor_id == donor_id)
            .cloned())
    }

    fn set_response(
        &self,
        notification_id: NotificationId,
        donor_id: DonorId,
        response: DonorResponse,
        response_at: DateTime<Utc>,
    ) -> StoreResult<NotificationRecord> {
        let mut notifications = write(&self.notifications)?;
        match notifications.get_mut(&notification_id.0) {
            Some(record) if record.donor_id == donor_id => {
                record.response = response;
                record.response_at = Some(response_at);
                Ok(record.clone())
            }
            _ => Err(ServerError::NotificationNotFound),
        }
    }

    fn list_notifications_for_donor(&self, donor_id: DonorId) -> StoreResult<Vec<NotificationRecord>> {
        let mut records: Vec<NotificationRecord> = read(&self.notifications)?
            .values()
            .filter(|n| n.donor_id == donor_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.notified_at.cmp(&a.notified_at).then(b.id.0.cmp(&a.id.0)));
        Ok(records)
    }

    fn list_notifications_for_request(
        &self,
        request_id: RequestId,
    ) -> StoreResult<Vec<NotificationRecord>> {
        Ok(read(&self.notifications)?
            .values()
            .filter(|n| n.request_id == request_id)
            .cloned()
            .collect())
    }
}

impl OtpStore for InMemoryStore {
    fn put_challenge(&self, challenge: OtpChallenge) -> StoreResult<()> {
        write(&self.challenges)?.insert(challenge.email.to_lowercase(), challenge);
        Ok(())
    }

    fn get_challenge(&self, email: &str) -> StoreResult<Option<OtpChallenge>> {
        Ok(read(&self.challenges)?.get(&email.to_lowercase()).cloned())
    }

    fn increment_attempts(
        &self,
        email: &str,
        challenge_id: &ChallengeId,
        seen_attempts: u32,
    ) -> StoreResult<bool> {
        let mut challenges = write(&self.challenges)?;
        match challenges.get_mut(&email.to_lowercase()) {
            Some(c) if &c.id == challenge_id && c.attempts == seen_attempts => {
                c.attempts += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove_challenge(&self, email: &str, challenge_id: &ChallengeId) -> StoreResult<bool> {
        let key = email.to_lowercase();
        let mut challenges = write(&self.challenges)?;
        if challenges.get(&key).is_some_and(|c| &c.id == challenge_id) {
            challenges.remove(&key);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl AuditStore for InMemoryStore {
    fn record(
        &self,
        actor: AuditActor,
        actor_id: u64,
        action: AuditAction,
        entity: Option<&str>,
    ) -> StoreResult<AuditEntry> {
        let mut audit = write(&self.audit)?;
        let entry = AuditEntry {
            id: AuditId(audit.len() as u64 + 1),
            actor,
            actor_id,
            action,
            entity: entity.map(str::to_string),
            created_at: Utc::now(),
        };
        audit.push(entry.clone());
        Ok(entry)
    }

    fn list_audit(&self) -> StoreResult<Vec<AuditEntry>> {
        Ok(read(&self.audit)?.clone())
    }
}
