//! SQLite-based storage implementation

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use lifepulse_core::{BloodGroup, Coordinate, DonorResponse, DonorStatus, RequestStatus};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{
    AuditAction, AuditActor, AuditEntry, AuditId, AuditStore, BloodRequest, ChallengeId, Donor, DonorCounts, DonorDetails, DonorId, DonorQuery, DonorStore,
    HospitalId, NewBloodRequest, NotificationId, NotificationRecord, NotificationStore,
    OtpChallenge, OtpStore, ProfileUpdate, RequestId, RequestStore, StoreResult,
};
use crate::crypto::generate_public_code;
use crate::error::ServerError;

/// Current schema version
const SCHEMA_VERSION: i32 = 3;

/// Inserts tried before a public code collision is reported
const MAX_CODE_ATTEMPTS: u32 = 4;

const DONOR_COLUMNS: &str = "id, donor_code, full_name, email, phone, blood_group, area, \
     latitude, longitude, status, is_available, rejection_reason, consent_given, consent_at, \
     created_at, updated_at";

const REQUEST_COLUMNS: &str =
    "id, request_code, hospital_id, blood_group_needed, latitude, longitude, radius_km, status, created_at";

const NOTIFICATION_COLUMNS: &str = "id, request_id, donor_id, notified_at, response, response_at";

const AUDIT_COLUMNS: &str = "id, actor, actor_id, action, entity, created_at";

/// Fixed-width UTC timestamps so that text ordering matches time ordering
fn fmt_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn optional_time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn blood_group_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<BloodGroup> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn location_at(row: &Row<'_>, lat_idx: usize) -> rusqlite::Result<Option<Coordinate>> {
    let lat: Option<f64> = row.get(lat_idx)?;
    let lon: Option<f64> = row.get(lat_idx + 1)?;
    Ok(match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
        _ => None,
    })
}

fn donor_from_row(row: &Row<'_>) -> rusqlite::Result<Donor> {
    let status: String = row.get(9)?;
    Ok(Donor {
        id: DonorId(row.get::<_, i64>(0)? as u64),
        donor_code: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        blood_group: blood_group_at(row, 5)?,
        area: row.get(6)?,
        location: location_at(row, 7)?,
        status: status
            .parse::<DonorStatus>()
            .map_err(|e| conversion_error(9, e))?,
        is_available: row.get::<_, i32>(10)? != 0,
        rejection_reason: row.get(11)?,
        consent_given: row.get::<_, i32>(12)? != 0,
        consent_at: optional_time_at(row, 13)?,
        created_at: time_at(row, 14)?,
        updated_at: time_at(row, 15)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<BloodRequest> {
    let status: String = row.get(7)?;
    Ok(BloodRequest {
        id: RequestId(row.get::<_, i64>(0)? as u64),
        request_code: row.get(1)?,
        hospital_id: HospitalId(row.get::<_, i64>(2)? as u64),
        blood_group_needed: blood_group_at(row, 3)?,
        location: location_at(row, 4)?,
        radius_km: row.get(6)?,
        status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Active),
        created_at: time_at(row, 8)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRecord> {
    let response: Option<String> = row.get(4)?;
    Ok(NotificationRecord {
        id: NotificationId(row.get::<_, i64>(0)? as u64),
        request_id: RequestId(row.get::<_, i64>(1)? as u64),
        donor_id: DonorId(row.get::<_, i64>(2)? as u64),
        notified_at: time_at(row, 3)?,
        response: DonorResponse::parse(response.as_deref().unwrap_or("none"))
            .unwrap_or(DonorResponse::NoResponse),
        response_at: optional_time_at(row, 5)?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let unknown = |idx: usize, raw: &str| {
        conversion_error(idx, ServerError::Dependency(format!("unknown audit value {}", raw)))
    };
    let actor: String = row.get(1)?;
    let action: String = row.get(3)?;
    Ok(AuditEntry {
        id: AuditId(row.get::<_, i64>(0)? as u64),
        actor: AuditActor::parse(&actor).ok_or_else(|| unknown(1, &actor))?,
        actor_id: row.get::<_, i64>(2)? as u64,
        action: AuditAction::parse(&action).ok_or_else(|| unknown(3, &action))?,
        entity: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}

fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<OtpChallenge> {
    Ok(OtpChallenge {
        email: row.get(0)?,
        id: ChallengeId(row.get(1)?),
        code_hash: row.get(2)?,
        expires_at: time_at(row, 3)?,
        attempts: row.get::<_, i64>(4)?.max(0) as u32,
        created_at: time_at(row, 5)?,
    })
}

/// Whether `e` is a UNIQUE violation on `column` (written `table.column`)
fn is_unique_violation(e: &rusqlite::Error, column: &str) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, Some(message)) => {
            err.code == rusqlite::ErrorCode::ConstraintViolation
                && message.starts_with("UNIQUE constraint failed")
                && message.contains(column)
        }
        _ => false,
    }
}

fn donor_write_error(e: rusqlite::Error) -> ServerError {
    if is_unique_violation(&e, "donors.email") {
        return ServerError::EmailAlreadyRegistered;
    }
    ServerError::dependency(e)
}

/// Run an insert with a fresh public code, retrying while the code collides
fn insert_with_code<T>(
    column: &str,
    mut insert: impl FnMut(&str) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    let mut attempt = 1;
    loop {
        match insert(&generate_public_code()) {
            Err(e) if attempt < MAX_CODE_ATTEMPTS && is_unique_violation(&e, column) => {
                tracing::debug!(column, attempt, "Public code collision, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn insert_donor(
    conn: &Connection,
    details: &DonorDetails,
    donor_code: &str,
) -> rusqlite::Result<DonorId> {
    let now = fmt_time(Utc::now());
    let consent_at = details.consent_given.then(|| now.clone());

    conn.execute(
        "INSERT INTO donors (donor_code, full_name, email, phone, blood_group, area,
            latitude, longitude, status, is_available, consent_given, consent_at,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11, ?12, ?12)",
        params![
            donor_code,
            details.full_name,
            details.email.to_lowercase(),
            details.phone,
            details.blood_group.as_str(),
            details.area,
            details.location.map(|c| c.latitude),
            details.location.map(|c| c.longitude),
            DonorStatus::PendingEmailVerification.as_str(),
            details.consent_given as i32,
            consent_at,
            now,
        ],
    )?;

    Ok(DonorId(conn.last_insert_rowid() as u64))
}

/// SQLite-based store implementing every storage trait
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, ServerError> {
        let conn = Connection::open(path).map_err(ServerError::dependency)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, ServerError> {
        let conn = Connection::open_in_memory().map_err(ServerError::dependency)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ServerError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(ServerError::dependency)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ServerError::Dependency("database lock poisoned".to_string()))
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), ServerError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }
            if current_version < 2 {
                Self::migrate_v2(conn)?;
            }
            if current_version < 3 {
                Self::migrate_v3(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(ServerError::dependency)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, ServerError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(ServerError::dependency)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(ServerError::dependency)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), ServerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS donors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                donor_code TEXT NOT NULL UNIQUE,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL,
                blood_group TEXT NOT NULL,
                area TEXT,
                latitude REAL,
                longitude REAL,
                status TEXT NOT NULL,
                is_available INTEGER NOT NULL DEFAULT 1,
                rejection_reason TEXT,
                consent_given INTEGER NOT NULL DEFAULT 0,
                consent_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_donors_match
                ON donors(status, is_available, blood_group);
            CREATE INDEX IF NOT EXISTS idx_donors_location ON donors(latitude, longitude);

            CREATE TABLE IF NOT EXISTS blood_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_code TEXT NOT NULL UNIQUE,
                hospital_id INTEGER NOT NULL,
                blood_group_needed TEXT NOT NULL,
                latitude REAL,
                longitude REAL,
                radius_km REAL NOT NULL DEFAULT 5.0,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_requests_hospital ON blood_requests(hospital_id);

            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id INTEGER NOT NULL REFERENCES blood_requests(id),
                donor_id INTEGER NOT NULL REFERENCES donors(id),
                notified_at TEXT NOT NULL,
                response TEXT NOT NULL DEFAULT 'none',
                response_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_donor ON notifications(donor_id);
            CREATE INDEX IF NOT EXISTS idx_notifications_request ON notifications(request_id);

            -- One live challenge per email
            CREATE TABLE IF NOT EXISTS otp_challenges (
                email TEXT PRIMARY KEY,
                challenge_id TEXT NOT NULL,
                code_hash TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(ServerError::dependency)?;

        Ok(())
    }

    /// Migration to version 2: fold legacy upper-case statuses into canonical values.
    ///
    /// Rows imported from the previous system carried `PENDING`, `APPROVED`,
    /// `REJECTED` and upper-case responses.
    fn migrate_v2(conn: &Connection) -> Result<(), ServerError> {
        conn.execute_batch(
            r#"
            UPDATE donors SET status = 'pending_hospital_approval'
                WHERE UPPER(status) IN ('PENDING', 'PENDING_HOSPITAL_APPROVAL');
            UPDATE donors SET status = 'pending_email_verification'
                WHERE UPPER(status) = 'PENDING_EMAIL_VERIFICATION';
            UPDATE donors SET status = 'approved' WHERE UPPER(status) = 'APPROVED';
            UPDATE donors SET status = 'rejected' WHERE UPPER(status) = 'REJECTED';
            UPDATE donors SET rejection_reason = NULL WHERE status != 'rejected';

            UPDATE notifications SET response = 'none'
                WHERE response IS NULL OR UPPER(response) IN ('PENDING', 'NONE');
            UPDATE notifications SET response = LOWER(response)
                WHERE UPPER(response) IN ('ACCEPT', 'DECLINE');
            "#,
        )
        .map_err(ServerError::dependency)?;

        Ok(())
    }

    /// Migration to version 3: audit trail
    fn migrate_v3(conn: &Connection) -> Result<(), ServerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                actor TEXT NOT NULL,
                actor_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                entity TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_log(actor, actor_id);
            "#,
        )
        .map_err(ServerError::dependency)?;

        Ok(())
    }
}

impl DonorStore for SqliteStore {
    fn create_donor(&self, details: &DonorDetails) -> StoreResult<Donor> {
        let conn = self.conn()?;
        let id = insert_with_code("donors.donor_code", |code| insert_donor(&conn, details, code))
            .map_err(donor_write_error)?;
        drop(conn); // Release lock before calling get_donor

        self.get_donor(id)?.ok_or(ServerError::DonorNotFound)
    }

    fn get_donor(&self, donor_id: DonorId) -> StoreResult<Option<Donor>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM donors WHERE id = ?1", DONOR_COLUMNS),
            params![donor_id.0 as i64],
            donor_from_row,
        )
        .optional()
        .map_err(ServerError::dependency)
    }

    fn get_donor_by_email(&self, email: &str) -> StoreResult<Option<Donor>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM donors WHERE email = ?1", DONOR_COLUMNS),
            params![email.to_lowercase()],
            donor_from_row,
        )
        .optional()
        .map_err(ServerError::dependency)
    }

    fn update_registration(&self, donor_id: DonorId, details: &DonorDetails) -> StoreResult<Donor> {
        let conn = self.conn()?;
        let now = fmt_time(Utc::now());

        let rows_affected = conn
            .execute(
                "UPDATE donors SET full_name = ?1, email = ?2, phone = ?3, blood_group = ?4,
                    area = ?5, latitude = ?6, longitude = ?7, status = ?8,
                    rejection_reason = NULL,
                    consent_at = CASE WHEN ?9 = 1 AND consent_given = 0 THEN ?10 ELSE consent_at END,
                    consent_given = ?9, updated_at = ?10
                 WHERE id = ?11",
                params![
                    details.full_name,
                    details.email.to_lowercase(),
                    details.phone,
                    details.blood_group.as_str(),
                    details.area,
                    details.location.map(|c| c.latitude),
                    details.location.map(|c| c.longitude),
                    DonorStatus::PendingEmailVerification.as_str(),
                    details.consent_given as i32,
                    now,
                    donor_id.0 as i64,
                ],
            )
            .map_err(donor_write_error)?;

        if rows_affected == 0 {
            return Err(ServerError::DonorNotFound);
        }
        drop(conn);

        self.get_donor(donor_id)?.ok_or(ServerError::DonorNotFound)
    }

    fn update_status(
        &self,
        donor_id: DonorId,
        status: DonorStatus,
        rejection_reason: Option<&str>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let reason = match status {
            DonorStatus::Rejected => rejection_reason,
            _ => None,
        };

        let rows_affected = conn
            .execute(
                "UPDATE donors SET status = ?1, rejection_reason = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.as_str(), reason, fmt_time(Utc::now()), donor_id.0 as i64],
            )
            .map_err(ServerError::dependency)?;

        if rows_affected == 0 {
            return Err(ServerError::DonorNotFound);
        }

        Ok(())
    }

    fn update_profile(&self, donor_id: DonorId, update: &ProfileUpdate) -> StoreResult<Donor> {
        let conn = self.conn()?;

        let rows_affected = conn
            .execute(
                "UPDATE donors SET
                    phone = COALESCE(?1, phone),
                    area = COALESCE(?2, area),
                    latitude = COALESCE(?3, latitude),
                    longitude = COALESCE(?4, longitude),
                    is_available = COALESCE(?5, is_available),
                    updated_at = ?6
                 WHERE id = ?7",
                params![
                    update.phone,
                    update.area,
                    update.location.map(|c| c.latitude),
                    update.location.map(|c| c.longitude),
                    update.is_available.map(|a| a as i32),
                    fmt_time(Utc::now()),
                    donor_id.0 as i64,
                ],
            )
            .map_err(ServerError::dependency)?;

        if rows_affected == 0 {
            return Err(ServerError::DonorNotFound);
        }
        drop(conn);

        self.get_donor(donor_id)?.ok_or(ServerError::DonorNotFound)
    }

    fn find_donors(&self, query: &DonorQuery) -> StoreResult<Vec<Donor>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            values.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(available) = query.available {
            values.push(Value::Integer(available as i64));
            clauses.push(format!("is_available = ?{}", values.len()));
        }
        if let Some(group) = query.blood_group {
            values.push(Value::Text(group.as_str().to_string()));
            clauses.push(format!("blood_group = ?{}", values.len()));
        }
        if let Some(bounds) = &query.within {
            clauses.push("latitude IS NOT NULL AND longitude IS NOT NULL".to_string());

            values.push(Value::Real(bounds.min_lat));
            values.push(Value::Real(bounds.max_lat));
            clauses.push(format!(
                "latitude BETWEEN ?{} AND ?{}",
                values.len() - 1,
                values.len()
            ));

            let mut ranges = Vec::new();
            for (min_lon, max_lon) in bounds.longitude_ranges() {
                values.push(Value::Real(min_lon));
                values.push(Value::Real(max_lon));
                ranges.push(format!(
                    "longitude BETWEEN ?{} AND ?{}",
                    values.len() - 1,
                    values.len()
                ));
            }
            clauses.push(format!("({})", ranges.join(" OR ")));
        }

        let mut sql = format!("SELECT {} FROM donors", DONOR_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(ServerError::dependency)?;
        let donors = stmt
            .query_map(params_from_iter(values.iter()), donor_from_row)
            .map_err(ServerError::dependency)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::dependency)?;

        Ok(donors)
    }

    fn count_by_status(&self) -> StoreResult<DonorCounts> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM donors GROUP BY status")
            .map_err(ServerError::dependency)?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(ServerError::dependency)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::dependency)?;

        let mut counts = DonorCounts::default();
        for (status, count) in rows {
            let status = status.parse::<DonorStatus>()?;
            counts.add(status, count as u64);
        }
        Ok(counts)
    }
}

impl RequestStore for SqliteStore {
    fn create_request(&self, request: &NewBloodRequest) -> StoreResult<BloodRequest> {
        let conn = self.conn()?;

        insert_with_code("blood_requests.request_code", |code| {
            conn.execute(
                "INSERT INTO blood_requests (request_code, hospital_id, blood_group_needed,
                    latitude, longitude, radius_km, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    code,
                    request.hospital_id.0 as i64,
                    request.blood_group_needed.as_str(),
                    request.location.map(|c| c.latitude),
                    request.location.map(|c| c.longitude),
                    request.radius_km,
                    RequestStatus::Active.as_str(),
                    fmt_time(Utc::now()),
                ],
            )
        })
        .map_err(ServerError::dependency)?;

        let id = RequestId(conn.last_insert_rowid() as u64);
        drop(conn);

        self.get_request(id)?.ok_or(ServerError::RequestNotFound)
    }

    fn get_request(&self, request_id: RequestId) -> StoreResult<Option<BloodRequest>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM blood_requests WHERE id = ?1", REQUEST_COLUMNS),
            params![request_id.0 as i64],
            request_from_row,
        )
        .optional()
        .map_err(ServerError::dependency)
    }

    fn list_requests_by_hospital(&self, hospital_id: HospitalId) -> StoreResult<Vec<BloodRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM blood_requests WHERE hospital_id = ?1 ORDER BY id",
                REQUEST_COLUMNS
            ))
            .map_err(ServerError::dependency)?;

        let requests = stmt
            .query_map(params![hospital_id.0 as i64], request_from_row)
            .map_err(ServerError::dependency)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::dependency)?;

        Ok(requests)
    }

    fn set_request_status(&self, request_id: RequestId, status: RequestStatus) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                "UPDATE blood_requests SET status = ?1 WHERE id = ?2",
                params![status.as_str(), request_id.0 as i64],
            )
            .map_err(ServerError::dependency)?;

        if rows_affected == 0 {
            return Err(ServerError::RequestNotFound);
        }

        Ok(())
    }
}

impl NotificationStore for SqliteStore {
    fn create_notification(
        &self,
        request_id: RequestId,
        donor_id: DonorId,
        notified_at: DateTime<Utc>,
    ) -> StoreResult<NotificationRecord> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO notifications (request_id, donor_id, notified_at, response)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                request_id.0 as i64,
                donor_id.0 as i64,
                fmt_time(notified_at),
                DonorResponse::NoResponse.as_str(),
            ],
        )
        .map_err(ServerError::dependency)?;

        let id = NotificationId(conn.last_insert_rowid() as u64);
        drop(conn);

        self.get_notification_for_donor(id, donor_id)?
            .ok_or(ServerError::NotificationNotFound)
    }

    fn get_notification_for_donor(
        &self,
        notification_id: NotificationId,
        donor_id: DonorId,
    ) -> StoreResult<Option<NotificationRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM notifications WHERE id = ?1 AND donor_id = ?2",
                NOTIFICATION_COLUMNS
            ),
            params![notification_id.0 as i64, donor_id.0 as i64],
            notification_from_row,
        )
        .optional()
        .map_err(ServerError::dependency)
    }

    fn set_response(
        &self,
        notification_id: NotificationId,
        donor_id: DonorId,
        response: DonorResponse,
        response_at: DateTime<Utc>,
    ) -> StoreResult<NotificationRecord> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                "UPDATE notifications SET response = ?1, response_at = ?2
                 WHERE id = ?3 AND donor_id = ?4",
                params![
                    response.as_str(),
                    fmt_time(response_at),
                    notification_id.0 as i64,
                    donor_id.0 as i64,
                ],
            )
            .map_err(ServerError::dependency)?;

        if rows_affected == 0 {
            return Err(ServerError::NotificationNotFound);
        }
        drop(conn);

        self.get_notification_for_donor(notification_id, donor_id)?
            .ok_or(ServerError::NotificationNotFound)
    }

    fn list_notifications_for_donor(&self, donor_id: DonorId) -> StoreResult<Vec<NotificationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM notifications WHERE donor_id = ?1 ORDER BY notified_at DESC, id DESC",
                NOTIFICATION_COLUMNS
            ))
            .map_err(ServerError::dependency)?;

        let records = stmt
            .query_map(params![donor_id.0 as i64], notification_from_row)
            .map_err(ServerError::dependency)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::dependency)?;

        Ok(records)
    }

    fn list_notifications_for_request(
        &self,
        request_id: RequestId,
    ) -> StoreResult<Vec<NotificationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM notifications WHERE request_id = ?1 ORDER BY id",
                NOTIFICATION_COLUMNS
            ))
            .map_err(ServerError::dependency)?;

        let records = stmt
            .query_map(params![request_id.0 as i64], notification_from_row)
            .map_err(ServerError::dependency)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::dependency)?;

        Ok(records)
    }
}

impl OtpStore for SqliteStore {
    fn put_challenge(&self, challenge: OtpChallenge) -> StoreResult<()> {
        let conn = self.conn()?;

        // Upsert keyed by email: replacing the previous challenge is a single statement
        conn.execute(
            "INSERT INTO otp_challenges (email, challenge_id, code_hash, expires_at, attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(email) DO UPDATE SET
                challenge_id = excluded.challenge_id,
                code_hash = excluded.code_hash,
                expires_at = excluded.expires_at,
                attempts = excluded.attempts,
                created_at = excluded.created_at",
            params![
                challenge.email.to_lowercase(),
                challenge.id.0,
                challenge.code_hash,
                fmt_time(challenge.expires_at),
                challenge.attempts as i64,
                fmt_time(challenge.created_at),
            ],
        )
        .map_err(ServerError::dependency)?;

        Ok(())
    }

    fn get_challenge(&self, email: &str) -> StoreResult<Option<OtpChallenge>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT email, challenge_id, code_hash, expires_at, attempts, created_at
             FROM otp_challenges WHERE email = ?1",
            params![email.to_lowercase()],
            challenge_from_row,
        )
        .optional()
        .map_err(ServerError::dependency)
    }

    fn increment_attempts(
        &self,
        email: &str,
        challenge_id: &ChallengeId,
        seen_attempts: u32,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                "UPDATE otp_challenges SET attempts = attempts + 1
                 WHERE email = ?1 AND challenge_id = ?2 AND attempts = ?3",
                params![email.to_lowercase(), challenge_id.0, seen_attempts as i64],
            )
            .map_err(ServerError::dependency)?;

        Ok(rows_affected == 1)
    }

    fn remove_challenge(&self, email: &str, challenge_id: &ChallengeId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let rows_affected = conn
            .execute(
                "DELETE FROM otp_challenges WHERE email = ?1 AND challenge_id = ?2",
                params![email.to_lowercase(), challenge_id.0],
            )
            .map_err(ServerError::dependency)?;

        Ok(rows_affected == 1)
    }
}

impl AuditStore for SqliteStore {
    fn record(
        &self,
        actor: AuditActor,
        actor_id: u64,
        action: AuditAction,
        entity: Option<&str>,
    ) -> StoreResult<AuditEntry> {
        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO audit_log (actor, actor_id, action, entity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                actor.as_str(),
                actor_id as i64,
                action.as_str(),
                entity,
                fmt_time(now),
            ],
        )
        .map_err(ServerError::dependency)?;

        Ok(AuditEntry {
            id: AuditId(conn.last_insert_rowid() as u64),
            actor,
            actor_id,
            action,
            entity: entity.map(str::to_string),
            created_at: now,
        })
    }

    fn list_audit(&self) -> StoreResult<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM audit_log ORDER BY id", AUDIT_COLUMNS))
            .map_err(ServerError::dependency)?;

        let entries = stmt
            .query_map([], audit_from_row)
            .map_err(ServerError::dependency)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::dependency)?;

        Ok(entries)
    }
}
