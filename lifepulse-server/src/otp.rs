//! Email one-time-password issuance and verification
//!
//! A challenge moves `NONE -> ISSUED -> {VERIFIED, EXPIRED, EXHAUSTED}`.
//! Verified and expired challenges are deleted. An exhausted challenge
//! (too many failed attempts) stays in place until it expires or a new code
//! is issued for the same email; issuing again is the only way to recover
//! before expiry. Expiry is checked lazily at verification time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lifepulse_core::validation::normalize_email;

use crate::crypto::{generate_otp_code, Hasher};
use crate::email::{otp_mail, Mailer};
use crate::error::{ServerError, ServerResult};
use crate::store::{ChallengeId, OtpChallenge, OtpStore};

/// Bound on compare-and-swap retries when concurrent writers touch the same email
const MAX_CAS_RETRIES: usize = 8;

/// Issuance and verification limits
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: u32,
    pub platform_name: String,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            max_attempts: 3,
            platform_name: "LifePulse".to_string(),
        }
    }
}

/// Outcome of issuing a challenge. The plaintext code is only ever mailed.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub email: String,
    pub expires_at: DateTime<Utc>,
    /// Whether the mailer accepted the message; the challenge exists either way
    pub delivered: bool,
    /// Mailer error, when delivery failed
    pub delivery_error: Option<String>,
}

/// OTP state machine over an [`OtpStore`]
pub struct OtpService<S, H, M> {
    store: Arc<S>,
    hasher: Arc<H>,
    mailer: Arc<M>,
    policy: OtpPolicy,
}

impl<S, H, M> OtpService<S, H, M>
where
    S: OtpStore,
    H: Hasher,
    M: Mailer,
{
    pub fn new(store: Arc<S>, hasher: Arc<H>, mailer: Arc<M>, policy: OtpPolicy) -> Self {
        Self {
            store,
            hasher,
            mailer,
            policy,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Issue a fresh 6-digit code for an email, replacing any live challenge.
    pub fn issue(&self, email: &str) -> ServerResult<IssuedChallenge> {
        let email = normalize_email(email)?;
        let code = generate_otp_code();
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.policy.ttl).ok_or_else(|| {
            ServerError::Dependency(format!("OTP lifetime {} is out of range", self.policy.ttl))
        })?;

        let challenge = OtpChallenge {
            id: ChallengeId::generate(),
            email: email.clone(),
            code_hash: self.hasher.hash(&code)?,
            expires_at,
            attempts: 0,
            created_at: now,
        };
        self.store.put_challenge(challenge)?;

        let mail = otp_mail(
            &self.policy.platform_name,
            &code,
            self.policy.ttl.num_minutes(),
        );
        let delivery_error = self.mailer.send_mail(&email, &mail).err();

        Ok(IssuedChallenge {
            email,
            expires_at,
            delivered: delivery_error.is_none(),
            delivery_error,
        })
    }

    /// Verify a candidate code. Success consumes the challenge.
    ///
    /// Errors, checked in this order:
    /// - `OtpNotFound`: no live challenge (never issued, consumed, or expired earlier)
    /// - `TooManyAttempts`: the attempt limit was reached; the challenge is kept
    /// - `OtpExpired`: past `expires_at`; the challenge is deleted
    /// - `InvalidCode`: mismatch; the attempt counter is incremented
    pub fn verify(&self, email: &str, candidate: &str) -> ServerResult<()> {
        let email = normalize_email(email)?;
        let candidate = candidate.trim();

        for _ in 0..MAX_CAS_RETRIES {
            let challenge = self
                .store
                .get_challenge(&email)?
                .ok_or(ServerError::OtpNotFound)?;

            if challenge.attempts >= self.policy.max_attempts {
                return Err(ServerError::TooManyAttempts);
            }

            if Utc::now() > challenge.expires_at {
                if self.store.remove_challenge(&email, &challenge.id)? {
                    return Err(ServerError::OtpExpired);
                }
                // Replaced by a newer issuance meanwhile
                continue;
            }

            if !self.hasher.verify(candidate, &challenge.code_hash)? {
                if self
                    .store
                    .increment_attempts(&email, &challenge.id, challenge.attempts)?
                {
                    return Err(ServerError::InvalidCode);
                }
                continue;
            }

            if self.store.remove_challenge(&email, &challenge.id)? {
                return Ok(());
            }
            // Consumed or replaced concurrently; re-read to report the current state
        }

        Err(ServerError::Dependency(format!(
            "OTP challenge for {} kept changing during verification",
            email
        )))
    }
}
