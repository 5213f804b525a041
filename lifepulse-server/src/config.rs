//! Service configuration

use serde::Deserialize;

/// Longest OTP lifetime accepted from the environment (one day)
pub const MAX_OTP_TTL_MINUTES: i64 = 24 * 60;

/// Cost range bcrypt accepts
const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// SQLite database path; `None` keeps everything in memory
    pub database_path: Option<String>,

    /// Lifetime of an issued OTP, between 1 and `MAX_OTP_TTL_MINUTES`
    pub otp_ttl_minutes: i64,

    /// Failed comparisons after which an OTP becomes unusable
    pub otp_max_attempts: u32,

    /// bcrypt cost used for OTP hashes (4 to 31)
    pub bcrypt_cost: u32,

    /// Public URL of the web front end, linked from alert mails
    pub frontend_url: String,

    /// Name used in mail subjects and bodies
    pub platform_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_path: None,
            otp_ttl_minutes: 10,
            otp_max_attempts: 3,
            bcrypt_cost: crate::crypto::BCRYPT_COST,
            frontend_url: "http://localhost:3000".to_string(),
            platform_name: "LifePulse".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `LIFEPULSE_*` environment variables.
    ///
    /// Unset, unparsable or out-of-range values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());
        let defaults = Self::default();

        Self {
            port: get("LIFEPULSE_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            database_path: get("LIFEPULSE_DATABASE"),
            otp_ttl_minutes: get("LIFEPULSE_OTP_TTL_MINUTES")
                .and_then(|s| s.parse().ok())
                .filter(|m| (1..=MAX_OTP_TTL_MINUTES).contains(m))
                .unwrap_or(defaults.otp_ttl_minutes),
            otp_max_attempts: get("LIFEPULSE_OTP_MAX_ATTEMPTS")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.otp_max_attempts),
            bcrypt_cost: get("LIFEPULSE_BCRYPT_COST")
                .and_then(|s| s.parse().ok())
                .filter(|c| BCRYPT_COST_RANGE.contains(c))
                .unwrap_or(defaults.bcrypt_cost),
            frontend_url: get("LIFEPULSE_FRONTEND_URL").unwrap_or(defaults.frontend_url),
            platform_name: get("LIFEPULSE_PLATFORM_NAME").unwrap_or(defaults.platform_name),
        }
    }
}
