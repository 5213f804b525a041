//! Application state shared by the HTTP handlers

use std::sync::Arc;

use chrono::Duration;

use crate::config::{Config, MAX_OTP_TTL_MINUTES};
use crate::crypto::BcryptHasher;
use crate::dispatch::{AlertSettings, NotificationDispatcher};
use crate::email::Mailer;
use crate::matcher::DonorMatcher;
use crate::otp::{OtpPolicy, OtpService};
use crate::store::Store;

/// Everything a request handler needs, wired once at startup
pub struct AppState<S, M> {
    pub store: Arc<S>,
    pub otp: OtpService<S, BcryptHasher, M>,
    pub matcher: DonorMatcher<S>,
    pub dispatcher: NotificationDispatcher<S, M>,
    pub config: Config,
}

impl<S, M> AppState<S, M>
where
    S: Store,
    M: Mailer,
{
    pub fn new(store: S, mailer: M, config: Config) -> Self {
        let store = Arc::new(store);
        let mailer = Arc::new(mailer);

        let policy = OtpPolicy {
            ttl: Duration::minutes(config.otp_ttl_minutes.clamp(1, MAX_OTP_TTL_MINUTES)),
            max_attempts: config.otp_max_attempts,
            platform_name: config.platform_name.clone(),
        };
        let otp = OtpService::new(
            store.clone(),
            Arc::new(BcryptHasher::new(config.bcrypt_cost)),
            mailer.clone(),
            policy,
        );

        let dispatcher = NotificationDispatcher::new(
            store.clone(),
            mailer,
            AlertSettings {
                platform_name: config.platform_name.clone(),
                frontend_url: config.frontend_url.clone(),
            },
        );

        Self {
            matcher: DonorMatcher::new(store.clone()),
            store,
            otp,
            dispatcher,
            config,
        }
    }
}
