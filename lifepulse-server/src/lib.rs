//! LifePulse blood donor service
//!
//! Donors register and verify their email with a one-time code, hospitals
//! approve them, raise blood requests and alert nearby eligible donors.

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod matcher;
pub mod otp;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use dispatch::{AlertOutcome, AlertSettings, DispatchOutcome, DispatchReport, NotificationDispatcher};
pub use email::{ConsoleMailer, Mailer, SmtpConfig, SmtpMailer};
pub use error::{ServerError, ServerResult};
pub use matcher::DonorMatcher;
pub use otp::{IssuedChallenge, OtpPolicy, OtpService};
pub use state::AppState;
pub use store::{InMemoryStore, SqliteStore, Store};
