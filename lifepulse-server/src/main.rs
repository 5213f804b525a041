//! LifePulse server binary

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lifepulse_server::{
    routes, AppState, Config, ConsoleMailer, InMemoryStore, Mailer, SmtpConfig, SmtpMailer,
    SqliteStore, Store,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifepulse_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    let mailer = build_mailer();

    let app = match config.database_path.clone() {
        Some(path) => {
            let store = SqliteStore::open(&path)?;
            tracing::info!(path = %path, "Using SQLite store");
            build_app(store, mailer, config.clone())
        }
        None => {
            tracing::warn!("LIFEPULSE_DATABASE not set, data will not survive a restart");
            build_app(InMemoryStore::new(), mailer, config.clone())
        }
    };

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("LifePulse listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_mailer() -> Box<dyn Mailer> {
    match SmtpConfig::from_env() {
        Some(smtp) => {
            let host = smtp.host.clone();
            match SmtpMailer::new(smtp) {
                Ok(mailer) => {
                    tracing::info!(host = %host, "Using SMTP mailer");
                    Box::new(mailer)
                }
                Err(e) => {
                    tracing::error!(host = %host, error = %e, "SMTP unavailable, falling back to console mailer");
                    Box::new(ConsoleMailer::new())
                }
            }
        }
        None => {
            tracing::info!("SMTP not configured, printing mail to the console");
            Box::new(ConsoleMailer::new())
        }
    }
}

fn build_app<S: Store + 'static>(store: S, mailer: Box<dyn Mailer>, config: Config) -> Router {
    let state = Arc::new(AppState::new(store, mailer, config));
    routes::create_router(state)
}
