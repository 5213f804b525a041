//! SMTP-based mailer for production

use lettre::{
    message::MultiPart, transport::smtp::authentication::Credentials, Message, SmtpTransport,
    Transport,
};

use super::Mailer;

/// Configuration for SMTP mail sending
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host (e.g., "smtp.gmail.com")
    pub host: String,
    /// SMTP server port (typically 465 for TLS, 587 for STARTTLS)
    pub port: u16,
    pub username: String,
    /// SMTP password or app password
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

impl SmtpConfig {
    /// Create config from environment variables
    ///
    /// Required:
    /// - SMTP_HOST
    /// - SMTP_USERNAME
    /// - SMTP_PASSWORD
    /// - SMTP_FROM_EMAIL
    ///
    /// Optional:
    /// - SMTP_PORT (default: 465)
    /// - SMTP_FROM_NAME
    pub fn from_env() -> Option<Self> {
        fn get_env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|s| !s.is_empty())
        }

        let host = get_env("SMTP_HOST")?;
        let username = get_env("SMTP_USERNAME")?;
        let password = get_env("SMTP_PASSWORD")?;
        let from_email = get_env("SMTP_FROM_EMAIL")?;

        let port = get_env("SMTP_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(465);

        let from_name = get_env("SMTP_FROM_NAME");

        Some(Self {
            host,
            port,
            username,
            password,
            from_email,
            from_name,
        })
    }
}

/// SMTP mailer for production use
pub struct SmtpMailer {
    transport: SmtpTransport,
    from_email: String,
    from_name: Option<String>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer and check that the server is reachable
    pub fn new(config: SmtpConfig) -> Result<Self, String> {
        let creds = Credentials::new(config.username, config.password);

        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
            .port(config.port)
            .credentials(creds)
            .build();

        transport
            .test_connection()
            .map_err(|e| format!("SMTP connection test failed: {}", e))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP connection established");

        Ok(Self {
            transport,
            from_email: config.from_email,
            from_name: config.from_name,
        })
    }

    fn from_address(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_email),
            None => self.from_email.clone(),
        }
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str) -> Result<(), String> {
        let from = self
            .from_address()
            .parse()
            .map_err(|e| format!("Invalid from address: {}", e))?;

        let to_addr = to
            .parse()
            .map_err(|e| format!("Invalid to address: {}", e))?;

        let message = Message::builder()
            .from(from)
            .to(to_addr)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text_body.to_string(),
                html_body.to_string(),
            ))
            .map_err(|e| format!("Failed to build email: {}", e))?;

        self.transport
            .send(&message)
            .map_err(|e| format!("Failed to send email: {}", e))?;

        tracing::info!(to = %to, subject = %subject, "Mail sent");
        Ok(())
    }
}
