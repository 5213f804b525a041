//! Mail delivery abstractions

pub mod console;
pub mod smtp;
pub mod templates;

pub use console::ConsoleMailer;
pub use smtp::{SmtpConfig, SmtpMailer};
pub use templates::{alert_mail, otp_mail, Mail};

/// Trait for sending mail.
///
/// Delivery failures are reported as `Err` with a description and are never
/// fatal to the operation that triggered the send.
pub trait Mailer: Send + Sync {
    /// Send a message with plain-text and HTML bodies
    fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str) -> Result<(), String>;

    /// Send a prepared message
    fn send_mail(&self, to: &str, mail: &Mail) -> Result<(), String> {
        self.send(to, &mail.subject, &mail.text, &mail.html)
    }
}

/// Allow using Box<dyn Mailer> as a Mailer
impl Mailer for Box<dyn Mailer> {
    fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str) -> Result<(), String> {
        (**self).send(to, subject, text_body, html_body)
    }
}
