//! Console-based mailer for development

use super::Mailer;

/// Mailer that prints messages to the console (for development)
pub struct ConsoleMailer;

impl ConsoleMailer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailer for ConsoleMailer {
    fn send(&self, to: &str, subject: &str, text_body: &str, _html_body: &str) -> Result<(), String> {
        println!();
        println!("========================================");
        println!("  TO: {}", to);
        println!("  SUBJECT: {}", subject);
        println!("----------------------------------------");
        println!("{}", text_body);
        println!("========================================");
        println!();

        tracing::info!(to = %to, subject = %subject, "Mail written to console");

        Ok(())
    }
}
