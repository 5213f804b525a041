//! Mail bodies for OTP and donor alerts

use lifepulse_core::BloodGroup;

/// A rendered message
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Verification code mail
pub fn otp_mail(platform_name: &str, code: &str, valid_minutes: i64) -> Mail {
    let subject = format!("{}: Verify Your Email", platform_name);
    let text = format!(
        "Your One-Time Password (OTP) for {platform} registration is: {code}\n\n\
         This code is valid for {minutes} minutes.\n\n\
         Thank you for saving lives!",
        platform = platform_name,
        code = code,
        minutes = valid_minutes,
    );
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px; color: #333;">
    <h2 style="color: #e63946;">{platform} Verification</h2>
    <p>Your One-Time Password (OTP) is:</p>
    <h1 style="letter-spacing: 5px; background: #eee; padding: 10px; display: inline-block;">{code}</h1>
    <p>This code is valid for {minutes} minutes.</p>
    <p>If you did not request this, please ignore this email.</p>
</div>"#,
        platform = html_escape(platform_name),
        code = code,
        minutes = valid_minutes,
    );

    Mail { subject, text, html }
}

/// Urgent alert to a donor, optionally naming the blood group needed
pub fn alert_mail(
    platform_name: &str,
    donor_name: &str,
    blood_group: Option<BloodGroup>,
    frontend_url: &str,
) -> Mail {
    let dashboard = format!("{}/donor/dashboard", frontend_url.trim_end_matches('/'));
    let need = match blood_group {
        Some(group) => format!("an urgent need for {} blood", group),
        None => "an urgent need for blood".to_string(),
    };

    let subject = "URGENT: Blood Donation Needed".to_string();
    let text = format!(
        "Dear {name},\n\n\
         A hospital has {need}. Your profile matches the requirements. \
         Please log in to your dashboard for more details or visit the hospital \
         immediately if you can.\n\n{dashboard}\n\nThank you, {platform} Team",
        name = donor_name,
        need = need,
        dashboard = dashboard,
        platform = platform_name,
    );
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px; color: #333;">
    <h2 style="color: #e63946;">Urgent Blood Need</h2>
    <p>Dear {name},</p>
    <p>A hospital has flagged {need}, and your profile matches.</p>
    <p><strong>Please consider donating immediately.</strong></p>
    <p>Log in to your dashboard for more details.</p>
    <a href="{dashboard}" style="background: #e63946; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px;">Go to Dashboard</a>
</div>"#,
        name = html_escape(donor_name),
        need = need,
        dashboard = html_escape(&dashboard),
    );

    Mail { subject, text, html }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
