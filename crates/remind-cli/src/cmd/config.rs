use crate::output::print_json;
use anyhow::Context;
use remind_core::EmailConfig;

/// Check the email environment and print it with the password hidden.
pub fn run(json: bool) -> anyhow::Result<()> {
    let email = EmailConfig::from_env().context("email configuration is incomplete")?;

    if json {
        return print_json(&serde_json::json!({
            "to": email.to,
            "sender_address": email.sender_address,
            "sender_password": "<redacted>",
            "host": email.host,
            "port": email.port,
        }));
    }

    println!("Email configuration OK");
    println!("  to:     {}", email.to);
    println!("  from:   {}", email.sender_address);
    println!("  server: {}:{}", email.host, email.port);
    Ok(())
}
