use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::models::notification::Notification;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
});

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{6,14}$").expect("valid phone pattern"));

pub const EMAIL_SUBJECT_MAX_CHARS: usize = 998;
pub const SMS_MESSAGE_MAX_CHARS: usize = 1600;
pub const SMS_SEGMENT_CHARS: usize = 160;
pub const PUSH_TITLE_MAX_CHARS: usize = 100;
pub const PUSH_BODY_MAX_BYTES: usize = 4096;
pub const IN_APP_USER_ID_MAX_CHARS: usize = 128;
pub const IN_APP_TITLE_MAX_CHARS: usize = 200;
pub const IN_APP_MESSAGE_MAX_CHARS: usize = 5000;

/// Checks every channel shares: something to send and someone to send it to.
pub fn validate_common(notification: &Notification) -> Result<()> {
    if notification.recipient().trim().is_empty() {
        return Err(anyhow!("Recipient cannot be empty"));
    }

    if notification.title().trim().is_empty() {
        return Err(anyhow!("Title cannot be empty"));
    }

    if notification.message().trim().is_empty() {
        return Err(anyhow!("Message cannot be empty"));
    }

    Ok(())
}

pub fn validate_email_address(address: &str) -> Result<()> {
    if !EMAIL_PATTERN.is_match(address) {
        return Err(anyhow!("Invalid email address: {}", address));
    }

    Ok(())
}

pub fn validate_phone_number(number: &str) -> Result<()> {
    if !PHONE_PATTERN.is_match(number) {
        return Err(anyhow!("Invalid phone number: {}", number));
    }

    Ok(())
}

pub fn validate_fcm_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(anyhow!("Device token cannot be empty"));
    }

    if token.len() < 20 {
        return Err(anyhow!("Device token too short (minimum 20 characters)"));
    }

    if token.len() > 200 {
        return Err(anyhow!("Device token too long (maximum 200 characters)"));
    }

    let valid_chars = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.');

    if !valid_chars {
        return Err(anyhow!("Device token contains invalid characters"));
    }

    Ok(())
}

pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.chars().any(char::is_whitespace) {
        return Err(anyhow!("User id cannot contain whitespace"));
    }

    if user_id.chars().count() > IN_APP_USER_ID_MAX_CHARS {
        return Err(anyhow!(
            "User id too long (maximum {} characters)",
            IN_APP_USER_ID_MAX_CHARS
        ));
    }

    Ok(())
}

pub fn validate_max_chars(field: &str, value: &str, max: usize) -> Result<()> {
    let length = value.chars().count();
    if length > max {
        return Err(anyhow!(
            "{} too long ({} characters, maximum {})",
            field,
            length,
            max
        ));
    }

    Ok(())
}

pub fn sms_segments(message: &str) -> usize {
    message.chars().count().div_ceil(SMS_SEGMENT_CHARS).max(1)
}
