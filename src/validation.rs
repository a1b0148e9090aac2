//! Input validation for account credentials, quest names and settings.

use crate::errors::ValidationError;

pub const MIN_PASSWORD_LEN: usize = 4;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_USERNAME_LEN: usize = 32;
pub const MAX_QUEST_NAME_LEN: usize = 80;

/// Normalize a username for lookup and storage: trimmed and lower-cased.
///
/// Any non-empty name without control characters is accepted; filesystem
/// safety comes from [`safe_filename`], not from restricting the character set.
pub fn normalize_username(username: &str) -> Result<String, ValidationError> {
    let normalized = username.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    if normalized.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::UsernameTooLong { max: MAX_USERNAME_LEN });
    }
    if normalized.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidUsernameCharacters);
    }
    Ok(normalized)
}

/// Check password length. Length is counted in characters, not bytes.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooLong { max: MAX_PASSWORD_LEN });
    }
    Ok(())
}

/// Trim a quest name and reject empty or oversized names.
pub fn validate_quest_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyQuestName);
    }
    if trimmed.chars().count() > MAX_QUEST_NAME_LEN {
        return Err(ValidationError::QuestNameTooLong { max: MAX_QUEST_NAME_LEN });
    }
    Ok(trimmed.to_string())
}

/// Accept an hour in `[0, 23]`.
pub fn validate_reset_hour(hour: i64) -> Result<u32, ValidationError> {
    if (0..=23).contains(&hour) {
        Ok(hour as u32)
    } else {
        Err(ValidationError::ResetHourOutOfRange(hour))
    }
}

/// Generate safe filename from username using URL encoding
pub fn safe_filename(username: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    utf8_percent_encode(username, NON_ALPHANUMERIC).to_string()
}
