use thiserror::Error;

/// Errors returned by the quest-progress engine and the account store.
#[derive(Debug, Error)]
pub enum QuestError {
    /// Input rejected before any state was touched.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Login failed. The inner kind is for logs and tests only; both kinds
    /// render the same message so usernames cannot be enumerated.
    #[error("authentication failed")]
    Authentication(AuthFailure),

    /// Returned by registration when the normalized username is taken.
    #[error("username '{0}' is already taken")]
    Conflict(String),

    /// Wrapper around IO errors (directory creation, record read/write).
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Wrapper around JSON encode/decode errors on account records.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Password hashing or a stored hash that cannot be parsed.
    #[error("password hash failure: {0}")]
    Hash(String),
}

/// Why an authentication attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownAccount,
    InvalidCredentials,
}

/// Validation errors with user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Username required")]
    EmptyUsername,

    #[error("Username is too long (maximum {max} characters)")]
    UsernameTooLong { max: usize },

    #[error("Username contains control characters")]
    InvalidUsernameCharacters,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Password is too long (maximum {max} characters)")]
    PasswordTooLong { max: usize },

    #[error("Reset hour must be between 0 and 23 (got {0})")]
    ResetHourOutOfRange(i64),

    #[error("Quest name cannot be empty")]
    EmptyQuestName,

    #[error("Quest name is too long (maximum {max} characters)")]
    QuestNameTooLong { max: usize },

    #[error("No quest at position {index} ({len} quests)")]
    QuestIndexOutOfRange { index: usize, len: usize },

    #[error("Unknown quest id: {0}")]
    UnknownQuest(String),
}

pub type Result<T> = std::result::Result<T, QuestError>;
