/// Client-detected problems with user input, reported before any write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Value must not be empty")]
    Empty,

    #[error("The category has already existed.")]
    DuplicateCategory,

    #[error("The username has already existed")]
    UsernameTaken,
}

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    /// A 403 most likely caused by a token that still carries the pre-rename
    /// username. Logging out and back in fixes it.
    #[error("Your session predates a username change; log in again")]
    StaleToken,

    /// A 401. The session has already been cleared when this is returned.
    #[error("Unauthorized")]
    Unauthorized(String),

    #[error("Not found")]
    NotFound,

    #[error("A change to {0} is already in progress")]
    Busy(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlogError {
    /// Message suitable for showing next to a form.
    pub fn user_message(&self) -> String {
        match self {
            BlogError::Auth(msg) | BlogError::Permission(msg) => msg.clone(),
            BlogError::Unauthorized(msg) if !msg.is_empty() => msg.clone(),
            BlogError::Status { message, .. } if !message.is_empty() => message.clone(),
            BlogError::Validation(kind) => kind.to_string(),
            other => other.to_string(),
        }
    }

    /// Transport and server failures. These roll back tentative state and are
    /// never retried automatically.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            BlogError::Network(_) | BlogError::Http(_) | BlogError::Status { .. }
        )
    }
}

pub type BlogResult<T> = Result<T, BlogError>;
