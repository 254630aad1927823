//! # AppError
//!
//! Centralized error handling for memeow.
//! Maps store and identity failures to the categories a screen can act on.

use thiserror::Error;

/// The primary error type for all memeow operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected input or a disallowed transition (empty note, cooldown, no nickname yet)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A friend request or acceptance aimed at oneself
    #[error("cannot send a friend request to yourself")]
    SelfRequest,

    /// Resource not found (e.g., nickname, user record)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Nickname reservation lost to another user
    #[error("nickname already taken: {0}")]
    Taken(String),

    /// No signed-in session
    #[error("not authenticated")]
    NotAuthenticated,

    /// Infrastructure failure (network, backend, missing index)
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn not_found(entity: &str, key: impl Into<String>) -> Self {
        AppError::NotFound(entity.to_string(), key.into())
    }

    /// Wraps a collaborator failure, keeping the full context chain.
    pub fn unavailable(err: impl Into<anyhow::Error>) -> Self {
        AppError::StoreUnavailable(format!("{:#}", err.into()))
    }

    /// Text shown at the screen boundary.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ValidationError(msg) => msg.clone(),
            AppError::SelfRequest => "You cannot add yourself as a friend.".to_string(),
            AppError::NotFound(entity, _) => format!("No {entity} found."),
            AppError::Taken(_) => "Nickname Taken".to_string(),
            AppError::NotAuthenticated => "Please sign in to continue.".to_string(),
            AppError::StoreUnavailable(_) => {
                "Failed to load data. Please check your internet connection or try again later."
                    .to_string()
            }
        }
    }

    /// Whether retrying the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

/// Failures reported by a `DocumentStore` adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A create-if-absent write found an existing record
    #[error("{collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    /// An update targeted a record that does not exist
    #[error("{collection}/{id} does not exist")]
    Missing { collection: String, id: String },

    /// The backend refused the query shape (membership limit, missing index)
    #[error("query rejected: {0}")]
    InvalidQuery(String),

    /// A stored document could not be mapped to a model
    #[error("malformed document {collection}/{id}: {source}")]
    Malformed {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store backend failure: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn backend(err: impl Into<anyhow::Error>) -> Self {
        StoreError::Backend(err.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { id, .. } => AppError::Taken(id),
            StoreError::Missing { collection, id } => AppError::NotFound(collection, id),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

/// A specialized Result type for memeow logic.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type returned by document store ports.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
