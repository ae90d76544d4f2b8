/// Errors raised while validating and transitioning user records
///
/// Every variant except `Database` is a client-correctable condition. The
/// `Display` strings are the messages returned to API clients.

use thiserror::Error;

/// Result alias for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors from the validator and the record transition engine
#[derive(Debug, Error)]
pub enum RecordError {
    /// Full name absent or blank
    #[error("Full name is required")]
    InvalidName,

    /// Mobile number not reducible to 10 digits
    #[error("Invalid mobile number format")]
    InvalidMobile,

    /// PAN not matching five letters, four digits, one letter
    #[error("Invalid PAN number format")]
    InvalidTaxId,

    /// Referenced manager is missing or inactive
    #[error("Manager not found or not active")]
    ManagerNotActive,

    /// No active row for the requested user
    ///
    /// Carries the offending identifier when the request named several.
    #[error("{}", not_found_message(.user_id))]
    UserNotFound {
        /// Identifier reported back to the caller, if any
        user_id: Option<String>,
    },

    /// Request did not name which record(s) to act on
    #[error("{0}")]
    MissingKey(&'static str),

    /// Update request carried no fields
    #[error("Update data must be provided")]
    EmptyChangeSet,

    /// Multi-record update that is not a manager reassignment
    #[error("Bulk update is only supported for manager_id")]
    UnsupportedBulkUpdate,

    /// Update request named a field that cannot be changed
    #[error("Unsupported update field: {0}")]
    UnknownField(String),

    /// Active row was retired by another writer mid-transition
    #[error("User {0} was modified concurrently")]
    Conflict(String),

    /// Store failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn not_found_message(user_id: &Option<String>) -> String {
    match user_id {
        Some(id) => format!("User with ID {id} not found"),
        None => "User not found".to_string(),
    }
}

impl RecordError {
    /// Builds a not-found error that does not name the identifier
    pub fn user_not_found() -> Self {
        RecordError::UserNotFound { user_id: None }
    }

    /// Builds a not-found error naming `user_id`
    pub fn user_not_found_with_id(user_id: impl Into<String>) -> Self {
        RecordError::UserNotFound {
            user_id: Some(user_id.into()),
        }
    }
}
