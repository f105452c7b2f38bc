use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ConfigError;
use crate::edit_session::ValidationError;
use crate::gateway::GatewayError;
use crate::mutator::MutationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Shown inline next to the offending input.
    Inline,
    /// Dismissible notice; the user may re-trigger the action.
    Transient,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Network,
    Remote,
    NotFound,
    Busy,
    Timeout,
    Forbidden,
    Storage,
    Configuration,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Network => "NETWORK_ERROR",
            Self::Remote => "REMOTE_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Busy => "CONCURRENT_MUTATION_REJECTED",
            Self::Timeout => "TIMEOUT",
            Self::Forbidden => "FORBIDDEN",
            Self::Storage => "STORAGE_ERROR",
            Self::Configuration => "CONFIG_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Validation => ErrorSeverity::Inline,
            Self::Network
            | Self::Remote
            | Self::NotFound
            | Self::Busy
            | Self::Timeout
            | Self::Forbidden
            | Self::Storage => ErrorSeverity::Transient,
            Self::Configuration | Self::Internal => ErrorSeverity::Fatal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Remote => "The server could not complete the request. Please try again.".into(),
            ErrorKind::NotFound => "This listing is no longer available.".into(),
            ErrorKind::Busy => "Please wait, a previous change is still being saved.".into(),
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Forbidden => "You don't have permission to change this listing.".into(),
            ErrorKind::Storage => "Unable to read or write saved data.".into(),
            ErrorKind::Configuration | ErrorKind::Internal => {
                "An unexpected error occurred. Please restart the app.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string()).with_context("field", e.field().as_str())
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        let kind = match &e {
            GatewayError::Network(_) => ErrorKind::Network,
            GatewayError::Remote { .. } => ErrorKind::Remote,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Timeout => ErrorKind::Timeout,
            GatewayError::Storage(_) => ErrorKind::Storage,
            GatewayError::UnexpectedResponse(_) => ErrorKind::Remote,
        };
        let err = AppError::new(kind, e.to_string());
        match e {
            GatewayError::Remote { status, .. } => err.with_context("status", status.to_string()),
            GatewayError::NotFound(id) => err.with_context("listing_id", id.as_str()),
            _ => err,
        }
    }
}

impl From<MutationError> for AppError {
    fn from(e: MutationError) -> Self {
        match e {
            MutationError::Busy(id) => {
                AppError::new(ErrorKind::Busy, format!("mutation already in flight for {id}"))
                    .with_context("listing_id", id.as_str())
            }
            MutationError::NotFound(id) => {
                AppError::new(ErrorKind::NotFound, format!("listing {id} is not loaded"))
                    .with_context("listing_id", id.as_str())
            }
            MutationError::Forbidden(reason) => AppError::new(ErrorKind::Forbidden, reason),
            MutationError::Gateway(g) => g.into(),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}
