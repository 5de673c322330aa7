//! Error types for the drive_rotate crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ApiErrorResponse;

/// Reasons Google attaches to 403 responses when a quota or rate limit is hit.
const QUOTA_REASONS: &[&str] = &[
    "storageQuotaExceeded",
    "quotaExceeded",
    "userRateLimitExceeded",
    "rateLimitExceeded",
    "dailyLimitExceeded",
    "sharingRateLimitExceeded",
];

/// Errors that can occur when talking to Google Drive or reading local files.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Local file not found: {}", .0.display())]
    LocalNotFound(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    LocalNotRegular(PathBuf),

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Remote file not found: {0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DriveError {
    /// Build an error from a non-success Drive API response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
        let message = parsed
            .as_ref()
            .map(|e| e.error.message.clone())
            .unwrap_or_else(|| body.to_string());
        let quota_reason = parsed.as_ref().is_some_and(|e| {
            e.error
                .errors
                .iter()
                .filter_map(|item| item.reason.as_deref())
                .any(|reason| QUOTA_REASONS.contains(&reason))
        });

        match status {
            401 => DriveError::Auth(message),
            404 => DriveError::NotFound(message),
            408 => DriveError::TransientIo(message),
            429 => DriveError::Quota(message),
            403 if quota_reason => DriveError::Quota(message),
            500..=599 => DriveError::TransientIo(format!("server error {status}: {message}")),
            _ => DriveError::Api { status, message },
        }
    }

    /// Whether the user may retry the failed operation as-is.
    ///
    /// Malformed responses are grouped with transient failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriveError::TransientIo(_) | DriveError::Malformed(_))
    }

    /// Whether the session is unusable and the program should stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriveError::Auth(_))
    }
}

impl From<reqwest::Error> for DriveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DriveError::Malformed(err.to_string())
        } else if err.is_builder() {
            DriveError::Config(err.to_string())
        } else if err.is_timeout() {
            DriveError::TransientIo(format!("request timed out: {}", err))
        } else {
            DriveError::TransientIo(err.to_string())
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
