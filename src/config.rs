//! Runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DriveError, Result};

/// Maximum number of files kept in the target folder.
pub const DEFAULT_CAP: usize = 10;

/// Folder used when the user gives no name.
pub const DEFAULT_FOLDER: &str = "myfiles";

pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
pub const DEFAULT_TOKEN_DIR: &str = "tokens";
pub const DEFAULT_CALLBACK_PORT: u16 = 8888;
pub const DEFAULT_CALLBACK_PATH: &str = "/Callback";

/// Per-request timeout for Drive API calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for the browser redirect during authorization.
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Access to files created or opened by this app.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// OAuth `access_type` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AccessType {
    /// Request a refresh token so later runs need no browser.
    #[default]
    Offline,
    Online,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Offline => "offline",
            AccessType::Online => "online",
        }
    }
}

/// Settings for the installed-app authorization flow.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Client secret JSON downloaded from the Cloud console.
    pub credentials: PathBuf,
    /// Directory holding the cached credential.
    pub token_store: PathBuf,
    pub callback_port: u16,
    pub callback_path: String,
    pub scopes: Vec<String>,
    pub access_type: AccessType,
    pub authorization_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            token_store: PathBuf::from(DEFAULT_TOKEN_DIR),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            access_type: AccessType::Offline,
            authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
        }
    }
}

impl AuthConfig {
    /// Check values the flow can't work without.
    pub fn validate(&self) -> Result<()> {
        if !self.callback_path.starts_with('/') {
            return Err(DriveError::Config(format!(
                "callback path must start with '/': {}",
                self.callback_path
            )));
        }
        if self.scopes.is_empty() {
            return Err(DriveError::Config("at least one scope is required".into()));
        }
        Ok(())
    }
}

/// Everything the binary needs to run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub cap: usize,
    pub folder: Option<String>,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cap == 0 {
            return Err(DriveError::Config("cap must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(DriveError::Config("request timeout must be positive".into()));
        }
        self.auth.validate()
    }

    /// Folder name to use, with blank names mapped to the default.
    pub fn folder_name(&self) -> &str {
        folder_or_default(self.folder.as_deref())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            cap: DEFAULT_CAP,
            folder: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Trim `input`, falling back to [`DEFAULT_FOLDER`] when nothing is left.
pub fn folder_or_default(input: Option<&str>) -> &str {
    match input.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_FOLDER,
    }
}
