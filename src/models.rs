//! Data models for Google Drive API responses and local upload sources.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{DriveError, Result};
use crate::mime;

/// MIME type Google Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file resource as it appears on the wire.
///
/// Every field is optional because the API only returns the fields that were
/// requested; conversion into [`RemoteFile`] or [`Folder`] validates them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub parents: Vec<String>,
}

/// A file stored in a Drive folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub created_time: OffsetDateTime,
    pub mime_type: Option<String>,
    pub parent_id: Option<String>,
}

impl TryFrom<FileResource> for RemoteFile {
    type Error = DriveError;

    fn try_from(resource: FileResource) -> Result<Self> {
        let id = resource
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DriveError::Malformed("file without id".to_string()))?;
        let created_time = resource
            .created_time
            .ok_or_else(|| DriveError::Malformed(format!("file {} has no createdTime", id)))?;

        Ok(Self {
            id,
            name: resource.name.unwrap_or_default(),
            created_time,
            mime_type: resource.mime_type,
            parent_id: resource.parents.into_iter().next(),
        })
    }
}

impl std::fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (Created: {})",
            self.name,
            format_timestamp(self.created_time)
        )
    }
}

/// A Drive folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

impl TryFrom<FileResource> for Folder {
    type Error = DriveError;

    fn try_from(resource: FileResource) -> Result<Self> {
        let id = resource
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DriveError::Malformed("folder without id".to_string()))?;
        Ok(Self {
            id,
            name: resource.name.unwrap_or_default(),
        })
    }
}

/// A local file that has been checked and is ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub content_type: &'static str,
}

impl LocalFile {
    /// Inspect a local path, failing unless it names an existing regular file.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DriveError::LocalNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(DriveError::Io(e)),
        };
        if !metadata.is_file() {
            return Err(DriveError::LocalNotRegular(path.to_path_buf()));
        }

        // Name the upload after the path as given, not a symlink's target.
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DriveError::LocalNotRegular(path.to_path_buf()))?;
        let path = fs::canonicalize(path)?;
        let content_type = mime::resolve(&name);

        Ok(Self {
            path,
            name,
            size: metadata.len(),
            content_type,
        })
    }
}

/// Snapshot of a folder's children, newest first.
#[derive(Debug, Clone)]
pub struct FolderView {
    pub folder_id: String,
    pub cap: usize,
    pub files: Vec<RemoteFile>,
}

impl FolderView {
    /// Build a view, ordering files newest first (ties broken by id).
    pub fn new(folder_id: impl Into<String>, cap: usize, mut files: Vec<RemoteFile>) -> Self {
        files.sort_by(|a, b| {
            b.created_time
                .cmp(&a.created_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        Self {
            folder_id: folder_id.into(),
            cap,
            files,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether the folder currently holds more files than the cap allows.
    pub fn exceeds_cap(&self) -> bool {
        self.files.len() > self.cap
    }
}

/// Result of a retention pass over one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    /// Files removed by this pass, oldest first.
    pub deleted: Vec<RemoteFile>,
    /// Children left in the folder after the pass.
    pub kept: usize,
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorItem {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// OAuth client secret for an installed application.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Client secret file as downloaded from the Google Cloud console.
#[derive(Debug, Deserialize)]
pub struct ClientSecretFile {
    #[serde(default)]
    pub installed: Option<ApplicationSecret>,
    #[serde(default)]
    pub web: Option<ApplicationSecret>,
}

impl ClientSecretFile {
    pub fn into_secret(self) -> Option<ApplicationSecret> {
        self.installed.or(self.web)
    }
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth2 error response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Credential persisted in the token store between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Format a timestamp as RFC 3339, falling back to the debug form.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
