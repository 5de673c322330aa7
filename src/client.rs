//! Google Drive API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::auth::Authenticator;
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{DriveError, Result};
use crate::gateway::DriveGateway;
use crate::models::{
    FileListResponse, FileResource, Folder, LocalFile, RemoteFile, FOLDER_MIME_TYPE,
};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Largest page the files.list endpoint accepts.
const PAGE_SIZE: &str = "1000";

const FOLDER_FIELDS: &str = "nextPageToken, files(id, name)";
const CHILD_FIELDS: &str = "nextPageToken, files(id, name, createdTime, mimeType, parents)";
const UPLOAD_FIELDS: &str = "id, name, createdTime, mimeType, parents";

/// Escape a value for use inside a single-quoted Drive query string.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query matching non-trashed folders named `name`.
pub fn folder_query(name: &str) -> String {
    format!(
        "mimeType='{}' and name='{}' and trashed=false",
        FOLDER_MIME_TYPE,
        escape_query_value(name)
    )
}

/// Query matching the non-trashed children of `folder_id`.
pub fn children_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents and trashed=false",
        escape_query_value(folder_id)
    )
}

/// Client for a user's My Drive.
///
/// Owns the authenticated session; every request asks it for a current token.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a client against the public Drive endpoints.
    pub fn new(auth: Authenticator, timeout: Duration) -> Result<Self> {
        Self::with_base_urls(auth, timeout, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Create a client against custom endpoints.
    pub fn with_base_urls(
        auth: Authenticator,
        timeout: Duration,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Result<Self> {
        let timeout = if timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            timeout
        };
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            auth,
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Query files using Google Drive query syntax, following every page.
    pub async fn query_files(&self, query: &str, fields: &str) -> Result<Vec<FileResource>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.access_token().await?;
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&token)
                .query(&[
                    ("q", query),
                    ("spaces", "drive"),
                    ("fields", fields),
                    ("pageSize", PAGE_SIZE),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = send(request).await?;
            let list_response: FileListResponse = response.json().await?;
            debug!(
                query,
                count = list_response.files.len(),
                more = list_response.next_page_token.is_some(),
                "listed page"
            );
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(all_files)
    }
}

#[async_trait]
impl DriveGateway for DriveClient {
    async fn find_folder_by_name(&self, name: &str) -> Result<Option<Folder>> {
        let candidates = self.query_files(&folder_query(name), FOLDER_FIELDS).await?;

        // The server already filtered by name; quoting quirks can still let
        // near-misses through, so compare again.
        for candidate in candidates {
            if candidate.name.as_deref() == Some(name) {
                let folder = Folder::try_from(candidate)?;
                debug!(name, id = %folder.id, "found existing folder");
                return Ok(Some(folder));
            }
        }
        Ok(None)
    }

    async fn create_folder(&self, name: &str) -> Result<Folder> {
        let token = self.auth.access_token().await?;
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });

        let request = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("fields", "id, name")])
            .json(&metadata);

        let response = send(request).await?;
        let mut resource: FileResource = response.json().await?;
        if resource.name.is_none() {
            resource.name = Some(name.to_string());
        }
        let folder = Folder::try_from(resource)?;
        info!(name, id = %folder.id, "created folder");
        Ok(folder)
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        self.query_files(&children_query(folder_id), CHILD_FIELDS)
            .await?
            .into_iter()
            .map(RemoteFile::try_from)
            .collect()
    }

    async fn upload_file(
        &self,
        local: &LocalFile,
        parent_id: &str,
        upload_name: &str,
        content_type: &str,
    ) -> Result<RemoteFile> {
        let token = self.auth.access_token().await?;

        let metadata = serde_json::json!({
            "name": upload_name,
            "parents": [parent_id]
        });
        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;

        let file = tokio::fs::File::open(&local.path).await?;
        let body = Body::wrap_stream(ReaderStream::new(file));
        let file_part = Part::stream_with_length(body, local.size)
            .file_name(upload_name.to_string())
            .mime_str(content_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let request = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", UPLOAD_FIELDS)])
            .multipart(form);

        let response = send(request).await?;
        let resource: FileResource = response.json().await?;
        let uploaded = RemoteFile::try_from(resource)?;
        info!(
            name = %uploaded.name,
            id = %uploaded.id,
            size = local.size,
            "uploaded file"
        );
        Ok(uploaded)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let token = self.auth.access_token().await?;

        let request = self
            .http
            .delete(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token);

        send(request).await.map_err(|e| match e {
            DriveError::NotFound(_) => DriveError::NotFound(file_id.to_string()),
            other => other,
        })?;
        Ok(())
    }
}

/// Send a request, turning non-success responses into typed errors.
async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    Err(DriveError::from_response(status.as_u16(), &error_body))
}
