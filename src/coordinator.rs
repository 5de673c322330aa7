//! Upload pipeline: resolve folder, upload under a unique name, enforce the cap.

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{DriveError, Result};
use crate::gateway::DriveGateway;
use crate::models::{Folder, FolderView, LocalFile, RemoteFile, RetentionReport};
use crate::naming;
use crate::retention::{RetentionError, RetentionManager};

/// Step of an upload that failed before the file reached the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Validation,
    FolderResolution,
    Upload,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Validation => "file validation",
            UploadStage::FolderResolution => "folder resolution",
            UploadStage::Upload => "upload",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct UploadError {
    pub stage: UploadStage,
    pub source: DriveError,
}

impl UploadError {
    fn at(stage: UploadStage) -> impl FnOnce(DriveError) -> Self {
        move |source| Self { stage, source }
    }

    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// What happened to one uploaded file.
///
/// The upload itself succeeded; retention may still have failed.
#[derive(Debug)]
pub struct UploadOutcome {
    pub local: LocalFile,
    pub folder: Folder,
    pub uploaded: RemoteFile,
    pub retention: std::result::Result<RetentionReport, RetentionError>,
}

impl UploadOutcome {
    /// Whether retention finished too.
    pub fn is_complete(&self) -> bool {
        self.retention.is_ok()
    }
}

/// Runs uploads one at a time against a borrowed gateway.
pub struct UploadCoordinator<'a, G: ?Sized, C> {
    gateway: &'a G,
    clock: C,
}

impl<'a, G: DriveGateway + ?Sized, C: Clock> UploadCoordinator<'a, G, C> {
    pub fn new(gateway: &'a G, clock: C) -> Self {
        Self { gateway, clock }
    }

    pub fn gateway(&self) -> &'a G {
        self.gateway
    }

    /// Validate, resolve `folder_name`, upload and enforce `cap`.
    pub async fn upload_and_enforce(
        &self,
        local_path: &Path,
        folder_name: &str,
        cap: usize,
    ) -> std::result::Result<UploadOutcome, UploadError> {
        let local = LocalFile::inspect(local_path).map_err(UploadError::at(UploadStage::Validation))?;
        let folder = self.resolve_folder(folder_name).await?;
        self.upload_checked(local, folder, cap).await
    }

    /// Upload into a folder that was resolved earlier in the session.
    pub async fn upload_into(
        &self,
        local_path: &Path,
        folder: &Folder,
        cap: usize,
    ) -> std::result::Result<UploadOutcome, UploadError> {
        let local = LocalFile::inspect(local_path).map_err(UploadError::at(UploadStage::Validation))?;
        self.upload_checked(local, folder.clone(), cap).await
    }

    pub async fn resolve_folder(&self, folder_name: &str) -> std::result::Result<Folder, UploadError> {
        let folder = self
            .gateway
            .find_or_create_folder(folder_name)
            .await
            .map_err(UploadError::at(UploadStage::FolderResolution))?;
        debug!(name = folder_name, id = %folder.id, "folder resolved");
        Ok(folder)
    }

    async fn upload_checked(
        &self,
        local: LocalFile,
        folder: Folder,
        cap: usize,
    ) -> std::result::Result<UploadOutcome, UploadError> {
        let upload_name = naming::mint(&local.name, self.clock.now());
        debug!(original = %local.name, upload_name = %upload_name, "minted upload name");

        let uploaded = self
            .gateway
            .upload_file(&local, &folder.id, &upload_name, local.content_type)
            .await
            .map_err(UploadError::at(UploadStage::Upload))?;

        let retention = self.enforce(&folder.id, cap).await;
        if let Ok(report) = &retention {
            info!(
                folder = %folder.name,
                deleted = report.deleted.len(),
                kept = report.kept,
                "upload complete"
            );
        }

        Ok(UploadOutcome {
            local,
            folder,
            uploaded,
            retention,
        })
    }

    /// Run retention on its own.
    pub async fn enforce(
        &self,
        folder_id: &str,
        cap: usize,
    ) -> std::result::Result<RetentionReport, RetentionError> {
        RetentionManager::new(self.gateway).enforce(folder_id, cap).await
    }

    /// Current children of a folder, newest first.
    pub async fn list_folder(&self, folder_id: &str, cap: usize) -> Result<FolderView> {
        let files = self.gateway.list_children(folder_id).await?;
        Ok(FolderView::new(folder_id, cap, files))
    }
}
