//! The remote drive operations the upload pipeline depends on.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Folder, LocalFile, RemoteFile};

/// Abstract Drive client.
///
/// Implementations walk every result page before returning; callers never see
/// partial listings.
#[async_trait]
pub trait DriveGateway: Send + Sync {
    /// Find a non-trashed folder whose name is exactly `name`.
    async fn find_folder_by_name(&self, name: &str) -> Result<Option<Folder>>;

    /// Create a folder at the drive root.
    async fn create_folder(&self, name: &str) -> Result<Folder>;

    async fn find_or_create_folder(&self, name: &str) -> Result<Folder> {
        match self.find_folder_by_name(name).await? {
            Some(folder) => Ok(folder),
            None => self.create_folder(name).await,
        }
    }

    /// All non-trashed children of a folder, in no particular order.
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>>;

    /// Upload `local` into `parent_id` under `upload_name` in one request.
    async fn upload_file(
        &self,
        local: &LocalFile,
        parent_id: &str,
        upload_name: &str,
        content_type: &str,
    ) -> Result<RemoteFile>;

    /// Permanently delete a file. Fails with `NotFound` if it is already gone.
    async fn delete_file(&self, file_id: &str) -> Result<()>;
}
