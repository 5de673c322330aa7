//! Keeps a folder at or below its file cap by deleting the oldest files.
//!
//! Age is the server-assigned creation time. Files created in the same instant
//! are ordered by id so repeated runs pick the same victims.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::DriveError;
use crate::gateway::DriveGateway;
use crate::models::{RemoteFile, RetentionReport};

/// A retention pass that stopped early.
#[derive(Debug, Error)]
#[error("retention stopped after {} deletion(s): {source}", .deleted.len())]
pub struct RetentionError {
    /// Files removed before the failure.
    pub deleted: Vec<RemoteFile>,
    /// Children still in the folder, if the listing succeeded.
    pub remaining: Option<usize>,
    pub source: DriveError,
}

impl RetentionError {
    fn listing(source: DriveError) -> Self {
        Self {
            deleted: Vec::new(),
            remaining: None,
            source,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// Sort files oldest first, ties broken by id.
pub fn sort_oldest_first(files: &mut [RemoteFile]) {
    files.sort_by(|a, b| {
        a.created_time
            .cmp(&b.created_time)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Split `files` into the ones to delete and the ones to keep.
pub fn plan_eviction(mut files: Vec<RemoteFile>, cap: usize) -> (Vec<RemoteFile>, Vec<RemoteFile>) {
    if files.len() <= cap {
        return (Vec::new(), files);
    }
    sort_oldest_first(&mut files);
    let keep = files.split_off(files.len() - cap);
    (files, keep)
}

/// Enforces the cap on a folder through a borrowed gateway.
pub struct RetentionManager<'a, G: ?Sized> {
    gateway: &'a G,
}

impl<'a, G: DriveGateway + ?Sized> RetentionManager<'a, G> {
    pub fn new(gateway: &'a G) -> Self {
        Self { gateway }
    }

    /// Delete the oldest children of `folder_id` until at most `cap` remain.
    ///
    /// A file that is already gone counts as removed. Any other failure stops
    /// the pass; calling again picks up where it left off.
    pub async fn enforce(
        &self,
        folder_id: &str,
        cap: usize,
    ) -> Result<RetentionReport, RetentionError> {
        let files = self
            .gateway
            .list_children(folder_id)
            .await
            .map_err(RetentionError::listing)?;
        let total = files.len();
        debug!(folder_id, total, cap, "checking retention");

        if total <= cap {
            return Ok(RetentionReport {
                deleted: Vec::new(),
                kept: total,
            });
        }

        let (victims, _) = plan_eviction(files, cap);
        info!(
            folder_id,
            excess = victims.len(),
            cap,
            "deleting oldest files to respect cap"
        );

        let mut deleted = Vec::with_capacity(victims.len());
        let mut already_gone = 0;
        for file in victims {
            match self.gateway.delete_file(&file.id).await {
                Ok(()) => {
                    info!(id = %file.id, name = %file.name, "deleted");
                    deleted.push(file);
                }
                Err(DriveError::NotFound(_)) => {
                    warn!(id = %file.id, "file already removed");
                    already_gone += 1;
                }
                Err(source) => {
                    let remaining = total - deleted.len() - already_gone;
                    return Err(RetentionError {
                        deleted,
                        remaining: Some(remaining),
                        source,
                    });
                }
            }
        }

        Ok(RetentionReport { deleted, kept: cap })
    }
}
