//! In-memory Drive used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use drive_rotate::{DriveError, DriveGateway, Folder, LocalFile, RemoteFile, Result};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

/// Failure to inject into the next matching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    NotFound,
    Auth,
    Quota,
}

impl Failure {
    fn to_error(self, what: &str) -> DriveError {
        match self {
            Failure::Transient => DriveError::TransientIo(format!("{what}: connection reset")),
            Failure::NotFound => DriveError::NotFound(what.to_string()),
            Failure::Auth => DriveError::Auth(format!("{what}: token revoked")),
            Failure::Quota => DriveError::Quota(format!("{what}: storage quota exceeded")),
        }
    }
}

#[derive(Default)]
struct State {
    folders: Vec<Folder>,
    files: Vec<RemoteFile>,
    next_id: u64,
    next_created: Option<OffsetDateTime>,
    delete_failures: HashMap<String, Failure>,
    upload_failure: Option<Failure>,
    list_failure: Option<Failure>,
    find_failure: Option<Failure>,
    deleted: Vec<String>,
    uploads: Vec<(String, String, String)>,
    calls: Vec<String>,
}

pub const START: OffsetDateTime = datetime!(2025-03-14 9:00 UTC);

/// A drive whose server clock advances one second per created file.
#[derive(Default)]
pub struct FakeDrive {
    state: Mutex<State>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(state: &mut State) -> (String, OffsetDateTime) {
        state.next_id += 1;
        let created = state.next_created.unwrap_or(START);
        state.next_created = Some(created + Duration::seconds(1));
        (format!("file-{:04}", state.next_id), created)
    }

    pub fn add_folder(&self, id: &str, name: &str) -> Folder {
        let folder = Folder {
            id: id.to_string(),
            name: name.to_string(),
        };
        self.state.lock().unwrap().folders.push(folder.clone());
        folder
    }

    /// Put `count` files into `folder_id`, each one second newer than the last.
    pub fn seed(&self, folder_id: &str, count: usize) -> Vec<RemoteFile> {
        let mut state = self.state.lock().unwrap();
        (0..count)
            .map(|i| {
                let (id, created) = Self::tick(&mut state);
                let file = RemoteFile {
                    id,
                    name: format!("seed-{i}.txt"),
                    created_time: created,
                    mime_type: Some("text/plain".to_string()),
                    parent_id: Some(folder_id.to_string()),
                };
                state.files.push(file.clone());
                file
            })
            .collect()
    }

    /// Insert a file with an explicit id and creation time.
    pub fn insert(&self, folder_id: &str, id: &str, created: OffsetDateTime) -> RemoteFile {
        let file = RemoteFile {
            id: id.to_string(),
            name: format!("{id}.txt"),
            created_time: created,
            mime_type: None,
            parent_id: Some(folder_id.to_string()),
        };
        self.state.lock().unwrap().files.push(file.clone());
        file
    }

    pub fn fail_delete(&self, file_id: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .delete_failures
            .insert(file_id.to_string(), failure);
    }

    pub fn fail_next_upload(&self, failure: Failure) {
        self.state.lock().unwrap().upload_failure = Some(failure);
    }

    pub fn fail_next_list(&self, failure: Failure) {
        self.state.lock().unwrap().list_failure = Some(failure);
    }

    pub fn fail_next_find(&self, failure: Failure) {
        self.state.lock().unwrap().find_failure = Some(failure);
    }

    pub fn children(&self, folder_id: &str) -> Vec<RemoteFile> {
        self.state
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|f| f.parent_id.as_deref() == Some(folder_id))
            .cloned()
            .collect()
    }

    pub fn folders(&self) -> Vec<Folder> {
        self.state.lock().unwrap().folders.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// (upload name, parent id, content type) for every upload.
    pub fn uploads(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl DriveGateway for FakeDrive {
    async fn find_folder_by_name(&self, name: &str) -> Result<Option<Folder>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("find_folder".to_string());
        if let Some(failure) = state.find_failure.take() {
            return Err(failure.to_error(name));
        }
        Ok(state.folders.iter().find(|f| f.name == name).cloned())
    }

    async fn create_folder(&self, name: &str) -> Result<Folder> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create_folder".to_string());
        state.next_id += 1;
        let folder = Folder {
            id: format!("folder-{:04}", state.next_id),
            name: name.to_string(),
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_children".to_string());
        if let Some(failure) = state.list_failure.take() {
            return Err(failure.to_error(folder_id));
        }
        let mut files: Vec<RemoteFile> = state
            .files
            .iter()
            .filter(|f| f.parent_id.as_deref() == Some(folder_id))
            .cloned()
            .collect();
        // Listing order is unspecified; make sure nobody relies on it.
        files.reverse();
        Ok(files)
    }

    async fn upload_file(
        &self,
        local: &LocalFile,
        parent_id: &str,
        upload_name: &str,
        content_type: &str,
    ) -> Result<RemoteFile> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("upload_file".to_string());
        if let Some(failure) = state.upload_failure.take() {
            return Err(failure.to_error(&local.name));
        }
        let (id, created) = Self::tick(&mut state);
        let file = RemoteFile {
            id,
            name: upload_name.to_string(),
            created_time: created,
            mime_type: Some(content_type.to_string()),
            parent_id: Some(parent_id.to_string()),
        };
        state.files.push(file.clone());
        state.uploads.push((
            upload_name.to_string(),
            parent_id.to_string(),
            content_type.to_string(),
        ));
        Ok(file)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("delete_file".to_string());
        match state.delete_failures.remove(file_id) {
            Some(Failure::NotFound) => {
                // Someone else removed it first.
                state.files.retain(|f| f.id != file_id);
                return Err(Failure::NotFound.to_error(file_id));
            }
            Some(failure) => return Err(failure.to_error(file_id)),
            None => {}
        }
        let before = state.files.len();
        state.files.retain(|f| f.id != file_id);
        if state.files.len() == before {
            return Err(DriveError::NotFound(file_id.to_string()));
        }
        state.deleted.push(file_id.to_string());
        Ok(())
    }
}

/// Write a small local file and return its path.
pub fn local_file(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"hello drive").unwrap();
    path
}
