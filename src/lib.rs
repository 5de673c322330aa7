//! drive_rotate - upload files to a Google Drive folder that keeps only the
//! newest N of them.
//!
//! This library provides:
//! - An installed-app OAuth session with a cached refresh token
//! - A Drive client for folder lookup, listing, upload and delete
//! - Retention that deletes the oldest files once a folder exceeds its cap
//! - An upload pipeline and an interactive menu built on top of them
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use drive_rotate::{AppConfig, Authenticator, DriveClient, SystemClock, UploadCoordinator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!     let auth = Authenticator::obtain(&config.auth).await?;
//!     let client = DriveClient::new(auth, config.request_timeout)?;
//!     let coordinator = UploadCoordinator::new(&client, SystemClock::utc());
//!
//!     let outcome = coordinator
//!         .upload_and_enforce(Path::new("report.pdf"), "myfiles", config.cap)
//!         .await?;
//!     println!("uploaded {}", outcome.uploaded.name);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fixtures;
pub mod gateway;
pub mod installed_flow;
pub mod mime;
pub mod models;
pub mod naming;
pub mod retention;
pub mod shell;

// Re-exports for convenience
pub use auth::{Authenticator, TokenStore};
pub use client::DriveClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AccessType, AppConfig, AuthConfig};
pub use coordinator::{UploadCoordinator, UploadError, UploadOutcome, UploadStage};
pub use error::{DriveError, Result};
pub use gateway::DriveGateway;
pub use models::{Folder, FolderView, LocalFile, RemoteFile, RetentionReport};
pub use retention::{RetentionError, RetentionManager};
pub use shell::Shell;
