//! Sample files for trying out uploads and rotation by hand.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::error::Result;

/// Directory used when none is given.
pub const DEFAULT_FIXTURE_DIR: &str = "test-files";

fn human_timestamp(now: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    now.format(format).unwrap_or_else(|_| now.to_string())
}

fn fixtures(ts: &str) -> Result<Vec<(&'static str, String)>> {
    let config = json!({
        "application": "drive_rotate",
        "version": "1.0",
        "created": ts,
        "settings": {
            "maxFiles": 10,
            "autoCleanup": true,
            "uniqueNaming": true
        }
    });

    Ok(vec![
        (
            "sample-document.txt",
            format!(
                "Sample Document\n\
                 ================\n\n\
                 This is a test document created on {ts}\n\n\
                 Upload it to check that files land in the target folder.\n\n\
                 Things to watch:\n\
                 - File upload to Google Drive\n\
                 - Automatic folder management\n\
                 - File cleanup when limit exceeded\n\
                 - Unique file naming with timestamps"
            ),
        ),
        (
            "notes.txt",
            format!(
                "Notes\n\
                 =====\n\n\
                 Created: {ts}\n\n\
                 Sample notes for testing file upload."
            ),
        ),
        (
            "data.csv",
            format!(
                "Name,Age,City,Date\n\
                 John Doe,25,New York,{ts}\n\
                 Jane Smith,30,Los Angeles,{ts}\n\
                 Bob Johnson,35,Chicago,{ts}\n\
                 Alice Brown,28,Houston,{ts}"
            ),
        ),
        ("config.json", serde_json::to_string_pretty(&config)?),
        (
            "readme.md",
            format!(
                "# Test File\n\n\
                 This is a markdown test file created on {ts}\n\n\
                 ## Purpose\n\
                 Exercise uploads and the automatic cleanup of old files.\n\n\
                 ## Usage\n\
                 Upload this file a few times and watch the oldest copies disappear."
            ),
        ),
    ])
}

/// Write the sample files into `dir`, creating it if needed.
///
/// Existing files with the same names are overwritten.
pub fn generate(dir: &Path, now: OffsetDateTime) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let ts = human_timestamp(now);

    let mut written = Vec::new();
    for (name, content) in fixtures(&ts)? {
        let path = dir.join(name);
        fs::write(&path, content)?;
        info!(path = %path.display(), "created fixture");
        written.push(path);
    }
    Ok(written)
}
