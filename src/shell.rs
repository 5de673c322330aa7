//! Interactive text menu on top of the upload coordinator.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::clock::Clock;
use crate::config::{folder_or_default, DEFAULT_FOLDER};
use crate::coordinator::{UploadCoordinator, UploadOutcome};
use crate::error::Result;
use crate::gateway::DriveGateway;
use crate::models::{format_size, Folder, FolderView, RetentionReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Upload,
    List,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Upload),
            "2" => Some(MenuChoice::List),
            "3" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// Strip one pair of surrounding double quotes, as pasted from a file manager.
pub fn unquote(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Print a folder listing, newest first.
pub fn write_listing<W: Write>(out: &mut W, view: &FolderView) -> std::io::Result<()> {
    writeln!(out, "\n=== Files in folder ===")?;
    writeln!(out, "Total files: {} (cap {})", view.len(), view.cap)?;
    if view.is_empty() {
        writeln!(out, "No files found in the folder.")?;
        return Ok(());
    }
    writeln!(out, "Files (sorted by creation time - newest first):")?;
    for (i, file) in view.files.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, file)?;
    }
    writeln!(out, "========================\n")
}

pub fn write_report<W: Write>(out: &mut W, report: &RetentionReport) -> std::io::Result<()> {
    if report.deleted.is_empty() {
        return writeln!(out, "Folder holds {} file(s); nothing to delete.", report.kept);
    }
    writeln!(
        out,
        "Deleted {} oldest file(s) to maintain the limit:",
        report.deleted.len()
    )?;
    for file in &report.deleted {
        writeln!(out, "  Deleted: {}", file)?;
    }
    writeln!(out, "Files remaining: {}", report.kept)
}

pub fn write_outcome<W: Write>(out: &mut W, outcome: &UploadOutcome) -> std::io::Result<()> {
    writeln!(
        out,
        "Uploaded {} ({}) as:",
        outcome.local.name,
        format_size(outcome.local.size)
    )?;
    writeln!(out, "  Name: {}", outcome.uploaded.name)?;
    writeln!(out, "  ID: {}", outcome.uploaded.id)?;
    match &outcome.retention {
        Ok(report) => write_report(out, report),
        Err(err) => {
            writeln!(out, "Upload succeeded but retention failed: {}", err)?;
            for file in &err.deleted {
                writeln!(out, "  Deleted: {}", file)?;
            }
            if let Some(remaining) = err.remaining {
                writeln!(out, "Files remaining: {}", remaining)?;
            }
            Ok(())
        }
    }
}

/// Line-oriented menu loop.
pub struct Shell<'a, G: ?Sized, C, R, W> {
    coordinator: UploadCoordinator<'a, G, C>,
    cap: usize,
    input: R,
    output: W,
}

impl<'a, G, C, R, W> Shell<'a, G, C, R, W>
where
    G: DriveGateway + ?Sized,
    C: Clock,
    R: BufRead,
    W: Write,
{
    pub fn new(coordinator: UploadCoordinator<'a, G, C>, cap: usize, input: R, output: W) -> Self {
        Self {
            coordinator,
            cap,
            input,
            output,
        }
    }

    /// Run until the user exits or input ends.
    ///
    /// Authorization failures end the loop with an error; anything else is
    /// reported and the menu comes back.
    pub async fn run(&mut self, preset_folder: Option<&str>) -> Result<()> {
        writeln!(self.output, "=== Google Drive File Manager ===")?;
        writeln!(
            self.output,
            "Uploads go to one folder that keeps at most {} files; the oldest are deleted first.\n",
            self.cap
        )?;

        let folder_name = match preset_folder {
            Some(name) => folder_or_default(Some(name)).to_string(),
            None => {
                self.prompt(&format!(
                    "Enter the folder name (default: '{}'): ",
                    DEFAULT_FOLDER
                ))?;
                match self.read_line()? {
                    Some(line) => folder_or_default(Some(&line)).to_string(),
                    None => return Ok(()),
                }
            }
        };

        let folder = self
            .coordinator
            .resolve_folder(&folder_name)
            .await
            .map_err(|e| e.source)?;
        writeln!(
            self.output,
            "Working with folder: {} (ID: {})",
            folder.name, folder.id
        )?;
        self.show_listing(&folder).await?;

        loop {
            writeln!(self.output, "Choose an option:")?;
            writeln!(self.output, "1. Upload a file")?;
            writeln!(self.output, "2. List files in folder")?;
            writeln!(self.output, "3. Exit")?;
            self.prompt("Enter your choice (1-3): ")?;

            let Some(line) = self.read_line()? else {
                writeln!(self.output, "Goodbye!")?;
                return Ok(());
            };

            match MenuChoice::parse(&line) {
                Some(MenuChoice::Upload) => self.upload(&folder).await?,
                Some(MenuChoice::List) => self.show_listing(&folder).await?,
                Some(MenuChoice::Exit) => {
                    writeln!(self.output, "Goodbye!")?;
                    return Ok(());
                }
                None => writeln!(self.output, "Invalid choice. Please enter 1, 2, or 3.\n")?,
            }
        }
    }

    async fn upload(&mut self, folder: &Folder) -> Result<()> {
        self.prompt("Enter the path to the file you want to upload: ")?;
        let Some(line) = self.read_line()? else {
            return Ok(());
        };
        let path = unquote(&line);
        if path.is_empty() {
            writeln!(self.output, "Error: no path given.\n")?;
            return Ok(());
        }

        match self
            .coordinator
            .upload_into(Path::new(path), folder, self.cap)
            .await
        {
            Ok(outcome) => {
                write_outcome(&mut self.output, &outcome)?;
                if let Err(err) = outcome.retention {
                    if err.is_fatal() {
                        return Err(err.source);
                    }
                    writeln!(self.output)?;
                    return Ok(());
                }
                writeln!(self.output, "Upload complete!")?;
                self.show_listing(folder).await
            }
            Err(err) if err.is_fatal() => Err(err.source),
            Err(err) => {
                writeln!(self.output, "Error: {}\n", err)?;
                Ok(())
            }
        }
    }

    async fn show_listing(&mut self, folder: &Folder) -> Result<()> {
        match self.coordinator.list_folder(&folder.id, self.cap).await {
            Ok(view) => write_listing(&mut self.output, &view)?,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => writeln!(self.output, "Error listing files: {}\n", err)?,
        }
        Ok(())
    }

    fn prompt(&mut self, text: &str) -> Result<()> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}
