//! drive_rotate CLI - upload files to a Google Drive folder that keeps the newest N.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use glob::glob;
use tracing_subscriber::EnvFilter;

use drive_rotate::config::{
    AccessType, AppConfig, AuthConfig, DEFAULT_AUTHORIZATION_TIMEOUT, DEFAULT_CALLBACK_PATH,
    DEFAULT_CALLBACK_PORT, DEFAULT_CAP, DEFAULT_CREDENTIALS_PATH, DEFAULT_TOKEN_DIR,
    DRIVE_FILE_SCOPE,
};
use drive_rotate::fixtures::{self, DEFAULT_FIXTURE_DIR};
use drive_rotate::shell::{write_listing, write_outcome, write_report};
use drive_rotate::{
    Authenticator, Clock, DriveClient, Shell, SystemClock, UploadCoordinator,
};

/// Upload files to a Google Drive folder that keeps at most N files.
#[derive(Parser)]
#[command(name = "drive_rotate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the OAuth client secret JSON (installed application).
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", default_value = DEFAULT_CREDENTIALS_PATH)]
    credentials: PathBuf,

    /// Directory where the authorization is cached.
    #[arg(long, env = "DRIVE_ROTATE_TOKENS", default_value = DEFAULT_TOKEN_DIR)]
    tokens_dir: PathBuf,

    /// Local port for the authorization redirect.
    #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
    port: u16,

    /// Path for the authorization redirect.
    #[arg(long, default_value = DEFAULT_CALLBACK_PATH)]
    callback_path: String,

    /// OAuth scope to request (repeatable).
    #[arg(long = "scope")]
    scopes: Vec<String>,

    #[arg(long, value_enum, default_value_t = AccessType::Offline)]
    access_type: AccessType,

    /// Maximum number of files kept in the folder.
    #[arg(long, env = "DRIVE_ROTATE_CAP", default_value_t = DEFAULT_CAP)]
    cap: usize,

    /// Target folder name (prompted for when omitted in interactive mode).
    #[arg(long, short = 'f', env = "DRIVE_ROTATE_FOLDER")]
    folder: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files, then enforce the cap.
    Upload {
        /// File patterns to upload (supports glob patterns like *.tar, file_{1,2,3}.txt).
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// List files in the folder, newest first.
    List,

    /// Delete the oldest files until the folder is within the cap.
    Enforce,

    /// Write sample files to upload.
    GenerateFixtures {
        #[arg(default_value = DEFAULT_FIXTURE_DIR)]
        dir: PathBuf,
    },

    /// Remove the cached authorization.
    Logout,
}

impl Cli {
    fn app_config(&self) -> AppConfig {
        let scopes = if self.scopes.is_empty() {
            vec![DRIVE_FILE_SCOPE.to_string()]
        } else {
            self.scopes.clone()
        };

        AppConfig {
            auth: AuthConfig {
                credentials: self.credentials.clone(),
                token_store: self.tokens_dir.clone(),
                callback_port: self.port,
                callback_path: self.callback_path.clone(),
                scopes,
                access_type: self.access_type,
                authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            },
            cap: self.cap,
            folder: self.folder.clone(),
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("drive_rotate={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Resolve the local offset before anything can spawn a thread.
    let clock = SystemClock::local();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.app_config();
    config.validate().context("Invalid configuration")?;

    match &cli.command {
        Some(Commands::GenerateFixtures { dir }) => {
            let written = fixtures::generate(dir, clock.now())
                .with_context(|| format!("Failed to create fixtures in {:?}", dir))?;
            println!("Created {} test file(s) in {:?}:", written.len(), dir);
            for path in written {
                println!("  {}", path.display());
            }
            return Ok(());
        }
        Some(Commands::Logout) => {
            let removed = Authenticator::logout(&config.auth)
                .await
                .context("Failed to remove cached authorization")?;
            if removed {
                println!("Cached authorization removed.");
            } else {
                println!("No cached authorization found.");
            }
            return Ok(());
        }
        _ => {}
    }

    let auth = Authenticator::obtain(&config.auth)
        .await
        .with_context(|| format!("Failed to authorize with {:?}", config.auth.credentials))?;
    let client = DriveClient::new(auth, config.request_timeout)?;
    let coordinator = UploadCoordinator::new(&client, clock);

    match cli.command {
        None => {
            let stdin = io::stdin();
            let mut shell = Shell::new(coordinator, config.cap, stdin.lock(), io::stdout());
            shell.run(config.folder.as_deref()).await?;
        }

        Some(Commands::List) => {
            let folder = coordinator
                .resolve_folder(config.folder_name())
                .await?;
            let view = coordinator
                .list_folder(&folder.id, config.cap)
                .await
                .with_context(|| format!("Failed to list files in folder: {}", folder.name))?;
            write_listing(&mut io::stdout(), &view)?;
        }

        Some(Commands::Enforce) => {
            let folder = coordinator
                .resolve_folder(config.folder_name())
                .await?;
            let report = coordinator.enforce(&folder.id, config.cap).await?;
            write_report(&mut io::stdout(), &report)?;
        }

        Some(Commands::Upload { patterns }) => {
            let files_to_upload = expand_patterns(&patterns)?;
            if files_to_upload.is_empty() {
                anyhow::bail!("No files to upload");
            }

            let folder = coordinator
                .resolve_folder(config.folder_name())
                .await?;
            println!(
                "Uploading {} file(s) to {} (ID: {})...",
                files_to_upload.len(),
                folder.name,
                folder.id
            );

            let mut failures = 0;
            let mut stdout = io::stdout();
            for (idx, file_path) in files_to_upload.iter().enumerate() {
                println!(
                    "[{}/{}] {}",
                    idx + 1,
                    files_to_upload.len(),
                    file_path.display()
                );

                match coordinator.upload_into(file_path, &folder, config.cap).await {
                    Ok(outcome) => {
                        write_outcome(&mut stdout, &outcome)?;
                        if let Err(err) = outcome.retention {
                            if err.is_fatal() {
                                return Err(err.into());
                            }
                            failures += 1;
                        }
                    }
                    Err(err) if err.is_fatal() => return Err(err.into()),
                    Err(err) => {
                        failures += 1;
                        eprintln!("  Error: {}", err);
                    }
                }
                stdout.flush()?;
            }

            if failures > 0 {
                anyhow::bail!("{} of {} upload(s) did not complete", failures, files_to_upload.len());
            }
            println!("Done.");
        }

        Some(Commands::GenerateFixtures { .. }) | Some(Commands::Logout) => {}
    }

    Ok(())
}

/// Expand glob and brace patterns into a sorted, de-duplicated file list.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        for expanded_pattern in expand_braces(pattern) {
            let matches: Vec<PathBuf> = glob(&expanded_pattern)
                .with_context(|| format!("Invalid glob pattern: {}", expanded_pattern))?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file())
                .collect();

            if matches.is_empty() {
                // No glob match: pass the literal path on so the upload
                // reports why it can't be used.
                files.push(PathBuf::from(&expanded_pattern));
            } else {
                files.extend(matches);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| {
                    let expanded = format!("{}{}{}", prefix, alt.trim(), suffix);
                    expand_braces(&expanded)
                })
                .collect();
        }
    }

    vec![pattern.to_string()]
}
