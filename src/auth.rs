//! OAuth2 authentication for an installed application.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::{DriveError, Result};
use crate::installed_flow::InstalledFlow;
use crate::models::{
    ApplicationSecret, ClientSecretFile, OAuthErrorResponse, StoredCredential, TokenResponse,
};

/// Name of the credential file inside the token store directory.
const CREDENTIAL_FILE: &str = "StoredCredential.json";

/// Refresh this long before the access token actually expires.
const EXPIRY_BUFFER: Duration = Duration::seconds(60);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Load the client secret downloaded from the Google Cloud console.
pub fn load_secret<P: AsRef<Path>>(path: P) -> Result<ApplicationSecret> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        DriveError::Config(format!(
            "cannot read client secret {}: {}",
            path.display(),
            e
        ))
    })?;
    let file: ClientSecretFile = serde_json::from_str(&content)?;
    file.into_secret().ok_or_else(|| {
        DriveError::Config(format!(
            "{} has neither an \"installed\" nor a \"web\" section",
            path.display()
        ))
    })
}

impl StoredCredential {
    /// Build a credential from a token endpoint response.
    ///
    /// Refresh responses usually omit the refresh token, so the previous one
    /// is carried over.
    pub fn from_response(
        response: TokenResponse,
        previous_refresh_token: Option<String>,
        requested_scopes: &[String],
        now: OffsetDateTime,
    ) -> Self {
        let lifetime = response
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let scopes = match response.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => requested_scopes.to_vec(),
        };

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh_token),
            expires_at: now + Duration::seconds(lifetime),
            scopes,
        }
    }

    /// Whether the access token is still usable at `now`.
    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at - EXPIRY_BUFFER > now
    }

    /// Whether every scope in `scopes` was granted.
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.scopes.contains(s))
    }
}

/// Directory-backed cache for the OAuth credential.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn credential_path(&self) -> PathBuf {
        self.dir.join(CREDENTIAL_FILE)
    }

    /// Read the stored credential. An unreadable file counts as absent.
    pub async fn load(&self) -> Result<Option<StoredCredential>> {
        let path = self.credential_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(credential) => Ok(Some(credential)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt credential file");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, credential: &StoredCredential) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.dir.join(format!("{}.tmp", CREDENTIAL_FILE));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(credential)?).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, self.credential_path()).await?;
        debug!(dir = %self.dir.display(), "credential saved");
        Ok(())
    }

    /// Remove the stored credential. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(self.credential_path()).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Authenticated session for Google APIs.
///
/// Holds the current credential and refreshes it when it is about to expire.
/// Refreshes are serialized behind a write lock.
#[derive(Clone)]
pub struct Authenticator {
    secret: Arc<ApplicationSecret>,
    store: Option<Arc<TokenStore>>,
    http: Client,
    credential: Arc<RwLock<StoredCredential>>,
}

impl Authenticator {
    /// Obtain a session, running the browser flow if no usable credential is
    /// cached in the token store.
    pub async fn obtain(config: &AuthConfig) -> Result<Self> {
        config.validate()?;
        let secret = load_secret(&config.credentials)?;
        let store = TokenStore::new(&config.token_store);
        let http = Client::new();
        let now = OffsetDateTime::now_utc();

        let credential = match store.load().await? {
            Some(stored)
                if stored.covers(&config.scopes)
                    && (stored.refresh_token.is_some() || stored.is_fresh(now)) =>
            {
                debug!(path = %store.credential_path().display(), "using stored credential");
                stored
            }
            _ => {
                let flow = InstalledFlow::new(&secret, config, &http);
                let response = flow.run().await?;
                let credential = StoredCredential::from_response(
                    response,
                    None,
                    &config.scopes,
                    OffsetDateTime::now_utc(),
                );
                store.save(&credential).await?;
                info!(dir = %store.dir().display(), "authorization complete");
                credential
            }
        };

        Ok(Self::with_parts(secret, credential, Some(store), http))
    }

    /// Create an authenticator from an existing credential.
    ///
    /// Without a store, refreshed tokens live only in memory.
    pub fn new(
        secret: ApplicationSecret,
        credential: StoredCredential,
        store: Option<TokenStore>,
    ) -> Self {
        Self::with_parts(secret, credential, store, Client::new())
    }

    fn with_parts(
        secret: ApplicationSecret,
        credential: StoredCredential,
        store: Option<TokenStore>,
        http: Client,
    ) -> Self {
        Self {
            secret: Arc::new(secret),
            store: store.map(Arc::new),
            http,
            credential: Arc::new(RwLock::new(credential)),
        }
    }

    /// Forget the cached credential for `config`.
    pub async fn logout(config: &AuthConfig) -> Result<bool> {
        TokenStore::new(&config.token_store).clear().await
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.credential.read().await;
            if cached.is_fresh(OffsetDateTime::now_utc()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cached = self.credential.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if cached.is_fresh(OffsetDateTime::now_utc()) {
            return Ok(cached.access_token.clone());
        }

        let refresh_token = cached.refresh_token.clone().ok_or_else(|| {
            DriveError::Auth(
                "access token expired and no refresh token is stored; log out and authorize again"
                    .to_string(),
            )
        })?;
        let refreshed = self.refresh(&refresh_token, &cached.scopes).await?;
        if let Some(store) = &self.store {
            store.save(&refreshed).await?;
        }
        *cached = refreshed;
        Ok(cached.access_token.clone())
    }

    async fn refresh(&self, refresh_token: &str, scopes: &[String]) -> Result<StoredCredential> {
        debug!("refreshing access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.secret.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let oauth_error = serde_json::from_str::<OAuthErrorResponse>(&body).ok();

            if oauth_error.as_ref().is_some_and(|e| e.error == "invalid_grant") {
                if let Some(store) = &self.store {
                    store.clear().await?;
                    warn!("refresh token was rejected; stored credential removed");
                }
            }

            let message = match oauth_error {
                Some(OAuthErrorResponse {
                    error,
                    error_description: Some(description),
                }) => format!("{}: {}", error, description),
                Some(e) => e.error,
                None => body,
            };
            return Err(DriveError::Auth(format!(
                "token refresh failed ({}): {}",
                status, message
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(StoredCredential::from_response(
            token,
            Some(refresh_token.to_string()),
            scopes,
            OffsetDateTime::now_utc(),
        ))
    }
}
