//! Browser authorization for installed applications.
//!
//! The user opens the printed URL, consents, and Google redirects the browser
//! to a listener on `127.0.0.1`. The code from that redirect is exchanged for
//! tokens at the secret's `token_uri`.

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};
use url::Url;

use crate::config::AuthConfig;
use crate::error::{DriveError, Result};
use crate::models::{ApplicationSecret, TokenResponse};

/// What a request to the loopback listener carried.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Callback {
    /// Not the redirect (favicon and the like).
    Ignored,
    Code { code: String, state: Option<String> },
    Denied(String),
    MissingCode,
}

/// A listener waiting for the browser redirect.
pub struct PendingAuthorization {
    listener: TcpListener,
    state: String,
    redirect_uri: String,
    url: Url,
}

impl PendingAuthorization {
    /// URL the user has to open.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn state(&self) -> &str {
        &self.state
    }
}

pub struct InstalledFlow<'a> {
    secret: &'a ApplicationSecret,
    config: &'a AuthConfig,
    http: &'a Client,
}

impl<'a> InstalledFlow<'a> {
    pub fn new(secret: &'a ApplicationSecret, config: &'a AuthConfig, http: &'a Client) -> Self {
        Self {
            secret,
            config,
            http,
        }
    }

    /// Run the whole flow: listen, print the URL, wait, exchange the code.
    pub async fn run(&self) -> Result<TokenResponse> {
        let pending = self.start().await?;
        eprintln!(
            "Please open the following address in your browser:\n  {}",
            pending.url()
        );
        self.finish(pending).await
    }

    /// Bind the loopback listener and build the authorization URL.
    ///
    /// Port 0 picks a free port; the redirect URI always names the bound one.
    pub async fn start(&self) -> Result<PendingAuthorization> {
        let port = self.config.callback_port;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| DriveError::Auth(format!("cannot listen on 127.0.0.1:{}: {}", port, e)))?;
        let bound = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{}{}", bound, self.config.callback_path);
        let state = random_state();
        let url = self.authorization_url(&redirect_uri, &state)?;
        info!(port = bound, "waiting for authorization redirect");

        Ok(PendingAuthorization {
            listener,
            state,
            redirect_uri,
            url,
        })
    }

    /// Wait for the redirect and exchange its code.
    pub async fn finish(&self, pending: PendingAuthorization) -> Result<TokenResponse> {
        let code = tokio::time::timeout(
            self.config.authorization_timeout,
            self.receive_code(&pending.listener, &pending.state),
        )
        .await
        .map_err(|_| DriveError::Auth("timed out waiting for the browser redirect".to_string()))??;

        self.exchange_code(&code, &pending.redirect_uri).await
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.secret.auth_uri)
            .map_err(|e| DriveError::Config(format!("invalid auth_uri: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.secret.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", self.config.access_type.as_str())
            .append_pair("state", state);
        Ok(url)
    }

    async fn receive_code(&self, listener: &TcpListener, state: &str) -> Result<String> {
        loop {
            let (mut stream, peer) = listener.accept().await?;
            let mut buf = vec![0u8; 8192];
            let read = stream.read(&mut buf).await?;
            let request = String::from_utf8_lossy(&buf[..read]);
            debug!(%peer, "loopback request");

            match parse_callback(&request, &self.config.callback_path) {
                Callback::Ignored => {
                    respond(&mut stream, "404 Not Found", "Not found").await;
                }
                Callback::Denied(reason) => {
                    respond(&mut stream, "200 OK", "Authorization was denied.").await;
                    return Err(DriveError::Auth(format!("authorization denied: {}", reason)));
                }
                Callback::MissingCode => {
                    respond(&mut stream, "400 Bad Request", "Authorization code missing.").await;
                    return Err(DriveError::Auth(
                        "authorization code missing in redirect".to_string(),
                    ));
                }
                Callback::Code {
                    code,
                    state: returned,
                } => {
                    if returned.as_deref() != Some(state) {
                        respond(&mut stream, "400 Bad Request", "State mismatch.").await;
                        return Err(DriveError::Auth(
                            "state mismatch in authorization redirect".to_string(),
                        ));
                    }
                    respond(
                        &mut stream,
                        "200 OK",
                        "Authorization complete. You can close this window.",
                    )
                    .await;
                    return Ok(code);
                }
            }
        }
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
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
            return Err(DriveError::Auth(format!(
                "code exchange failed ({}): {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

/// Classify the raw HTTP request received by the loopback listener.
pub(crate) fn parse_callback(request: &str, callback_path: &str) -> Callback {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return Callback::Ignored;
    };
    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return Callback::Ignored;
    };
    if url.path() != callback_path {
        return Callback::Ignored;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Callback::Denied(error);
    }
    match code {
        Some(code) => Callback::Code { code, state },
        None => Callback::MissingCode,
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

async fn respond(stream: &mut TcpStream, status: &str, message: &str) {
    let body = format!("<html><body><h2>{}</h2></body></html>", message);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
