//! OAuth2 credential management for the Gmail API
//!
//! The stored credential is a small JSON document holding the access token,
//! its expiry, the refresh token and the OAuth client it was issued to, so an
//! expired token can be refreshed without the client-secret file.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use google_gmail1::yup_oauth2::storage::{TokenInfo, TokenStorage};
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{GmailError, Result};

/// Read/write access without permanent deletion; enough to list, read and trash
pub const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

pub const REQUIRED_SCOPES: &[&str] = &[MODIFY_SCOPE];

/// Tokens this close to expiry are treated as expired
const EXPIRY_SKEW_SECS: i64 = 60;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Persisted OAuth2 credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// A token is valid when present and not about to expire; no expiry means no limit
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now,
            None => true,
        }
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.client_id.as_deref().is_some_and(|c| !c.is_empty())
            && self.client_secret.is_some()
    }

    /// Load the stored credential
    ///
    /// A missing file is `None`. So is an unreadable one: it gets regenerated
    /// by the next login.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!("Ignoring unreadable credential file {:?}: {}", path, e);
                Ok(None)
            }
        }
    }

    /// Write the credential through a temp file and rename it into place
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");

        if let Err(e) = write_private(&tmp_path, json.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp_path, path).await?;

        debug!("Saved credential to {:?}", path);
        Ok(())
    }
}

async fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    secure_token_file(path).await
}

/// What the stored credential allows the authenticator to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    /// Usable as-is
    Valid(Credential),
    /// Expired, but carries what is needed to refresh silently
    Refreshable(Credential),
    /// Absent or unusable; an interactive login is required
    Missing,
}

pub fn assess_credential(stored: Option<Credential>, now: DateTime<Utc>) -> CredentialState {
    match stored {
        Some(credential) if credential.is_valid(now) => CredentialState::Valid(credential),
        Some(credential) if credential.is_refreshable() => CredentialState::Refreshable(credential),
        _ => CredentialState::Missing,
    }
}

/// OAuth client identity copied into every persisted credential
#[derive(Debug, Clone)]
struct OAuthClient {
    client_id: String,
    client_secret: String,
}

/// yup-oauth2 token storage that persists into the credential file
struct CredentialStore {
    path: PathBuf,
    client: OAuthClient,
    current: Mutex<Option<TokenInfo>>,
    refresh_token: Mutex<Option<String>>,
}

impl CredentialStore {
    fn new(path: &Path, client: OAuthClient, refresh_token: Option<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            client,
            current: Mutex::new(None),
            refresh_token: Mutex::new(refresh_token),
        }
    }

    /// Store that starts out serving the stored credential's token
    fn seeded(path: &Path, client: OAuthClient, credential: &Credential) -> Self {
        let store = Self::new(path, client, credential.refresh_token.clone());
        *store
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = seed_token(credential);
        store
    }

    fn credential_from(&self, token: &TokenInfo, scopes: &[&str]) -> Credential {
        let mut known_refresh = self
            .refresh_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Refresh responses usually omit the refresh token; keep the one we had
        if let Some(refresh) = token.refresh_token.clone() {
            *known_refresh = Some(refresh);
        }

        Credential {
            token: token.access_token.clone().unwrap_or_default(),
            refresh_token: known_refresh.clone(),
            expiry: token
                .expires_at
                .and_then(|at| DateTime::<Utc>::from_timestamp(at.unix_timestamp(), 0)),
            client_id: Some(self.client.client_id.clone()),
            client_secret: Some(self.client.client_secret.clone()),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TokenStorage for CredentialStore {
    async fn set(&self, scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        let credential = self.credential_from(&token, scopes);
        credential
            .save(&self.path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to store credential: {}", e))?;

        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
        info!("Stored refreshed credential at {:?}", self.path);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// The stored access token in yup-oauth2's form, so the authenticator
/// serves it until expiry and refreshes it afterwards
fn seed_token(credential: &Credential) -> Option<TokenInfo> {
    if credential.token.is_empty() {
        return None;
    }
    Some(TokenInfo {
        access_token: Some(credential.token.clone()),
        refresh_token: credential.refresh_token.clone(),
        expires_at: credential
            .expiry
            .and_then(|at| time::OffsetDateTime::from_unix_timestamp(at.timestamp()).ok()),
        id_token: None,
    })
}

fn https_connector(
) -> Result<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>> {
    Ok(hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| GmailError::AuthError(format!("Failed to load TLS roots: {}", e)))?
        .https_or_http()
        .enable_http1()
        .build())
}

/// Obtain a Gmail hub backed by a usable credential
///
/// A refreshable stored credential goes through the authorized-user flow,
/// which serves the stored token until it expires and then refreshes it for
/// the rest of the run. A valid credential that cannot be refreshed is used
/// as a fixed token. Anything else needs an interactive browser login using
/// the client-secret file. The credential file is rewritten after every
/// refresh or login.
///
/// # Errors
/// `GmailError::MissingClientConfig` when a login is needed but
/// `credentials_path` does not exist.
pub async fn authenticate(credentials_path: &Path, token_path: &Path) -> Result<GmailHub> {
    let stored = Credential::load(token_path).await?;

    match assess_credential(stored, Utc::now()) {
        CredentialState::Valid(credential) if credential.is_refreshable() => {
            debug!("Using stored credential from {:?}", token_path);
            refresh_hub(credential, token_path).await
        }
        CredentialState::Valid(credential) => {
            debug!("Using stored credential from {:?} without refresh", token_path);
            let client = hyper_util::client::legacy::Client::builder(
                hyper_util::rt::TokioExecutor::new(),
            )
            .build(https_connector()?);
            Ok(Gmail::new(client, credential.token))
        }
        CredentialState::Refreshable(credential) => {
            info!("Stored credential expired, refreshing");
            refresh_hub(credential, token_path).await
        }
        CredentialState::Missing => login_hub(credentials_path, token_path).await,
    }
}

async fn refresh_hub(credential: Credential, token_path: &Path) -> Result<GmailHub> {
    let client = OAuthClient {
        client_id: credential.client_id.clone().unwrap_or_default(),
        client_secret: credential.client_secret.clone().unwrap_or_default(),
    };
    let secret = yup_oauth2::authorized_user::AuthorizedUserSecret {
        client_id: client.client_id.clone(),
        client_secret: client.client_secret.clone(),
        refresh_token: credential.refresh_token.clone().unwrap_or_default(),
        key_type: "authorized_user".to_string(),
    };

    let store = CredentialStore::seeded(token_path, client, &credential);
    let auth = yup_oauth2::AuthorizedUserAuthenticator::builder(secret)
        .with_storage(Box::new(store))
        .build()
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    auth.token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to refresh token: {}", e)))?;
    debug!("Authorized-user token ready");

    let http = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(https_connector()?);
    Ok(Gmail::new(http, auth))
}

async fn login_hub(credentials_path: &Path, token_path: &Path) -> Result<GmailHub> {
    if !credentials_path.exists() {
        return Err(GmailError::MissingClientConfig(credentials_path.to_path_buf()));
    }

    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to read credentials: {}", e)))?;

    let client = OAuthClient {
        client_id: secret.client_id.clone(),
        client_secret: secret.client_secret.clone(),
    };

    // HTTPRedirect listens on a local port for the browser callback
    let store = CredentialStore::new(token_path, client, None);
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .with_storage(Box::new(store))
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    auth.token(REQUIRED_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

    let http = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(https_connector()?);
    Ok(Gmail::new(http, auth))
}

/// Remove the stored credential so the next run logs in again
pub async fn forget_credential(token_path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(token_path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs; the file keeps the ACL inherited from its directory
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
