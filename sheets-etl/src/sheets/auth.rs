//! OAuth access tokens for the Sheets API

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::GoogleConfig;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read and write access to spreadsheets
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Google rejects assertions valid for longer than an hour
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Seconds shaved off a token's lifetime so it is never used at the edge of expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Upper bound on how long a token is cached, whatever the endpoint claims
const MAX_CACHE_SECS: i64 = 24 * 3600;

/// Credentials JSON: `authorized_user` from `gcloud auth application-default
/// login`, or a `service_account` key downloaded from the console
#[derive(Debug, Clone, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Clone)]
struct RefreshCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
}

struct ServiceAccount {
    client_email: String,
    key_id: Option<String>,
    key: EncodingKey,
    token_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl ServiceAccount {
    /// Signed RS256 assertion exchanged for an access token
    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.key)
            .context("Failed to sign service account assertion")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

enum TokenSource {
    Static(String),
    Refresh {
        http: reqwest::Client,
        credentials: RefreshCredentials,
    },
    ServiceAccount {
        http: reqwest::Client,
        account: ServiceAccount,
    },
}

/// Supplies bearer tokens, refreshing and caching them as needed
pub struct GoogleAuth {
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    fn new(source: TokenSource) -> Self {
        GoogleAuth {
            source,
            cached: Mutex::new(None),
        }
    }

    /// A fixed token, never refreshed
    pub fn static_token(token: impl Into<String>) -> Self {
        Self::new(TokenSource::Static(token.into()))
    }

    /// Prefer `access_token`, otherwise read `credentials_file`
    pub fn from_config(config: &GoogleConfig, http: reqwest::Client) -> Result<Self> {
        if let Some(token) = config.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(Self::static_token(token.trim()));
        }
        match &config.credentials_file {
            Some(path) => Self::from_credentials_file(path, http),
            None => bail!("google.credentials_file is not configured and no access token is set"),
        }
    }

    pub fn from_credentials_file(path: &Path, http: reqwest::Client) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        Self::from_credentials_json(&content, http)
            .with_context(|| format!("Invalid credentials file: {}", path.display()))
    }

    pub fn from_credentials_json(json: &str, http: reqwest::Client) -> Result<Self> {
        let file: CredentialsFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        let token_uri = file
            .token_uri
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        let source = match file.kind.as_str() {
            "authorized_user" => TokenSource::Refresh {
                http,
                credentials: RefreshCredentials {
                    client_id: file.client_id.context("Credentials missing client_id")?,
                    client_secret: file
                        .client_secret
                        .context("Credentials missing client_secret")?,
                    refresh_token: file
                        .refresh_token
                        .context("Credentials missing refresh_token")?,
                    token_uri,
                },
            },
            "service_account" => {
                let pem = file.private_key.context("Credentials missing private_key")?;
                let key = EncodingKey::from_rsa_pem(pem.as_bytes())
                    .context("Service account private_key is not an RSA PEM key")?;
                TokenSource::ServiceAccount {
                    http,
                    account: ServiceAccount {
                        client_email: file.client_email.context("Credentials missing client_email")?,
                        key_id: file.private_key_id,
                        key,
                        token_uri,
                    },
                }
            }
            other => bail!(
                "Unsupported credentials type '{}'; expected 'service_account' or 'authorized_user'",
                other
            ),
        };

        Ok(Self::new(source))
    }

    /// Current bearer token
    pub async fn access_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.token.clone());
            }
        }

        log::debug!("Refreshing Google access token");
        let token = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Refresh { http, credentials } => {
                request_token(
                    http,
                    &credentials.token_uri,
                    &[
                        ("grant_type", "refresh_token"),
                        ("client_id", credentials.client_id.as_str()),
                        ("client_secret", credentials.client_secret.as_str()),
                        ("refresh_token", credentials.refresh_token.as_str()),
                    ],
                )
                .await?
            }
            TokenSource::ServiceAccount { http, account } => {
                let assertion = account.assertion(Utc::now())?;
                request_token(
                    http,
                    &account.token_uri,
                    &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
                )
                .await?
            }
        };

        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: expiry_after(Utc::now(), token.expires_in),
        });

        Ok(token.access_token)
    }
}

async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .context("Failed to request access token")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Token endpoint returned {}: {}", status, body);
    }

    response
        .json()
        .await
        .context("Failed to parse token response")
}

/// When a token issued at `now` should be refreshed. Missing lifetimes
/// default to an hour; absurd ones are clamped.
fn expiry_after(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    let secs = expires_in
        .unwrap_or(3600)
        .saturating_sub(EXPIRY_MARGIN_SECS)
        .clamp(0, MAX_CACHE_SECS);
    now + Duration::seconds(secs)
}
