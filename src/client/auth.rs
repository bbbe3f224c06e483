//! Authentication strategies for the GitHub client

use chrono::{DateTime, Utc};
use compact_str::{CompactString, format_compact};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use super::{
    config::Credentials,
    error::{ClientError, Result},
};

/// Installation tokens are refreshed this long before GitHub expires them.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// App JWTs are backdated to tolerate clock drift and expire within GitHub's 10 minute limit.
const JWT_BACKDATE_SECS: i64 = 60;
const JWT_LIFETIME_SECS: i64 = 9 * 60;

/// Produces the `Authorization` header value for each request
pub enum Authenticator {
    Token(CompactString),
    App(AppAuthenticator),
}

pub struct AppAuthenticator {
    app_id: u64,
    installation_id: u64,
    key: EncodingKey,
    cached: Mutex<Option<InstallationToken>>,
}

#[derive(Debug, Clone)]
pub struct InstallationToken {
    pub token: CompactString,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: CompactString,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authenticator::Token(_) => f.write_str("Authenticator::Token(..)"),
            Authenticator::App(app) => f
                .debug_struct("Authenticator::App")
                .field("app_id", &app.app_id)
                .field("installation_id", &app.installation_id)
                .finish_non_exhaustive(),
        }
    }
}

impl Authenticator {
    /// Build the authenticator for resolved credentials, loading key material eagerly
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        match credentials {
            Credentials::Token(token) => Ok(Self::Token(token.clone())),
            Credentials::App {
                app_id,
                installation_id,
                private_key_path,
            } => {
                let pem = std::fs::read(private_key_path).map_err(|e| {
                    ClientError::credentials(
                        format_compact!("cannot read private key {}", private_key_path.display()),
                        e,
                    )
                })?;
                Ok(Self::App(AppAuthenticator::from_pem(*app_id, *installation_id, &pem)?))
            },
        }
    }
}

impl AppAuthenticator {
    pub fn from_pem(app_id: u64, installation_id: u64, pem: &[u8]) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| ClientError::credentials("invalid RSA private key", e))?;

        Ok(Self {
            app_id,
            installation_id,
            key,
            cached: Mutex::new(None),
        })
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    /// Signed JWT identifying the app itself
    pub fn app_jwt(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = AppClaims {
            iat: now.timestamp() - JWT_BACKDATE_SECS,
            exp: now.timestamp() + JWT_LIFETIME_SECS,
            iss: format_compact!("{}", self.app_id),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| ClientError::credentials("failed to sign app JWT", e))
    }

    /// Exclusive access to the cached installation token.
    ///
    /// The guard is held while a replacement is requested, so concurrent
    /// callers wait for that exchange instead of starting their own.
    pub async fn token_slot(&self) -> MutexGuard<'_, Option<InstallationToken>> {
        self.cached.lock().await
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

impl InstallationToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}
