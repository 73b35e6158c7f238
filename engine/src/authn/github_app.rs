//! GitHub App installation tokens

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authn::issuer::{CredentialIssuer, InstallationToken};
use crate::authn::secret::SecretValue;
use crate::errors::EngineError;
use crate::http::client::HttpClient;
use crate::models::application::GitSource;
use crate::storage::settings::GithubSettings;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Claims of the app JWT exchanged for an installation token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppClaims {
    /// Issued at, backdated a minute for clock drift
    pub iat: i64,

    /// Expiration, GitHub caps this at ten minutes
    pub exp: i64,

    /// App id
    pub iss: String,
}

impl AppClaims {
    pub fn new(app_id: u64, now: DateTime<Utc>) -> Self {
        let now = now.timestamp();
        Self {
            iat: now - 60,
            exp: now + 9 * 60,
            iss: app_id.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// Sign the RS256 app JWT
pub fn app_jwt(
    app_id: u64,
    private_key: &SecretValue,
    now: DateTime<Utc>,
) -> Result<SecretValue, EngineError> {
    let key = EncodingKey::from_rsa_pem(private_key.expose().as_bytes()).map_err(|e| {
        EngineError::AuthError(format!("Invalid private key for GitHub app {}: {}", app_id, e))
    })?;

    let jwt = encode(&Header::new(Algorithm::RS256), &AppClaims::new(app_id, now), &key)
        .map_err(|e| EngineError::AuthError(format!("Failed to sign JWT for GitHub app {}: {}", app_id, e)))?;

    Ok(SecretValue::new(jwt))
}

/// URL the app JWT is posted to
pub fn access_tokens_url(api_url: &str, installation_id: u64) -> String {
    format!(
        "{}/app/installations/{}/access_tokens",
        api_url.trim_end_matches('/'),
        installation_id
    )
}

/// Issues installation tokens through the GitHub App API
pub struct GithubAppIssuer {
    http: HttpClient,
}

impl GithubAppIssuer {
    pub fn new(settings: &GithubSettings) -> Result<Self, EngineError> {
        Ok(Self {
            http: HttpClient::new(Duration::from_secs(settings.api_timeout_secs))?,
        })
    }
}

#[async_trait]
impl CredentialIssuer for GithubAppIssuer {
    async fn issue_installation_token(
        &self,
        source: &GitSource,
    ) -> Result<InstallationToken, EngineError> {
        let missing = |what: &str| {
            EngineError::ConfigurationError(format!("Source {} has no {}", source.id, what))
        };
        let app_id = source.app_id.ok_or_else(|| missing("app id"))?;
        let installation_id = source.installation_id.ok_or_else(|| missing("installation id"))?;
        let private_key = source.private_key.as_ref().ok_or_else(|| missing("app private key"))?;
        if source.api_url.is_empty() {
            return Err(missing("api url"));
        }

        let jwt = app_jwt(app_id, private_key, Utc::now())?;
        let url = access_tokens_url(&source.api_url, installation_id);
        let response: AccessTokenResponse =
            self.http.post_empty(&url, jwt.expose(), GITHUB_ACCEPT).await?;

        info!(
            "Issued installation token for GitHub app {} (installation {})",
            app_id, installation_id
        );
        Ok(InstallationToken {
            token: SecretValue::new(response.token),
            expires_at: response.expires_at,
        })
    }
}
