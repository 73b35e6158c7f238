//! Installation token issuance

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::authn::secret::SecretValue;
use crate::errors::EngineError;
use crate::models::application::GitSource;

/// A short-lived token granting repository access through a source app
#[derive(Debug, Clone)]
pub struct InstallationToken {
    pub token: SecretValue,
    pub expires_at: Option<DateTime<Utc>>,
}

impl InstallationToken {
    pub fn new(token: SecretValue) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Issues installation tokens for private sources
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue_installation_token(
        &self,
        source: &GitSource,
    ) -> Result<InstallationToken, EngineError>;
}
