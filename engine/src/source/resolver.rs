//! Source credential classification

use tracing::debug;

use crate::authn::secret::SecretValue;
use crate::errors::EngineError;
use crate::models::application::{Application, GitSource};
use crate::storage::settings::Settings;

/// How the repository of one deployment attempt is authenticated
///
/// Borrows from the application it was resolved from and is dropped once
/// the command plan has been synthesized.
#[derive(Debug, Clone, Copy)]
pub enum SourceIdentity<'a> {
    /// Anonymous clone of the configured repository
    PlainRepository { repository: &'a str },

    /// Clone through a source app; private sources need an installation token
    AppToken { source: &'a GitSource },

    /// Clone over SSH with a key written to the remote host first
    DeployKey { key_id: u64, material: &'a SecretValue },
}

impl SourceIdentity<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceIdentity::PlainRepository { .. } => "plain_repository",
            SourceIdentity::AppToken { .. } => "app_token",
            SourceIdentity::DeployKey { .. } => "deploy_key",
        }
    }

    /// Public identities clone without credentials; submodule SSH URLs are
    /// rewritten to HTTPS for them
    pub fn is_public(&self) -> bool {
        match self {
            SourceIdentity::PlainRepository { .. } => true,
            SourceIdentity::AppToken { source } => source.is_public,
            SourceIdentity::DeployKey { .. } => false,
        }
    }

    /// Whether cloning needs an installation token from the issuer
    pub fn needs_installation_token(&self) -> bool {
        matches!(self, SourceIdentity::AppToken { source } if !source.is_public)
    }
}

/// Classifies an application into exactly one [`SourceIdentity`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceCredentialResolver {
    /// Accept deploy key id 0 as a configured key
    development: bool,
}

impl SourceCredentialResolver {
    pub fn new(development: bool) -> Self {
        Self { development }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.development)
    }

    /// First match wins: deploy key, then source app, then plain repository
    pub fn resolve<'a>(&self, app: &'a Application) -> Result<SourceIdentity<'a>, EngineError> {
        if app.git_repository.trim().is_empty() {
            return Err(EngineError::ConfigurationError(format!(
                "Application {} has no git repository configured",
                app.id
            )));
        }

        let identity = match app.private_key_id {
            Some(key_id) if key_id != 0 || self.development => {
                let material = app
                    .private_key
                    .as_ref()
                    .and_then(|key| key.private_key.as_ref())
                    .filter(|material| !material.is_empty())
                    .ok_or_else(|| {
                        EngineError::ConfigurationError(format!(
                            "Deploy key {} of application {} has no key material",
                            key_id, app.id
                        ))
                    })?;
                SourceIdentity::DeployKey { key_id, material }
            }
            _ => match &app.source {
                Some(source) => {
                    if !source.is_public && source.installation_id.is_none() {
                        return Err(EngineError::ConfigurationError(format!(
                            "Private source {} of application {} has no installation id",
                            source.id, app.id
                        )));
                    }
                    SourceIdentity::AppToken { source }
                }
                None => SourceIdentity::PlainRepository {
                    repository: &app.git_repository,
                },
            },
        };

        debug!("Application {} resolved to {} identity", app.id, identity.kind());
        Ok(identity)
    }
}
