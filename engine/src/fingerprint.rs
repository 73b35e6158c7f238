//! Configuration fingerprints for redeploy detection

use std::sync::Arc;

use tracing::debug;

use crate::errors::EngineError;
use crate::models::application::Application;
use crate::storage::store::ApplicationStore;
use crate::utils::sha256_hash;

/// Separates fields so that moving text between neighbours changes the hash
const FIELD_SEPARATOR: char = '\u{1f}';

/// Stable hash over every field that makes a redeploy necessary
///
/// Preview builds (`pull_request_id != 0`) hash the preview variables
/// instead of the regular ones.
pub fn fingerprint(app: &Application, pull_request_id: u64) -> Result<String, EngineError> {
    let fields: [&str; 16] = [
        app.fqdn.as_deref().unwrap_or_default(),
        &app.git_repository,
        &app.git_branch,
        &app.git_commit_sha,
        &app.build_pack,
        &app.static_image,
        &app.install_command,
        &app.build_command,
        &app.start_command,
        &app.ports_exposes,
        app.ports_mappings.as_deref().unwrap_or_default(),
        &app.base_directory,
        app.publish_directory.as_deref().unwrap_or_default(),
        app.dockerfile.as_deref().unwrap_or_default(),
        &app.dockerfile_location,
        app.custom_labels.as_deref().unwrap_or_default(),
    ];

    let mut input = String::new();
    for field in fields {
        input.push_str(field);
        input.push(FIELD_SEPARATOR);
    }

    let variables = if pull_request_id == 0 {
        app.environment_variables()
    } else {
        app.environment_variables_preview()
    };
    input.push_str(&serde_json::to_string(&variables)?);

    Ok(sha256_hash(input.as_bytes()))
}

/// True on first run (no stored hash) or when the fingerprint moved
pub fn has_changed(app: &Application, pull_request_id: u64) -> Result<bool, EngineError> {
    let current = fingerprint(app, pull_request_id)?;
    Ok(app.config_hash.as_deref() != Some(current.as_str()))
}

/// Fingerprint checks that can record the new hash
pub struct ConfigFingerprinter {
    store: Arc<dyn ApplicationStore>,
}

impl ConfigFingerprinter {
    pub fn new(store: Arc<dyn ApplicationStore>) -> Self {
        Self { store }
    }

    /// Same answer as [`has_changed`]; with `persist` set a changed hash is
    /// written to the store and to `app`
    ///
    /// Without `persist` nothing is written.
    pub async fn check(
        &self,
        app: &mut Application,
        pull_request_id: u64,
        persist: bool,
    ) -> Result<bool, EngineError> {
        let current = fingerprint(app, pull_request_id)?;
        if app.config_hash.as_deref() == Some(current.as_str()) {
            return Ok(false);
        }

        debug!(
            "Configuration of application {} changed ({} -> {})",
            app.id,
            app.config_hash.as_deref().unwrap_or("none"),
            current
        );
        if persist {
            self.store.save_config_hash(&app.id, &current).await?;
            app.config_hash = Some(current);
        }
        Ok(true)
    }
}
