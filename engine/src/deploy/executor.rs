//! Remote command execution seam

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::authn::secret::MaskedText;
use crate::errors::EngineError;
use crate::models::server::RemoteHost;

/// Runs an ordered command list on a remote host
///
/// Implementations execute the list in one shell session, stop at the first
/// failing command, and own timeouts and retries. Failures come back as
/// [`EngineError::TransportError`] and are never retried by the engine.
#[async_trait]
pub trait RemoteCommandRunner: Send + Sync {
    /// Returns captured stdout, or an empty string when `capture_output` is off
    async fn run(
        &self,
        commands: &[MaskedText],
        host: &RemoteHost,
        capture_output: bool,
    ) -> Result<String, EngineError>;
}

/// Run commands whose failure must not affect the caller, e.g. cleanup
pub async fn run_best_effort(
    runner: &dyn RemoteCommandRunner,
    commands: &[MaskedText],
    host: &RemoteHost,
) {
    debug!("Running {} best-effort command(s) on {}", commands.len(), host);
    if let Err(e) = runner.run(commands, host, false).await {
        warn!("Ignoring failed best-effort command on {}: {}", host, e);
    }
}
