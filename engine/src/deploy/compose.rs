//! Compose file synchronization
//!
//! Fetches only the compose file of an application through a sparse,
//! checkout-only clone on the remote host, hands it to a [`ComposeParser`]
//! and trims the stored per-service routing to the services that still exist.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::authn::secret::MaskedText;
use crate::deploy::executor::{self, RemoteCommandRunner};
use crate::deploy::git::GitImport;
use crate::errors::EngineError;
use crate::models::application::{Application, ServiceRouting};
use crate::models::deployment::DeploymentContext;
use crate::models::server::RemoteHost;
use crate::storage::settings::Settings;
use crate::storage::store::ApplicationStore;
use crate::utils;

/// Services found in a compose file, keyed by service name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCompose {
    pub services: BTreeMap<String, serde_json::Value>,
}

impl ParsedCompose {
    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }
}

/// External compose parsing capability
pub trait ComposeParser: Send + Sync {
    fn parse(&self, raw: &str, app: &Application) -> anyhow::Result<ParsedCompose>;
}

/// Whether a sync may reuse compose content that is already stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// First load; stored content wins and nothing is fetched
    Initial,

    /// Always fetch from the repository
    #[default]
    Refresh,
}

/// Result of one sync
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeSync {
    pub services: ParsedCompose,

    /// Routing kept after reconciliation, `None` when nothing is left
    pub routing: Option<BTreeMap<String, ServiceRouting>>,

    /// False when stored content was reused
    pub fetched: bool,
}

/// Keep only the routing entries whose service still exists
///
/// Never adds entries; an empty result is reported as `None`.
pub fn reconcile_routing(
    stored: Option<&BTreeMap<String, ServiceRouting>>,
    parsed: &ParsedCompose,
) -> Option<BTreeMap<String, ServiceRouting>> {
    let kept: BTreeMap<String, ServiceRouting> = stored?
        .iter()
        .filter(|(name, _)| parsed.has_service(name))
        .map(|(name, routing)| (name.clone(), routing.clone()))
        .collect();
    (!kept.is_empty()).then_some(kept)
}

/// Drives compose fetch, parse and routing reconciliation
pub struct ComposeSyncOrchestrator {
    import: GitImport,
    runner: Arc<dyn RemoteCommandRunner>,
    parser: Arc<dyn ComposeParser>,
    store: Arc<dyn ApplicationStore>,
    temp_dir: String,
}

impl ComposeSyncOrchestrator {
    pub fn new(
        settings: &Settings,
        import: GitImport,
        runner: Arc<dyn RemoteCommandRunner>,
        parser: Arc<dyn ComposeParser>,
        store: Arc<dyn ApplicationStore>,
    ) -> Self {
        Self {
            import,
            runner,
            parser,
            store,
            temp_dir: settings.temp_dir.trim_end_matches('/').to_string(),
        }
    }

    fn parse(&self, raw: &str, app: &Application) -> Result<ParsedCompose, EngineError> {
        self.parser.parse(raw, app).map_err(|e| {
            EngineError::ComposeParseError(format!("Application {}: {}", app.id, e))
        })
    }

    /// Sync the compose file of `app` from its destination server
    ///
    /// Callers serialize syncs per application and server; concurrent syncs
    /// of different pairs use separate temporary directories.
    pub async fn sync(&self, app: &Application, mode: SyncMode) -> Result<ComposeSync, EngineError> {
        if mode == SyncMode::Initial {
            if let Some(raw) = app.docker_compose_raw.as_deref().filter(|r| !r.trim().is_empty()) {
                debug!("Reusing stored compose file of application {}", app.id);
                return Ok(ComposeSync {
                    services: self.parse(raw, app)?,
                    routing: app.docker_compose_domains.clone(),
                    fetched: false,
                });
            }
        }

        let host = app
            .destination
            .as_ref()
            .map(|destination| &destination.server)
            .ok_or_else(|| {
                EngineError::ConfigurationError(format!(
                    "Application {} has no destination server",
                    app.id
                ))
            })?;

        let raw = self.fetch(app, host).await?;

        let services = self.parse(&raw, app)?;
        let routing = reconcile_routing(app.docker_compose_domains.as_ref(), &services);

        self.store.save_compose(&app.id, &raw, routing.as_ref()).await?;

        info!(
            "Synced compose file of application {}: {} service(s), {} routed",
            app.id,
            services.services.len(),
            routing.as_ref().map_or(0, BTreeMap::len)
        );

        Ok(ComposeSync {
            services,
            routing,
            fetched: true,
        })
    }

    /// Sparse-checkout the compose file into a private directory and read it
    async fn fetch(&self, app: &Application, host: &RemoteHost) -> Result<String, EngineError> {
        let attempt_id = utils::generate_attempt_id();
        let workdir = format!("{}/{}", self.temp_dir, attempt_id);
        let compose_file = app.compose_file_path();

        let ctx = DeploymentContext::new(&attempt_id)
            .with_only_checkout(true)
            .with_base_dir(".");
        let plan = self.import.generate(app, &ctx).await?;

        let mut commands = vec![MaskedText::plain(format!("mkdir -p {} && cd {}", workdir, workdir))];
        commands.extend(plan.commands().iter().cloned());
        commands.push(MaskedText::plain("git sparse-checkout init --cone"));
        commands.push(MaskedText::plain(format!("git sparse-checkout set {}", compose_file)));
        commands.push(MaskedText::plain("git read-tree -mu HEAD"));
        commands.push(MaskedText::plain(format!("cat {}", compose_file)));

        info!(
            "Fetching {} of application {} from {} into {}",
            compose_file, app.id, host, workdir
        );
        let result = self.runner.run(&commands, host, true).await;

        executor::run_best_effort(
            self.runner.as_ref(),
            &[MaskedText::plain(format!("rm -rf {}", workdir))],
            host,
        )
        .await;

        let output = result?;
        if output.trim().is_empty() {
            warn!("Compose file {} of application {} came back empty", compose_file, app.id);
            return Err(EngineError::SourceFetchError(format!(
                "Compose file {} of application {} not found on {}",
                compose_file, app.id, host
            )));
        }
        Ok(output)
    }
}
