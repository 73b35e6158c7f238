//! Git import command synthesis
//!
//! Turns a resolved [`SourceIdentity`] and a [`DeploymentContext`] into the
//! exact shell commands that clone and prepare a working tree on the remote
//! host. Synthesis is pure: identical inputs give byte-identical commands.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info};

use crate::authn::issuer::{CredentialIssuer, InstallationToken};
use crate::authn::secret::MaskedText;
use crate::deploy::docker;
use crate::deploy::refs::{self, RefCheckout};
use crate::errors::EngineError;
use crate::models::application::{Application, GitSource, SourceProvider};
use crate::models::deployment::{DeploymentContext, GitType};
use crate::source::repository::RepositoryReference;
use crate::source::resolver::{SourceCredentialResolver, SourceIdentity};
use crate::storage::settings::{Settings, SshSettings};

/// Branch, commit and working-tree options taken from the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub branch: String,
    /// Commit to pin, `HEAD` for the branch tip
    pub commit_sha: String,
    pub submodules: bool,
    pub lfs: bool,
}

impl CheckoutSettings {
    pub fn from_application(app: &Application) -> Self {
        Self {
            branch: app.git_branch.clone(),
            commit_sha: app.git_commit_sha.clone(),
            submodules: app.settings.is_git_submodules_enabled,
            lfs: app.settings.is_git_lfs_enabled,
        }
    }

    fn pinned_commit(&self) -> Option<&str> {
        let sha = self.commit_sha.trim();
        (!sha.is_empty() && sha != "HEAD").then_some(sha)
    }
}

/// Ordered commands for one deployment attempt
///
/// Commands and the repository URL may embed a token or key; only their
/// masked renderings may be logged or persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    commands: Vec<MaskedText>,
    branch: String,
    repository_url: MaskedText,
    base_dir: String,
}

impl CommandPlan {
    pub fn commands(&self) -> &[MaskedText] {
        &self.commands
    }

    /// Branch or PR refspec that was checked out
    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn repository_url(&self) -> &MaskedText {
        &self.repository_url
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn masked_commands(&self) -> Vec<&str> {
        self.commands.iter().map(MaskedText::masked).collect()
    }

    pub fn exposed_commands(&self) -> Vec<&str> {
        self.commands.iter().map(MaskedText::expose).collect()
    }

    /// All commands chained with `&&` into one script
    pub fn joined(&self) -> MaskedText {
        let mut builder = MaskedText::builder();
        for (i, command) in self.commands.iter().enumerate() {
            if i > 0 {
                builder = builder.text(" && ");
            }
            builder = builder.append(command);
        }
        builder.build()
    }

    /// Whether any command or the URL carries secret material
    pub fn is_sensitive(&self) -> bool {
        self.repository_url.is_sensitive() || self.commands.iter().any(MaskedText::is_sensitive)
    }
}

fn provider_git_type(provider: SourceProvider) -> GitType {
    match provider {
        SourceProvider::Github => GitType::Github,
        SourceProvider::Gitlab => GitType::Gitlab,
        SourceProvider::Bitbucket => GitType::Bitbucket,
    }
}

/// Builds [`CommandPlan`]s
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    artifacts_dir: String,
    ssh: SshSettings,
}

impl CommandSynthesizer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            artifacts_dir: settings.artifacts_dir.clone(),
            ssh: settings.ssh.clone(),
        }
    }

    /// Working tree of the deployment on the remote host
    pub fn base_dir(&self, ctx: &DeploymentContext) -> String {
        match &ctx.custom_base_dir {
            Some(dir) => dir.clone(),
            None => format!(
                "{}/{}",
                self.artifacts_dir.trim_end_matches('/'),
                ctx.deployment_id
            ),
        }
    }

    /// Non-interactive SSH command line for `GIT_SSH_COMMAND`
    fn ssh_command(&self, port: u16, with_key: bool) -> String {
        let mut command = format!(
            "ssh -o ConnectTimeout={} -p {} -o Port={} -o LogLevel=ERROR -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
            self.ssh.connect_timeout_secs, port, port
        );
        if with_key {
            command.push_str(" -i ");
            command.push_str(&self.ssh.key_path);
        }
        command
    }

    fn repository_url(
        &self,
        identity: &SourceIdentity<'_>,
        repo: &RepositoryReference,
        token: Option<&InstallationToken>,
        ctx: &DeploymentContext,
    ) -> Result<MaskedText, EngineError> {
        match identity {
            SourceIdentity::PlainRepository { .. } | SourceIdentity::DeployKey { .. } => {
                Ok(MaskedText::plain(repo.repository.clone()))
            }
            SourceIdentity::AppToken { source } if source.is_public => Ok(MaskedText::plain(
                format!("{}/{}", source.html_url.trim_end_matches('/'), repo.repository),
            )),
            SourceIdentity::AppToken { source } => {
                let token = token.filter(|t| !t.token.is_empty()).ok_or_else(|| {
                    EngineError::ConfigurationError(format!(
                        "Deployment {} needs an installation token for private source {}",
                        ctx.deployment_id, source.id
                    ))
                })?;
                let (scheme, authority) = source_authority(source)?;
                Ok(MaskedText::builder()
                    .text(&format!("{}://x-access-token:", scheme))
                    .secret(token.token.expose())
                    .text(&format!("@{}/{}.git", authority, repo.repository))
                    .build())
            }
        }
    }

    /// Synthesize the clone/checkout commands of one deployment attempt
    pub fn synthesize(
        &self,
        identity: &SourceIdentity<'_>,
        ctx: &DeploymentContext,
        repo: &RepositoryReference,
        checkout: &CheckoutSettings,
        token: Option<&InstallationToken>,
    ) -> Result<CommandPlan, EngineError> {
        if !refs::is_safe_ref(&ctx.deployment_id) || ctx.deployment_id.contains('/') {
            return Err(EngineError::ConfigurationError(
                "Deployment id is not a valid container name".to_string(),
            ));
        }
        refs::validate_ref("branch", &checkout.branch, &ctx.deployment_id)?;
        if let Some(sha) = checkout.pinned_commit() {
            refs::validate_ref("commit", sha, &ctx.deployment_id)?;
        }
        if let Some(commit) = ctx.target_commit.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            refs::validate_ref("target commit", commit, &ctx.deployment_id)?;
        }

        let base_dir = self.base_dir(ctx);

        let git_type = match (ctx.git_type, identity) {
            (GitType::None, SourceIdentity::AppToken { source }) => {
                provider_git_type(source.provider)
            }
            (git_type, _) => git_type,
        };
        let ref_plan = refs::plan_for_provider(ctx, git_type, &checkout.branch)?;

        let with_key = matches!(identity, SourceIdentity::DeployKey { .. });
        let git = format!("GIT_SSH_COMMAND=\"{}\" git", self.ssh_command(repo.ssh_port, with_key));
        let url = self.repository_url(identity, repo, token, ctx)?;

        let mut commands = Vec::new();

        if let SourceIdentity::DeployKey { key_id, material } = identity {
            if material.is_empty() {
                return Err(EngineError::ConfigurationError(format!(
                    "Deploy key {} has no key material (deployment {})",
                    key_id, ctx.deployment_id
                )));
            }
            let encoded = STANDARD.encode(material.expose());
            commands.push(MaskedText::plain(format!("mkdir -p {}", self.ssh.key_dir())));
            commands.push(
                MaskedText::builder()
                    .text("echo '")
                    .secret(&encoded)
                    .text(&format!("' | base64 -d > {}", self.ssh.key_path))
                    .build(),
            );
            commands.push(MaskedText::plain(format!("chmod 600 {}", self.ssh.key_path)));
        }

        if let Some(target) = &ref_plan.checkout {
            commands.push(MaskedText::plain(format!("echo 'Checking out {}'", target.target())));
        }

        let no_checkout = if ctx.only_checkout { "--no-checkout " } else { "" };
        commands.push(
            MaskedText::builder()
                .text(&format!("{} clone {}-b {} ", git, no_checkout, checkout.branch))
                .append(&url)
                .text(&format!(" {}", base_dir))
                .build(),
        );

        if !ctx.only_checkout {
            if let Some(sha) = checkout.pinned_commit() {
                commands.push(MaskedText::plain(format!(
                    "cd {} && {} -c advice.detachedHead=false checkout {} >/dev/null 2>&1",
                    base_dir, git, sha
                )));
            }
            if checkout.submodules {
                if identity.is_public() {
                    commands.push(MaskedText::plain(format!(
                        r#"cd {0} && sed -i "s#git@\(.*\):#https://\1/#g" {0}/.gitmodules || true"#,
                        base_dir
                    )));
                }
                commands.push(MaskedText::plain(format!(
                    "cd {} && {} submodule update --init --recursive",
                    base_dir, git
                )));
            }
            if checkout.lfs {
                commands.push(MaskedText::plain(format!("cd {} && {} lfs pull", base_dir, git)));
            }
        }

        match &ref_plan.checkout {
            Some(RefCheckout::FetchAndCheckout { refspec, local_branch }) => {
                commands.push(MaskedText::plain(format!(
                    "cd {} && {} fetch origin {} && git checkout {}",
                    base_dir, git, refspec, local_branch
                )));
            }
            Some(RefCheckout::Commit { commit }) => {
                commands.push(MaskedText::plain(format!(
                    "cd {} && {} checkout {}",
                    base_dir, git, commit
                )));
            }
            None => {}
        }

        if ctx.exec_in_container {
            commands = commands
                .iter()
                .map(|command| docker::wrap(&ctx.deployment_id, command))
                .collect();
        }

        info!(
            "Synthesized {} command(s) for deployment {} ({} identity, branch {})",
            commands.len(),
            ctx.deployment_id,
            identity.kind(),
            ref_plan.branch
        );
        for command in &commands {
            debug!("  {}", command.masked());
        }

        Ok(CommandPlan {
            commands,
            branch: ref_plan.branch,
            repository_url: url,
            base_dir,
        })
    }
}

/// Scheme and `host[:port]` of a source's web root
fn source_authority(source: &GitSource) -> Result<(String, String), EngineError> {
    let invalid = || {
        EngineError::ConfigurationError(format!("Source {} has an invalid html url", source.id))
    };
    let url = url::Url::parse(source.html_url.trim()).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok((url.scheme().to_string(), authority))
}

/// Resolve, authorize and synthesize in one step
pub struct GitImport {
    resolver: SourceCredentialResolver,
    synthesizer: CommandSynthesizer,
    issuer: Arc<dyn CredentialIssuer>,
}

impl GitImport {
    pub fn new(settings: &Settings, issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self {
            resolver: SourceCredentialResolver::from_settings(settings),
            synthesizer: CommandSynthesizer::new(settings),
            issuer,
        }
    }

    /// Build the command plan of `app` for one deployment attempt
    ///
    /// Identity and credential problems surface here, before anything runs
    /// remotely.
    pub async fn generate(
        &self,
        app: &Application,
        ctx: &DeploymentContext,
    ) -> Result<CommandPlan, EngineError> {
        let identity = self.resolver.resolve(app)?;

        let token = match identity {
            SourceIdentity::AppToken { source } if !source.is_public => {
                let token = self.issuer.issue_installation_token(source).await?;
                if token.is_expired() {
                    return Err(EngineError::AuthError(format!(
                        "Installation token of source {} is already expired",
                        source.id
                    )));
                }
                Some(token)
            }
            _ => None,
        };

        let repo = RepositoryReference::parse(&app.git_repository);
        let checkout = CheckoutSettings::from_application(app);
        self.synthesizer
            .synthesize(&identity, ctx, &repo, &checkout, token.as_ref())
    }
}
