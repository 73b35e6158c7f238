//! Application model and its field normalization

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::authn::secret::SecretValue;
use crate::models::server::{Destination, ServerStatusPivot};
use crate::status::{self, AggregatedStatus};

/// Git hosting provider behind an attached source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceProvider {
    #[default]
    Github,
    Gitlab,
    Bitbucket,
}

/// A git source (app installation) the application is linked to
#[derive(Debug, Clone, Deserialize)]
pub struct GitSource {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub provider: SourceProvider,

    /// Web root, e.g. `https://github.com`
    pub html_url: String,

    /// API root, e.g. `https://api.github.com`
    #[serde(default)]
    pub api_url: String,

    /// Public sources clone anonymously over HTTPS
    #[serde(default)]
    pub is_public: bool,

    #[serde(default)]
    pub app_id: Option<u64>,

    #[serde(default)]
    pub installation_id: Option<u64>,

    /// PEM key the app signs installation-token requests with
    #[serde(default)]
    pub private_key: Option<SecretValue>,
}

/// A deploy key attached to the application
#[derive(Debug, Clone, Deserialize)]
pub struct PrivateKey {
    pub id: u64,

    #[serde(default)]
    pub name: String,

    /// PEM material, absent when the key record exists but is empty
    #[serde(default)]
    pub private_key: Option<SecretValue>,
}

/// Per-application feature switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationSettings {
    #[serde(default)]
    pub is_git_submodules_enabled: bool,

    #[serde(default)]
    pub is_git_lfs_enabled: bool,

    #[serde(default)]
    pub is_auto_deploy_enabled: bool,

    #[serde(default)]
    pub is_preview_deployments_enabled: bool,
}

/// An environment variable as it takes part in the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub key: String,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub is_build_time: bool,

    #[serde(default)]
    pub is_preview: bool,
}

/// Routing metadata stored per compose service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRouting {
    #[serde(default)]
    pub domain: Option<String>,
}

/// Persisted application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Comma separated routing domains
    #[serde(default)]
    pub fqdn: Option<String>,

    #[serde(default)]
    pub git_repository: String,

    #[serde(default = "default_branch")]
    pub git_branch: String,

    #[serde(default = "default_commit")]
    pub git_commit_sha: String,

    #[serde(default = "default_build_pack")]
    pub build_pack: String,

    #[serde(default)]
    pub static_image: String,

    #[serde(default)]
    pub install_command: String,

    #[serde(default)]
    pub build_command: String,

    #[serde(default)]
    pub start_command: String,

    #[serde(default)]
    pub ports_exposes: String,

    #[serde(default)]
    pub ports_mappings: Option<String>,

    #[serde(default = "default_root")]
    pub base_directory: String,

    #[serde(default)]
    pub publish_directory: Option<String>,

    /// Inline dockerfile content for dockerfile-only applications
    #[serde(default)]
    pub dockerfile: Option<String>,

    #[serde(default = "default_dockerfile_location")]
    pub dockerfile_location: String,

    #[serde(default = "default_compose_location")]
    pub docker_compose_location: String,

    #[serde(default = "default_compose_location")]
    pub docker_compose_pr_location: String,

    #[serde(default)]
    pub docker_compose_raw: Option<String>,

    #[serde(default)]
    pub docker_compose_domains: Option<BTreeMap<String, ServiceRouting>>,

    #[serde(default)]
    pub custom_labels: Option<String>,

    /// Primary server status token
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default)]
    pub config_hash: Option<String>,

    #[serde(default)]
    pub settings: ApplicationSettings,

    #[serde(default)]
    pub source: Option<GitSource>,

    /// Deploy key reference; `Some(0)` is the development sentinel
    #[serde(default)]
    pub private_key_id: Option<u64>,

    #[serde(default)]
    pub private_key: Option<PrivateKey>,

    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,

    /// Additional servers in attachment order
    #[serde(default)]
    pub additional_servers: Vec<ServerStatusPivot>,

    #[serde(default)]
    pub destination: Option<Destination>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_commit() -> String {
    "HEAD".to_string()
}

fn default_build_pack() -> String {
    "nixpacks".to_string()
}

fn default_root() -> String {
    "/".to_string()
}

fn default_dockerfile_location() -> String {
    "/Dockerfile".to_string()
}

fn default_compose_location() -> String {
    "/docker-compose.yaml".to_string()
}

fn default_status() -> String {
    "exited:unhealthy".to_string()
}

/// `/`-prefixed directory, never empty
pub fn normalize_base_directory(value: &str) -> String {
    format!("/{}", value.trim().trim_start_matches('/'))
}

/// `/`-prefixed directory, or none when empty
pub fn normalize_publish_directory(value: Option<&str>) -> Option<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(format!("/{}", v.trim_start_matches('/'))),
        _ => None,
    }
}

/// `/`-prefixed file location without a trailing `/`, `default` when empty
pub fn normalize_file_location(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return default.to_string();
    }
    if value == "/" {
        return value.to_string();
    }
    let value = value.strip_suffix('/').unwrap_or(value);
    if value.starts_with('/') {
        value.to_string()
    } else {
        format!("/{}", value)
    }
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl Application {
    /// Apply the persisted-field transforms
    pub fn normalized(mut self) -> Self {
        self.fqdn = none_if_blank(self.fqdn);
        self.install_command = self.install_command.trim().to_string();
        self.build_command = self.build_command.trim().to_string();
        self.start_command = self.start_command.trim().to_string();
        self.base_directory = normalize_base_directory(&self.base_directory);
        self.publish_directory = normalize_publish_directory(self.publish_directory.as_deref());
        self.dockerfile_location =
            normalize_file_location(&self.dockerfile_location, "/Dockerfile");
        self.docker_compose_location =
            normalize_file_location(&self.docker_compose_location, "/docker-compose.yaml");
        self.docker_compose_pr_location =
            normalize_file_location(&self.docker_compose_pr_location, "/docker-compose.yaml");
        self.ports_mappings = none_if_blank(self.ports_mappings);
        self.status = status::normalize_token(&self.status);
        self
    }

    pub fn fqdns(&self) -> Vec<String> {
        self.fqdn.as_deref().map(split_list).unwrap_or_default()
    }

    pub fn ports_exposes_list(&self) -> Vec<String> {
        split_list(&self.ports_exposes)
    }

    pub fn ports_mappings_list(&self) -> Vec<String> {
        self.ports_mappings.as_deref().map(split_list).unwrap_or_default()
    }

    pub fn is_exited(&self) -> bool {
        self.status.starts_with("exited")
    }

    /// Whether deployments start from a git checkout at all
    pub fn git_based(&self) -> bool {
        if self.dockerfile.as_deref().is_some_and(|d| !d.is_empty()) {
            return false;
        }
        self.build_pack != "dockerimage"
    }

    fn source_link(&self, suffix: &str) -> String {
        match &self.source {
            Some(source) if !self.git_repository.is_empty() && !self.git_branch.is_empty() => {
                format!(
                    "{}/{}/{}",
                    source.html_url.trim_end_matches('/'),
                    self.git_repository,
                    suffix
                )
            }
            _ => self.git_repository.clone(),
        }
    }

    /// Browser link to the deployed branch
    pub fn git_branch_location(&self) -> String {
        self.source_link(&format!("tree/{}", self.git_branch))
    }

    /// Browser link to the repository webhook settings
    pub fn git_webhook_url(&self) -> String {
        self.source_link("settings/hooks")
    }

    /// Browser link to the branch history
    pub fn git_commits_url(&self) -> String {
        self.source_link(&format!("commits/{}", self.git_branch))
    }

    /// Compose file path relative to a checkout root, e.g. `./app/docker-compose.yaml`
    pub fn compose_file_path(&self) -> String {
        let workdir = self.base_directory.trim_end_matches('/');
        format!(".{}{}", workdir, self.docker_compose_location)
    }

    /// Non-preview variables ordered by key
    pub fn environment_variables(&self) -> Vec<&EnvironmentVariable> {
        self.sorted_variables(false)
    }

    /// Preview variables ordered by key
    pub fn environment_variables_preview(&self) -> Vec<&EnvironmentVariable> {
        self.sorted_variables(true)
    }

    fn sorted_variables(&self, preview: bool) -> Vec<&EnvironmentVariable> {
        let mut vars: Vec<&EnvironmentVariable> = self
            .environment_variables
            .iter()
            .filter(|v| v.is_preview == preview)
            .collect();
        vars.sort_by(|a, b| a.key.cmp(&b.key));
        vars
    }

    /// Current application-level status across all servers
    pub fn aggregated_status(&self) -> AggregatedStatus {
        status::aggregate(
            &self.status,
            self.additional_servers.iter().map(|s| s.status.as_str()),
        )
    }
}
