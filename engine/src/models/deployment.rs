//! Deployment attempt models

use serde::{Deserialize, Serialize};

/// VCS provider of a pull/merge request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitType {
    #[default]
    None,
    Github,
    Gitlab,
    Bitbucket,
}

impl GitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitType::None => "none",
            GitType::Github => "github",
            GitType::Gitlab => "gitlab",
            GitType::Bitbucket => "bitbucket",
        }
    }
}

impl std::str::FromStr for GitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "none" => Ok(GitType::None),
            "github" => Ok(GitType::Github),
            "gitlab" => Ok(GitType::Gitlab),
            "bitbucket" => Ok(GitType::Bitbucket),
            _ => Err(format!("Invalid git type: {}", s)),
        }
    }
}

impl std::fmt::Display for GitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-attempt deployment context, read-only once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentContext {
    /// Opaque correlation token, also the helper container name
    pub deployment_id: String,

    /// Pull/merge request number, 0 when not a preview build
    #[serde(default)]
    pub pull_request_id: u64,

    /// Provider that owns the pull request ref syntax
    #[serde(default)]
    pub git_type: GitType,

    /// Wrap every command for execution inside the helper container
    #[serde(default)]
    pub exec_in_container: bool,

    /// Clone without checking out a working tree
    #[serde(default)]
    pub only_checkout: bool,

    /// Overrides the per-deployment artifacts directory
    #[serde(default)]
    pub custom_base_dir: Option<String>,

    /// Explicit commit for providers without a symbolic PR ref
    #[serde(default)]
    pub target_commit: Option<String>,
}

impl DeploymentContext {
    /// Context for a regular branch deployment
    pub fn new(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            pull_request_id: 0,
            git_type: GitType::None,
            exec_in_container: false,
            only_checkout: false,
            custom_base_dir: None,
            target_commit: None,
        }
    }

    /// Context for a preview deployment of a pull/merge request
    pub fn pull_request(deployment_id: impl Into<String>, pull_request_id: u64, git_type: GitType) -> Self {
        Self {
            pull_request_id,
            git_type,
            ..Self::new(deployment_id)
        }
    }

    pub fn with_exec_in_container(mut self, exec_in_container: bool) -> Self {
        self.exec_in_container = exec_in_container;
        self
    }

    pub fn with_only_checkout(mut self, only_checkout: bool) -> Self {
        self.only_checkout = only_checkout;
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<String>) -> Self {
        self.custom_base_dir = Some(base_dir.into());
        self
    }

    pub fn with_target_commit(mut self, commit: impl Into<String>) -> Self {
        self.target_commit = Some(commit.into());
        self
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request_id != 0
    }
}
