//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Development mode, enables the deploy-key id 0 sentinel
    #[serde(default)]
    pub development: bool,

    /// Root of per-deployment working trees on the remote host
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    /// Root of temporary sparse checkouts on the remote host
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    /// SSH transport settings used inside synthesized git commands
    #[serde(default)]
    pub ssh: SshSettings,

    /// GitHub API settings for installation token issuance
    #[serde(default)]
    pub github: GithubSettings,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_artifacts_dir() -> String {
    "/artifacts".to_string()
}

fn default_temp_dir() -> String {
    "/tmp".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            development: false,
            artifacts_dir: default_artifacts_dir(),
            temp_dir: default_temp_dir(),
            ssh: SshSettings::default(),
            github: GithubSettings::default(),
            log_dir: None,
        }
    }
}

/// SSH options for git transport on the remote host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Connect timeout passed as `-o ConnectTimeout`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Where deploy keys are written before cloning
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_key_path() -> String {
    "/root/.ssh/id_rsa".to_string()
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            key_path: default_key_path(),
        }
    }
}

impl SshSettings {
    /// Directory holding the deploy key
    pub fn key_dir(&self) -> &str {
        match self.key_path.rsplit_once('/') {
            Some(("", _)) => "/",
            Some((dir, _)) => dir,
            None => ".",
        }
    }
}

/// GitHub API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSettings {
    /// Request timeout for token issuance
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
}

fn default_api_timeout() -> u64 {
    30
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_timeout_secs: default_api_timeout(),
        }
    }
}
