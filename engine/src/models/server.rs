//! Remote server models

use serde::{Deserialize, Serialize};

/// A remote host reachable by the command runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHost {
    /// Server id in the platform
    #[serde(default)]
    pub id: u64,

    /// Display name, safe to log
    #[serde(default)]
    pub name: String,

    /// Address the runner connects to
    pub ip: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

impl std::fmt::Display for RemoteHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}@{}:{}", self.user, self.ip, self.port)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Status of the application on one additional server
///
/// Lives and dies with the application/server attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatusPivot {
    pub server_id: u64,

    /// `state:health` token written by status polling
    #[serde(default = "default_pivot_status")]
    pub status: String,
}

fn default_pivot_status() -> String {
    "exited:unhealthy".to_string()
}

/// Where the application runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub server: RemoteHost,
}
