//! Repository string normalization

use serde::{Deserialize, Serialize};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Repository address with any embedded SSH port pulled out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    /// `host:path` for scp-style addresses, otherwise the input unchanged
    pub repository: String,
    pub ssh_port: u16,
}

impl RepositoryReference {
    /// Extract a `host:port/path` port into `host:path` + port
    ///
    /// URL-style addresses (`scheme://...`) carry their port natively and
    /// pass through unchanged, as does anything without a `:<digits>/` part.
    pub fn parse(raw: &str) -> Self {
        if !raw.contains("://") {
            if let Some((host, port, path)) = split_port(raw) {
                return Self {
                    repository: format!("{}:{}", host, path),
                    ssh_port: port,
                };
            }
        }
        Self {
            repository: raw.to_string(),
            ssh_port: DEFAULT_SSH_PORT,
        }
    }

    pub fn has_custom_port(&self) -> bool {
        self.ssh_port != DEFAULT_SSH_PORT
    }
}

fn split_port(raw: &str) -> Option<(&str, u16, &str)> {
    let (host, rest) = raw.split_once(':')?;
    let (digits, path) = rest.split_once('/')?;
    if host.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let port = digits.parse::<u16>().ok()?;
    Some((host, port, path))
}
