//! Multi-server status aggregation
//!
//! A status token is `state:health`, `state(health)` or a bare `state`.
//! Missing health reads as `unhealthy`.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const RUNNING: &str = "running";
pub const HEALTHY: &str = "healthy";
pub const UNHEALTHY: &str = "unhealthy";
pub const DEGRADED: &str = "degraded";

/// Application-level status, recomputed on every read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedStatus {
    pub state: String,
    pub health: String,
}

impl AggregatedStatus {
    pub fn new(state: impl Into<String>, health: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            health: health.into(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == RUNNING
    }

    pub fn is_degraded(&self) -> bool {
        self.state == DEGRADED
    }
}

impl fmt::Display for AggregatedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.state, self.health)
    }
}

fn health_or_default(health: &str) -> String {
    let health = health.trim();
    if health.is_empty() {
        UNHEALTHY.to_string()
    } else {
        health.to_string()
    }
}

/// Parse one token into its state and health
pub fn parse_token(raw: &str) -> AggregatedStatus {
    if let Some((state, rest)) = raw.split_once('(') {
        let health = rest.split_once(')').map_or(rest, |(inner, _)| inner);
        return AggregatedStatus::new(state.trim(), health_or_default(health));
    }
    if let Some((state, health)) = raw.split_once(':') {
        return AggregatedStatus::new(state.trim(), health_or_default(health));
    }
    AggregatedStatus::new(raw.trim(), UNHEALTHY)
}

/// Canonical `state:health` form written back to storage
pub fn normalize_token(raw: &str) -> String {
    parse_token(raw).to_string()
}

/// Reduce the primary token and additional server tokens to one status
///
/// An additional server degrades the state only when it is not running and
/// disagrees with the primary state; it marks the aggregate unhealthy only
/// when it is not healthy and disagrees with the primary health. Both checks
/// compare against the primary, so once an aggregate flips it stays flipped
/// and the result does not depend on attachment order.
pub fn aggregate<'a, I>(primary: &str, additional: I) -> AggregatedStatus
where
    I: IntoIterator<Item = &'a str>,
{
    let main = parse_token(primary);
    let mut result = main.clone();

    for token in additional {
        let server = parse_token(token);
        if server.state != RUNNING && server.state != main.state {
            result.state = DEGRADED.to_string();
        }
        if server.health != HEALTHY && server.health != main.health {
            result.health = UNHEALTHY.to_string();
        }
    }

    result
}
