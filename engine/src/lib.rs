//! Shipyard engine library
//!
//! Source resolution and remote command synthesis for deployments: turns a
//! stored application plus a deployment attempt into the shell commands that
//! fetch its source on a remote host, keeps compose metadata in sync, and
//! answers status and redeploy questions.

pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod fingerprint;
pub mod http;
pub mod logs;
pub mod models;
pub mod source;
pub mod status;
pub mod storage;
pub mod utils;
