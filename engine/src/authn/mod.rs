//! Credentials: secret handling and installation token issuance

pub mod github_app;
pub mod issuer;
pub mod secret;
