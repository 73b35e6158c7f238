//! Data model

pub mod application;
pub mod deployment;
pub mod server;
