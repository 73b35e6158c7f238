//! Source identity: which credentials fetch the repository, and from where

pub mod repository;
pub mod resolver;
