//! Shared building blocks of the certificate registration server: the token
//! service, the role hierarchy, configuration loading and the JSON wire types.

pub mod auth;
pub mod config;
pub mod types;
