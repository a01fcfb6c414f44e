//! JobMirror client - the outer layers around the model engine.
//!
//! Provides the REST implementation of the model's remote-service seam
//! and the TOML-file implementation of its configuration seam, plus the
//! `jobmirror` CLI binary built on both.

pub mod config;
pub mod rest;

pub use config::{ConfigError, FileConfig};
pub use rest::{CredentialStore, Credentials, EnvCredentials, RestClient};
