//! Runtime configuration
//!
//! The handler is loaded by pcscd, so there is no command line; everything
//! comes from the environment.

use std::path::PathBuf;

use log::warn;
use thiserror::Error;

use crate::library::SigningProfile;

pub const STORAGE_DIR_VAR: &str = "LIBRARYCARD_STORAGE_DIR";
pub const SIGNING_VAR: &str = "LIBRARYCARD_SIGNING";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown signing profile {0:?}, expected auto, signature or raw")]
    UnknownSigningProfile(String),
}

/// Card runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardConfig {
    /// Directory holding `card_state.json`
    pub storage_dir: PathBuf,
    /// Signing strategies the emulated card offers
    pub signing: SigningProfile,
}

impl CardConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_dir = lookup(STORAGE_DIR_VAR)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_dir);

        let signing = match lookup(SIGNING_VAR) {
            Some(value) => parse_signing_profile(&value).unwrap_or_else(|e| {
                warn!("{}; using auto", e);
                SigningProfile::default()
            }),
            None => SigningProfile::default(),
        };

        Self { storage_dir, signing }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            signing: SigningProfile::default(),
        }
    }
}

/// `~/.librarycard`, or `/var/lib/librarycard` without a home directory
pub fn default_storage_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".librarycard"),
        None => PathBuf::from("/var/lib/librarycard"),
    }
}

pub fn parse_signing_profile(value: &str) -> Result<SigningProfile, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "auto" => Ok(SigningProfile::full()),
        "signature" => Ok(SigningProfile::signature_only()),
        "raw" => Ok(SigningProfile::raw_only()),
        _ => Err(ConfigError::UnknownSigningProfile(value.to_string())),
    }
}
