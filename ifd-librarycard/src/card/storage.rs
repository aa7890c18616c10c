//! Card state storage
//!
//! Emulates the secure element's EEPROM with a JSON file so the credential
//! survives power cycles and pcscd restarts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use super::state::CardState;

/// Errors while reading or writing the state file
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed card state: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handles persistent storage of card state
pub struct CardDataStore {
    state_file: Option<PathBuf>,
    state: CardState,
}

impl CardDataStore {
    pub const STATE_FILE: &'static str = "card_state.json";

    /// Create a store backed by `storage_dir/card_state.json`
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_file: Some(storage_dir.into().join(Self::STATE_FILE)),
            state: CardState::default(),
        }
    }

    /// Create a store that keeps everything in memory
    pub fn ephemeral() -> Self {
        Self {
            state_file: None,
            state: CardState::default(),
        }
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    /// Load card state from storage
    ///
    /// Returns true if state was loaded, false if a blank card was created
    pub fn load(&mut self) -> bool {
        let Some(path) = self.state_file.clone() else {
            return false;
        };

        match Self::read_state(&path) {
            Ok(Some(state)) => {
                self.state = state;
                info!("Loaded card state from {:?}", path);
                true
            }
            Ok(None) => {
                info!("No existing card state, starting with a blank card");
                self.state = CardState::default();
                false
            }
            Err(e) => {
                warn!("Failed to load card state: {}", e);
                self.state = CardState::default();
                false
            }
        }
    }

    /// Save card state to storage
    ///
    /// Failures are logged and reported as false; they never reach the card holder.
    pub fn save(&self) -> bool {
        let Some(path) = self.state_file.as_deref() else {
            return true;
        };

        match Self::write_state(path, &self.state) {
            Ok(()) => {
                debug!("Saved card state to {:?}", path);
                true
            }
            Err(e) => {
                warn!("Failed to save card state: {}", e);
                false
            }
        }
    }

    fn read_state(path: &Path) -> Result<Option<CardState>, StorageError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io { path: path.to_path_buf(), source });
            }
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_state(path: &Path, state: &CardState) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io { path: path.to_path_buf(), source };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        fs::write(path, json).map_err(io_err)?;
        // The file carries the PIN digest and the private key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }

    /// Reset card to factory state (reissue)
    pub fn reset_to_factory(&mut self) {
        self.state = CardState::default();
        self.save();
        info!("Card reset to factory state");
    }

    /// Get a reference to the current card state
    pub fn get_state(&self) -> &CardState {
        &self.state
    }

    /// Get a mutable reference to the current card state
    pub fn get_state_mut(&mut self) -> &mut CardState {
        &mut self.state
    }
}
