//! Card runtime: persistent state, its storage, and the answer to reset

pub mod atr;
pub mod state;
pub mod storage;

pub use atr::{build_atr, library_atr};
pub use state::CardState;
pub use storage::{CardDataStore, StorageError};
