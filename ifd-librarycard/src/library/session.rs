//! PIN session state
//!
//! Tracks whether the card holder's PIN has been verified since the applet was
//! last selected. Only the PIN manager sets or clears the flag during command
//! processing; everyone else reads it. It is never persisted.

use super::error::CardError;

/// Security state for the current session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SecurityState {
    pin_validated: bool,
}

impl SecurityState {
    /// Create a new, unauthenticated security state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the PIN as verified
    pub(crate) fn set_validated(&mut self) {
        self.pin_validated = true;
    }

    /// Check if the PIN has been verified
    pub fn is_validated(&self) -> bool {
        self.pin_validated
    }

    /// Abort with `6982` unless the PIN has been verified
    pub fn require_validated(&self) -> Result<(), CardError> {
        if self.pin_validated {
            Ok(())
        } else {
            Err(CardError::SecurityStatusNotSatisfied)
        }
    }

    /// Log the session out (PIN change, selection, power cycle)
    pub fn clear(&mut self) {
        self.pin_validated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SecurityState::new();
        assert!(!state.is_validated());
        assert_eq!(
            state.require_validated(),
            Err(CardError::SecurityStatusNotSatisfied)
        );
    }

    #[test]
    fn test_set_and_clear() {
        let mut state = SecurityState::new();
        state.set_validated();
        assert!(state.is_validated());
        assert!(state.require_validated().is_ok());
        state.clear();
        assert!(!state.is_validated());
    }
}
