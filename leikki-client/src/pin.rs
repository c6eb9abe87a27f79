use leikki_shared::domain::{PIN_LEN, Pin, sanitize_pin};
use tracing::{info, warn};

use crate::AppError;

/// Accepted when the profile has no PIN of its own.
pub const DEFAULT_PIN: &str = "1234";

/// Unlock state for admin-only actions.
#[derive(Debug, Default)]
pub struct AdminGate {
    unlocked: bool,
}

impl AdminGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Compares sanitized `entered` against `expected` (or [`DEFAULT_PIN`]).
    pub fn try_unlock(&mut self, entered: &str, expected: Option<&Pin>) -> Result<(), AppError> {
        let entered = sanitize_pin(entered);
        if entered.len() != PIN_LEN {
            return Err(AppError::Validation(format!(
                "PIN must be {PIN_LEN} digits"
            )));
        }
        let expected = expected.map(Pin::as_str).unwrap_or(DEFAULT_PIN);
        if entered != expected {
            warn!("wrong admin PIN");
            return Err(AppError::WrongPin);
        }
        info!("admin unlocked");
        self.unlocked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.unlocked = false;
    }
}
