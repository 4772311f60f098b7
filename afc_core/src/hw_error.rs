//! Maps `Box<dyn Error>` from trait boundaries to typed `AfcError`.
//!
//! The traits in `afc_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to the typed error enum, with an optional feature-gated path
//! for `afc_hardware::HwError` downcasting.

use crate::error::AfcError;

/// Map a trait-boundary error to a typed `AfcError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> AfcError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<afc_hardware::error::HwError>() {
            return match hw {
                afc_hardware::error::HwError::NotResponding(_)
                | afc_hardware::error::HwError::Spi(_) => AfcError::Sensor(hw.to_string()),
                other => AfcError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("not responding") || lower.contains("timeout") {
        AfcError::Sensor(s)
    } else {
        AfcError::Hardware(s)
    }
}
