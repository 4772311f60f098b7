//! Fault latching and derived status bits.

/// Communication fault latch with an edge-triggered clear.
#[derive(Debug, Clone, Default)]
pub struct FaultLatch {
    latched: bool,
    last_reset: bool,
}

impl FaultLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latched(&self) -> bool {
        self.latched
    }

    /// One slow tick. A present fault latches; the latch clears only on a
    /// rising edge of `reset` while no fault is present.
    pub fn update(&mut self, fault: bool, reset: bool) -> bool {
        let rising = reset && !self.last_reset;
        self.last_reset = reset;
        if fault {
            if !self.latched {
                tracing::warn!("communication fault latched");
            }
            self.latched = true;
        } else if rising && self.latched {
            tracing::info!("communication fault cleared");
            self.latched = false;
        }
        self.latched
    }
}

/// Externally visible status, recomputed every slow tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusBits {
    /// Communication fault latched or homing in progress.
    pub not_ready: bool,
    pub com_fault: bool,
    /// Home position not yet received.
    pub not_configured: bool,
    pub homing_in_progress: bool,
    pub manual_mode: bool,
}

impl StatusBits {
    pub fn derive(
        com_fault: bool,
        homing_in_progress: bool,
        not_configured: bool,
        manual_mode: bool,
    ) -> Self {
        Self {
            not_ready: com_fault || homing_in_progress,
            com_fault,
            not_configured,
            homing_in_progress,
            manual_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_level_does_not_clear_without_edge() {
        let mut l = FaultLatch::new();
        // reset held high while the fault is active
        assert!(l.update(true, true));
        assert!(l.update(false, true));
        assert!(l.update(false, false));
        assert!(!l.update(false, true));
        assert!(!l.latched());
    }

    #[test]
    fn not_ready_is_or_of_inputs() {
        assert!(!StatusBits::derive(false, false, true, true).not_ready);
        assert!(StatusBits::derive(true, false, false, false).not_ready);
        assert!(StatusBits::derive(false, true, false, false).not_ready);
    }
}
