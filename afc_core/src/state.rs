//! Control modes and the pure transition function.

/// Top-level control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlMode {
    Startup = 0x10,
    AutoZero = 0x20,
    AutoHome = 0x30,
    RunAfc = 0x40,
    RunManual = 0x50,
}

impl ControlMode {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a raw state code. Anything unknown is a recoverable fault and
    /// decodes to `RunAfc`.
    pub fn from_raw(code: u8) -> Self {
        match code {
            0x10 => Self::Startup,
            0x20 => Self::AutoZero,
            0x30 => Self::AutoHome,
            0x40 => Self::RunAfc,
            0x50 => Self::RunManual,
            other => {
                tracing::warn!(code = other, "invalid control state, forcing RunAfc");
                Self::RunAfc
            }
        }
    }

    /// True while the actuator is being zeroed or sent home.
    #[inline]
    pub fn homing_in_progress(self) -> bool {
        matches!(self, Self::AutoZero | Self::AutoHome)
    }
}

impl core::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Startup => "startup",
            Self::AutoZero => "auto-zero",
            Self::AutoHome => "auto-home",
            Self::RunAfc => "run-afc",
            Self::RunManual => "run-manual",
        };
        f.write_str(s)
    }
}

/// Everything a transition depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInputs {
    pub current_position: u16,
    pub home_position: u16,
    pub zero_tolerance: u16,
    pub not_configured: bool,
    pub manual_requested: bool,
}

/// Next mode given the current one and the inputs.
pub fn next_mode(mode: ControlMode, i: &ModeInputs) -> ControlMode {
    match mode {
        ControlMode::Startup => ControlMode::AutoZero,
        ControlMode::AutoZero => {
            if i.current_position <= i.zero_tolerance && !i.not_configured {
                ControlMode::AutoHome
            } else {
                mode
            }
        }
        ControlMode::AutoHome => {
            if i.current_position == i.home_position {
                ControlMode::RunAfc
            } else {
                mode
            }
        }
        ControlMode::RunAfc if i.manual_requested => ControlMode::RunManual,
        ControlMode::RunManual if !i.manual_requested => ControlMode::RunAfc,
        ControlMode::RunAfc | ControlMode::RunManual => mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_recover_to_run_afc() {
        assert_eq!(ControlMode::from_raw(0), ControlMode::RunAfc);
        assert_eq!(ControlMode::from_raw(0xFF), ControlMode::RunAfc);
        for m in [
            ControlMode::Startup,
            ControlMode::AutoZero,
            ControlMode::AutoHome,
            ControlMode::RunAfc,
            ControlMode::RunManual,
        ] {
            assert_eq!(ControlMode::from_raw(m.code()), m);
        }
    }

    #[test]
    fn homing_flag_is_a_function_of_mode() {
        assert!(ControlMode::AutoZero.homing_in_progress());
        assert!(ControlMode::AutoHome.homing_in_progress());
        assert!(!ControlMode::Startup.homing_in_progress());
        assert!(!ControlMode::RunAfc.homing_in_progress());
        assert!(!ControlMode::RunManual.homing_in_progress());
    }
}
