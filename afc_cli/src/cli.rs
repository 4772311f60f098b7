//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "afc", version, about = "Magnetron AFC controller (simulated board)")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller against the simulated RF load
    Simulate {
        /// Run length in seconds
        #[arg(long, value_name = "SECS", default_value_t = 20.0)]
        duration: f64,
        /// Seconds into the run at which the transmitter starts pulsing
        #[arg(long, value_name = "SECS", default_value_t = 8.0)]
        pulse_from: f64,
        /// Seconds into the run at which pulsing stops (end of run if unset)
        #[arg(long, value_name = "SECS")]
        pulse_until: Option<f64>,
        /// Override [simulation].home
        #[arg(long, value_name = "POS")]
        home: Option<u16>,
        /// Switch to manual mode with this target once pulsing starts
        #[arg(long, value_name = "POS")]
        manual: Option<u16>,
        /// Ask for per-pulse log records
        #[arg(long, action = ArgAction::SetTrue)]
        fast_log: bool,
        /// Record a trace point every N slow ticks
        #[arg(long, value_name = "TICKS")]
        trace_every: Option<u32>,
        /// Run on the wall clock with one thread per trigger instead of virtual time
        #[arg(long, action = ArgAction::SetTrue)]
        realtime: bool,
        /// Read the reverse detector from the SPI converter (hardware builds)
        #[arg(long, action = ArgAction::SetTrue)]
        spi_adc: bool,
        /// Enable real-time mode (SCHED_FIFO, affinity, mlockall); needs --realtime
        #[arg(
            long,
            action = ArgAction::SetTrue,
            requires = "realtime",
            long_help = "Enable real-time mode on supported OSes.\n\nLinux: Attempts SCHED_FIFO priority, pins to one CPU, and calls mlockall to lock the process address space into RAM. Requires a build with the `rt` feature and usually elevated privileges or ulimits (e.g., memlock)."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (Linux only)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Select memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE")]
        rt_lock: Option<RtLock>,
        /// CPU index to pin to when --rt is enabled (Linux only). Defaults to 0.
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
    },
    /// Validate the config and run a short simulated bring-up
    SelfCheck,
}
