use thiserror::Error;

/// Why a run of the control core stopped for good.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    #[error("peripheral bring-up failed")]
    BringUp,
    #[error("slow tick watchdog expired")]
    Watchdog,
}

#[derive(Debug, Error, Clone)]
pub enum AfcError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("sensor not responding: {0}")]
    Sensor(String),
    #[error("unknown command index {0:#06x}")]
    UnknownCommand(u16),
    #[error("fatal: {0}")]
    Fatal(FatalReason),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing reverse power scaler")]
    MissingReverseScaler,
    #[error("missing forward power scaler")]
    MissingForwardScaler,
    #[error("missing transport")]
    MissingTransport,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
