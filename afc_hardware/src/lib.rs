//! Board-side devices for the AFC controller.
//!
//! `sim` holds the simulated RF load, converters, phase driver and transport
//! used by `afc simulate` and the tests. The `hardware` feature adds the
//! SPI-attached external converter; `rt` adds process scheduling helpers.

pub mod error;
#[cfg(feature = "rt")]
pub mod rt;
pub mod sim;
#[cfg(feature = "hardware")]
pub mod spi_adc;

pub use sim::{
    PhaseProbe, PositionFn, SimExternalAdc, SimInternalAdc, SimParams, SimPhases, SimPulseCounter,
    SimTransport, TransportLines,
};
