//! External converter pair on the SPI bus.
//!
//! Each transfer sends the channel select word and clocks back the 16-bit
//! result of that channel. A bus that reads back all ones has no converter
//! driving MISO and is reported as not responding.

use afc_traits::{AdcChannel, BoxError, ExternalAdc};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::error::{HwError, Result};

const SELECT_A: u8 = 0x80;
const SELECT_B: u8 = 0xC0;

pub struct SpiAdc {
    spi: Spi,
}

impl SpiAdc {
    pub fn new(bus: u8, select: u8, clock_hz: u32) -> Result<Self> {
        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            _ => return Err(HwError::Spi(format!("unsupported bus {bus}"))),
        };
        let ss = match select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            _ => return Err(HwError::Spi(format!("unsupported slave select {select}"))),
        };
        let spi =
            Spi::new(bus, ss, clock_hz, Mode::Mode0).map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi })
    }

    fn read_channel(&mut self, channel: AdcChannel) -> Result<u16> {
        let cmd = match channel {
            AdcChannel::A => SELECT_A,
            AdcChannel::B => SELECT_B,
        };
        let write = [cmd, 0x00];
        let mut read = [0u8; 2];
        let n = self
            .spi
            .transfer(&mut read, &write)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        if n != read.len() || read == [0xFF, 0xFF] {
            return Err(HwError::NotResponding("external converter"));
        }
        let v = u16::from_be_bytes(read);
        tracing::trace!(?channel, raw = v, "spi converter read");
        Ok(v)
    }
}

impl ExternalAdc for SpiAdc {
    fn transfer(&mut self, channel: AdcChannel) -> std::result::Result<u32, BoxError> {
        Ok(u32::from(self.read_channel(channel)?))
    }
}
