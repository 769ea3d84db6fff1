//! Controller build parameters.

use serde::{Deserialize, Serialize};

use crate::bus::BusKind;
use crate::error::ConfigError;

/// Parameters fixed when a controller is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiConfig {
    pub bus: BusKind,
    /// Bus data width and SPI word width, in bytes (1-4)
    pub bus_width_bytes: u8,
    /// Controller clock frequency (informational; time is counted in clocks)
    pub clock_hz: u32,
    /// SCLK divider exponent: one SCLK period is `2^(rate_div+1)` clocks
    pub rate_div: u8,
    pub cpol: bool,
    pub cpha: bool,
    /// Number of chip-select outputs (1-32)
    pub select_lines: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        SpiConfig {
            bus: BusKind::AxiLite,
            bus_width_bytes: 4,
            clock_hz: 100_000_000,
            rate_div: 0,
            cpol: false,
            cpha: false,
            select_lines: 1,
        }
    }
}

impl SpiConfig {
    pub fn new(bus: BusKind, bus_width_bytes: u8) -> Self {
        SpiConfig { bus, bus_width_bytes, ..SpiConfig::default() }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=4).contains(&self.bus_width_bytes) {
            return Err(ConfigError::BusWidth(self.bus_width_bytes));
        }
        if !(1..=32).contains(&self.select_lines) {
            return Err(ConfigError::SelectLines(self.select_lines));
        }
        if self.rate_div > 15 {
            return Err(ConfigError::RateDivider(self.rate_div));
        }
        Ok(())
    }

    /// Bits per SPI word.
    pub fn word_bits(&self) -> u32 {
        self.bus_width_bytes as u32 * 8
    }

    /// SCLK frequency implied by `clock_hz` and `rate_div`.
    pub fn sclk_hz(&self) -> u32 {
        self.clock_hz >> (self.rate_div as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(SpiConfig::default().validate(), Ok(()));
        assert_eq!(SpiConfig::default().word_bits(), 32);
        assert_eq!(SpiConfig::default().sclk_hz(), 50_000_000);
    }

    #[test]
    fn test_validate_rejects() {
        let c = SpiConfig::new(BusKind::Up, 5);
        assert_eq!(c.validate(), Err(ConfigError::BusWidth(5)));
        let c = SpiConfig { select_lines: 0, ..SpiConfig::default() };
        assert_eq!(c.validate(), Err(ConfigError::SelectLines(0)));
        let c = SpiConfig { rate_div: 16, ..SpiConfig::default() };
        assert_eq!(c.validate(), Err(ConfigError::RateDivider(16)));
    }
}
