//! Shift timing and chip-select outputs.
//!
//! Stands in for the physical layer: it does not move individual bits, it
//! only counts clock edges for one word period and reports the end of the
//! shift exactly once per started word.
//!
//! One SCLK period spans `2^(rate_div + 1)` controller clocks, so a word takes
//! `bits * 2^(rate_div + 1)` clocks. With the default divider of 0 an 8-bit
//! word completes 16 clocks after it was accepted.

use crate::config::SpiConfig;

#[derive(Debug, Clone)]
pub struct Shifter {
    half_period: u32,
    clocks_per_word: u32,
    /// Clocks left in the current word; 0 when idle
    remaining: u32,
    mosi: u32,
    cpol: bool,
    cpha: bool,
    lines_mask: u32,
}

impl Shifter {
    pub fn new(config: &SpiConfig) -> Self {
        let half_period = 1u32 << config.rate_div;
        Shifter {
            half_period,
            clocks_per_word: config.word_bits() * half_period * 2,
            remaining: 0,
            mosi: 0,
            cpol: config.cpol,
            cpha: config.cpha,
            lines_mask: lines_mask(config.select_lines),
        }
    }

    pub fn reset(&mut self) {
        self.remaining = 0;
        self.mosi = 0;
    }

    pub fn clocks_per_word(&self) -> u32 {
        self.clocks_per_word
    }

    pub fn busy(&self) -> bool {
        self.remaining != 0
    }

    /// Clocks left before the current word completes.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Begin shifting `word`.
    pub fn start(&mut self, word: u32) {
        self.mosi = word;
        self.remaining = self.clocks_per_word;
    }

    /// Advance one clock. Returns the shifted-out word when it finishes.
    pub fn tick(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            Some(self.mosi)
        } else {
            None
        }
    }

    /// SCLK level. Idles at CPOL and toggles every half period while busy.
    /// With CPHA clear the first half period is spent at idle (data set up
    /// before the leading edge); with CPHA set the leading edge comes first.
    pub fn sclk(&self) -> bool {
        if !self.busy() {
            return self.cpol;
        }
        let elapsed = self.clocks_per_word - self.remaining;
        let half = elapsed / self.half_period + self.cpha as u32;
        self.cpol ^ (half & 1 == 1)
    }

    /// Active-low chip-select outputs, one bit per line.
    pub fn ss_n(&self, slave_select: u32, sso: bool) -> u32 {
        if sso {
            0
        } else if self.busy() {
            !slave_select & self.lines_mask
        } else {
            self.lines_mask
        }
    }

    pub(crate) fn restore(&mut self, remaining: u32, mosi: u32) {
        self.remaining = remaining.min(self.clocks_per_word);
        self.mosi = mosi;
    }

    pub(crate) fn mosi(&self) -> u32 {
        self.mosi
    }
}

fn lines_mask(lines: u8) -> u32 {
    if lines >= 32 {
        u32::MAX
    } else {
        (1u32 << lines) - 1
    }
}
