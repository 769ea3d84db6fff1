//! End-of-packet marker detection.
//!
//! Every accepted TX submission is compared against EOP_VALUE. A match sets
//! the EOP status bit, which stays set until STATUS is written. The receive
//! path is never inspected.

use crate::regs::{RegisterFile, Status};

#[derive(Debug, Clone, Default)]
pub struct EopDetector {
    /// Marker matches since reset
    pub matches: u64,
}

impl EopDetector {
    pub fn new() -> Self {
        EopDetector { matches: 0 }
    }

    pub fn reset(&mut self) {
        self.matches = 0;
    }

    /// Check an accepted word. Returns true on a marker match.
    pub fn check(&mut self, regs: &mut RegisterFile, word: u32) -> bool {
        if word != regs.eop_value() {
            return false;
        }
        regs.set_status(regs.status() | Status::EOP);
        self.matches += 1;
        true
    }
}
