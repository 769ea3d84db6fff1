//! Status and interrupt controller.
//!
//! Owns the condition bits in STATUS and the single interrupt output. The
//! output is recomputed from STATUS and CONTROL after every access and every
//! completion; it is never tracked incrementally.
//!
//! | Condition | Enable | Cleared by |
//! |-----------|--------|------------|
//! | ROE  | IROE  | STATUS write |
//! | TOE  | ITOE  | STATUS write |
//! | TRDY | ITRDY | TX_DATA write (set again on completion) |
//! | RRDY | IRRDY | RX_DATA read |
//! | EOP  | IEOP  | STATUS write |
//!
//! Nothing fires unless the global IE bit is set.

use crate::eop::EopDetector;
use crate::regs::{Control, RegisterFile, Status};
use crate::transfer::{Submit, TransferEngine};

/// Condition/enable pairs feeding the interrupt output.
const SOURCES: [(Status, Control); 5] = [
    (Status::ROE, Control::IROE),
    (Status::TOE, Control::ITOE),
    (Status::TRDY, Control::ITRDY),
    (Status::RRDY, Control::IRRDY),
    (Status::EOP, Control::IEOP),
];

#[derive(Debug, Clone, Default)]
pub struct StatusController {
    irq: bool,
    /// TOE events since reset
    pub tx_overruns: u64,
    /// ROE events since reset
    pub rx_overruns: u64,
}

impl StatusController {
    pub fn new() -> Self {
        StatusController { irq: false, tx_overruns: 0, rx_overruns: 0 }
    }

    pub fn reset(&mut self) {
        *self = StatusController::new();
    }

    /// Level driven on the interrupt line after the last refresh.
    pub fn irq(&self) -> bool {
        self.irq
    }

    /// RX_DATA was read.
    pub fn on_rx_read(&mut self, regs: &mut RegisterFile) {
        regs.set_status(regs.status() - Status::RRDY);
        self.refresh(regs);
    }

    /// TX_DATA was written: hand the word to the engine, run marker detection
    /// on accepted words, latch TOE/E on overrun.
    pub fn on_tx_write(
        &mut self,
        regs: &mut RegisterFile,
        engine: &mut TransferEngine,
        eop: &mut EopDetector,
        word: u32,
    ) -> Submit {
        let outcome = engine.submit(regs, word);
        match outcome {
            Submit::Accepted(accepted) => {
                eop.check(regs, accepted);
            }
            Submit::Overrun => {
                regs.set_status(regs.status() | Status::TOE | Status::E);
                self.tx_overruns += 1;
                log::warn!("TX overrun: 0x{:X} written while busy", regs.tx_data());
            }
        }
        self.refresh(regs);
        outcome
    }

    /// STATUS was written. The value is irrelevant: every latched condition
    /// clears, RRDY/TRDY are untouched.
    pub fn on_status_write(&mut self, regs: &mut RegisterFile, _value: u32) {
        regs.set_status(regs.status() - Status::LATCHED);
        self.refresh(regs);
    }

    /// CONTROL was written; SSO is mirrored into STATUS for readback.
    pub fn on_control_write(&mut self, regs: &mut RegisterFile, value: u32) {
        let control = Control::from_bits_truncate(value);
        regs.set_control(control);
        let status = regs.status();
        regs.set_status(if control.contains(Control::SSO) {
            status | Status::SSO
        } else {
            status - Status::SSO
        });
        self.refresh(regs);
    }

    /// A shift finished and the engine latched the word.
    pub fn on_receive_complete(&mut self, regs: &mut RegisterFile) {
        let mut status = regs.status();
        if status.contains(Status::RRDY) {
            status |= Status::ROE | Status::E;
            self.rx_overruns += 1;
            log::warn!("RX overrun: unread word replaced by 0x{:X}", regs.rx_data());
        }
        regs.set_status(status | Status::RRDY);
        self.refresh(regs);
    }

    /// Recompute and latch the interrupt level.
    pub fn refresh(&mut self, regs: &RegisterFile) -> bool {
        self.irq = effective_irq(regs.status(), regs.control());
        self.irq
    }

    /// Drive the line low without touching STATUS (reset).
    pub fn force_low(&mut self) {
        self.irq = false;
    }
}

/// IRQ = IE && any(condition && enable).
pub fn effective_irq(status: Status, control: Control) -> bool {
    control.contains(Control::IE)
        && SOURCES
            .iter()
            .any(|&(cond, en)| status.contains(cond) && control.contains(en))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_needs_global_enable() {
        assert!(!effective_irq(Status::RRDY, Control::IRRDY));
        assert!(effective_irq(Status::RRDY, Control::IRRDY | Control::IE));
        assert!(!effective_irq(Status::RRDY, Control::ITRDY | Control::IE));
        assert!(!effective_irq(Status::empty(), Control::all()));
    }

    #[test]
    fn test_e_alone_does_not_fire() {
        // E has no enable of its own; the overrun bits carry the interrupt
        assert!(!effective_irq(Status::E, Control::all() - Control::IROE - Control::ITOE));
    }

    #[test]
    fn test_status_write_clears_latched_only() {
        let mut regs = RegisterFile::new(4);
        let mut sc = StatusController::new();
        regs.set_status(Status::all());
        sc.on_status_write(&mut regs, 0);
        assert_eq!(regs.status(), Status::TRDY | Status::RRDY | Status::SSO);
    }

    #[test]
    fn test_receive_complete_overrun() {
        let mut regs = RegisterFile::new(4);
        let mut sc = StatusController::new();
        regs.set_control(Control::IE | Control::IROE);
        sc.on_receive_complete(&mut regs);
        assert!(!sc.irq());
        sc.on_receive_complete(&mut regs);
        assert!(regs.status().contains(Status::ROE | Status::E | Status::RRDY));
        assert!(sc.irq());
        assert_eq!(sc.rx_overruns, 1);
    }

    #[test]
    fn test_tx_overrun_sets_e() {
        let mut regs = RegisterFile::new(4);
        let mut sc = StatusController::new();
        let mut eng = TransferEngine::new();
        let mut eop = EopDetector::new();
        regs.set_control(Control::IE | Control::ITOE);
        assert!(matches!(sc.on_tx_write(&mut regs, &mut eng, &mut eop, 1), Submit::Accepted(1)));
        assert!(!sc.irq());
        assert_eq!(sc.on_tx_write(&mut regs, &mut eng, &mut eop, 1), Submit::Overrun);
        assert!(regs.status().contains(Status::TOE | Status::E));
        assert!(sc.irq());
    }

    #[test]
    fn test_sso_readback() {
        let mut regs = RegisterFile::new(4);
        let mut sc = StatusController::new();
        sc.on_control_write(&mut regs, Control::SSO.bits());
        assert!(regs.status().contains(Status::SSO));
        sc.on_control_write(&mut regs, 0);
        assert!(!regs.status().contains(Status::SSO));
    }
}
