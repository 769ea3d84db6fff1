//! Blocking register-level driver.
//!
//! Wraps a controller and talks to it the way host software would: through
//! bus addresses only, polling STATUS between clock edges. Every wait has a
//! cycle budget and can be cancelled from another thread through a
//! [`CancelToken`], so a stuck controller surfaces as an error instead of
//! a hang.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::device::SpiDevice;
use crate::error::DriverError;
use crate::regs::{Control, Status, CONTROL, RX_DATA, SLAVE_SELECT, STATUS, TX_DATA};
use crate::SpiController;

/// Default cycle budget for a single wait.
pub const DEFAULT_TIMEOUT: u64 = 1 << 20;

/// Shared flag that aborts a pending wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Driver<'a, D: SpiDevice> {
    ctl: &'a mut SpiController<D>,
    timeout: u64,
    cancel: Option<CancelToken>,
}

impl<'a, D: SpiDevice> Driver<'a, D> {
    pub fn new(ctl: &'a mut SpiController<D>) -> Self {
        Driver { ctl, timeout: DEFAULT_TIMEOUT, cancel: None }
    }

    pub fn with_timeout(mut self, cycles: u64) -> Self {
        self.timeout = cycles;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn controller(&mut self) -> &mut SpiController<D> {
        self.ctl
    }

    pub fn read_reg(&mut self, offset: u32) -> Result<u32, DriverError> {
        Ok(self.ctl.read_reg(offset)?)
    }

    pub fn write_reg(&mut self, offset: u32, value: u32) -> Result<(), DriverError> {
        Ok(self.ctl.write_reg(offset, value)?)
    }

    pub fn status(&mut self) -> Result<Status, DriverError> {
        Ok(Status::from_bits_truncate(self.read_reg(STATUS)?))
    }

    pub fn set_control(&mut self, control: Control) -> Result<(), DriverError> {
        self.write_reg(CONTROL, control.bits())
    }

    pub fn select(&mut self, mask: u32) -> Result<(), DriverError> {
        self.write_reg(SLAVE_SELECT, mask)
    }

    /// Clear latched ROE/TOE/E/EOP.
    pub fn clear_errors(&mut self) -> Result<(), DriverError> {
        self.write_reg(STATUS, 0)
    }

    /// Tick until every bit of `mask` is set in STATUS.
    pub fn wait_status(&mut self, mask: Status) -> Result<Status, DriverError> {
        let mut waited = 0u64;
        loop {
            self.check_cancel()?;
            let status = self.status()?;
            if status.contains(mask) {
                return Ok(status);
            }
            if waited >= self.timeout {
                log::warn!("timeout waiting for {:?} (status {:?})", mask, status);
                return Err(DriverError::Timeout { mask: mask.bits(), cycles: waited });
            }
            self.ctl.tick();
            waited += 1;
        }
    }

    /// Tick until the interrupt line is high.
    pub fn wait_irq(&mut self) -> Result<(), DriverError> {
        let mut waited = 0u64;
        while !self.ctl.irq() {
            self.check_cancel()?;
            if waited >= self.timeout {
                return Err(DriverError::Timeout { mask: 0, cycles: waited });
            }
            self.ctl.tick();
            waited += 1;
        }
        Ok(())
    }

    /// Wait for the TX slot, then queue `word`.
    pub fn send(&mut self, word: u32) -> Result<(), DriverError> {
        self.wait_status(Status::TRDY)?;
        self.write_reg(TX_DATA, word)
    }

    /// Wait for a received word and read it.
    pub fn receive(&mut self) -> Result<u32, DriverError> {
        self.wait_status(Status::RRDY)?;
        self.read_reg(RX_DATA)
    }

    /// Full-duplex exchange of one word.
    pub fn transfer(&mut self, word: u32) -> Result<u32, DriverError> {
        self.send(word)?;
        self.receive()
    }

    /// Exchange a sequence of words, returning what came back for each.
    pub fn transfer_all(&mut self, words: &[u32]) -> Result<Vec<u32>, DriverError> {
        words.iter().map(|&w| self.transfer(w)).collect()
    }

    fn check_cancel(&self) -> Result<(), DriverError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(DriverError::Cancelled),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusKind;
    use crate::config::SpiConfig;
    use crate::device::Echo;
    use crate::error::AccessError;
    use crate::regs::EOP_VALUE;

    const BUSES: [BusKind; 3] = [BusKind::AxiLite, BusKind::Up, BusKind::Wishbone];

    fn loopback(bus: BusKind) -> SpiController {
        SpiController::new(SpiConfig::new(bus, 4)).unwrap()
    }

    #[test]
    fn test_loopback_receives_what_was_sent() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            let sent: Vec<u32> = (0..256).collect();
            let mut recv = drv.transfer_all(&sent).unwrap();
            // flush the last word out of the slave
            recv.push(drv.transfer(0).unwrap());
            // first word back is the slave's reset content
            assert_eq!(recv.remove(0), 0);
            assert_eq!(recv, sent, "{:?}", bus);
        }
    }

    #[test]
    fn test_echo_round_trip() {
        for bus in BUSES {
            let mut ctl = SpiController::with_device(SpiConfig::new(bus, 4), Echo).unwrap();
            let mut drv = Driver::new(&mut ctl);
            for w in 0..256 {
                assert_eq!(drv.transfer(w).unwrap(), w);
            }
        }
    }

    #[test]
    fn test_slave_receives_each_write() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            for x in 0..256 {
                drv.write_reg(TX_DATA, x).unwrap();
                drv.wait_status(Status::TRDY).unwrap();
                assert_eq!(drv.controller().device().contents(), x);
            }
        }
    }

    #[test]
    fn test_irq_on_rrdy_dropped_by_rx_read() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            drv.set_control(Control::IE | Control::IRRDY).unwrap();
            for x in 0..256 {
                drv.write_reg(TX_DATA, x).unwrap();
                drv.wait_irq().unwrap();
                drv.read_reg(RX_DATA).unwrap();
                drv.controller().run(2);
                assert!(!drv.controller().irq());
            }
        }
    }

    #[test]
    fn test_irq_on_trdy_dropped_by_tx_write() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            drv.set_control(Control::IE | Control::ITRDY).unwrap();
            for x in 0..256 {
                drv.wait_irq().unwrap();
                drv.write_reg(TX_DATA, x).unwrap();
                drv.controller().run(2);
                assert!(!drv.controller().irq());
            }
        }
    }

    #[test]
    fn test_tx_overrun_raises_and_clears() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            drv.set_control(Control::IE | Control::ITOE).unwrap();
            for x in 0..32 {
                drv.write_reg(TX_DATA, x).unwrap();
                drv.controller().run(2);
                drv.write_reg(TX_DATA, x).unwrap();
                drv.controller().run(2);
                assert!(drv.controller().irq());
                let status = drv.status().unwrap();
                assert!(status.contains(Status::TOE | Status::E));
                drv.clear_errors().unwrap();
                drv.controller().run(2);
                assert!(!drv.controller().irq());
                assert!(!drv.status().unwrap().intersects(Status::TOE | Status::E));
                drv.receive().unwrap();
            }
        }
    }

    #[test]
    fn test_rx_overrun_raises_and_clears() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            drv.set_control(Control::IE | Control::IROE).unwrap();
            for x in 0..32 {
                drv.write_reg(TX_DATA, x).unwrap();
                drv.wait_status(Status::TRDY).unwrap();
                drv.write_reg(TX_DATA, x).unwrap();
                drv.wait_status(Status::TRDY).unwrap();
                drv.controller().run(1);
                assert!(drv.controller().irq());
                let status = drv.status().unwrap();
                assert!(status.contains(Status::ROE | Status::E));
                drv.clear_errors().unwrap();
                drv.controller().run(2);
                assert!(!drv.controller().irq());
                assert!(!drv.status().unwrap().intersects(Status::ROE | Status::E));
            }
            assert!(drv.controller().rx_overruns() >= 32);
        }
    }

    #[test]
    fn test_sso_holds_select_low() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            drv.set_control(Control::SSO).unwrap();
            for _ in 0..256 {
                drv.controller().run(2);
                assert_eq!(drv.controller().ss_n(), 0);
            }
        }
    }

    #[test]
    fn test_eop_marker() {
        for bus in BUSES {
            let mut ctl = loopback(bus);
            let mut drv = Driver::new(&mut ctl);
            drv.set_control(Control::IE | Control::IEOP).unwrap();
            drv.write_reg(EOP_VALUE, 0xFF).unwrap();
            for x in 0..255u32 {
                if x % 10 == 0 && x != 0 {
                    drv.write_reg(TX_DATA, 0xFF).unwrap();
                    drv.controller().run(2);
                    assert!(drv.status().unwrap().contains(Status::EOP));
                    assert!(drv.controller().irq());
                    drv.wait_status(Status::TRDY).unwrap();
                } else {
                    drv.write_reg(TX_DATA, x).unwrap();
                    drv.wait_status(Status::TRDY).unwrap();
                    assert_eq!(drv.controller().device().contents(), x);
                }
            }
        }
    }

    #[test]
    fn test_timeout() {
        let mut ctl = loopback(BusKind::AxiLite);
        let mut drv = Driver::new(&mut ctl).with_timeout(100);
        // nothing was sent, RRDY never rises
        assert_eq!(
            drv.wait_status(Status::RRDY),
            Err(DriverError::Timeout { mask: Status::RRDY.bits(), cycles: 100 })
        );
        assert!(matches!(drv.wait_irq(), Err(DriverError::Timeout { .. })));
    }

    #[test]
    fn test_cancelled_wait() {
        let token = CancelToken::new();
        let mut ctl = loopback(BusKind::Wishbone);
        let mut drv = Driver::new(&mut ctl).with_cancel(token.clone());
        token.cancel();
        assert_eq!(drv.wait_status(Status::RRDY), Err(DriverError::Cancelled));
    }

    #[test]
    fn test_reset_surfaces_as_access_error() {
        let mut ctl = loopback(BusKind::Up);
        ctl.set_reset(true);
        let mut drv = Driver::new(&mut ctl);
        assert_eq!(drv.transfer(1), Err(DriverError::Access(AccessError::InReset)));
    }
}
