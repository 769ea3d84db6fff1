//! Controller register file.
//!
//! The register map is laid out on a 4-byte stride regardless of the bus
//! data width:
//!
//! | Offset | Register     | Access |
//! |--------|--------------|--------|
//! | 0x00   | RX_DATA      | R (read clears RRDY) |
//! | 0x04   | TX_DATA      | W (write submits a word) |
//! | 0x08   | STATUS       | R, any write clears ROE/TOE/E/EOP |
//! | 0x0C   | CONTROL      | R/W |
//! | 0x10   | reserved     | reads 0, writes ignored |
//! | 0x14   | SLAVE_SELECT | R/W |
//! | 0x18   | EOP_VALUE    | R/W |
//! | 0x1C   | CONTROL_EXT  | R/W |
//!
//! [`RegisterFile`] is pure storage. Side effects of an access live in the
//! controller and in [`crate::irq::StatusController`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::AddressError;

pub const RX_DATA: u32 = 0x00;
pub const TX_DATA: u32 = 0x04;
pub const STATUS: u32 = 0x08;
pub const CONTROL: u32 = 0x0C;
pub const RESERVED: u32 = 0x10;
pub const SLAVE_SELECT: u32 = 0x14;
pub const EOP_VALUE: u32 = 0x18;
pub const CONTROL_EXT: u32 = 0x1C;

/// Byte distance between two consecutive registers.
pub const REG_STRIDE: u32 = 4;
/// Number of register positions in the map, the reserved one included.
pub const REG_SLOTS: u32 = 8;

bitflags! {
    /// STATUS register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u32 {
        /// Receive overrun
        const ROE  = 1 << 3;
        /// Transmit overrun
        const TOE  = 1 << 4;
        /// Transmit ready
        const TRDY = 1 << 6;
        /// Receive ready
        const RRDY = 1 << 7;
        /// Aggregate error (ROE | TOE latched)
        const E    = 1 << 8;
        /// End-of-packet marker matched
        const EOP  = 1 << 9;
        /// Slave-select override readback
        const SSO  = 1 << 10;
    }
}

impl Status {
    /// Bits cleared by any write to STATUS.
    pub const LATCHED: Status = Status::ROE
        .union(Status::TOE)
        .union(Status::E)
        .union(Status::EOP);
}

bitflags! {
    /// CONTROL register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Control: u32 {
        const IROE  = 1 << 3;
        const ITOE  = 1 << 4;
        const ITRDY = 1 << 6;
        const IRRDY = 1 << 7;
        /// Global interrupt enable
        const IE    = 1 << 8;
        const IEOP  = 1 << 9;
        /// Slave-select override
        const SSO   = 1 << 10;
    }
}

/// Register position in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterIndex {
    RxData,
    TxData,
    Status,
    Control,
    Reserved,
    SlaveSelect,
    EopValue,
    ControlExt,
}

impl RegisterIndex {
    pub const ALL: [RegisterIndex; REG_SLOTS as usize] = [
        RegisterIndex::RxData,
        RegisterIndex::TxData,
        RegisterIndex::Status,
        RegisterIndex::Control,
        RegisterIndex::Reserved,
        RegisterIndex::SlaveSelect,
        RegisterIndex::EopValue,
        RegisterIndex::ControlExt,
    ];

    /// Look up a register by its word position (byte offset / 4).
    pub fn from_word(word: u32) -> Option<Self> {
        Self::ALL.get(word as usize).copied()
    }

    /// Byte offset of this register in the map.
    pub fn offset(self) -> u32 {
        self as u32 * REG_STRIDE
    }

    pub fn name(self) -> &'static str {
        match self {
            RegisterIndex::RxData => "RX_DATA",
            RegisterIndex::TxData => "TX_DATA",
            RegisterIndex::Status => "STATUS",
            RegisterIndex::Control => "CONTROL",
            RegisterIndex::Reserved => "RESERVED",
            RegisterIndex::SlaveSelect => "SLAVE_SELECT",
            RegisterIndex::EopValue => "EOP_VALUE",
            RegisterIndex::ControlExt => "CONTROL_EXT",
        }
    }

    /// Storage slot; the reserved position has none.
    fn slot(self) -> Option<usize> {
        match self {
            RegisterIndex::RxData => Some(0),
            RegisterIndex::TxData => Some(1),
            RegisterIndex::Status => Some(2),
            RegisterIndex::Control => Some(3),
            RegisterIndex::Reserved => None,
            RegisterIndex::SlaveSelect => Some(4),
            RegisterIndex::EopValue => Some(5),
            RegisterIndex::ControlExt => Some(6),
        }
    }
}

/// Power-on value of SLAVE_SELECT: slave 0 selected.
pub const SLAVE_SELECT_RESET: u32 = 0x1;

/// Seven word-wide storage slots.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    slots: [u32; 7],
    mask: u32,
}

impl RegisterFile {
    /// Create a register file for `width_bytes`-wide words (1-4).
    pub fn new(width_bytes: u8) -> Self {
        let mut regs = RegisterFile { slots: [0; 7], mask: word_mask(width_bytes) };
        regs.reset();
        regs
    }

    /// Restore power-on values.
    pub fn reset(&mut self) {
        self.slots = [0; 7];
        self.slots[2] = Status::TRDY.bits();
        self.slots[4] = SLAVE_SELECT_RESET & self.mask;
    }

    /// All-ones value for the configured word width.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn read(&self, index: RegisterIndex) -> Result<u32, AddressError> {
        let slot = index.slot().ok_or(AddressError::InvalidAddress(index.offset()))?;
        Ok(self.slots[slot])
    }

    pub fn write(&mut self, index: RegisterIndex, value: u32) -> Result<(), AddressError> {
        let slot = index.slot().ok_or(AddressError::InvalidAddress(index.offset()))?;
        self.slots[slot] = match index {
            // Bitfields keep their full layout on narrow buses.
            RegisterIndex::Status | RegisterIndex::Control => value,
            _ => value & self.mask,
        };
        Ok(())
    }

    // --- Typed accessors ---

    #[inline]
    pub fn rx_data(&self) -> u32 {
        self.slots[0]
    }

    #[inline]
    pub fn set_rx_data(&mut self, v: u32) {
        self.slots[0] = v & self.mask;
    }

    #[inline]
    pub fn tx_data(&self) -> u32 {
        self.slots[1]
    }

    #[inline]
    pub fn set_tx_data(&mut self, v: u32) {
        self.slots[1] = v & self.mask;
    }

    /// STATUS is not masked to the word width: its bits sit above bit 7.
    #[inline]
    pub fn status(&self) -> Status {
        Status::from_bits_truncate(self.slots[2])
    }

    #[inline]
    pub fn set_status(&mut self, s: Status) {
        self.slots[2] = s.bits();
    }

    #[inline]
    pub fn control(&self) -> Control {
        Control::from_bits_truncate(self.slots[3])
    }

    #[inline]
    pub fn set_control(&mut self, c: Control) {
        self.slots[3] = c.bits();
    }

    #[inline]
    pub fn slave_select(&self) -> u32 {
        self.slots[4]
    }

    #[inline]
    pub fn eop_value(&self) -> u32 {
        self.slots[5]
    }

    #[inline]
    pub fn control_ext(&self) -> u32 {
        self.slots[6]
    }

    pub(crate) fn raw(&self) -> [u32; 7] {
        self.slots
    }

    pub(crate) fn load_raw(&mut self, slots: [u32; 7]) {
        self.slots = slots;
    }
}

/// Mask covering `width_bytes` bytes.
pub fn word_mask(width_bytes: u8) -> u32 {
    match width_bytes {
        0 => 0,
        1..=3 => (1u32 << (width_bytes as u32 * 8)) - 1,
        _ => u32::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_values() {
        let regs = RegisterFile::new(4);
        assert_eq!(regs.rx_data(), 0);
        assert_eq!(regs.status(), Status::TRDY);
        assert_eq!(regs.control(), Control::empty());
        assert_eq!(regs.slave_select(), 1);
    }

    #[test]
    fn test_reserved_slot_rejected() {
        let mut regs = RegisterFile::new(4);
        assert_eq!(
            regs.read(RegisterIndex::Reserved),
            Err(AddressError::InvalidAddress(RESERVED))
        );
        assert!(regs.write(RegisterIndex::Reserved, 1).is_err());
    }

    #[test]
    fn test_width_mask() {
        let mut regs = RegisterFile::new(1);
        regs.write(RegisterIndex::EopValue, 0x1FF).unwrap();
        assert_eq!(regs.read(RegisterIndex::EopValue), Ok(0xFF));
        regs.write(RegisterIndex::Control, 0x180).unwrap();
        assert_eq!(regs.control(), Control::IE | Control::IRRDY);

        let mut regs = RegisterFile::new(2);
        regs.set_tx_data(0xABCDE);
        assert_eq!(regs.tx_data(), 0xBCDE);
        assert_eq!(word_mask(3), 0x00FF_FFFF);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(RegisterIndex::from_word(STATUS / REG_STRIDE), Some(RegisterIndex::Status));
        assert_eq!(RegisterIndex::ControlExt.offset(), CONTROL_EXT);
        assert_eq!(RegisterIndex::from_word(8), None);
    }

    #[test]
    fn test_status_above_narrow_width() {
        let mut regs = RegisterFile::new(1);
        regs.set_status(Status::E | Status::EOP);
        assert!(regs.status().contains(Status::EOP));
    }
}
