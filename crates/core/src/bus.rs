//! Bus adapters.
//!
//! Each external bus presents the same register map under its own addressing
//! convention. An adapter turns a raw bus address into a [`RegisterIndex`]
//! and knows the reverse mapping used by drivers:
//!
//! - [`AxiLiteAdapter`]: byte addressed, registers on a 4-byte stride
//! - [`UpAdapter`]: narrow synchronous bus; addresses arrive pre-shifted right
//!   by `bus_width_bytes / 2`
//! - [`WishboneAdapter`]: byte addressed, one ACK pulse per completed cycle
//!
//! Adapters are stateless apart from the bus width they were built for. An
//! address that does not land on a register, or an access narrower or wider
//! than the bus, is a programming error and is rejected immediately.

use serde::{Deserialize, Serialize};

use crate::error::AddressError;
use crate::regs::{RegisterIndex, REG_SLOTS, REG_STRIDE};

/// External bus flavour, chosen when the controller is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusKind {
    AxiLite,
    Up,
    Wishbone,
}

impl BusKind {
    /// Byte used in save-state headers.
    pub fn id(self) -> u8 {
        match self {
            BusKind::AxiLite => 0,
            BusKind::Up => 1,
            BusKind::Wishbone => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(BusKind::AxiLite),
            1 => Some(BusKind::Up),
            2 => Some(BusKind::Wishbone),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "axi" | "axi-lite" | "axi_lite" | "axil" => Some(BusKind::AxiLite),
            "up" | "uP" => Some(BusKind::Up),
            "wb" | "wishbone" => Some(BusKind::Wishbone),
            _ => None,
        }
    }

    /// Build the adapter for a bus `width_bytes` wide.
    pub fn adapter(self, width_bytes: u8) -> Box<dyn BusAdapter> {
        match self {
            BusKind::AxiLite => Box::new(AxiLiteAdapter::new(width_bytes)),
            BusKind::Up => Box::new(UpAdapter::new(width_bytes)),
            BusKind::Wishbone => Box::new(WishboneAdapter::new(width_bytes)),
        }
    }
}

/// Access direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Read,
    Write,
}

/// Raw access as it arrives from a bus shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRequest {
    pub address: u32,
    pub direction: Direction,
    /// Bytes the master drives (or samples) on the data lines
    pub width_bytes: u8,
    /// Write data; ignored for reads.
    pub payload: u32,
}

impl BusRequest {
    pub fn read(address: u32, width_bytes: u8) -> Self {
        BusRequest { address, direction: Direction::Read, width_bytes, payload: 0 }
    }

    pub fn write(address: u32, payload: u32, width_bytes: u8) -> Self {
        BusRequest { address, direction: Direction::Write, width_bytes, payload }
    }
}

/// Decoded access understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub index: RegisterIndex,
    pub direction: Direction,
}

/// How the bus reports a completed access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Separate read/write ready lines
    Ready { read: &'static str, write: &'static str },
    /// Single acknowledge pulse for either direction
    AckPulse { ack: &'static str },
}

/// Mapping from one bus's addressing convention to register indices.
pub trait BusAdapter {
    fn kind(&self) -> BusKind;

    /// Raw bus address to register.
    fn translate(&self, address: u32) -> Result<RegisterIndex, AddressError>;

    /// Register byte offset to the raw address a master puts on this bus.
    fn encode(&self, offset: u32) -> u32;

    fn handshake(&self) -> Handshake;

    /// Data width the bus was built with.
    fn width_bytes(&self) -> u8;

    fn decode(&self, req: &BusRequest) -> Result<Access, AddressError> {
        if req.width_bytes != self.width_bytes() {
            return Err(AddressError::WidthMismatch {
                address: req.address,
                width: req.width_bytes,
                expected: self.width_bytes(),
            });
        }
        let index = self.translate(req.address)?;
        Ok(Access { index, direction: req.direction })
    }
}

/// Byte offset to register, shared by all variants once the bus-specific
/// shift has been undone. `raw` is only used for error reporting.
fn index_for_offset(offset: u32, raw: u32) -> Result<RegisterIndex, AddressError> {
    if offset % REG_STRIDE != 0 {
        return Err(AddressError::MisalignedAddress(raw));
    }
    let word = offset / REG_STRIDE;
    if word >= REG_SLOTS {
        return Err(AddressError::InvalidAddress(raw));
    }
    RegisterIndex::from_word(word).ok_or(AddressError::InvalidAddress(raw))
}

/// Lite memory-mapped bus: byte addresses, word-aligned.
#[derive(Debug, Clone, Copy)]
pub struct AxiLiteAdapter {
    width: u8,
}

impl AxiLiteAdapter {
    pub fn new(width_bytes: u8) -> Self {
        AxiLiteAdapter { width: width_bytes }
    }
}

impl BusAdapter for AxiLiteAdapter {
    fn kind(&self) -> BusKind {
        BusKind::AxiLite
    }

    fn translate(&self, address: u32) -> Result<RegisterIndex, AddressError> {
        index_for_offset(address, address)
    }

    fn encode(&self, offset: u32) -> u32 {
        offset
    }

    fn handshake(&self) -> Handshake {
        Handshake::Ready { read: "s_axi_arready", write: "s_axi_wready" }
    }

    fn width_bytes(&self) -> u8 {
        self.width
    }
}

/// Narrow synchronous register bus.
///
/// The master shifts byte offsets right by `bus_width_bytes / 2` before
/// driving the address lines (a 4-byte bus sees TX_DATA at address 1).
#[derive(Debug, Clone, Copy)]
pub struct UpAdapter {
    width: u8,
    shift: u32,
}

impl UpAdapter {
    pub fn new(width_bytes: u8) -> Self {
        UpAdapter { width: width_bytes, shift: (width_bytes / 2) as u32 }
    }

    /// Address divisor exponent for this bus width.
    pub fn shift(&self) -> u32 {
        self.shift
    }
}

impl BusAdapter for UpAdapter {
    fn kind(&self) -> BusKind {
        BusKind::Up
    }

    fn translate(&self, address: u32) -> Result<RegisterIndex, AddressError> {
        let offset = address
            .checked_shl(self.shift)
            .filter(|o| o >> self.shift == address)
            .ok_or(AddressError::InvalidAddress(address))?;
        index_for_offset(offset, address)
    }

    fn encode(&self, offset: u32) -> u32 {
        offset >> self.shift
    }

    fn handshake(&self) -> Handshake {
        Handshake::Ready { read: "up_rack", write: "up_wack" }
    }

    fn width_bytes(&self) -> u8 {
        self.width
    }
}

/// Classic handshake bus: byte addresses plus an ACK pulse per cycle.
#[derive(Debug, Clone, Copy)]
pub struct WishboneAdapter {
    width: u8,
}

impl WishboneAdapter {
    pub fn new(width_bytes: u8) -> Self {
        WishboneAdapter { width: width_bytes }
    }
}

impl BusAdapter for WishboneAdapter {
    fn kind(&self) -> BusKind {
        BusKind::Wishbone
    }

    fn translate(&self, address: u32) -> Result<RegisterIndex, AddressError> {
        index_for_offset(address, address)
    }

    fn encode(&self, offset: u32) -> u32 {
        offset
    }

    fn handshake(&self) -> Handshake {
        Handshake::AckPulse { ack: "s_wb_ack" }
    }

    fn width_bytes(&self) -> u8 {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{CONTROL_EXT, EOP_VALUE, RX_DATA, STATUS, TX_DATA};

    #[test]
    fn test_axi_lite_translate() {
        let bus = AxiLiteAdapter::new(4);
        assert_eq!(bus.translate(RX_DATA), Ok(RegisterIndex::RxData));
        assert_eq!(bus.translate(STATUS), Ok(RegisterIndex::Status));
        assert_eq!(bus.translate(CONTROL_EXT), Ok(RegisterIndex::ControlExt));
        assert_eq!(bus.translate(0x06), Err(AddressError::MisalignedAddress(0x06)));
        assert_eq!(bus.translate(0x20), Err(AddressError::InvalidAddress(0x20)));
    }

    #[test]
    fn test_up_translate_per_width() {
        // 4-byte bus: divisor exponent 2, addresses are word indices
        let bus = UpAdapter::new(4);
        assert_eq!(bus.shift(), 2);
        assert_eq!(bus.translate(TX_DATA >> 2), Ok(RegisterIndex::TxData));
        assert_eq!(bus.translate(EOP_VALUE >> 2), Ok(RegisterIndex::EopValue));
        assert_eq!(bus.translate(8), Err(AddressError::InvalidAddress(8)));

        // 2-byte bus: halfword addresses
        let bus = UpAdapter::new(2);
        assert_eq!(bus.translate(STATUS >> 1), Ok(RegisterIndex::Status));
        assert_eq!(bus.translate(3), Err(AddressError::MisalignedAddress(3)));

        // 1-byte bus: plain byte offsets
        let bus = UpAdapter::new(1);
        assert_eq!(bus.translate(STATUS), Ok(RegisterIndex::Status));
        assert_eq!(bus.translate(STATUS + 1), Err(AddressError::MisalignedAddress(9)));
    }

    #[test]
    fn test_up_huge_address_rejected() {
        let bus = UpAdapter::new(4);
        assert_eq!(bus.translate(u32::MAX), Err(AddressError::InvalidAddress(u32::MAX)));
    }

    #[test]
    fn test_encode_inverts_translate() {
        for kind in [BusKind::AxiLite, BusKind::Up, BusKind::Wishbone] {
            for width in 1..=4u8 {
                let bus = kind.adapter(width);
                for index in RegisterIndex::ALL {
                    let raw = bus.encode(index.offset());
                    assert_eq!(bus.translate(raw), Ok(index), "{:?} width {}", kind, width);
                }
            }
        }
    }

    #[test]
    fn test_decode_keeps_direction() {
        let bus = WishboneAdapter::new(4);
        let access = bus.decode(&BusRequest::write(TX_DATA, 0x5A, 4)).unwrap();
        assert_eq!(access, Access { index: RegisterIndex::TxData, direction: Direction::Write });
        assert!(matches!(bus.handshake(), Handshake::AckPulse { .. }));
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        for kind in [BusKind::AxiLite, BusKind::Up, BusKind::Wishbone] {
            let bus = kind.adapter(4);
            assert_eq!(bus.kind(), kind);
            let raw = bus.encode(TX_DATA);
            assert_eq!(
                bus.decode(&BusRequest::write(raw, 0x5A, 1)),
                Err(AddressError::WidthMismatch { address: raw, width: 1, expected: 4 })
            );
            assert!(bus.decode(&BusRequest::read(raw, 4)).is_ok());
        }
    }

    #[test]
    fn test_bus_kind_ids() {
        for kind in [BusKind::AxiLite, BusKind::Up, BusKind::Wishbone] {
            assert_eq!(BusKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(BusKind::parse("wb"), Some(BusKind::Wishbone));
        assert_eq!(BusKind::parse("isa"), None);
    }
}
