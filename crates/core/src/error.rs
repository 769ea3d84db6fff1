//! Error types for the controller model.
//!
//! Overruns (TOE/ROE) are not errors here: they are protocol conditions
//! reported through STATUS and the interrupt line, never through `Err`.

use crate::bus::BusKind;

/// Rejected register address.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    #[error("address 0x{0:X} does not map to a register")]
    InvalidAddress(u32),
    #[error("address 0x{0:X} is not aligned to a register boundary")]
    MisalignedAddress(u32),
    #[error("{width}-byte access at 0x{address:X} on a {expected}-byte bus")]
    WidthMismatch { address: u32, width: u8, expected: u8 },
}

/// Failed bus access.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error(transparent)]
    Address(#[from] AddressError),
    /// Access attempted while reset is asserted. No state was changed.
    #[error("controller is held in reset")]
    InReset,
}

/// Invalid construction parameters.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bus width of {0} bytes is not supported (expected 1-4)")]
    BusWidth(u8),
    #[error("{0} chip-select lines requested (expected 1-32)")]
    SelectLines(u8),
    #[error("rate divider {0} is out of range (expected 0-15)")]
    RateDivider(u8),
}

/// Failure of a blocking driver operation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("timed out after {cycles} cycles waiting for status 0x{mask:03X}")]
    Timeout { mask: u32, cycles: u64 },
    #[error("wait cancelled")]
    Cancelled,
}

/// Failure to save or restore a controller image.
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("save state I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("save state is too small ({0} bytes)")]
    Truncated(usize),
    #[error("invalid save state file (bad magic)")]
    BadMagic,
    #[error("unsupported save state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("bus mismatch: save={saved:?} current={current:?}")]
    BusMismatch { saved: Option<BusKind>, current: BusKind },
    #[error("decompress error: {0}")]
    Decompress(String),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
