//! Controller save states.
//!
//! Captures the full controller (registers, engine, shift progress, counters
//! and the attached device's state) so a run can be resumed exactly.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "SPIS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Bus kind         |  u8 (0 = AXI-lite, 1 = uP, 2 = Wishbone)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bus::BusKind;
use crate::config::SpiConfig;
use crate::error::StateError;
use crate::transfer::EngineState;

/// Magic bytes identifying a controller save state.
const MAGIC: &[u8; 4] = b"SPIS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub config: SpiConfig,
    /// RX, TX, STATUS, CONTROL, SLAVE_SELECT, EOP_VALUE, CONTROL_EXT
    pub regs: [u32; 7],
    pub engine: EngineState,
    pub words_sent: u64,
    pub words_received: u64,
    pub shift_remaining: u32,
    pub shift_mosi: u32,
    pub tx_overruns: u64,
    pub rx_overruns: u64,
    pub eop_matches: u64,
    pub device: u32,
    pub in_reset: bool,
    pub cycle: u64,
}

/// Encode a state with header and deflate compression.
pub fn save_to_bytes(state: &ControllerState) -> Result<Vec<u8>, StateError> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(state.config.bus.id());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode a state, verifying magic, version and bus kind.
pub fn load_from_bytes(data: &[u8], expected_bus: BusKind) -> Result<ControllerState, StateError> {
    if data.len() < HEADER_LEN {
        return Err(StateError::Truncated(data.len()));
    }
    if &data[0..4] != MAGIC {
        return Err(StateError::BadMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(StateError::Version { found: version, expected: FORMAT_VERSION });
    }
    if data[8] != expected_bus.id() {
        return Err(StateError::BusMismatch {
            saved: BusKind::from_id(data[8]),
            current: expected_bus,
        });
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| StateError::Decompress(format!("{:?}", e)))?;
    let state: ControllerState = bincode::deserialize(&decompressed)?;
    state.config.validate()?;
    Ok(state)
}

pub fn save_to_file(state: &ControllerState, path: &Path) -> Result<(), StateError> {
    let bytes = save_to_bytes(state)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn load_from_file(path: &Path, expected_bus: BusKind) -> Result<ControllerState, StateError> {
    let data = std::fs::read(path)?;
    load_from_bytes(&data, expected_bus)
}
