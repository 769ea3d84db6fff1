//! Single-word transfer engine.
//!
//! There is exactly one TX slot and one RX slot. A word written while the TX
//! slot is busy is an overrun: it lands in TX_DATA but is never shifted. A
//! word received while RX_DATA still holds an unread word replaces it.
//!
//! The engine only moves data and TRDY. Condition bits (TOE/ROE/E/RRDY) are
//! raised by [`crate::irq::StatusController`] from the outcomes returned here.

use serde::{Deserialize, Serialize};

use crate::regs::{RegisterFile, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    /// Word being shifted out
    Transmitting { word: u32 },
    /// A word just finished; cleared on the next clock edge or submission
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// Word latched for shifting
    Accepted(u32),
    /// TX slot was busy; word stored in TX_DATA only
    Overrun,
}

#[derive(Debug, Clone)]
pub struct TransferEngine {
    state: EngineState,
    /// Accepted submissions since reset
    pub words_sent: u64,
    /// Completions since reset
    pub words_received: u64,
}

impl TransferEngine {
    pub fn new() -> Self {
        TransferEngine { state: EngineState::Idle, words_sent: 0, words_received: 0 }
    }

    pub fn reset(&mut self) {
        *self = TransferEngine::new();
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn busy(&self) -> bool {
        matches!(self.state, EngineState::Transmitting { .. })
    }

    /// Accept `word` into the TX slot.
    pub fn submit(&mut self, regs: &mut RegisterFile, word: u32) -> Submit {
        regs.set_tx_data(word);
        let status = regs.status();
        if !status.contains(Status::TRDY) {
            return Submit::Overrun;
        }
        let word = regs.tx_data();
        regs.set_status(status - Status::TRDY);
        self.state = EngineState::Transmitting { word };
        self.words_sent += 1;
        Submit::Accepted(word)
    }

    /// Latch a received word. An unread RX word is replaced; flagging that
    /// is left to the status controller, which sees RRDY still set.
    pub fn complete(&mut self, regs: &mut RegisterFile, received: u32) {
        regs.set_rx_data(received);
        regs.set_status(regs.status() | Status::TRDY);
        self.state = EngineState::Complete;
        self.words_received += 1;
    }

    /// Supply RX_DATA. Clearing RRDY is the status controller's job.
    pub fn read_rx(&self, regs: &RegisterFile) -> u32 {
        regs.rx_data()
    }

    /// Clock edge with no completion.
    pub fn tick(&mut self) {
        if self.state == EngineState::Complete {
            self.state = EngineState::Idle;
        }
    }

    pub(crate) fn restore(&mut self, state: EngineState, sent: u64, received: u64) {
        self.state = state;
        self.words_sent = sent;
        self.words_received = received;
    }
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new()
    }
}
