//! # spi-core
//!
//! Register-level model of a memory-mapped SPI master controller.
//!
//! A host reaches the controller through one of three register buses
//! (AXI-lite, a narrow uP bus, Wishbone), all sharing one eight-slot register
//! map. Writing TX_DATA starts a single-word exchange with the attached slave;
//! the received word lands in RX_DATA. Overruns and end-of-packet markers are
//! latched in STATUS and can drive one level-sensitive interrupt line.
//!
//! Time advances one controller clock per [`SpiController::tick`]. Accesses
//! are applied immediately at the current edge; a shift that finishes on the
//! same edge is applied after them.
//!
//! ## Architecture
//!
//! - [`SpiController`]: top-level model wiring the pieces together
//! - [`bus`]: address translation and handshake naming per bus flavour
//! - [`regs`]: register map, STATUS/CONTROL bit layouts, storage
//! - [`transfer`]: single-slot TX/RX engine
//! - [`irq`]: condition latching and the interrupt output
//! - [`eop`]: end-of-packet marker detection
//! - [`shifter`]: word timing, SCLK and chip-select outputs
//! - [`device`]: slaves on the serial side (loopback, echo, idle)
//! - [`driver`]: blocking register-level driver with timeouts
//! - [`savestate`]: compressed controller images
//! - [`trace`]: access trace ring and register dumps

pub mod bus;
pub mod config;
pub mod device;
pub mod driver;
pub mod eop;
pub mod error;
pub mod irq;
pub mod regs;
pub mod savestate;
pub mod shifter;
pub mod trace;
pub mod transfer;

pub use bus::{BusKind, BusRequest, Direction, Handshake};
pub use config::SpiConfig;
pub use device::{Echo, Idle, Loopback, SpiDevice};
pub use driver::{CancelToken, Driver};
pub use error::{AccessError, AddressError, ConfigError, DriverError, StateError};
pub use regs::{Control, RegisterFile, RegisterIndex, Status};

use bus::BusAdapter;
use eop::EopDetector;
use irq::StatusController;
use savestate::ControllerState;
use shifter::Shifter;
use trace::{AccessTrace, TraceEntry};
use transfer::{Submit, TransferEngine};

/// Entries kept by the access trace.
pub const TRACE_CAPACITY: usize = 4096;

/// SPI master controller with an attached slave device.
pub struct SpiController<D: SpiDevice = Loopback> {
    config: SpiConfig,
    bus: Box<dyn BusAdapter>,
    regs: RegisterFile,
    engine: TransferEngine,
    eop: EopDetector,
    status: StatusController,
    shifter: Shifter,
    device: D,
    /// Chip-select level last reported to the device
    selected: bool,
    in_reset: bool,
    cycle: u64,
    read_ack: bool,
    write_ack: bool,
    pub trace: AccessTrace,
}

impl SpiController<Loopback> {
    /// Controller with a loopback slave on line 0.
    pub fn new(config: SpiConfig) -> Result<Self, ConfigError> {
        SpiController::with_device(config, Loopback::new())
    }
}

impl<D: SpiDevice> SpiController<D> {
    pub fn with_device(config: SpiConfig, device: D) -> Result<Self, ConfigError> {
        config.validate()?;
        let bus = config.bus.adapter(config.bus_width_bytes);
        log::debug!(
            "SPI controller: {:?} bus, {} bytes, rate_div {}, {} select line(s), device {}",
            bus.kind(),
            config.bus_width_bytes,
            config.rate_div,
            config.select_lines,
            device.name()
        );
        Ok(SpiController {
            bus,
            regs: RegisterFile::new(config.bus_width_bytes),
            engine: TransferEngine::new(),
            eop: EopDetector::new(),
            status: StatusController::new(),
            shifter: Shifter::new(&config),
            device,
            selected: false,
            in_reset: false,
            cycle: 0,
            read_ack: false,
            write_ack: false,
            trace: AccessTrace::new(TRACE_CAPACITY),
            config,
        })
    }

    /// Return every register and internal state to power-on values.
    fn reinit(&mut self) {
        self.regs.reset();
        self.engine.reset();
        self.eop.reset();
        self.status.reset();
        self.shifter.reset();
        self.read_ack = false;
        self.write_ack = false;
        self.sync_select();
    }

    /// Drive the reset input. While asserted, registers hold their reset
    /// values, accesses are refused and the interrupt and acknowledge
    /// outputs stay low.
    pub fn set_reset(&mut self, asserted: bool) {
        if asserted {
            if !self.in_reset {
                log::debug!("reset asserted at cycle {}", self.cycle);
            }
            self.reinit();
            self.status.force_low();
        } else if self.in_reset {
            log::debug!("reset released at cycle {}", self.cycle);
            self.status.refresh(&self.regs);
        }
        self.in_reset = asserted;
    }

    /// Pulse reset for one edge.
    pub fn reset(&mut self) {
        self.set_reset(true);
        self.tick();
        self.set_reset(false);
    }

    pub fn in_reset(&self) -> bool {
        self.in_reset
    }

    // --- Bus side ---

    /// Apply one raw bus access at the current edge.
    ///
    /// Returns the read data (0 for writes). Address and width errors leave
    /// all state untouched and raise no acknowledge.
    pub fn access(&mut self, req: &BusRequest) -> Result<u32, AccessError> {
        if self.in_reset {
            return Err(AccessError::InReset);
        }
        let access = self.bus.decode(req)?;
        let value = match access.direction {
            Direction::Read => {
                let v = self.read_index(access.index);
                self.read_ack = true;
                v
            }
            Direction::Write => {
                self.write_index(access.index, req.payload);
                self.write_ack = true;
                0
            }
        };
        self.sync_select();

        let irq = self.status.irq();
        log::trace!(
            "{:?} {} addr=0x{:X} value=0x{:X} irq={}",
            access.direction,
            access.index.name(),
            req.address,
            if access.direction == Direction::Read { value } else { req.payload },
            irq
        );
        self.trace.record(TraceEntry {
            cycle: self.cycle,
            index: access.index,
            direction: access.direction,
            value: if access.direction == Direction::Read { value } else { req.payload },
            irq,
        });
        Ok(value)
    }

    /// Full-width read from a raw bus address.
    pub fn read(&mut self, address: u32) -> Result<u32, AccessError> {
        let width = self.config.bus_width_bytes;
        self.access(&BusRequest::read(address, width))
    }

    /// Full-width write to a raw bus address.
    pub fn write(&mut self, address: u32, value: u32) -> Result<(), AccessError> {
        let width = self.config.bus_width_bytes;
        self.access(&BusRequest::write(address, value, width)).map(|_| ())
    }

    /// Read a register by byte offset, encoded for this bus.
    pub fn read_reg(&mut self, offset: u32) -> Result<u32, AccessError> {
        let address = self.bus.encode(offset);
        self.read(address)
    }

    /// Write a register by byte offset, encoded for this bus.
    pub fn write_reg(&mut self, offset: u32, value: u32) -> Result<(), AccessError> {
        let address = self.bus.encode(offset);
        self.write(address, value)
    }

    fn read_index(&mut self, index: RegisterIndex) -> u32 {
        match index {
            RegisterIndex::RxData => {
                let v = self.engine.read_rx(&self.regs);
                self.status.on_rx_read(&mut self.regs);
                v
            }
            RegisterIndex::Reserved => 0,
            RegisterIndex::TxData => self.regs.tx_data(),
            RegisterIndex::Status => self.regs.status().bits(),
            RegisterIndex::Control => self.regs.control().bits(),
            RegisterIndex::SlaveSelect => self.regs.slave_select(),
            RegisterIndex::EopValue => self.regs.eop_value(),
            RegisterIndex::ControlExt => self.regs.control_ext(),
        }
    }

    fn write_index(&mut self, index: RegisterIndex, value: u32) {
        match index {
            RegisterIndex::TxData => {
                let outcome =
                    self.status
                        .on_tx_write(&mut self.regs, &mut self.engine, &mut self.eop, value);
                if let Submit::Accepted(word) = outcome {
                    self.shifter.start(word);
                }
            }
            RegisterIndex::Status => self.status.on_status_write(&mut self.regs, value),
            RegisterIndex::Control => self.status.on_control_write(&mut self.regs, value),
            // read-only / unused
            RegisterIndex::RxData | RegisterIndex::Reserved => {}
            RegisterIndex::SlaveSelect | RegisterIndex::EopValue | RegisterIndex::ControlExt => {
                if self.regs.write(index, value).is_ok() {
                    self.status.refresh(&self.regs);
                }
            }
        }
    }

    /// Tell the device when chip select on line 0 changes.
    fn sync_select(&mut self) {
        let selected = self.ss_n() & 1 == 0;
        if selected != self.selected {
            self.selected = selected;
            self.device.select(selected);
        }
    }

    // --- Clock ---

    /// Advance one controller clock edge.
    pub fn tick(&mut self) {
        self.cycle += 1;
        self.read_ack = false;
        self.write_ack = false;
        if self.in_reset {
            return;
        }
        self.engine.tick();
        if let Some(mosi) = self.shifter.tick() {
            let miso = self.device.exchange(mosi);
            self.engine.complete(&mut self.regs, miso);
            // RRDY still set here means the previous word was never read
            self.status.on_receive_complete(&mut self.regs);
            log::trace!("word done at cycle {}: out=0x{:X} in=0x{:X}", self.cycle, mosi, miso);
        }
        self.sync_select();
    }

    /// Advance `cycles` clock edges.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    // --- Outputs and inspection ---

    /// Interrupt output level.
    pub fn irq(&self) -> bool {
        !self.in_reset && self.status.irq()
    }

    /// Read handshake output (`arready` / `rack` / `ack`) for this edge.
    pub fn read_ack(&self) -> bool {
        self.read_ack
    }

    /// Write handshake output (`wready` / `wack` / `ack`) for this edge.
    pub fn write_ack(&self) -> bool {
        self.write_ack
    }

    /// Single acknowledge for buses with one ACK line.
    pub fn ack(&self) -> bool {
        self.read_ack || self.write_ack
    }

    pub fn handshake(&self) -> Handshake {
        self.bus.handshake()
    }

    /// Active-low chip-select outputs.
    pub fn ss_n(&self) -> u32 {
        let sso = !self.in_reset && self.regs.control().contains(Control::SSO);
        self.shifter.ss_n(self.regs.slave_select(), sso)
    }

    pub fn sclk(&self) -> bool {
        self.shifter.sclk()
    }

    /// True while a word is on the wire.
    pub fn busy(&self) -> bool {
        self.engine.busy()
    }

    /// STATUS without side effects.
    pub fn status(&self) -> Status {
        self.regs.status()
    }

    pub fn control(&self) -> Control {
        self.regs.control()
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    pub fn bus(&self) -> &dyn BusAdapter {
        self.bus.as_ref()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Clocks one word occupies the wire.
    pub fn word_clocks(&self) -> u32 {
        self.shifter.clocks_per_word()
    }

    pub fn words_sent(&self) -> u64 {
        self.engine.words_sent
    }

    pub fn words_received(&self) -> u64 {
        self.engine.words_received
    }

    pub fn tx_overruns(&self) -> u64 {
        self.status.tx_overruns
    }

    pub fn rx_overruns(&self) -> u64 {
        self.status.rx_overruns
    }

    pub fn eop_matches(&self) -> u64 {
        self.eop.matches
    }

    pub fn dump_registers(&self) -> String {
        trace::dump_registers(&self.regs)
    }

    // --- Save states ---

    pub fn save_state(&self) -> ControllerState {
        ControllerState {
            config: self.config.clone(),
            regs: self.regs.raw(),
            engine: self.engine.state(),
            words_sent: self.engine.words_sent,
            words_received: self.engine.words_received,
            shift_remaining: self.shifter.remaining(),
            shift_mosi: self.shifter.mosi(),
            tx_overruns: self.status.tx_overruns,
            rx_overruns: self.status.rx_overruns,
            eop_matches: self.eop.matches,
            device: self.device.save_state(),
            in_reset: self.in_reset,
            cycle: self.cycle,
        }
    }

    /// Restore a captured state. The controller is rebuilt from the saved
    /// configuration; the attached device is kept and given its saved state.
    pub fn load_state(&mut self, state: &ControllerState) -> Result<(), StateError> {
        state.config.validate()?;
        self.config = state.config.clone();
        self.bus = self.config.bus.adapter(self.config.bus_width_bytes);
        self.regs = RegisterFile::new(self.config.bus_width_bytes);
        self.regs.load_raw(state.regs);
        self.engine
            .restore(state.engine, state.words_sent, state.words_received);
        self.eop.matches = state.eop_matches;
        self.status.tx_overruns = state.tx_overruns;
        self.status.rx_overruns = state.rx_overruns;
        self.shifter = Shifter::new(&self.config);
        self.shifter.restore(state.shift_remaining, state.shift_mosi);
        self.device.load_state(state.device);
        self.in_reset = state.in_reset;
        self.cycle = state.cycle;
        self.read_ack = false;
        self.write_ack = false;
        if self.in_reset {
            self.status.force_low();
        } else {
            self.status.refresh(&self.regs);
        }
        self.selected = self.ss_n() & 1 == 0;
        log::debug!("state restored at cycle {}", self.cycle);
        Ok(())
    }
}
