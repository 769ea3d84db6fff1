//! Bus access tracing and register dumps.
//!
//! Recent accesses are kept in a fixed-size ring buffer; once full, the
//! oldest entry is overwritten. Tracing is off until [`AccessTrace::enable`]
//! is called; the ring is allocated on first enable.

use std::fmt::Write;

use crate::bus::Direction;
use crate::regs::{RegisterFile, RegisterIndex};

/// One completed register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    /// Clock edge the access was applied on
    pub cycle: u64,
    pub index: RegisterIndex,
    pub direction: Direction,
    /// Data read, or data written
    pub value: u32,
    /// Interrupt level after the access
    pub irq: bool,
}

pub struct AccessTrace {
    /// Empty until tracing is first enabled
    buf: Vec<Option<TraceEntry>>,
    capacity: usize,
    /// Next slot to overwrite
    write_pos: usize,
    count: usize,
    enabled: bool,
}

impl AccessTrace {
    pub fn new(capacity: usize) -> Self {
        AccessTrace {
            buf: Vec::new(),
            capacity: capacity.max(1),
            write_pos: 0,
            count: 0,
            enabled: false,
        }
    }

    pub fn enable(&mut self, on: bool) {
        if on && self.buf.is_empty() {
            self.buf = vec![None; self.capacity];
        }
        self.enabled = on;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries the ring currently has room for (0 before the first enable).
    pub fn allocated(&self) -> usize {
        self.buf.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, entry: TraceEntry) {
        if !self.enabled {
            return;
        }
        self.buf[self.write_pos] = Some(entry);
        self.write_pos = (self.write_pos + 1) % self.buf.len();
        if self.count < self.buf.len() {
            self.count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        for slot in self.buf.iter_mut() {
            *slot = None;
        }
        self.write_pos = 0;
        self.count = 0;
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> Vec<TraceEntry> {
        if self.count == 0 {
            return Vec::new();
        }
        let cap = self.buf.len();
        let start = (self.write_pos + cap - self.count) % cap;
        (0..self.count)
            .filter_map(|i| self.buf[(start + i) % cap])
            .collect()
    }

    /// One line per entry.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for e in self.entries() {
            let dir = match e.direction {
                Direction::Read => "RD",
                Direction::Write => "WR",
            };
            let _ = writeln!(
                out,
                "{:>8} {} {:<12} 0x{:08X}{}",
                e.cycle,
                dir,
                e.index.name(),
                e.value,
                if e.irq { " IRQ" } else { "" }
            );
        }
        out
    }
}

/// Named dump of every storage register.
pub fn dump_registers(regs: &RegisterFile) -> String {
    let mut out = String::new();
    for index in RegisterIndex::ALL {
        if let Ok(v) = regs.read(index) {
            let _ = writeln!(out, "{:02X} {:<12} = 0x{:08X}", index.offset(), index.name(), v);
        }
    }
    let _ = write!(out, "STATUS  {:?}\nCONTROL {:?}", regs.status(), regs.control());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cycle: u64) -> TraceEntry {
        TraceEntry {
            cycle,
            index: RegisterIndex::Status,
            direction: Direction::Read,
            value: 0x40,
            irq: false,
        }
    }

    #[test]
    fn test_disabled_records_nothing() {
        let mut t = AccessTrace::new(4);
        t.record(entry(1));
        assert!(t.is_empty());
        assert!(t.entries().is_empty());
        assert_eq!(t.format(), "");
    }

    #[test]
    fn test_ring_allocated_on_enable() {
        let mut t = AccessTrace::new(4096);
        assert_eq!(t.allocated(), 0);
        t.enable(true);
        assert_eq!(t.allocated(), 4096);
        t.enable(false);
        t.enable(true);
        assert_eq!(t.allocated(), t.capacity());
    }

    #[test]
    fn test_ring_overflow_keeps_newest() {
        let mut t = AccessTrace::new(2);
        t.enable(true);
        t.record(entry(1));
        t.record(entry(2));
        t.record(entry(3)); // overwrites cycle 1
        let cycles: Vec<u64> = t.entries().iter().map(|e| e.cycle).collect();
        assert_eq!(cycles, vec![2, 3]);
        t.clear();
        assert!(t.entries().is_empty());
    }

    #[test]
    fn test_format_and_dump() {
        let mut t = AccessTrace::new(4);
        t.enable(true);
        t.record(entry(7));
        assert!(t.format().contains("RD STATUS"));

        let dump = dump_registers(&RegisterFile::new(4));
        assert!(dump.contains("SLAVE_SELECT"));
        assert!(!dump.contains("RESERVED"));
    }
}
