//! SPI slave devices attached to the controller's serial side.
//!
//! The shifter hands each finished word to the attached device and latches
//! whatever the device shifted back.

/// A slave on the serial side of the controller.
pub trait SpiDevice {
    /// Exchange one word: `mosi` in, MISO word out.
    fn exchange(&mut self, mosi: u32) -> u32;

    /// Chip select changed (true = selected).
    fn select(&mut self, _selected: bool) {}

    fn name(&self) -> &'static str;

    /// Device state carried in save states.
    fn save_state(&self) -> u32 {
        0
    }

    fn load_state(&mut self, _state: u32) {}
}

impl<T: SpiDevice + ?Sized> SpiDevice for Box<T> {
    fn exchange(&mut self, mosi: u32) -> u32 {
        (**self).exchange(mosi)
    }

    fn select(&mut self, selected: bool) {
        (**self).select(selected)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn save_state(&self) -> u32 {
        (**self).save_state()
    }

    fn load_state(&mut self, state: u32) {
        (**self).load_state(state)
    }
}

/// Pick a device by name (`loopback`, `echo`, `idle`).
pub fn by_name(name: &str, word_mask: u32) -> Option<Box<dyn SpiDevice>> {
    match name {
        "loopback" | "loop" => Some(Box::new(Loopback::new())),
        "echo" => Some(Box::new(Echo)),
        "idle" | "none" => Some(Box::new(Idle::new(word_mask))),
        _ => None,
    }
}

/// Loopback slave: each exchange returns the word received by the previous
/// one. The first word read back after reset is the slave's power-on content,
/// not an echo.
#[derive(Debug, Clone, Default)]
pub struct Loopback {
    contents: u32,
}

impl Loopback {
    pub fn new() -> Self {
        Loopback { contents: 0 }
    }

    /// Last word received from the master.
    pub fn contents(&self) -> u32 {
        self.contents
    }
}

impl SpiDevice for Loopback {
    fn exchange(&mut self, mosi: u32) -> u32 {
        std::mem::replace(&mut self.contents, mosi)
    }

    fn name(&self) -> &'static str {
        "loopback"
    }

    fn save_state(&self) -> u32 {
        self.contents
    }

    fn load_state(&mut self, state: u32) {
        self.contents = state;
    }
}

/// MISO wired to MOSI: the word shifted out comes straight back.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl SpiDevice for Echo {
    fn exchange(&mut self, mosi: u32) -> u32 {
        mosi
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

/// Nothing attached: MISO floats high.
#[derive(Debug, Clone, Copy)]
pub struct Idle {
    mask: u32,
}

impl Idle {
    pub fn new(mask: u32) -> Self {
        Idle { mask }
    }
}

impl SpiDevice for Idle {
    fn exchange(&mut self, _mosi: u32) -> u32 {
        self.mask
    }

    fn name(&self) -> &'static str {
        "idle"
    }
}
