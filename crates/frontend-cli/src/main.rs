//! Command-line runner for the SPI controller model.
//!
//! Two modes:
//!
//! - **Scenario mode** (default): streams a word sequence through the
//!   controller with the blocking driver and reports what came back.
//! - **Step mode** (`--step`): interactive register console; read, write and
//!   clock the controller by hand.
//!
//! Logging goes through `env_logger`; set `RUST_LOG=spi_core=trace` to see
//! every register access.

use anyhow::{anyhow, Context, Result};
use spi_core::regs::{self, RegisterIndex};
use spi_core::savestate;
use spi_core::{device, BusKind, Control, Driver, SpiConfig, SpiController, SpiDevice};
use std::env;
use std::io::{BufRead, Write};
use std::path::Path;

type Controller = SpiController<Box<dyn SpiDevice>>;

fn usage(prog: &str) {
    eprintln!("SPI controller model - Rust");
    eprintln!("Usage: {} [options]", prog);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --bus axi|up|wb      Register bus (default axi)");
    eprintln!("  --width N            Bus/word width in bytes 1-4 (default 4)");
    eprintln!("  --clock-hz N         Controller clock in Hz (default 100000000)");
    eprintln!("  --rate-div N         SCLK divider exponent 0-15 (default 0)");
    eprintln!("  --lines N            Chip-select lines 1-32 (default 1)");
    eprintln!("  --cpol / --cpha      SPI mode bits");
    eprintln!("  --device NAME        loopback | echo | idle (default loopback)");
    eprintln!("  --words N            Words to send in scenario mode (default 256)");
    eprintln!("  --eop V              End-of-packet marker (hex)");
    eprintln!("  --irq                Enable RRDY/EOP/overrun interrupts");
    eprintln!("  --trace              Print the access trace at exit");
    eprintln!("  --save-state F       Write a save state at exit");
    eprintln!("  --load-state F       Resume from a save state");
    eprintln!("  --step               Interactive register console");
    eprintln!("  --debug              Print register dump at exit");
}

fn arg_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_num<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> Result<T> {
    match arg_value(args, name) {
        Some(s) => s.parse().map_err(|_| anyhow!("{}: invalid value '{}'", name, s)),
        None => Ok(default),
    }
}

fn parse_hex(s: &str) -> Result<u32> {
    let t = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(t, 16).with_context(|| format!("invalid hex value '{}'", s))
}

fn build_config(args: &[String]) -> Result<SpiConfig> {
    let bus = match arg_value(args, "--bus") {
        Some(s) => BusKind::parse(s).ok_or_else(|| anyhow!("unknown bus '{}'", s))?,
        None => BusKind::AxiLite,
    };
    let config = SpiConfig {
        bus,
        bus_width_bytes: parse_num(args, "--width", 4u8)?,
        clock_hz: parse_num(args, "--clock-hz", SpiConfig::default().clock_hz)?,
        rate_div: parse_num(args, "--rate-div", 0u8)?,
        select_lines: parse_num(args, "--lines", 1u8)?,
        cpol: args.iter().any(|a| a == "--cpol"),
        cpha: args.iter().any(|a| a == "--cpha"),
        ..SpiConfig::default()
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage(&args[0]);
        return Ok(());
    }

    let config = build_config(&args)?;
    let dev_name = arg_value(&args, "--device").unwrap_or("loopback");
    let dev = device::by_name(dev_name, regs::word_mask(config.bus_width_bytes))
        .ok_or_else(|| anyhow!("unknown device '{}'", dev_name))?;
    let mut ctl: Controller = SpiController::with_device(config.clone(), dev)?;
    ctl.trace.enable(args.iter().any(|a| a == "--trace"));

    if let Some(path) = arg_value(&args, "--load-state") {
        let state = savestate::load_from_file(Path::new(path), config.bus)
            .with_context(|| format!("loading {}", path))?;
        ctl.load_state(&state)?;
        println!("Resumed from {} at cycle {}", path, ctl.cycle());
    }

    if args.iter().any(|a| a == "--step") {
        run_step_mode(&mut ctl)?;
    } else {
        run_scenario(&args, &mut ctl)?;
    }

    if ctl.trace.is_enabled() {
        println!("--- Trace ({} entries) ---", ctl.trace.len());
        print!("{}", ctl.trace.format());
    }
    if args.iter().any(|a| a == "--debug") {
        println!("--- Registers (cycle {}) ---\n{}", ctl.cycle(), ctl.dump_registers());
    }
    if let Some(path) = arg_value(&args, "--save-state") {
        savestate::save_to_file(&ctl.save_state(), Path::new(path))
            .with_context(|| format!("saving {}", path))?;
        println!("State saved to {}", path);
    }
    Ok(())
}

// ─── Scenario Mode ──────────────────────────────────────────────────────────

fn run_scenario(args: &[String], ctl: &mut Controller) -> Result<()> {
    let words: u32 = parse_num(args, "--words", 256)?;
    let eop = arg_value(args, "--eop").map(parse_hex).transpose()?;
    let mask = ctl.registers().mask();

    let mut drv = Driver::new(ctl);
    if let Some(marker) = eop {
        drv.write_reg(regs::EOP_VALUE, marker)?;
    }
    if args.iter().any(|a| a == "--irq") {
        drv.set_control(Control::IE | Control::IRRDY | Control::IEOP | Control::IROE | Control::ITOE)?;
    }

    let sent: Vec<u32> = (0..words).map(|w| w & mask).collect();
    let expected = expected_words(drv.controller().device(), &sent);
    let received = drv.transfer_all(&sent)?;

    let ctl = drv.controller();
    println!(
        "{:?} bus, {} bytes, {} clocks/word, SCLK {} Hz, device {}",
        ctl.config().bus,
        ctl.config().bus_width_bytes,
        ctl.word_clocks(),
        ctl.config().sclk_hz(),
        ctl.device().name()
    );
    println!(
        "Sent {} words, received {} in {} cycles",
        ctl.words_sent(),
        ctl.words_received(),
        ctl.cycle()
    );
    let mismatches = count_mismatches(&expected, &received);
    println!("Words differing from expected: {}", mismatches);
    if ctl.tx_overruns() + ctl.rx_overruns() > 0 {
        println!("Overruns: TX {} RX {}", ctl.tx_overruns(), ctl.rx_overruns());
    }
    if eop.is_some() {
        println!("EOP matches: {}", ctl.eop_matches());
    }
    Ok(())
}

/// What the slave should hand back for `sent`. A loopback slave returns the
/// previous word, starting with whatever it held before the run.
fn expected_words(dev: &dyn SpiDevice, sent: &[u32]) -> Vec<u32> {
    if dev.name() == "loopback" {
        std::iter::once(dev.save_state())
            .chain(sent.iter().copied())
            .take(sent.len())
            .collect()
    } else {
        sent.to_vec()
    }
}

fn count_mismatches(expected: &[u32], received: &[u32]) -> usize {
    expected.iter().zip(received).filter(|(e, r)| e != r).count()
}

// ─── Step Mode ──────────────────────────────────────────────────────────────

fn parse_register(s: &str) -> Result<u32> {
    let upper = s.to_ascii_uppercase();
    if let Some(index) = RegisterIndex::ALL.iter().find(|r| r.name() == upper) {
        return Ok(index.offset());
    }
    parse_hex(s)
}

fn run_step_mode(ctl: &mut Controller) -> Result<()> {
    println!("Step mode: r REG, w REG VAL, t [N], s, d, q");
    println!("REG is a name (STATUS) or a hex byte offset; VAL is hex");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("spi> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next() {
            Some(l) => l?,
            None => break,
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let result = match parts.as_slice() {
            [] => continue,
            ["q"] | ["quit"] => break,
            ["d"] | ["dump"] => {
                println!("{}", ctl.dump_registers());
                Ok(())
            }
            ["s"] | ["state"] => {
                println!(
                    "cycle={} irq={} ss_n=0b{:b} sclk={} busy={}",
                    ctl.cycle(),
                    ctl.irq(),
                    ctl.ss_n(),
                    ctl.sclk() as u8,
                    ctl.busy()
                );
                Ok(())
            }
            ["r", reg] => step_read(ctl, reg),
            ["w", reg, val] => step_write(ctl, reg, val),
            ["t"] => {
                ctl.tick();
                Ok(())
            }
            ["t", n] => n
                .parse::<u64>()
                .map(|n| ctl.run(n))
                .map_err(|_| anyhow!("invalid cycle count '{}'", n)),
            _ => Err(anyhow!("unknown command '{}'", line.trim())),
        };
        if let Err(e) = result {
            eprintln!("error: {:#}", e);
        }
    }
    println!("Total: {} cycles", ctl.cycle());
    Ok(())
}

fn step_read(ctl: &mut Controller, reg: &str) -> Result<()> {
    let offset = parse_register(reg)?;
    let v = ctl.read_reg(offset)?;
    println!("0x{:02X} -> 0x{:08X}", offset, v);
    Ok(())
}

fn step_write(ctl: &mut Controller, reg: &str, val: &str) -> Result<()> {
    let offset = parse_register(reg)?;
    let v = parse_hex(val)?;
    ctl.write_reg(offset, v)?;
    if offset == regs::TX_DATA && ctl.status().contains(spi_core::Status::TOE) {
        println!("(TX overrun)");
    }
    Ok(())
}
