//! W-Bus Heater Console
//!
//! Drives a heater (or the built-in simulator) from the command line and
//! prints a JSON snapshot after every round-robin lap.
//!
//! Usage:
//!   cargo run --example heater_console -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: first detected port)
//!   --config FILE     JSON driver configuration
//!   --sim             Use the simulated heater instead of a serial port
//!   --heat MIN        Start heating for MIN minutes
//!   --vent MIN        Start ventilation for MIN minutes
//!   --off             Switch the heater off
//!   --ticks N         Number of ticks to run (default: 60)
//!   --list            List serial ports and exit
//!
//! Set RUST_LOG=wbus_core=trace to see every byte on the wire.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wbus_core::prelude::*;
use wbus_core::protocol::list_ports;

enum Action {
    Heat(u8),
    Vent(u8),
    Off,
}

struct Options {
    port: Option<String>,
    config: Option<String>,
    sim: bool,
    action: Option<Action>,
    ticks: u32,
}

fn parse_args() -> Result<Option<Options>> {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options {
        port: None,
        config: None,
        sim: false,
        action: None,
        ticks: 60,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                opts.port = Some(value(&args, i)?.clone());
                i += 1;
            }
            "--config" | "-c" => {
                opts.config = Some(value(&args, i)?.clone());
                i += 1;
            }
            "--sim" => opts.sim = true,
            "--heat" => {
                opts.action = Some(Action::Heat(value(&args, i)?.parse()?));
                i += 1;
            }
            "--vent" => {
                opts.action = Some(Action::Vent(value(&args, i)?.parse()?));
                i += 1;
            }
            "--off" => opts.action = Some(Action::Off),
            "--ticks" | "-n" => {
                opts.ticks = value(&args, i)?.parse()?;
                i += 1;
            }
            "--list" => {
                for port in list_ports() {
                    match (port.usb_id, port.product) {
                        (Some((vid, pid)), product) => println!(
                            "{}  [{:04x}:{:04x}] {}",
                            port.name,
                            vid,
                            pid,
                            product.unwrap_or_default()
                        ),
                        (None, _) => println!("{}", port.name),
                    }
                }
                return Ok(None);
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }
    Ok(Some(opts))
}

fn value(args: &[String], i: usize) -> Result<&String> {
    args.get(i + 1)
        .with_context(|| format!("{} needs a value", args[i]))
}

fn print_help() {
    println!("W-Bus Heater Console");
    println!();
    println!("Usage: heater_console [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port PORT     Serial port (default: first detected port)");
    println!("  --config FILE   JSON driver configuration");
    println!("  --sim           Use the simulated heater");
    println!("  --heat MIN      Start heating for MIN minutes");
    println!("  --vent MIN      Start ventilation for MIN minutes");
    println!("  --off           Switch the heater off");
    println!("  --ticks N       Number of ticks to run (default: 60)");
    println!("  --list          List serial ports and exit");
}

fn run<T: Transport, C: Clock>(
    mut heater: HeaterDriver<T, C>,
    action: Option<Action>,
    ticks: u32,
    pace: Duration,
    advance: impl Fn(Duration),
) -> Result<()> {
    match action {
        Some(Action::Heat(min)) => heater.heat_on(Some(min)).context("heat on")?,
        Some(Action::Vent(min)) => heater.vent_on(Some(min)).context("vent on")?,
        Some(Action::Off) => heater.off().context("off")?,
        None => {}
    }

    let lap = heater.scheduler().tasks().len() as u32;
    for n in 1..=ticks {
        heater.tick();
        if lap > 0 && n % lap == 0 {
            println!("{}", serde_json::to_string(&heater.snapshot())?);
        }
        advance(pace);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(opts) = parse_args()? else {
        return Ok(());
    };

    let mut config = match &opts.config {
        Some(path) => DriverConfig::from_file(path)
            .with_context(|| format!("loading {}", path))?,
        None => DriverConfig::default(),
    };

    let pace = Duration::from_millis(500);
    if opts.sim {
        let clock = ManualClock::new();
        let heater = HeaterDriver::new(SimulatedHeater::new(), clock.clone(), &config);
        return run(heater, opts.action, opts.ticks, pace, |d| clock.advance(d));
    }

    if let Some(port) = opts.port {
        config.serial.port_name = port;
    }
    if config.serial.port_name.is_empty() {
        config.serial.port_name = list_ports()
            .into_iter()
            .next()
            .map(|p| p.name)
            .context("no serial port found, use --port or --sim")?;
    }
    println!(
        "Opening {} at {} baud",
        config.serial.port_name, config.serial.baud_rate
    );
    let heater = HeaterDriver::open(&config)?;
    run(heater, opts.action, opts.ticks, pace, std::thread::sleep)
}
