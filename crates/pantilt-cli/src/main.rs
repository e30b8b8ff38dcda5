//! Tracker node for pan-tilt units
//!
//! Wires the core library to a command line: one-shot moves and zeroing
//! against real hardware, port discovery, and a fully simulated demo run.
//! There is no depth sensor driver built in; live tracking plugs a sensor in
//! through the `DepthSource` trait, and `--demo` exercises the whole loop
//! against the simulator.

mod parse_args;
mod settings;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pantilt_core::demo::{SimulatedPtu, SweepDepthSource};
use pantilt_core::protocol::{DeviceProfile, Joint, ProtocolEngine};
use pantilt_core::serial::{discover, BaudRate, Port, PortConfig};
use pantilt_core::tracking::{PinholeConverter, Tracker, DEFAULT_DEADBAND_DEG};

use parse_args::AppArgs;
use settings::Settings;

const DEFAULT_BAUD: u32 = 9600;

fn main() -> Result<()> {
    let args = parse_args::parse().map_err(|e| anyhow::anyhow!("bad arguments: {}", e))?;

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if args.list_ports {
        return list_ports();
    }

    let mut stored = Settings::load();
    if args.save_settings {
        if args.device.is_some() {
            stored.device = args.device.clone();
        }
        if args.baud.is_some() {
            stored.baud = args.baud;
        }
        stored.save()?;
        info!("settings saved");
    }

    let profile = stored.profile.clone().unwrap_or_default();
    let deadband = args.deadband.unwrap_or(DEFAULT_DEADBAND_DEG);

    if args.demo {
        return run_demo(&args, profile, deadband);
    }

    run_device(&args, &stored, profile)
}

fn list_ports() -> Result<()> {
    let candidates = discover::candidate_ports();
    if candidates.is_empty() {
        println!("no serial devices found");
        return Ok(());
    }
    for candidate in candidates {
        match (candidate.usb_ids, candidate.product) {
            (Some((vid, pid)), Some(product)) => {
                println!("{}  [{:04x}:{:04x}] {}", candidate.name, vid, pid, product)
            }
            (Some((vid, pid)), None) => {
                println!("{}  [{:04x}:{:04x}]", candidate.name, vid, pid)
            }
            _ => println!("{}", candidate.name),
        }
    }
    Ok(())
}

fn run_demo(args: &AppArgs, profile: DeviceProfile, deadband: f64) -> Result<()> {
    // Shortened settle delay: the simulated unit has no motors to wait for.
    let profile = DeviceProfile {
        settle_delay: std::time::Duration::from_millis(10),
        ..profile
    };
    let engine = ProtocolEngine::with_link(Box::new(SimulatedPtu::new()), profile);
    let mut tracker = Tracker::new(
        SweepDepthSource::new(160, 120),
        PinholeConverter::default(),
        engine,
    )
    .with_deadband(deadband);

    info!("zeroing simulated unit");
    tracker.engine_mut().zero()?;

    info!(frames = args.frames, "tracking simulated target");
    tracker.run(args.frames)?;

    let engine = tracker.engine_mut();
    let pan = engine.query_position(Joint::Pan)?;
    let tilt = engine.query_position(Joint::Tilt)?;
    info!(?pan, ?tilt, "final reported position, degrees");
    Ok(())
}

fn run_device(args: &AppArgs, stored: &Settings, profile: DeviceProfile) -> Result<()> {
    let device = args
        .device
        .clone()
        .or_else(|| stored.device.clone())
        .context("no device given; use --device, --save-settings, or --list-ports")?;
    let baud_bps = args.baud.or(stored.baud).unwrap_or(DEFAULT_BAUD);
    let baud = BaudRate::from_bits_per_second(baud_bps)
        .with_context(|| format!("unsupported baud rate {}", baud_bps))?;

    let port = Port::open(PortConfig::new(device.clone(), baud))
        .with_context(|| format!("opening {}", device))?;
    let mut engine = ProtocolEngine::with_link(Box::new(port), profile);

    if args.zero {
        info!("running zero sequence");
        engine.zero()?;
    }

    match (args.pan, args.tilt) {
        (Some(pan), Some(tilt)) => {
            info!(pan, tilt, "relative move");
            engine.move_relative(pan, tilt)?;
        }
        (None, None) => {
            if !args.zero {
                bail!(
                    "nothing to do: no sensor driver is built in, so live tracking \
                     needs a DepthSource; try --zero, --pan/--tilt, or --demo"
                );
            }
        }
        _ => bail!("--pan and --tilt must be given together"),
    }

    Ok(())
}
