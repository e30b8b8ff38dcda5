const HELP: &str = "\
pantilt - serial control and nearest-point tracking for pan-tilt units

USAGE:
  pantilt [OPTIONS]

OPTIONS:
  -h, --help            Prints help information
  --device <path>       Serial device of the unit (default: from settings)
  --baud <bps>          Baud rate (default: 9600)
  --list-ports          List candidate serial devices and exit
  --zero                Run the zeroing sequence before anything else
  --pan <deg>           One-shot relative pan move (requires --tilt)
  --tilt <deg>          One-shot relative tilt move (requires --pan)
  --demo                Track a simulated target on a simulated unit
  --frames <n>          Frames to track in demo mode (default: 200)
  --deadband <deg>      Minimum offset worth moving for (default: 0.5)
  --save-settings       Persist --device/--baud to the settings file
  -v, --verbose         Debug-level log output
";

/// Parsed command line
#[derive(Debug)]
pub struct AppArgs {
    pub device: Option<String>,
    pub baud: Option<u32>,
    pub list_ports: bool,
    pub zero: bool,
    pub pan: Option<f64>,
    pub tilt: Option<f64>,
    pub demo: bool,
    pub frames: usize,
    pub deadband: Option<f64>,
    pub save_settings: bool,
    pub verbose: bool,
}

pub fn parse() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let args = AppArgs {
        device: pargs.opt_value_from_str("--device")?,
        baud: pargs.opt_value_from_str("--baud")?,
        list_ports: pargs.contains("--list-ports"),
        zero: pargs.contains("--zero"),
        pan: pargs.opt_value_from_str("--pan")?,
        tilt: pargs.opt_value_from_str("--tilt")?,
        demo: pargs.contains("--demo"),
        frames: pargs.opt_value_from_str("--frames")?.unwrap_or(200),
        deadband: pargs.opt_value_from_str("--deadband")?,
        save_settings: pargs.contains("--save-settings"),
        verbose: pargs.contains(["-v", "--verbose"]),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("warning: unused arguments: {:?}", remaining);
    }

    Ok(args)
}
