use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chip8::config::Config;
use chip8::display::{MonoTermDisplay, CHIP8_RESOLUTION};
use chip8::input::{Input, Keymap, StdinInput};
use chip8::interpreter::Chip8Interpreter;
use chip8::loader::Gamefile;
use chip8::random::StdRandom;
use chip8::sound::{Mute, SimpleBeep, Sound};

/// Run a CHIP-8 program in the terminal. Esc quits.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// ROM file to run
    #[arg(required_unless_present = "test_card")]
    rom: Option<PathBuf>,

    /// TOML file with emulator settings; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// instructions per second
    #[arg(short = 's', long)]
    cycles_per_second: Option<f64>,

    /// let sprites wrap round the edges of the screen
    #[arg(long)]
    wrap: bool,

    #[arg(short, long, value_enum)]
    keymap: Option<Keymap>,

    /// beep through the PC speaker
    #[arg(long)]
    sound: bool,

    /// seed the random number generator
    #[arg(long)]
    seed: Option<u64>,

    /// stop after this many instructions
    #[arg(long)]
    cycle_limit: Option<u64>,

    /// write logs here; with -v or RUST_LOG they otherwise go to chip8.log
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// more logging; repeat for more still
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// show the display test card and wait for a key
    #[arg(long)]
    test_card: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(cycles_per_second) = self.cycles_per_second {
            config.cycles_per_second = cycles_per_second;
        }
        if let Some(keymap) = self.keymap {
            config.keymap = keymap;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.cycle_limit.is_some() {
            config.cycle_limit = self.cycle_limit;
        }
        config.wrap_sprites |= self.wrap;
        config.sound |= self.sound;
        config.validate()?;
        Ok(config)
    }
}

/// where logs go when `--log-file` isn't given
const DEFAULT_LOG_FILE: &str = "chip8.log";

/// stderr shares the terminal with the TUI, so anything beyond the default
/// warnings goes to a file; None means stderr
fn log_path(verbose: u8, log_file: Option<&Path>, env_filter: bool) -> Option<PathBuf> {
    match log_file {
        Some(path) => Some(path.to_path_buf()),
        None if verbose > 0 || env_filter => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        None => None,
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_path(verbose, log_file, env_filter) {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn show_test_card(config: &Config) -> Result<()> {
    let mut display = MonoTermDisplay::new(CHIP8_RESOLUTION.0, CHIP8_RESOLUTION.1, "CHIP-8")?;
    let mut input = StdinInput::new(config.keymap, config.key_hold())?;
    display.test_card()?;
    while input.poll_events()?.is_empty() {
        thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}

/// run the ROM until the user quits; the terminal is restored on return
fn run(config: &Config, gamefile: &Gamefile, title: &str) -> Result<()> {
    let mut display = MonoTermDisplay::new(CHIP8_RESOLUTION.0, CHIP8_RESOLUTION.1, title)
        .context("setting up the terminal display")?;
    let mut input = StdinInput::new(config.keymap, config.key_hold())
        .context("setting up keyboard input")?;
    let mut beeper = SimpleBeep::new(config.pitch);
    let mut mute = Mute::new();
    let sound: &mut dyn Sound = if config.sound { &mut beeper } else { &mut mute };
    let mut random = StdRandom::new(config.seed);

    let mut interpreter = Chip8Interpreter::new(&mut display, &mut input, sound, &mut random)?;
    interpreter.set_wrap_sprites(config.wrap_sprites);
    interpreter.load(gamefile)?;

    let halted = interpreter.main_loop(config.cycles_per_second, config.cycle_limit);
    let pc = interpreter.program_counter();
    halted.with_context(|| format!("halted at 0x{:03x}", pc))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.log_file.as_deref())?;
    let config = args.config()?;
    info!(?config, "starting");

    if args.test_card {
        return show_test_card(&config);
    }

    let rom = args.rom.as_deref().context("no ROM given")?;
    let gamefile =
        Gamefile::read_from_file(rom).with_context(|| format!("reading {}", rom.display()))?;
    let title = match rom.file_name() {
        Some(name) => format!("CHIP-8: {}", name.to_string_lossy()),
        None => "CHIP-8".to_string(),
    };

    if let Err(e) = run(&config, &gamefile, &title) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
