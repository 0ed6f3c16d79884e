//! Command line front end: render register programs to WAV or play them live.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use ym2151::render::DEFAULT_SAMPLE_RATE;
use ym2151::RegisterProgram;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Parser)]
#[command(name = "ym2151")]
#[command(about = "YM2151 (OPM) FM synthesis emulator", version)]
struct Cli {
    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a register program to a WAV file
    Render(RenderArgs),
    /// Play a register program on the default audio device
    Play(PlayArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Output WAV file
    #[arg(short, long, default_value = "ym2151.wav")]
    output: PathBuf,

    /// Fade out over the last N seconds
    #[arg(long, default_value_t = 0.0)]
    fade_out: f64,

    #[command(flatten)]
    audio: AudioArgs,

    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
struct PlayArgs {
    /// Time allowed for the release after the final key-off, in milliseconds
    #[arg(long, default_value_t = 500)]
    release_ms: u64,

    #[command(flatten)]
    audio: AudioArgs,

    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
struct AudioArgs {
    /// Length in seconds
    #[arg(short, long, value_parser = parse_positive, default_value_t = 3.0)]
    duration: f64,

    /// Output sample rate in Hz
    #[arg(short = 'r', long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Chip master clock in Hz (overrides the program's clock)
    #[arg(long)]
    clock: Option<u32>,

    /// Downmix to a single channel
    #[arg(long)]
    mono: bool,
}

#[derive(Args)]
struct SourceArgs {
    /// JSON register program
    #[arg(short, long, conflicts_with = "demo")]
    program: Option<PathBuf>,

    /// Built-in demo program (used when no --program is given)
    #[arg(long, value_enum)]
    demo: Option<Demo>,

    /// Key code for the demo programs (0x prefix for hex)
    #[arg(short, long, value_parser = parse_key_code, default_value = "0x4D")]
    key_code: u8,

    /// Seed for the random patch demo
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Key toggle interval for the toggling demos, in milliseconds
    #[arg(long, value_parser = parse_positive, default_value_t = 500.0)]
    toggle_ms: f64,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum Demo {
    /// One sustained tone
    #[default]
    Tone,
    /// The tone keyed on and off at a fixed interval
    KeyToggle,
    /// A new random patch on every key-on
    Random,
}

fn parse_key_code(arg: &str) -> Result<u8, String> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => arg.parse(),
    };
    parsed.map_err(|e| format!("invalid key code '{arg}': {e}"))
}

/// Finite number greater than zero.
fn parse_positive(arg: &str) -> Result<f64, String> {
    let value: f64 = arg
        .parse()
        .map_err(|e| format!("invalid number '{arg}': {e}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("'{arg}' must be a finite number greater than 0"))
    }
}

/// Note name for a key code. Codes 3, 7, 11 and 15 of each octave are unused.
fn key_code_label(key_code: u8) -> Option<String> {
    let octave = (key_code >> 4) as usize;
    let (semitone, octave) = match key_code & 0x0f {
        n @ 0..=2 => (n as usize + 1, octave),
        n @ 4..=6 => (n as usize, octave),
        n @ 8..=10 => (n as usize - 1, octave),
        n @ 12..=13 => (n as usize - 2, octave),
        14 => (0, octave + 1),
        _ => return None,
    };
    Some(format!("{}{}", NOTE_NAMES[semitone], octave))
}

fn init_logging(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let level = if quiet {
        LevelFilter::Warn
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    TermLogger::init(
        level,
        ConfigBuilder::default()
            .set_time_level(LevelFilter::Off)
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;
    Ok(())
}

fn load_program(
    source: &SourceArgs,
    audio: &AudioArgs,
) -> anyhow::Result<RegisterProgram> {
    let mut program = match &source.program {
        Some(path) => RegisterProgram::load(path)
            .with_context(|| format!("Failed to load register program {}", path.display()))?,
        None => {
            let duration_ms = audio.duration * 1000.0;
            let demo = source.demo.unwrap_or_default();
            let label = key_code_label(source.key_code).unwrap_or_else(|| "--".into());
            log::info!(
                "Demo {:?}, key code {:#04x} ({})",
                demo,
                source.key_code,
                label
            );
            match demo {
                Demo::Tone => RegisterProgram::tone(source.key_code),
                Demo::KeyToggle => {
                    RegisterProgram::key_toggle(source.key_code, source.toggle_ms, duration_ms)
                }
                Demo::Random => {
                    RegisterProgram::random_patches(source.seed, source.toggle_ms, duration_ms)
                }
            }
        }
    };
    if audio.clock.is_some() {
        program.clock_hz = audio.clock;
    }
    program
        .validate()
        .context("Register program failed validation")?;
    let requested_ms = audio.duration * 1000.0;
    if program.duration_ms() > requested_ms {
        log::warn!(
            "Program runs {:.0} ms but only {:.0} ms will be rendered",
            program.duration_ms(),
            requested_ms
        );
    }
    Ok(program)
}

#[cfg(feature = "export-wav")]
fn render(args: RenderArgs) -> anyhow::Result<()> {
    use ym2151::export::{export_program_to_wav, ExportConfig};

    let program = load_program(&args.source, &args.audio)?;
    let config = if args.audio.mono {
        ExportConfig::mono()
    } else {
        ExportConfig::stereo()
    }
    .with_sample_rate(args.audio.sample_rate)
    .duration(args.audio.duration)
    .fade_out(args.fade_out);

    let audio = export_program_to_wav(&program, &args.output, &config)
        .with_context(|| format!("Failed to export {}", args.output.display()))?;

    println!("Wrote {}", args.output.display());
    println!("  Frames:      {}", audio.frames());
    println!("  Duration:    {:.2} s", audio.duration_secs());
    println!("  Sample rate: {} Hz", audio.sample_rate());
    println!("  Channels:    {}", audio.channels());
    println!("  Peak:        {}", audio.peak());
    Ok(())
}

#[cfg(not(feature = "export-wav"))]
fn render(_args: RenderArgs) -> anyhow::Result<()> {
    anyhow::bail!(
        "WAV rendering requires the \"export-wav\" feature. Rebuild with `--features export-wav`."
    )
}

#[cfg(feature = "streaming")]
fn play(args: PlayArgs) -> anyhow::Result<()> {
    use std::time::{Duration, Instant};
    use ym2151::streaming::{register_queue, ChipSource, StreamConfig};
    use ym2151::ym2151::registers::KEY_ON_ADDR;
    use ym2151::ym2151::CHANNEL_COUNT;
    use ym2151::AudioDevice;

    let program = load_program(&args.source, &args.audio)?;
    let mut config = StreamConfig::low_latency(args.audio.sample_rate);
    if args.audio.mono {
        config = config.mono();
    }

    let (control, receiver) = register_queue(config.register_queue_capacity)?;
    let source = ChipSource::for_program(&program, &config)
        .context("Failed to set up chip source")?
        .with_receiver(receiver);
    let stats = source.stats();

    println!("Streaming Configuration:");
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!(
        "  Block size:  {} frames ({:.1}ms latency)",
        config.frames_per_buffer,
        config.latency_ms()
    );
    println!("  Channels:    {}\n", config.channels);

    let device = AudioDevice::new(source).context("Failed to open audio device")?;
    let start = Instant::now();
    let hold = Duration::try_from_secs_f64(args.audio.duration)
        .with_context(|| format!("Invalid playback duration {} s", args.audio.duration))?;
    std::thread::sleep(hold);

    for channel in 0..CHANNEL_COUNT as u8 {
        control
            .write(KEY_ON_ADDR, channel)
            .context("Failed to queue key-off")?;
    }
    std::thread::sleep(Duration::from_millis(args.release_ms));
    device.finish();

    println!("=== Playback Statistics ===");
    println!("Duration:        {:.2} seconds", start.elapsed().as_secs_f32());
    println!("Frames rendered: {}", stats.frames_rendered());
    println!("Writes applied:  {}", stats.writes_applied());
    Ok(())
}

#[cfg(not(feature = "streaming"))]
fn play(_args: PlayArgs) -> anyhow::Result<()> {
    anyhow::bail!(
        "Live playback requires the \"streaming\" feature. Rebuild with `--features streaming`."
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;

    match cli.command {
        Command::Render(args) => render(args),
        Command::Play(args) => play(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codes_parse_as_hex_or_decimal() {
        assert_eq!(parse_key_code("0x4D"), Ok(0x4D));
        assert_eq!(parse_key_code("77"), Ok(77));
        assert!(parse_key_code("0x100").is_err());
        assert_eq!(key_code_label(0x4D).as_deref(), Some("B4"));
        assert_eq!(key_code_label(0x4E).as_deref(), Some("C5"));
        assert_eq!(key_code_label(0x43), None);
    }

    #[test]
    fn durations_and_intervals_must_be_finite_and_positive() {
        for bad in ["inf", "-inf", "NaN", "0", "-1", "abc"] {
            assert!(parse_positive(bad).is_err(), "{bad} accepted");
        }
        assert_eq!(parse_positive("0.25"), Ok(0.25));

        let render = |extra: &[&str]| {
            let mut argv = vec!["ym2151", "render", "--demo", "key-toggle"];
            argv.extend_from_slice(extra);
            Cli::try_parse_from(argv)
        };
        assert!(render(&["--duration", "inf"]).is_err());
        assert!(render(&["--toggle-ms", "0"]).is_err());
        assert!(render(&["--toggle-ms", "1e-300"]).is_ok());
        assert!(render(&[]).is_ok());
    }

    #[test]
    fn demo_programs_load_from_defaults() {
        let cli = Cli::try_parse_from(["ym2151", "render", "--demo", "key-toggle", "-d", "1"])
            .unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        let program = load_program(&args.source, &args.audio).unwrap();
        assert!(program.duration_ms() < 1_000.0);
        assert!(program.events.iter().any(|e| e.address == 0x08 && e.value == 0));
    }
}
