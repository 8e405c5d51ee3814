//! DRR CLI
//!
//! Usage:
//!   drr run --tone 220,330,550 --duration-secs 60     # Synthetic capture
//!   drr run --input breath.wav --render out.wav       # WAV capture, render output
//!   drr run --tone harmonic:110:4 --json              # JSON snapshots
//!   drr run --tone 200 --at "30:force focus21"        # Scheduled operator command
//!   drr serve --addr 127.0.0.1:3000                   # HTTP/WS API server
//!   drr config                                        # Print the effective config

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use drr::clock::{Clock, ManualClock};
use drr::config::EngineConfig;
use drr::core::{
    run_server, CaptureResult, CaptureSource, DrrEngine, OperatorCommand, SoftwareGraph,
    SynthesisBackend, Tone, ToneCapture, WavCapture, WavSink,
};
use drr::types::{EngineSnapshot, FocusState, SessionRecord};
use drr::{telemetry, DrrError, DrrResult, DEFAULT_SAMPLE_RATE, VERSION};

/// Default simulated session length without a WAV input
const DEFAULT_DURATION_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(
    name = "drr",
    version = VERSION,
    about = "DRR - Dynamic Resonance Response biofeedback engine",
    long_about = "DRR listens to a capture source, measures spectral coherence and\n\
                  stability, and steers a binaural/infrasonic soundscape through\n\
                  focus states.\n\n\
                  States:\n  \
                  FOCUS_12  - Session start, waiting for sustained stability\n  \
                  FOCUS_15  - Entered through the time-collapse event\n  \
                  FOCUS_21  - High coherence, convergence and long dwell\n  \
                  CRL_T/M/P - Operator-selected training modes"
)]
struct Cli {
    /// JSON config file; absent fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the random seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Override the control-loop cadence (milliseconds)
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a session on a simulated clock
    Run(RunArgs),
    /// Run the HTTP/WS API server
    Serve {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// WAV file used as the capture source
    #[arg(short, long, conflicts_with = "tone")]
    input: Option<PathBuf>,

    /// Synthetic capture: "220,330,550" or "harmonic:<fundamental>:<partials>"
    #[arg(short, long)]
    tone: Option<String>,

    /// Add uniform noise of this peak level to the synthetic capture
    #[arg(long, default_value_t = 0.0)]
    noise: f32,

    /// Write the synthesized stereo output to this WAV file
    #[arg(long)]
    render: Option<PathBuf>,

    /// Session length (defaults to the WAV length, or 60 s)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Operator command at a session offset, e.g. "30:force focus21"
    #[arg(long = "at", value_name = "SECS:COMMAND")]
    at: Vec<String>,

    /// Print every Nth committed snapshot (state changes always print)
    #[arg(long, default_value_t = 10)]
    every: u64,

    /// Output as JSON lines
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Show module breakdown
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();
    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => match cli.command {
            Command::Run(args) => run_session(config, &args),
            Command::Serve { addr } => run_server(&addr, config).await,
            Command::Config => print_config(&config),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> DrrResult<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.tick_interval_ms = tick_ms;
    }
    config.validate()?;
    Ok(config)
}

fn print_config(config: &EngineConfig) -> DrrResult<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Parse a synthetic capture spec
fn parse_tones(spec: &str) -> Result<Vec<Tone>, String> {
    if let Some(rest) = spec.strip_prefix("harmonic:") {
        let (fundamental, partials) = rest
            .split_once(':')
            .ok_or_else(|| format!("expected harmonic:<fundamental>:<partials>, got '{}'", spec))?;
        let fundamental: f32 = fundamental.trim().parse().map_err(|_| format!("bad fundamental '{}'", fundamental))?;
        let partials: usize = partials.trim().parse().map_err(|_| format!("bad partial count '{}'", partials))?;
        if fundamental <= 0.0 || partials == 0 {
            return Err("fundamental and partials must be positive".into());
        }
        return Ok(Tone::harmonic_series(fundamental, partials, 0.5));
    }

    let freqs = spec
        .split(',')
        .map(|f| f.trim().parse::<f32>().map_err(|_| format!("bad frequency '{}'", f.trim())))
        .collect::<Result<Vec<_>, _>>()?;
    if freqs.is_empty() || freqs.iter().any(|f| *f <= 0.0) {
        return Err("frequencies must be positive".into());
    }
    let amplitude = 0.5 / freqs.len() as f32;
    Ok(freqs
        .into_iter()
        .map(|frequency| Tone { frequency, amplitude })
        .collect())
}

/// Parse "SECS:COMMAND" into (offset ms, command)
fn parse_scheduled(entry: &str) -> DrrResult<(u64, OperatorCommand)> {
    let (secs, command) = entry
        .split_once(':')
        .ok_or_else(|| DrrError::Config(format!("expected SECS:COMMAND, got '{}'", entry)))?;
    let secs: f64 = secs
        .trim()
        .parse()
        .map_err(|_| DrrError::Config(format!("bad offset '{}'", secs)))?;
    Ok(((secs.max(0.0) * 1000.0) as u64, command.parse()?))
}

/// Explicit duration, else the WAV length, else the default
fn session_duration_ms(duration_secs: Option<u64>, wav_len_ms: Option<u64>) -> u64 {
    duration_secs
        .map(|s| s.saturating_mul(1000))
        .or(wav_len_ms)
        .unwrap_or(DEFAULT_DURATION_SECS * 1000)
}

/// Run a session on a simulated clock, one tick interval at a time
fn run_session(config: EngineConfig, args: &RunArgs) -> DrrResult<()> {
    let mut schedule = args
        .at
        .iter()
        .map(|s| parse_scheduled(s))
        .collect::<DrrResult<Vec<_>>>()?;
    schedule.sort_by_key(|(at, _)| *at);

    if args.no_color {
        colored::control::set_override(false);
    }

    let (capture, sample_rate, wav_len_ms): (CaptureResult, f32, Option<u64>) = match (&args.input, &args.tone) {
        (Some(path), _) => match WavCapture::open(path, &config.analyser) {
            Ok(wav) => {
                let sr = wav.sample_rate();
                let len = wav.duration_ms();
                (Ok(Box::new(wav) as Box<dyn CaptureSource>), sr, Some(len))
            }
            Err(e) => (Err(e), DEFAULT_SAMPLE_RATE, None),
        },
        (None, Some(spec)) => {
            let tones = parse_tones(spec).map_err(DrrError::Config)?;
            let tone = ToneCapture::new(DEFAULT_SAMPLE_RATE, tones, &config.analyser, config.seed)
                .with_noise(args.noise);
            (Ok(Box::new(tone) as Box<dyn CaptureSource>), DEFAULT_SAMPLE_RATE, None)
        }
        (None, None) => (
            Ok(Box::new(ToneCapture::harmonic(
                DEFAULT_SAMPLE_RATE,
                110.0,
                4,
                0.5,
                &config.analyser,
                config.seed,
            )) as Box<dyn CaptureSource>),
            DEFAULT_SAMPLE_RATE,
            None,
        ),
    };

    let duration_ms = session_duration_ms(args.duration_secs, wav_len_ms);
    let interval_ms = config.tick_interval_ms;

    let clock = Arc::new(ManualClock::new(0));
    let mut engine = DrrEngine::new(config, clock.clone(), SoftwareGraph::new(sample_rate as f64))?;
    let mut sink = match &args.render {
        Some(path) => Some(WavSink::create(path, sample_rate as u32)?),
        None => None,
    };

    if !args.json {
        print_header(args.no_color);
    }
    let capture_status = engine.start(capture)?;
    info!(?capture_status, duration_ms, "session started");

    let block_len = (sample_rate as u64 * interval_ms / 1000) as usize;
    let mut block = vec![[0.0f32; 2]; block_len];
    let mut last_state = engine.focus_state();
    let mut committed = 0u64;
    let mut pending = schedule.into_iter().peekable();

    while clock.now_ms() < duration_ms && engine.is_running() {
        let now = clock.advance(interval_ms);

        while let Some((at, command)) = pending.next_if(|(at, _)| *at <= now) {
            match engine.apply_command(command) {
                Ok(Some(event)) => info!(at, from = %event.from, to = %event.to, "scheduled command"),
                Ok(None) => info!(at, ?command, "scheduled command"),
                Err(e) => warn!(at, error = %e, "scheduled command failed"),
            }
        }

        if let Some(snapshot) = engine.poll() {
            committed += 1;
            let changed = snapshot.focus_state != last_state;
            if changed || committed % args.every.max(1) == 1 || args.every <= 1 {
                print_snapshot(&snapshot, args)?;
            }
            last_state = snapshot.focus_state;
        }

        if let Some(sink) = sink.as_mut() {
            block.iter_mut().for_each(|f| *f = [0.0; 2]);
            engine.backend_mut().render(&mut block);
            sink.write(&block)?;
        }
    }

    let final_state = engine.focus_state();
    let ticks = engine.tick_count();
    engine.stop();
    if let Some(sink) = sink {
        let frames = sink.finalize()?;
        info!(frames, "render written");
    }

    if args.json {
        println!("{}", serde_json::to_string(engine.session_log())?);
    } else {
        print_summary(&engine, final_state, ticks);
    }
    Ok(())
}

fn print_header(no_color: bool) {
    let title = format!("DRR v{} - Dynamic Resonance Response", VERSION);
    if no_color {
        println!("========================================");
        println!("  {}", title);
        println!("========================================");
    } else {
        println!("{}", "╔════════════════════════════════════════════╗".bold());
        println!("{}", format!("║  {:<42}║", title).bold());
        println!("{}", "╚════════════════════════════════════════════╝".bold());
    }
    println!();
}

fn print_snapshot(snapshot: &EngineSnapshot, args: &RunArgs) -> DrrResult<()> {
    if args.json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    if args.no_color {
        println!("{}", snapshot.to_parseable_string());
    } else {
        println!("{}", snapshot.to_terminal_string());
    }
    if args.verbose {
        print_verbose(snapshot);
    }
    Ok(())
}

fn print_verbose(snapshot: &EngineSnapshot) {
    let freqs = snapshot
        .dominant_frequencies
        .iter()
        .take(6)
        .map(|f| format!("{:.1}", f))
        .collect::<Vec<_>>()
        .join(", ");
    println!("  {:<12} [{}]", "peaks".dimmed(), freqs);
    println!(
        "  {:<12} convergence={} breath={:.3} phase={:.3}",
        "metrics".dimmed(),
        snapshot.metrics.harmonic_convergence,
        snapshot.metrics.breath_rhythm,
        snapshot.current_phase
    );
    println!(
        "  {:<12} L={:.2}Hz R={:.2}Hz infra={:.2} mod={:.2}",
        "audio".dimmed(),
        snapshot.audio_config.left_channel_hz,
        snapshot.audio_config.right_channel_hz,
        snapshot.audio_config.infrasonic_layer,
        snapshot.audio_config.modulation_rhythm
    );
    println!(
        "  {:<12} dissonance={:.2} spiral={:.2} nodes={} memory={}",
        "modules".dimmed(),
        snapshot.creative_flow.dissonance_level,
        snapshot.foresight.spiral_intensity,
        snapshot.resonance_nodes.len(),
        snapshot.resonance_memory_len
    );
    println!("  {:<12} {}", "reason".dimmed(), snapshot.reason.description());
}

fn print_summary<B: SynthesisBackend>(engine: &DrrEngine<B>, final_state: FocusState, ticks: u64) {
    println!();
    println!("{}", "Session ended".bold());
    println!("  final state: {} {}", final_state.emoji(), final_state);
    println!("  ticks:       {}", ticks);
    for event in engine.transitions() {
        println!(
            "  {:>8.1}s  {} → {}  {}",
            event.at_ms as f64 / 1000.0,
            event.from,
            event.to,
            event.reason.code().cyan()
        );
    }
    let atemporal = engine
        .session_log()
        .iter()
        .filter(|r| matches!(r, SessionRecord::Atemporal(_)))
        .count();
    if atemporal > 0 {
        println!("  atemporal events: {}", atemporal.to_string().magenta());
    }
}
