use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use foley_dub::analysis::features::volume_envelope;
use foley_dub::audio::finalizer::{decode_wav, finalize_recording, FinalizeRequest};
use foley_dub::audio::{RecordedAudio, RecordingFormat};
use foley_dub::catalog::{Catalog, ItemId, Level};
use foley_dub::config::AppConfig;
use foley_dub::engine::{AudioBackend, StubBackend};
use foley_dub::error::SubmissionError;
use foley_dub::game::{submit_dubbing, LevelSession, PlayerProgress, Submission, SubmissionOutcome};
use foley_dub::testing::Signal;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "foley_cli",
    about = "Record, analyze and score foley dubbing takes"
)]
struct Cli {
    /// JSON configuration (defaults to assets/foley_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON item and level catalog (defaults to the built-in catalog)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct TakeArgs {
    #[arg(long)]
    level: String,
    /// Comma separated item ids
    #[arg(long, value_delimiter = ',', required = true)]
    items: Vec<String>,
    /// Seed for simulated analysis and the wildness bonus
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Player progress file, read before and written after scoring
    #[arg(long)]
    progress: Option<PathBuf>,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List levels and their cues
    Levels,
    /// Score a WAV file against a level
    Score {
        #[arg(long)]
        wav: PathBuf,
        #[command(flatten)]
        take: TakeArgs,
    },
    /// Score a synthetic signal against a level
    Simulate {
        #[arg(long, value_enum, default_value_t = SignalKind::Sine)]
        signal: SignalKind,
        #[arg(long, default_value_t = 3.0)]
        secs: f32,
        #[command(flatten)]
        take: TakeArgs,
    },
    /// Record a take from the microphone and score it
    Record {
        /// Stop after this many seconds instead of the level duration
        #[arg(long)]
        secs: Option<f32>,
        /// Use the synthetic backend instead of the default input device
        #[arg(long)]
        stub: bool,
        #[command(flatten)]
        take: TakeArgs,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SignalKind {
    Silence,
    Sine,
    Noise,
    Bursts,
}

impl SignalKind {
    fn signal(self) -> Signal {
        match self {
            SignalKind::Silence => Signal::Silence,
            SignalKind::Sine => Signal::default(),
            SignalKind::Noise => Signal::Noise { amplitude: 0.4 },
            SignalKind::Bursts => Signal::Bursts {
                frequency_hz: 660.0,
                amplitude: 0.7,
                on_ms: 150,
                off_ms: 350,
            },
        }
    }
}

const SIMULATED_SAMPLE_RATE: u32 = 16_000;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    let catalog = match &cli.catalog {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            Catalog::from_json_str(&json)
                .with_context(|| format!("parsing catalog {}", path.display()))?
        }
        None => Catalog::builtin(),
    };

    match cli.command {
        Commands::Levels => run_levels(&catalog),
        Commands::Score { wav, take } => {
            let recording = recording_from_wav(&wav, &config)?;
            run_take(&catalog, &config, &take, &recording)
        }
        Commands::Simulate { signal, secs, take } => {
            let samples = signal.signal().render(SIMULATED_SAMPLE_RATE, secs);
            let recording = recording_from_samples(samples, SIMULATED_SAMPLE_RATE, &config)?;
            run_take(&catalog, &config, &take, &recording)
        }
        Commands::Record { secs, stub, take } => run_record(catalog, config, take, secs, stub),
    }
}

fn run_levels(catalog: &Catalog) -> Result<ExitCode> {
    for level in catalog.levels() {
        println!(
            "{}  {}  ({:.0}s, {} cues)",
            level.id,
            level.title,
            level.duration_secs,
            level.cues.len()
        );
        for cue in &level.cues {
            println!("    {:>6.2}s  {:<8} {}", cue.time, cue.expected_type, cue.description);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn find_level<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a Level> {
    let level = catalog
        .level(id)
        .ok_or_else(|| SubmissionError::UnknownLevel { id: id.to_string() })?;
    Ok(level)
}

fn selected_items(take: &TakeArgs) -> Vec<ItemId> {
    take.items.iter().map(|id| ItemId::from(id.as_str())).collect()
}

fn run_take(
    catalog: &Catalog,
    config: &AppConfig,
    take: &TakeArgs,
    recording: &RecordedAudio,
) -> Result<ExitCode> {
    let level = find_level(catalog, &take.level)?;
    let selected = selected_items(take);
    let mut progress = load_progress(take.progress.as_deref())?;
    let mut rng = StdRng::seed_from_u64(take.seed);

    let outcome = submit_dubbing(
        Submission {
            level,
            recording: Some(recording),
            selected: &selected,
            busy: false,
        },
        &mut progress,
        catalog,
        config,
        &mut rng,
    );
    finish_take(outcome, &progress, take)
}

fn run_record(
    catalog: Catalog,
    config: AppConfig,
    take: TakeArgs,
    secs: Option<f32>,
    stub: bool,
) -> Result<ExitCode> {
    let level = find_level(&catalog, &take.level)?.clone();
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let session = LevelSession::new(level, Arc::new(catalog), backend(stub), config);
    runtime.block_on(record_take(session, take, secs))
}

async fn record_take(
    mut session: LevelSession,
    take: TakeArgs,
    secs: Option<f32>,
) -> Result<ExitCode> {
    for id in selected_items(&take) {
        session
            .toggle_item(&id)
            .with_context(|| format!("selecting item '{}'", id))?;
    }

    let limit = secs
        .and_then(|secs| Duration::try_from_secs_f32(secs.max(0.0)).ok())
        .unwrap_or_else(|| session.auto_stop_after());
    session.capture().notify_user_gesture()?;
    session.start_recording()?;
    eprintln!("Recording for {:.1}s...", limit.as_secs_f32());

    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    while started.elapsed() < limit && session.capture().is_recording() {
        ticker.tick().await;
        let tick = session.tick();
        for alert in tick.alerts {
            eprintln!(
                "  cue at {:.2}s: {} ({})",
                alert.time, alert.expected_type, alert.description
            );
        }
        if let Some(err) = tick.capture_error {
            session.leave().await;
            return Err(err).context("recording failed");
        }
    }

    if session.stop_recording().await?.is_none() {
        eprintln!("Nothing was recorded");
    }

    let mut progress = load_progress(take.progress.as_deref())?;
    let mut rng = StdRng::seed_from_u64(take.seed);
    let outcome = session.submit(&mut progress, &mut rng);
    session.leave().await;
    finish_take(outcome, &progress, &take)
}

#[cfg(not(target_os = "android"))]
fn backend(stub: bool) -> Arc<dyn AudioBackend> {
    if stub {
        Arc::new(StubBackend::new())
    } else {
        Arc::new(foley_dub::engine::CpalBackend::new())
    }
}

#[cfg(target_os = "android")]
fn backend(_stub: bool) -> Arc<dyn AudioBackend> {
    Arc::new(StubBackend::new())
}

fn finish_take(
    outcome: Result<SubmissionOutcome, SubmissionError>,
    progress: &PlayerProgress,
    take: &TakeArgs,
) -> Result<ExitCode> {
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("Submission rejected: {}", err);
            return Ok(ExitCode::from(2));
        }
    };

    let report = serde_json::to_string_pretty(&outcome)?;
    match &take.output {
        Some(path) => fs::write(path, report)
            .with_context(|| format!("writing report {}", path.display()))?,
        None => println!("{}", report),
    }
    eprintln!(
        "{} / 100, {} stars: {}",
        outcome.breakdown.score,
        outcome.breakdown.stars,
        outcome.breakdown.comment.text()
    );

    if let Some(path) = &take.progress {
        fs::write(path, progress.to_json_string()?)
            .with_context(|| format!("writing progress {}", path.display()))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn load_progress(path: Option<&Path>) -> Result<PlayerProgress> {
    match path {
        Some(path) if path.exists() => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading progress {}", path.display()))?;
            PlayerProgress::from_json_str(&json)
                .with_context(|| format!("parsing progress {}", path.display()))
        }
        _ => Ok(PlayerProgress::new()),
    }
}

fn recording_from_wav(path: &Path, config: &AppConfig) -> Result<RecordedAudio> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded = decode_wav(&bytes)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("decoding {}", path.display()))?;
    recording_from_samples(decoded.samples, decoded.sample_rate, config)
}

fn recording_from_samples(
    samples: Vec<f32>,
    sample_rate: u32,
    config: &AppConfig,
) -> Result<RecordedAudio> {
    let interval_ms = config.capture.chunk_interval_ms;
    let volume_data = volume_envelope(&samples, sample_rate, interval_ms, &config.analysis);
    let recorded = finalize_recording(FinalizeRequest {
        chunks: if samples.is_empty() { Vec::new() } else { vec![samples] },
        sample_rate,
        format: RecordingFormat::WavFloat,
        volume_data,
        waveform_points: Vec::new(),
        chunk_interval_ms: interval_ms,
    })?;
    Ok(recorded)
}
