//! Liveness CLI - offline evaluation of recorded challenge sessions
//!
//! Commands:
//! - analyze: Evaluate a recording directory and print a verdict report
//! - config: Print the default configuration or validate a config file
//! - doctor: Diagnose configuration, recording and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use liveness_gate::capture::{CaptureObserver, FixedPicker};
use liveness_gate::replay::{list_frames, load_face_track, load_recording, DirectoryFrameSource};
use liveness_gate::report::ReportEncoder;
use liveness_gate::{
    analyze_session, ChallengeKind, LivenessChecker, LivenessConfig, LivenessError,
    ScriptedFaceLocator, Verdict, PRODUCER_NAME, VERSION,
};

/// Liveness - challenge-response anti-spoofing for face capture
#[derive(Parser)]
#[command(name = "liveness")]
#[command(version = VERSION)]
#[command(about = "Evaluate liveness of recorded face-capture sessions", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    log_format: LogFormat,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a recording directory and print a verdict report
    Analyze {
        /// Directory of frames, ordered by file name
        #[arg(short, long)]
        recording: PathBuf,

        /// JSON sidecar with one face box (or null) per frame
        #[arg(short, long)]
        faces: PathBuf,

        /// Challenge the subject was given
        #[arg(short, long)]
        challenge: ChallengeKind,

        /// Configuration file (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Replay through the timed capture controller instead of loading
        /// the whole recording at once
        #[arg(long)]
        timed: bool,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Instance ID recorded in the report producer block
        #[arg(long)]
        instance_id: Option<String>,
    },

    /// Print the default configuration or validate a config file
    Config {
        /// Configuration file to validate and print
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Diagnose configuration, recording and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a recording directory
        #[arg(long)]
        recording: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Human,
    /// Newline-delimited JSON
    Json,
}

fn init_logging(format: LogFormat, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let ansi = atty::is(atty::Stream::Stderr);

    match format {
        LogFormat::Human => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr).with_ansi(ansi))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format, &cli.log_level);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), LivenessCliError> {
    match command {
        Commands::Analyze {
            recording,
            faces,
            challenge,
            config,
            timed,
            output,
            instance_id,
        } => cmd_analyze(
            &recording,
            &faces,
            challenge,
            config.as_deref(),
            timed,
            &output,
            instance_id,
        ),

        Commands::Config { config } => cmd_config(config.as_deref()),

        Commands::Doctor {
            config,
            recording,
            json,
        } => cmd_doctor(config.as_deref(), recording.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<LivenessConfig, LivenessCliError> {
    match path {
        Some(path) => Ok(LivenessConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(LivenessConfig::default()),
    }
}

/// Shows the instruction and countdown on stderr
struct ConsoleObserver;

impl CaptureObserver for ConsoleObserver {
    fn on_instruction(&mut self, challenge: ChallengeKind, text: &str) {
        eprintln!("[{challenge}] {text}");
    }

    fn on_tick(&mut self, remaining_secs: u64, frames: usize) {
        eprintln!("  {remaining_secs}s left, {frames} frames");
    }
}

fn cmd_analyze(
    recording: &Path,
    faces: &Path,
    challenge: ChallengeKind,
    config: Option<&Path>,
    timed: bool,
    output: &Path,
    instance_id: Option<String>,
) -> Result<(), LivenessCliError> {
    let config = load_config(config)?;
    let locator: ScriptedFaceLocator = load_face_track(faces)?;
    info!(faces = locator.len(), "face track loaded");

    let verdict: Verdict = if timed {
        let mut checker = LivenessChecker::with_config(locator, config)?
            .with_picker(FixedPicker(challenge))
            .with_observer(ConsoleObserver);
        checker.run_liveness_check(&mut DirectoryFrameSource::new(recording))?
    } else {
        let session = load_recording(recording, challenge)?;
        analyze_session(&session, &config, &locator)
    };

    let encoder = match instance_id {
        Some(id) => ReportEncoder::with_instance_id(id),
        None => ReportEncoder::new(),
    };
    let report = encoder.encode_to_json(&verdict)?;

    if output.to_string_lossy() == "-" {
        println!("{}", report);
    } else {
        fs::write(output, report)?;
    }

    if verdict.accepted {
        Ok(())
    } else {
        Err(LivenessCliError::Rejected(verdict.summary()))
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), LivenessCliError> {
    let config = load_config(config)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    recording: Option<&Path>,
    json: bool,
) -> Result<(), LivenessCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, VERSION),
    });

    checks.push(match load_config(config) {
        Ok(cfg) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Config valid (window {} ms, min {} frames, quorum {}/3)",
                cfg.capture.window_ms, cfg.capture.min_frames, cfg.quorum
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        },
    });

    if let Some(dir) = recording {
        let check = if !dir.is_dir() {
            DoctorCheck {
                name: "recording".to_string(),
                status: CheckStatus::Error,
                message: "Recording directory does not exist".to_string(),
            }
        } else {
            match list_frames(dir) {
                Ok(frames) if frames.is_empty() => DoctorCheck {
                    name: "recording".to_string(),
                    status: CheckStatus::Warning,
                    message: "Recording directory holds no frames".to_string(),
                },
                Ok(frames) => DoctorCheck {
                    name: "recording".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("{} frames found", frames.len()),
                },
                Err(e) => DoctorCheck {
                    name: "recording".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot list recording: {}", e),
                },
            }
        };
        checks.push(check);
    }

    let stderr_check = if atty::is(atty::Stream::Stderr) {
        DoctorCheck {
            name: "stderr".to_string(),
            status: CheckStatus::Ok,
            message: "stderr is a TTY (coloured logs)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stderr".to_string(),
            status: CheckStatus::Ok,
            message: "stderr is redirected (plain logs)".to_string(),
        }
    };
    checks.push(stderr_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Liveness Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(LivenessCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum LivenessCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Liveness(LivenessError),
    Rejected(String),
    DoctorFailed,
}

impl From<io::Error> for LivenessCliError {
    fn from(e: io::Error) -> Self {
        LivenessCliError::Io(e)
    }
}

impl From<serde_json::Error> for LivenessCliError {
    fn from(e: serde_json::Error) -> Self {
        LivenessCliError::Json(e)
    }
}

impl From<LivenessError> for LivenessCliError {
    fn from(e: LivenessError) -> Self {
        LivenessCliError::Liveness(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LivenessCliError> for CliError {
    fn from(e: LivenessCliError) -> Self {
        match e {
            LivenessCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LivenessCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LivenessCliError::Liveness(e) => {
                let (code, hint) = match &e {
                    LivenessError::CaptureUnavailable(_) => {
                        ("CAPTURE_UNAVAILABLE", "Check the recording directory")
                    }
                    LivenessError::InsufficientFrames { .. } => {
                        ("INSUFFICIENT_FRAMES", "Record a longer session and retry")
                    }
                    LivenessError::Aborted { .. } => ("ABORTED", "Retry the challenge"),
                    LivenessError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'liveness config' for the defaults")
                    }
                    LivenessError::Json(_) => ("JSON_ERROR", "Check JSON syntax"),
                    LivenessError::Image(_) => ("IMAGE_ERROR", "Frames must be PNG or JPEG"),
                    LivenessError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            LivenessCliError::Rejected(summary) => CliError {
                code: "LIVENESS_REJECTED".to_string(),
                message: summary,
                hint: Some("See the report's reasons for the failed layers".to_string()),
            },
            LivenessCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
