//! Stave - descriptor compiler and deployment driver
//!
//! This is the main CLI entry point for Stave.

use clap::{Parser, Subcommand};
use stave::answers::AnswerSet;
use stave::channel::{ChannelConfig, SharedChannel};
use stave::command::{CommandOutcome, ExecuteOptions, ScaleOptions, Verb};
use stave::descriptor::SourceFormat;
use stave::engine::Engine;
use stave::error::{Result, StaveError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// File names probed when no descriptor is given explicitly.
const DESCRIPTOR_CANDIDATES: [&str; 4] =
    ["stave.yaml", "stave.yml", "descriptor.yaml", "descriptor.yml"];

/// Stave - compile application descriptors and drive them to a cluster
#[derive(Parser)]
#[command(name = "stave")]
#[command(version)]
#[command(about = "Compile application descriptors and drive them to a cluster", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Descriptor file (probes stave.yaml and friends when omitted)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Descriptor format, yaml or json (defaults by file extension)
    #[arg(long, global = true)]
    format: Option<String>,

    /// Answer as KEY=VALUE; repeatable, overrides file and inline answers
    #[arg(short, long = "answer", global = true)]
    answer: Vec<String>,

    /// YAML file of answers
    #[arg(long, global = true)]
    answers_file: Option<PathBuf>,

    /// Channel configuration file
    #[arg(short, long, global = true)]
    channel: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the descriptor and print its processed form
    Compile {
        /// Output format, yaml or json
        #[arg(short, long, default_value = "yaml")]
        output: String,
    },

    /// Create every application without starting it
    Create,

    /// Create and start every application
    Up,

    /// Show the state of every application
    Status,

    /// Stop every application
    Stop,

    /// Stop and start every application
    Restart,

    /// Set the instance count of one application
    Scale {
        /// Application name
        application: String,
        /// Desired instance count
        instances: i32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = resolve_descriptor(cli.file.as_deref())?;
    let format = match cli.format.as_deref() {
        Some(name) => parse_format(name)?,
        None => SourceFormat::from_path(&path),
    };
    let source = std::fs::read_to_string(&path)?;
    let answers = collect_answers(&cli.answer, cli.answers_file.as_deref())?;

    let (verb, scale) = match cli.command {
        Commands::Compile { output } => {
            let engine = Engine::new();
            let descriptor = engine.compile(&source, format, &answers)?;
            let rendered = match parse_format(&output)? {
                SourceFormat::Yaml => descriptor.to_yaml()?,
                SourceFormat::Json => descriptor.to_json()?,
            };
            println!("{}", rendered);
            return Ok(());
        }
        Commands::Create => (Verb::Create, None),
        Commands::Up => (Verb::Up, None),
        Commands::Status => (Verb::Status, None),
        Commands::Stop => (Verb::Stop, None),
        Commands::Restart => (Verb::Restart, None),
        Commands::Scale {
            application,
            instances,
        } => (
            Verb::Scale,
            Some(ScaleOptions {
                application,
                instances,
            }),
        ),
    };

    let channel = load_channel(cli.channel.as_deref())?;
    let engine = Engine::new().with_channel(channel);
    let descriptor = engine.compile(&source, format, &answers)?;

    let options = ExecuteOptions {
        scale,
        cancel: cancel_on_ctrl_c(),
    };
    let outcome = engine.execute(&descriptor, verb, &options).await?;
    report(verb, &outcome);

    match outcome.into_error() {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

fn parse_format(name: &str) -> Result<SourceFormat> {
    match name {
        "yaml" | "yml" => Ok(SourceFormat::Yaml),
        "json" => Ok(SourceFormat::Json),
        other => Err(StaveError::Config(format!(
            "unknown format '{}' (expected yaml or json)",
            other
        ))),
    }
}

fn resolve_descriptor(file: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = file {
        return Ok(path.to_path_buf());
    }
    for candidate in DESCRIPTOR_CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(StaveError::Config(format!(
        "no descriptor found; pass --file or create one of {}",
        DESCRIPTOR_CANDIDATES.join(", ")
    )))
}

/// Later sources win: answers file first, then KEY=VALUE flags.
fn collect_answers(pairs: &[String], file: Option<&Path>) -> Result<AnswerSet> {
    let mut answers = AnswerSet::new();
    if let Some(path) = file {
        let text = std::fs::read_to_string(path)?;
        let from_file: AnswerSet = serde_yaml::from_str(&text).map_err(|e| {
            StaveError::Config(format!("answers file {}: {}", path.display(), e))
        })?;
        answers.merge(&from_file.normalized());
    }
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(StaveError::Config(format!(
                "answer '{}' is not KEY=VALUE",
                pair
            )));
        };
        answers.insert(key, value);
    }
    Ok(answers)
}

fn load_channel(path: Option<&Path>) -> Result<SharedChannel> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stave")
            .join("channel.yaml"),
    };
    tracing::debug!(path = %path.display(), "loading channel configuration");
    ChannelConfig::from_path(&path)?.build()
}

/// First interrupt stops new dispatches; in-flight calls drain on their
/// own timeouts.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight calls");
            handle.cancel();
        }
    });
    token
}

fn report(verb: Verb, outcome: &CommandOutcome) {
    if verb == Verb::Status {
        println!(
            "{:<24} {:<12} {:<10} {}",
            "APPLICATION", "STATE", "CRITERIA", "OBSERVED"
        );
        for (name, entry) in &outcome.statuses {
            println!(
                "{:<24} {:<12} {:<10} {}",
                name,
                entry.state,
                if entry.meets_criteria { "met" } else { "unmet" },
                entry.observed_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    for (name, err) in &outcome.failures {
        eprintln!("{}: {}", name, err);
    }

    if outcome.cancelled {
        eprintln!(
            "cancelled after {} of {} calls completed",
            outcome.completed, outcome.total
        );
    } else if outcome.failures.is_empty() && verb != Verb::Status {
        println!("{}: {} of {} applications", verb, outcome.completed, outcome.total);
    }
}
