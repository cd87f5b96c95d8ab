//! ASL runner CLI
//!
//! Programs are read as JSON-serialized ASTs.

use asl::ast::Program;
use asl::config::{RunConfig, Strictness};
use asl::driver::{self, with_primitives};
use asl::instrumentation::trace_to_json;
use asl::interp::StaticEnv;
use asl::native::primitives;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "asl", version, about = "ASL native evaluation backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program; the process exits with the value returned by main()
    Run {
        /// JSON program file
        file: PathBuf,
        /// TOML run configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured strictness
        #[arg(long, value_enum)]
        strictness: Option<StrictnessArg>,
        /// Record identifier accesses
        #[arg(long)]
        instrument: bool,
        /// Write the recorded trace to this file as JSON
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Build the static environment without running
    Check {
        /// JSON program file
        file: PathBuf,
        #[arg(long, value_enum, default_value = "type-check")]
        strictness: StrictnessArg,
    },
    /// Dump the primitive declarations as JSON
    Primitives,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrictnessArg {
    Silence,
    Warn,
    TypeCheck,
}

impl From<StrictnessArg> for Strictness {
    fn from(arg: StrictnessArg) -> Self {
        match arg {
            StrictnessArg::Silence => Strictness::Silence,
            StrictnessArg::Warn => Strictness::Warn,
            StrictnessArg::TypeCheck => Strictness::TypeCheck,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asl=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            file,
            config,
            strictness,
            instrument,
            trace,
        } => run_file(&file, config.as_deref(), strictness, instrument, trace.as_deref()),
        Command::Check { file, strictness } => check_file(&file, strictness.into()).map(|()| 0),
        Command::Primitives => dump_primitives().map(|()| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn load_program(path: &Path) -> Result<Program, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&source)?)
}

fn run_file(
    path: &Path,
    config_path: Option<&Path>,
    strictness: Option<StrictnessArg>,
    instrument: bool,
    trace_path: Option<&Path>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let program = load_program(path)?;
    let mut config = match config_path {
        Some(config_path) => RunConfig::from_toml_str(&std::fs::read_to_string(config_path)?)?,
        None => RunConfig::default(),
    };
    if let Some(strictness) = strictness {
        config.strictness = strictness.into();
    }
    config.instrument |= instrument || trace_path.is_some();

    let outcome = driver::run_with_config(&config, None, &program)?;
    if let Some(trace_path) = trace_path {
        std::fs::write(trace_path, trace_to_json(&outcome.trace)?)?;
    }
    Ok(outcome.exit_code)
}

fn check_file(path: &Path, strictness: Strictness) -> Result<(), Box<dyn std::error::Error>> {
    let program = with_primitives(&load_program(path)?);
    let env = StaticEnv::build(&program, strictness)?;
    println!("✓ {} checks successfully ({} subprograms)", path.display(), env.subprograms().count());
    Ok(())
}

fn dump_primitives() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&primitives::declarations())?);
    Ok(())
}
