//! orbit - tool-call runner and terminal activity watcher.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use orbit_cli::{config::Config, logging, process, tools};
use orbit_core::{ActivityPipeline, SystemClock, ToolCallParser, ToolExecutor, run_status_loop};
use orbit_types::StatusChange;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use logging::{LogConfig, LogFormat};

/// Queue depth between the child's readers and the status loop.
const INPUT_QUEUE: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "orbit")]
#[command(about = "Extract and run tool calls, or watch a command's activity status")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (tool runs and status changes)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging (everything except per-rule matching)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long, global = true)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "arbiter=debug").
    /// Can be specified multiple times. Targets are prefixed with "orbit::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the tool call from a model response and print it as JSON
    Parse {
        /// Response file (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Extract the tool call from a model response and run it with the built-in tools
    Run {
        /// Response file (stdin when omitted)
        file: Option<PathBuf>,

        /// Override the tool's timeout
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
    /// Run a command and print its activity status as it changes
    Watch {
        /// Override the arbiter hold window
        #[arg(long, value_name = "MS")]
        hold_ms: Option<u64>,

        /// Override the debounce window
        #[arg(long, value_name = "MS")]
        debounce_ms: Option<u64>,

        /// Print each change as a JSON line
        #[arg(long)]
        json: bool,

        /// Command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    tracing::info!(
        target: "orbit::startup",
        "Loaded configuration (hold {} ms, debounce {} ms, {} extra tools)",
        config.arbiter.hold_ms,
        config.arbiter.debounce_ms,
        config.tools.known.len()
    );

    match cli.command {
        Command::Parse { file } => parse(&config, file).await,
        Command::Run { file, timeout_ms } => run(&config, file, timeout_ms).await,
        Command::Watch {
            hold_ms,
            debounce_ms,
            json,
            command,
        } => {
            if let Some(hold_ms) = hold_ms {
                config.arbiter.hold_ms = hold_ms;
            }
            if let Some(debounce_ms) = debounce_ms {
                config.arbiter.debounce_ms = debounce_ms;
            }
            watch(config, command, json).await
        }
    }
}

async fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

async fn parse(config: &Config, file: Option<PathBuf>) -> Result<()> {
    let registry = tools::builtin_registry()?;
    let parser = ToolCallParser::new(
        registry
            .names()
            .map(str::to_string)
            .chain(config.tools.known.iter().cloned()),
    );

    let text = read_input(file).await?;
    match parser.parse(&text) {
        Some(call) => println!("{}", serde_json::to_string_pretty(&call)?),
        None => eprintln!("No tool call found"),
    }
    Ok(())
}

async fn run(config: &Config, file: Option<PathBuf>, timeout_ms: Option<u64>) -> Result<()> {
    let executor = ToolExecutor::with_config(tools::builtin_registry()?, config.tools.executor.clone());
    let text = read_input(file).await?;

    match executor.run_from_text(&text, timeout_ms.map(Duration::from_millis)).await {
        Some(invocation) => println!("{}", serde_json::to_string_pretty(&invocation.output)?),
        None => eprintln!("No tool call found"),
    }
    Ok(())
}

async fn watch(config: Config, command: Vec<String>, json: bool) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("No command given");
    };

    let pipeline = ActivityPipeline::new(SystemClock::new(), config.activity, config.arbiter)?;
    let (tx, rx) = mpsc::channel(INPUT_QUEUE);

    let mut sink = |change: &StatusChange| print_change(change, json);
    let child = async {
        tokio::select! {
            result = process::run_command(program, args, tx) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "orbit::process", "Interrupted, stopping {}", program);
                Ok(None)
            }
        }
    };

    let ((), code) = tokio::join!(run_status_loop(pipeline, rx, &mut sink), child);
    match code? {
        Some(code) if code != 0 => std::process::exit(code),
        _ => Ok(()),
    }
}

fn print_change(change: &StatusChange, json: bool) {
    if json {
        match serde_json::to_string(change) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(target: "orbit::pipeline", "Failed to encode status: {}", e),
        }
    } else if change.is_idle() {
        println!("(idle)");
    } else if change.active {
        println!("[{}] {}", change.source, change.text);
    } else {
        println!("[{}] {} (done)", change.source, change.text);
    }
}
