use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::info;
use wrp_output::{
    AccessMode, DeviceNumber, HandleTable, Operation, OutputChannel, OutputConfig, OutputError,
    OutputKind, Representation, load_config, save_config,
};

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    let mut stdout = io::stdout().lock();
    match parse_and_dispatch(args, &mut stdout) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}", error.diagnostic_line());
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I, out: &mut dyn Write) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("wrp-cli".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args, out)
}

fn parse_and_dispatch(args: Vec<String>, out: &mut dyn Write) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch(cli.command, out),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                write!(out, "{err}")?;
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "wrp-cli", about = "Step result file naming and lifecycle")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Print the file layout of every output channel for one step
    Names {
        /// Analysis step number
        #[arg(long)]
        step: u32,
        /// Use the stress-output prefixes
        #[arg(long)]
        stress: bool,
    },
    /// Open and close the result files of one step
    Dump(DumpArgs),
    /// Write the default output configuration
    InitConfig {
        /// Destination JSON file
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct DumpArgs {
    /// Analysis step number
    #[arg(long)]
    step: u32,

    /// Output configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving the result files
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Output channel; repeat for several
    #[arg(long = "channel", value_name = "CHANNEL")]
    channels: Vec<OutputChannel>,

    /// Use the stress-output prefixes
    #[arg(long)]
    stress: bool,

    /// Compress flat text output after close
    #[arg(long)]
    compress: bool,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct FileReport {
    channel: OutputChannel,
    name: String,
    path: PathBuf,
    device: DeviceNumber,
    access: AccessMode,
    representation: Representation,
}

fn dispatch(command: CliCommand, out: &mut dyn Write) -> Result<i32, CliError> {
    match command {
        CliCommand::Names { step, stress } => run_names(step, stress, out),
        CliCommand::Dump(args) => run_dump(args, out),
        CliCommand::InitConfig { path } => {
            save_config(&path, &OutputConfig::default()).map_err(|source| CliError::Step {
                operation: "init-config",
                source,
            })?;
            writeln!(out, "wrote {}", path.display())?;
            Ok(0)
        }
    }
}

fn run_names(step: u32, stress: bool, out: &mut dyn Write) -> Result<i32, CliError> {
    let kind = OutputKind::from_stress_flag(stress);
    for channel in OutputChannel::ALL {
        let layout = channel.layout(kind, step).map_err(|err| CliError::Step {
            operation: "names",
            source: err.into(),
        })?;
        writeln!(
            out,
            "{:<17} {:<18} {:<11} {}",
            channel.as_str(),
            layout.name.as_str(),
            layout.access.as_str(),
            layout.representation.as_str()
        )?;
    }
    Ok(0)
}

fn run_dump(args: DumpArgs, out: &mut dyn Write) -> Result<i32, CliError> {
    let step_error =
        |operation: &'static str| move |source: OutputError| CliError::Step { operation, source };

    let mut config = match &args.config {
        Some(path) => load_config(path).map_err(step_error("load-config"))?,
        None => OutputConfig::default(),
    };
    if let Some(dir) = args.dir {
        config.directory = dir;
    }
    if !args.channels.is_empty() {
        config.channels = args.channels.into_iter().collect();
    }
    config.stress_output |= args.stress;
    config.compress_flat_text |= args.compress;

    fs::create_dir_all(&config.directory)?;
    let mut controller = config.controller().map_err(step_error("configure"))?;
    let request = config.request(args.step);

    let handles = controller
        .execute(Operation::Open, &request, HandleTable::new())
        .map_err(step_error("open"))?;
    let reports: Vec<FileReport> = handles
        .iter()
        .map(|file| FileReport {
            channel: file.channel(),
            name: file.name().to_string(),
            path: file.path().to_path_buf(),
            device: file.device(),
            access: file.access(),
            representation: file.representation(),
        })
        .collect();
    controller
        .execute(Operation::Close, &request, handles)
        .map_err(step_error("close"))?;
    info!(step = args.step, files = reports.len(), "step output written");

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &reports)?;
        writeln!(out)?;
    } else {
        for report in &reports {
            writeln!(
                out,
                "{:<17} unit {:<4} {}",
                report.channel.as_str(),
                report.device,
                report.path.display()
            )?;
        }
    }
    Ok(0)
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{operation}: {source}")]
    Step {
        operation: &'static str,
        #[source]
        source: OutputError,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CliError::Step { source, .. } if source.is_fatal())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            _ if self.is_fatal() => 3,
            _ => 1,
        }
    }

    pub fn diagnostic_line(&self) -> String {
        match self {
            CliError::Usage(message) => message.trim_end().to_string(),
            _ if self.is_fatal() => format!("fatal: {self}"),
            _ => format!("error: {self}"),
        }
    }
}
