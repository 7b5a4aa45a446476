mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use dataflow_pqt::{ContainerError, FsError, TemplateError};

#[derive(Parser)]
#[command(name = "dataflow-pqt")]
#[command(about = "Decode Fabric Dataflow exports and package them as Power Query Templates")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, action = ArgAction::Count, global = true, help = "More log output on stderr (-v info, -vv debug)")]
    pub verbose: u8,
    #[arg(long, global = true, value_name = "PATH", help = "Load settings from a JSON config file")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Decode every export .json in a directory into item_NNN directories")]
    Decode {
        #[arg(help = "Directory holding the export files")]
        dir: PathBuf,
        #[arg(long, help = "Leave the source export files in place")]
        keep_originals: bool,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "Build a .pqt for every decoded dataflow item")]
    Convert {
        #[arg(help = "Directory holding decoded item_NNN directories")]
        dir: PathBuf,
        #[arg(long, short, value_name = "DIR", help = "Output directory (defaults to the source)")]
        output: Option<PathBuf>,
        #[arg(long, value_name = "NAME", help = "Name of the directory that receives packaged items")]
        dataflows_dir: Option<String>,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "Decode then convert in one pass")]
    All {
        #[arg(help = "Directory holding the export files")]
        dir: PathBuf,
        #[arg(long, short, value_name = "DIR", help = "Output directory (defaults to the source)")]
        output: Option<PathBuf>,
        #[arg(long, help = "Leave the source export files in place")]
        keep_originals: bool,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "Show identity and parts of one export file")]
    Info {
        #[arg(help = "Path to the export .json")]
        path: PathBuf,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
    #[command(about = "Check the structure of a .pqt archive")]
    Validate {
        #[arg(help = "Path to the .pqt")]
        path: PathBuf,
        #[arg(long, short, value_enum, default_value = "text", help = "Output format")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Commands::Decode {
            dir,
            keep_originals,
            format,
        } => {
            let config = commands::with_overrides(config, keep_originals, None);
            commands::decode::run(&dir, &config, format)
        }
        Commands::Convert {
            dir,
            output,
            dataflows_dir,
            format,
        } => {
            let config = commands::with_overrides(config, false, dataflows_dir);
            commands::convert::run(&dir, output.as_deref(), &config, format)
        }
        Commands::All {
            dir,
            output,
            keep_originals,
            format,
        } => {
            let config = commands::with_overrides(config, keep_originals, None);
            commands::convert::run_all(&dir, output.as_deref(), &config, format)
        }
        Commands::Info { path, format } => commands::info::run(&path, &config, format),
        Commands::Validate { path, format } => commands::validate::run(&path, &config, format),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code_for_error(&e)
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `-v` raises the default `warn` level.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for_error(err: &anyhow::Error) -> ExitCode {
    if is_internal_error(err) {
        ExitCode::from(3)
    } else {
        ExitCode::from(2)
    }
}

fn is_internal_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(template_err) = cause.downcast_ref::<TemplateError>() {
            return !matches!(template_err, TemplateError::MissingMashup);
        }
        if let Some(fs_err) = cause.downcast_ref::<FsError>() {
            return matches!(fs_err, FsError::Io { .. });
        }
        cause.is::<ContainerError>()
    })
}
