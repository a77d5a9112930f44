use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use batchget::app::App;
use batchget::config::{ConfigLoader, ConfigOverrides};
use batchget::error::BatchError;
use batchget::output::{ConsoleOutput, JsonOutput, OutputMode};
use batchget::transport::HttpTransport;

#[derive(Parser)]
#[command(name = "batchget")]
#[command(about = "Download every URL in a list, skipping files already on disk")]
#[command(version, author)]
struct Cli {
    /// Text file with one URL per line
    urls_file: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    /// Directory that receives downloads and ledger files
    #[arg(long)]
    output_root: Option<Utf8PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Maximum downloads in flight (default: all at once)
    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    progress: bool,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<BatchError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BatchError) -> u8 {
    match error {
        BatchError::InputRead(_) | BatchError::ConfigRead(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(
        cli.config.as_deref(),
        ConfigOverrides {
            output_root: cli.output_root,
            timeout_secs: cli.timeout,
            concurrency: cli.concurrency,
            progress: cli.progress,
        },
    )?;
    let transport = HttpTransport::new(&config.user_agent, config.timeout)?;
    let app = App::new(transport, &config);

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.run_file(&cli.urls_file, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let summary = app.run_file(&cli.urls_file, &ConsoleOutput)?;
            ConsoleOutput::print_summary(&summary).into_diagnostic()?;
        }
    }
    Ok(())
}
