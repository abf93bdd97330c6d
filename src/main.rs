use clap::Parser;
use keystroke_log::{
    CaptureMode, ConsoleStatus, LoggingPipeline, NullStatus, PipelineConfig, StatusSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Log every key press to one or more files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log file to write to (repeatable). Defaults to ~/keylogs/keylog.txt
    #[arg(short, long = "output", value_name = "PATH")]
    outputs: Vec<PathBuf>,

    /// Overwrite log files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Pause after each key press, in milliseconds
    #[arg(long, default_value_t = 50)]
    throttle_ms: u64,

    /// Run the keyboard listener on a background task
    #[arg(long)]
    nonblocking: bool,

    /// Keep running even if no log file is usable
    #[arg(long)]
    allow_no_sinks: bool,

    /// Suppress status output
    #[arg(short, long)]
    quiet: bool,

    /// Disable colored status output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.nonblocking {
        CaptureMode::NonBlocking
    } else {
        CaptureMode::Blocking
    };

    let config = PipelineConfig::from_paths(cli.outputs)
        .with_overwrite(cli.overwrite)
        .with_throttle(Duration::from_millis(cli.throttle_ms))
        .with_mode(mode)
        .require_sink(!cli.allow_no_sinks);

    let status: Arc<dyn StatusSink> = if cli.quiet {
        Arc::new(NullStatus)
    } else if cli.no_color {
        Arc::new(ConsoleStatus::no_color())
    } else {
        Arc::new(ConsoleStatus::new())
    };

    let paths = config
        .sinks
        .iter()
        .map(|s| s.path.display().to_string())
        .collect::<Vec<_>>();
    status.ok(0, &format!("Log files: {}", paths.join(", ")));

    let report = LoggingPipeline::configure(config)
        .with_status(Arc::clone(&status))
        .start()
        .await?
        .wait()
        .await?;

    for sink in &report.sinks {
        status.info(
            1,
            &format!("{}: {} lines", sink.path.display(), sink.lines_written),
        );
    }

    Ok(())
}
