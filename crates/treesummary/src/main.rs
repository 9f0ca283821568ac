use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use treesummary::bucket::{analyze_buckets, Bucket};
use treesummary::config::{load_config, Config};
use treesummary::error::{ConfigError, Result};
use treesummary::output::MarkdownSink;
use treesummary::pipeline::{
    BatchReport, ContinuationGate, Pipeline, ProgressEvent, ProgressReporter, StopFlag,
};

#[derive(Parser)]
#[command(name = "treesummary")]
#[command(about = "Summarise a source tree file by file with a generative model", long_about = None)]
#[command(version)]
struct Cli {
    /// Project directory to summarise
    #[arg(required_unless_present = "buckets")]
    directory: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Clear the saved state and restart processing
    #[arg(long)]
    clear_state: bool,

    /// Restart processing from the beginning
    #[arg(long)]
    restart: bool,

    /// Continue with the next batch without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Number of files summarised concurrently
    #[arg(long)]
    parallel: Option<usize>,

    /// Files per batch (0 for no limit)
    #[arg(long)]
    limit: Option<usize>,

    /// Generate a supersummary every N files (0 to disable)
    #[arg(long)]
    supersummary_interval: Option<usize>,

    /// Directory for summaries and the checkpoint
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Summarise the buckets listed in this JSON file instead of a directory
    #[arg(long, value_name = "FILE", conflicts_with = "directory")]
    buckets: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if let Some(limit) = self.limit {
            config.limit = Some(limit);
        }
        if let Some(interval) = self.supersummary_interval {
            config.supersummary_interval = Some(interval);
        }
        if let Some(dir) = &self.output_dir {
            config.output_directory = dir.to_string_lossy().into_owned();
        }
        if self.yes {
            config.always_continue = true;
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    if let Err(e) = LogTracer::init() {
        eprintln!("Failed to forward log records to tracing: {}", e);
    }

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        )
    };
    if let Err(e) = installed {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
}

/// Progress bar for the batch in flight.
struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }

    fn replace_bar(&self, bar: Option<ProgressBar>) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = bar;
        }
    }
}

impl ProgressReporter for CliProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                discovered,
                pending,
                ..
            } => {
                info!("{} files found, {} to summarise", discovered, pending);
            }
            ProgressEvent::BatchStarted {
                batch,
                files,
                estimated_tokens,
            } => {
                let bar = ProgressBar::new(files as u64);
                bar.set_style(
                    ProgressStyle::with_template(
                        "  {spinner:.cyan} Batch {prefix} [{bar:30.cyan/dim}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("━╸─"),
                );
                bar.set_prefix(batch.to_string());
                if estimated_tokens > 0 {
                    bar.set_message(format!("(~{} tokens)", estimated_tokens));
                }
                bar.enable_steady_tick(Duration::from_millis(80));
                self.replace_bar(Some(bar));
            }
            ProgressEvent::FileCompleted { path, failed, .. } => {
                let name = Path::new(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(path);
                self.with_bar(|bar| {
                    bar.inc(1);
                    if failed {
                        bar.set_message(format!("failed: {}", name));
                    } else {
                        bar.set_message(name);
                    }
                });
            }
            ProgressEvent::SupersummaryGenerated { index } => {
                self.with_bar(|bar| bar.set_message(format!("supersummary {}", index)));
            }
            ProgressEvent::BatchCompleted {
                batch,
                summarised,
                failed,
                remaining,
            } => {
                self.replace_bar(None);
                eprintln!(
                    "  \x1b[32m✓\x1b[0m Batch {}: {} files summarised ({} failed), {} remaining",
                    batch, summarised, failed, remaining
                );
            }
            ProgressEvent::FinalSummaryGenerated => info!("Final summary generated"),
            ProgressEvent::ModernisationSummaryGenerated => {
                info!("Modernisation summary generated")
            }
            ProgressEvent::RunCompleted { .. } => self.replace_bar(None),
        }
    }
}

/// Asks the operator between batches. An interrupt or a missing terminal
/// ends the run at the batch boundary.
struct OperatorGate {
    stop: StopFlag,
    always_continue: bool,
    interactive: bool,
}

impl ContinuationGate for OperatorGate {
    fn should_continue(&self, report: &BatchReport) -> bool {
        if self.stop.is_stop_requested() {
            return false;
        }
        if self.always_continue {
            return true;
        }
        if !self.interactive {
            warn!("No terminal to confirm the next batch; pass --yes to continue unattended");
            return false;
        }

        let prompt = format!(
            "{} files remaining. Continue with the next batch?",
            report.remaining
        );
        off_runtime(|| {
            Confirm::new()
                .with_prompt(prompt)
                .default(true)
                .interact()
                .unwrap_or(false)
        })
    }
}

/// Runs a blocking call from inside the runtime without stalling the other
/// tasks scheduled on this worker. Needs the multi-threaded runtime.
fn off_runtime<T>(f: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(f)
}

fn load_buckets(path: &Path) -> std::result::Result<Vec<Bucket>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let pipeline = Pipeline::from_config(&config)?;
    if cli.restart || cli.clear_state {
        pipeline.clear_state()?;
    }

    let mut sink = MarkdownSink::new(&config.output_directory)?;
    let progress = CliProgress::new();

    if let Some(bucket_file) = &cli.buckets {
        let buckets = load_buckets(bucket_file)?;
        let analysis = analyze_buckets(pipeline.context(), &buckets, &progress, &mut sink).await?;
        info!(
            "Summarised {} buckets, summaries saved to {}",
            analysis.buckets.len(),
            sink.summary_path().display()
        );
        return Ok(());
    }

    let stop = StopFlag::new();
    let handler_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.request_stop();
        eprintln!("Interrupt received, stopping after the current batch");
    }) {
        warn!("Failed to install interrupt handler: {}", e);
    }

    let gate = OperatorGate {
        stop,
        always_continue: config.always_continue,
        interactive: std::io::stdin().is_terminal(),
    };

    let Some(directory) = cli.directory.as_deref() else {
        return Err(ConfigError::MissingSetting("directory").into());
    };

    let report = pipeline.run(directory, &gate, &progress, &mut sink).await?;

    if report.halted {
        info!(
            "Stopped early; {} files checkpointed. Run again to resume",
            report.processed_total
        );
    }
    info!("Summaries saved to {}", sink.summary_path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = load_config(&cli.config);
    let verbose = cli.verbose || loaded.as_ref().is_ok_and(|c| c.verbose);
    init_tracing(verbose, cli.log_json);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut config);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_blocking_prompt_leaves_runtime_running() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        tokio::spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        let observed = off_runtime(|| {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !done.load(Ordering::SeqCst) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            done.load(Ordering::SeqCst)
        });

        assert!(observed);
    }

    #[test]
    fn test_gate_stops_when_interrupted() {
        let stop = StopFlag::new();
        stop.request_stop();
        let gate = OperatorGate {
            stop,
            always_continue: true,
            interactive: false,
        };
        let report = BatchReport {
            batch: 1,
            summarised: 2,
            failed: 0,
            processed_total: 2,
            remaining: 3,
        };
        assert!(!gate.should_continue(&report));
    }
}
