use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use memrollup::{
    monitor,
    output::{Format, Report},
    process::Monitored,
    stats::Samples,
};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

const HIGH_FREQUENCY: f64 = 100.0;
const WRITE_TEST: &str = ".write_test";

/// Runs a command and reports statistics of its memory usage sampled from /proc/<pid>/smaps_rollup.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Opt {
    #[clap(short = 'F', long, default_value_t = 1.0, help = "sampling frequency in Hz")]
    frequency: f64,

    #[clap(short, long, help = "output file for statistics. stdout if not set")]
    output: Option<PathBuf>,

    #[clap(short, long, help = "output statistics in json instead of csv")]
    json: bool,

    #[clap(short, long, help = "log process lifecycle and every collected sample")]
    verbose: bool,

    #[clap(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        help = "command to monitor. words are joined with spaces and executed by bash -c"
    )]
    command: Vec<String>,
}

impl Opt {
    fn format(&self) -> Format {
        if self.json {
            Format::Json
        } else {
            Format::Csv
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    let level = if opt.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::builder().with_default_directive(level.into()).from_env_lossy())
        .init();

    ensure!(
        opt.frequency.is_finite() && opt.frequency > 0.0,
        "frequency must be a positive number"
    );
    if opt.frequency > HIGH_FREQUENCY {
        warn!("high frequency ({:.1} Hz) may impact system performance", opt.frequency);
    }
    let interval = Duration::try_from_secs_f64(1.0 / opt.frequency).context("frequency is too low")?;
    ensure!(Instant::now().checked_add(interval).is_some(), "frequency is too low");

    validate_environment(opt.output.as_deref())?;

    let interrupted = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let interrupted = interrupted.clone();
        move || {
            interrupted.store(true, Ordering::Relaxed);
        }
    })?;

    let mut monitored = Monitored::spawn(&opt.command).context("failed to start process")?;
    info!("sampling memory at {:.1} Hz", opt.frequency);
    let samples = match monitor::watch(&mut monitored, interval, &interrupted) {
        Ok(samples) => samples,
        Err(err) => {
            error!("memory monitoring: {}", err);
            Samples::default()
        }
    };
    let report = Report::new(
        monitored.command(),
        monitored.pid(),
        opt.frequency,
        monitored.started(),
        &samples,
    );
    match monitored.stop() {
        Ok(status) => info!("process exited: {}", status),
        Err(err) => warn!("stop process: {}", err),
    }

    if let Err(err) = write_results(&report, opt.format(), opt.output.as_deref()) {
        error!("failed to output results: {:#}", err);
    }
    Ok(())
}

fn validate_environment(output: Option<&Path>) -> Result<()> {
    if !cfg!(target_os = "linux") {
        bail!("this program requires linux");
    }
    if !Path::new("/proc/self/smaps_rollup").exists() {
        bail!("smaps_rollup not available in /proc. linux kernel 4.14 or later is required");
    }
    if let Some(output) = output {
        let dir = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        ensure!(dir.is_dir(), "output directory does not exist: {}", dir.display());
        let test_file = dir.join(WRITE_TEST);
        fs::File::create(&test_file).with_context(|| format!("cannot write to directory: {}", dir.display()))?;
        fs::remove_file(&test_file)?;
    }
    Ok(())
}

fn write_results(report: &Report, format: Format, output: Option<&Path>) -> Result<()> {
    if report.metadata.samples == 0 {
        println!("No data collected");
        return Ok(());
    }
    let mut data = report.render(format).context("failed to format output")?;
    if !data.ends_with('\n') {
        data.push('\n');
    }
    match output {
        Some(path) => fs::write(path, data).with_context(|| format!("failed to create output file {}", path.display())),
        None => io::stdout().write_all(data.as_bytes()).context("write to stdout"),
    }
}
