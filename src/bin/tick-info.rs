//! Print what a tick file holds.
//!
//! With `--points N` the activation periods are reduced to N points and
//! printed as `seconds,milliseconds` lines, ready for a plotting tool.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use ron::ser::PrettyConfig;
use tracing_subscriber::EnvFilter;

use ticktrace::codec::Decoder;
use ticktrace::downsample::minmax_lttb;
use ticktrace::io::{File, Mode};
use ticktrace::jitter;
use ticktrace::time::{format_iso_timestamp, NANOS_PER_SEC};

#[derive(Parser, Debug)]
#[command(version, about = "Show the header and statistics of a tick file")]
struct Cli {
    file: PathBuf,

    /// Print the activation periods downsampled to this many points
    #[arg(long)]
    points: Option<usize>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = File::open_with(&cli.file, Mode::READ_ONLY | Mode::EXISTING_ONLY)
        .wrap_err_with(|| format!("Could not open {}", cli.file.display()))?;
    let mut decoder = Decoder::new(file);

    let header = decoder.load_header()?.clone();
    let header_text = ron::ser::to_string_pretty(&header, PrettyConfig::new())
        .wrap_err("Could not format header")?;
    println!("{header_text}");
    if let Some(start) = format_iso_timestamp(header.start_time) {
        println!("session start: {start}");
    }

    let samples = decoder.load_samples()?.to_vec();
    let duration = (samples[samples.len() - 1] - samples[0]) as f64 / NANOS_PER_SEC as f64;
    println!("samples: {} spanning {duration:.3}s", samples.len());
    if let Some(period) = decoder.period() {
        println!("period: {:.3}ms", period as f64 / 1e6);
    }
    if let Some(priority) = decoder.priority() {
        println!("priority: {priority}");
    }

    let periods = jitter::activation_periods(&samples);
    let runs = jitter::run_durations(&samples);
    if let Some(max) = periods.max {
        println!("longest activation period: {max:.3}ms");
    }
    if let Some(max) = runs.max {
        println!("longest run: {max:.3}ms");
    }

    if let Some(points) = cli.points {
        if periods.is_empty() {
            return Ok(());
        }
        let reduced = minmax_lttb(&periods.points, points)?;
        for point in reduced {
            println!("{},{}", point.x, point.y);
        }
    }
    Ok(())
}
