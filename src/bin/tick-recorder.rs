//! Records the tick streams of every probe that connects.
//!
//! ```bash
//! tick-recorder /var/lib/ticks --listen /tmp/rtm_recorder
//! ```
//!
//! Stops on SIGINT or SIGTERM, clients still connected are flushed first.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::EnvFilter;

use ticktrace::io::LocalListener;
use ticktrace::recorder::{self, Recorder, RecorderConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Records tick streams from probes into tick files")]
struct Cli {
    /// Directory tick files are written to [default: current directory]
    output_dir: Option<PathBuf>,

    /// Unix socket probes connect to [default: /tmp/rtm_recorder]
    #[arg(long)]
    listen: Option<PathBuf>,

    /// RON file with recorder settings, flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => RecorderConfig::load(path)?,
        None => RecorderConfig::default(),
    };
    if let Some(dir) = cli.output_dir {
        config.recording_root = dir;
    }
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .wrap_err("Could not install signal handler")?;
    }

    let mut recorder = Recorder::from_config(&config)?;
    let listener = LocalListener::bind(&config.listen)
        .wrap_err_with(|| format!("Could not listen on {}", config.listen.display()))?;
    recorder::serve(&listener, &mut recorder, &shutdown, config.poll_interval())?;
    Ok(())
}
