//! Writes a synthetic tick file with a task whose period changes twice.
//!
//! ```bash
//! cargo run --example generate -- 100000 test.tick
//! ```

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;

use ticktrace::codec::{Encoder, Session};
use ticktrace::io::{File, Mode};
use ticktrace::Nanos;

const START: Nanos = 8_000_000 * 1_000_000_000;
const MS: Nanos = 1_000_000;
const US: Nanos = 1_000;

#[derive(Parser, Debug)]
struct Args {
    /// Number of task runs, each run logs twice
    samples: u64,
    #[arg(default_value = "test.tick")]
    output: PathBuf,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    println!("Generate {} samples", args.samples);

    let file = File::open_with(&args.output, Mode::WRITE_ONLY | Mode::TRUNCATE)
        .wrap_err_with(|| format!("Could not create {}", args.output.display()))?;
    let session = Session {
        process: "generator".to_owned(),
        task: "one_task".to_owned(),
        start_time: START,
        period: MS as u64,
        priority: 42,
    };
    let mut encoder = Encoder::open(session, file)?;
    let mut rng = Xoshiro128StarStar::seed_from_u64(args.seed);

    let mut period = 1;
    let mut i = 1;
    while i < args.samples {
        // slower in the middle third, somewhat faster in the last
        if i > args.samples / 3 {
            period = 7;
        }
        if i > args.samples * 2 / 3 {
            period = 3;
        }

        let wake_up_jitter = rng.random_range(-100..100) * US;
        let now = START + 20 * MS + i as Nanos * MS + wake_up_jitter;
        let run_time = (rng.random_range(0..500) + period as Nanos * 50) * US;
        encoder.log(now)?;
        encoder.log(now + run_time)?;
        i += period;
    }
    encoder.flush()?;
    Ok(())
}
