use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, Once};

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro128StarStar;
use ticktrace::codec::{Encoder, Session};
use ticktrace::io::{CloseError, Device, Mode, OpenError};
use ticktrace::{Nanos, Point};

pub fn setup_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{fmt, EnvFilter};

        let _ = color_eyre::install();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let fmt = fmt::layer().with_test_writer().with_line_number(true);

        let _ignore_err = tracing_subscriber::registry()
            .with(filter)
            .with(fmt)
            .with(tracing_error::ErrorLayer::default())
            .try_init();
    });
}

pub const MS: Nanos = 1_000_000;

pub fn session(process: &str, task: &str, start_time: Nanos) -> Session {
    Session {
        process: process.to_owned(),
        task: task.to_owned(),
        start_time,
        period: MS as u64,
        priority: 42,
    }
}

/// A complete tick stream as the encoder would write it.
pub fn encode(session: Session, timestamps: &[Nanos]) -> Vec<u8> {
    let mut encoder = Encoder::open(session, Vec::new()).unwrap();
    for ts in timestamps {
        encoder.log(*ts).unwrap();
    }
    encoder.flush().unwrap();
    encoder.get_ref().clone()
}

#[derive(Debug)]
pub enum Step {
    Data(Vec<u8>),
    WouldBlock,
    Fail(io::ErrorKind),
}

/// In memory connection that answers reads from a script. Once the script
/// runs out reads return 0, like a peer that hung up. Writes are kept.
#[derive(Debug)]
pub struct ScriptedDevice {
    script: VecDeque<Step>,
    mode: Mode,
    pub written: Arc<Mutex<Vec<u8>>>,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDevice {
    /// Already open, non blocking.
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            mode: Mode::READ_WRITE | Mode::NON_BLOCKING,
            written: Arc::default(),
        }
    }

    pub fn data(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.script.push_back(Step::Data(bytes.into()));
        self
    }

    /// `bytes` handed out in reads of at most `chunk` bytes.
    pub fn chunked(mut self, bytes: &[u8], chunk: usize) -> Self {
        for part in bytes.chunks(chunk) {
            self.script.push_back(Step::Data(part.to_vec()));
        }
        self
    }

    pub fn would_block(mut self) -> Self {
        self.script.push_back(Step::WouldBlock);
        self
    }

    /// `n` reads that find nothing
    pub fn idle(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.script.push_back(Step::WouldBlock);
        }
        self
    }

    pub fn fail(mut self, kind: io::ErrorKind) -> Self {
        self.script.push_back(Step::Fail(kind));
        self
    }

    pub fn boxed(self) -> Box<dyn Device> {
        Box::new(self)
    }
}

impl Device for ScriptedDevice {
    fn supported_modes(&self) -> Mode {
        Mode::READ_WRITE | Mode::NON_BLOCKING
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn open(&mut self, mode: Mode) -> Result<(), OpenError> {
        if !self.mode.is_empty() {
            return Err(OpenError::AlreadyOpen);
        }
        self.mode = mode;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CloseError> {
        if self.mode.is_empty() {
            return Err(CloseError::NotOpen);
        }
        self.mode = Mode::empty();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.pop_front() {
            None => Ok(0),
            Some(Step::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
            Some(Step::Fail(kind)) => Err(kind.into()),
            Some(Step::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.script.push_front(Step::Data(rest));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
}

/// Reads never return more then `max` bytes.
#[derive(Debug)]
pub struct ShortReads {
    inner: Cursor<Vec<u8>>,
    max: usize,
}

impl ShortReads {
    pub fn new(bytes: Vec<u8>, max: usize) -> Self {
        Self {
            inner: Cursor::new(bytes),
            max,
        }
    }
}

impl Read for ShortReads {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.max);
        self.inner.read(&mut buf[..n])
    }
}

impl Seek for ShortReads {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Writer whose bytes stay reachable after the writer itself is dropped.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Activation and completion timestamps of a periodic task whose wake up
/// and run time jitter.
pub fn task_timestamps(seed: u64, start: Nanos, runs: usize, period: Nanos) -> Vec<Nanos> {
    let mut rng = Xoshiro128StarStar::seed_from_u64(seed);
    let wake_up = Normal::new(0.0, period as f64 * 0.02).unwrap();
    let run_time = Normal::new(period as f64 * 0.2, period as f64 * 0.05).unwrap();

    let mut timestamps = Vec::with_capacity(2 * runs);
    let mut last = start;
    for run in 0..runs {
        let planned = start + run as Nanos * period;
        let activation = (planned + wake_up.sample(&mut rng) as Nanos).max(last);
        let completion = activation + (run_time.sample(&mut rng) as Nanos).max(0);
        timestamps.push(activation);
        timestamps.push(completion);
        last = completion;
    }
    timestamps
}

/// Slowly rising noisy signal, one point every `dx` seconds.
pub fn noisy_series(seed: u64, len: usize, dx: f64) -> Vec<Point> {
    let mut rng = Xoshiro128StarStar::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    (0..len)
        .map(|i| {
            let spike = if rng.random_ratio(1, 100) { 20.0 } else { 0.0 };
            let y = i as f64 * 0.01 + noise.sample(&mut rng) + spike;
            Point::new(i as f64 * dx, y)
        })
        .collect()
}
