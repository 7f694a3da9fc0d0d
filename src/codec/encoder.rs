use std::io::{self, Write};

use arraydeque::ArrayDeque;
use tracing::{instrument, warn};

use super::{encode_header, Command, NameTooLong, MAX_DELTA};
use crate::time::Nanos;

/// Samples are written out once more then this many are buffered
pub const MAX_PENDING: usize = 10;

/// Describes the task a probe reports on, written once at the start of a
/// tick stream.
#[derive(Debug, Clone)]
pub struct Session {
    pub process: String,
    pub task: String,
    /// Nanoseconds since the epoch, usually
    /// [`process_start_time`](crate::time::process_start_time)
    pub start_time: Nanos,
    /// Nanoseconds
    pub period: u64,
    pub priority: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Could not build header: {0}")]
    Header(#[from] NameTooLong),
    #[error("Could not write header: {0}")]
    WriteHeader(io::Error),
    #[error("Could not write command {command:?}: {source}")]
    WriteCommand {
        command: Command,
        #[source]
        source: io::Error,
    },
    #[error("Could not write {count} buffered samples: {source}")]
    WriteSamples {
        count: usize,
        #[source]
        source: io::Error,
    },
}

/// Writes the tick stream of one task.
///
/// Timestamps passed to [`log`](Encoder::log) are stored as 32 bit offsets to
/// a reference. Whenever a timestamp lies outside the window such an offset
/// can express a reference update is written instead. Samples are buffered
/// in small batches, commands are written as soon as they happen. Dropping
/// the encoder writes out any buffered samples.
#[derive(Debug)]
pub struct Encoder<W: Write> {
    sink: W,
    reference: Nanos,
    pending: ArrayDeque<u32, { MAX_PENDING + 1 }>,
    scratch: Vec<u8>,
}

impl<W: Write> Encoder<W> {
    /// Writes the header followed by the initial period and priority.
    #[instrument(skip_all, fields(process = %session.process, task = %session.task))]
    pub fn open(session: Session, sink: W) -> Result<Self, EncodeError> {
        let header = encode_header(&session.process, &session.task, session.start_time)?;

        let mut encoder = Self {
            sink,
            reference: 0,
            pending: ArrayDeque::new(),
            scratch: Vec::with_capacity((MAX_PENDING + 1) * 4),
        };
        encoder
            .sink
            .write_all(&header)
            .map_err(EncodeError::WriteHeader)?;
        encoder.update_period(session.period)?;
        encoder.update_priority(session.priority)?;
        Ok(encoder)
    }

    /// Record an event at `timestamp` (nanoseconds since the epoch).
    pub fn log(&mut self, timestamp: Nanos) -> Result<(), EncodeError> {
        let delta = timestamp - self.reference;
        if !(0..=MAX_DELTA).contains(&delta) {
            // the reference update itself marks this instant
            return self.update_reference(timestamp);
        }

        self.pending
            .push_back(delta as u32)
            .expect("flushed as soon as more then MAX_PENDING are pending");
        if self.pending.len() > MAX_PENDING {
            self.flush()?;
        }
        Ok(())
    }

    /// `period` in nanoseconds
    pub fn update_period(&mut self, period: u64) -> Result<(), EncodeError> {
        self.flush()?;
        self.emit(Command::UpdatePeriod(period))
    }

    pub fn update_priority(&mut self, priority: u32) -> Result<(), EncodeError> {
        self.flush()?;
        self.emit(Command::UpdatePriority(priority))
    }

    fn update_reference(&mut self, reference: Nanos) -> Result<(), EncodeError> {
        // samples relative to the old reference must precede the update
        self.flush()?;
        self.reference = reference;
        self.emit(Command::UpdateReference(reference as u64))
    }

    fn emit(&mut self, command: Command) -> Result<(), EncodeError> {
        self.scratch.clear();
        command.encode_into(&mut self.scratch);
        self.sink
            .write_all(&self.scratch)
            .map_err(|source| EncodeError::WriteCommand { command, source })
    }

    /// Write out buffered samples in a single write.
    pub fn flush(&mut self) -> Result<(), EncodeError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        self.scratch.clear();
        self.scratch
            .extend(self.pending.iter().flat_map(|delta| delta.to_le_bytes()));
        let count = self.pending.len();
        self.pending.clear();
        self.sink
            .write_all(&self.scratch)
            .map_err(|source| EncodeError::WriteSamples { count, source })
    }

    pub fn reference(&self) -> Nanos {
        self.reference
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }
}

impl<W: Write> Drop for Encoder<W> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("samples lost while closing tick stream: {e}");
        }
    }
}
