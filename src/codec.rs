//! The tick file wire format.
//!
//! All integers are little endian.
//!
//! ```text
//! offset  size  field
//! 0       2     version (= 1)
//! 2       6     padding
//! 8       8     data section offset
//! 16      16    uuid (reserved, zero)
//! 32      8     session start time, ns since epoch
//! 40      2     process name length N
//! 42      N     process name
//! 42+N    2     task name length M
//! 44+N    M     task name
//! ...           zero padding up to the data section offset (multiple of 8)
//! offset  2     data version (= 1)
//! +2      6     padding
//! +8      ...   stream of 4 byte records
//! ```
//!
//! A record with the top bit clear is a sample: the number of nanoseconds
//! since the current reference. With the top bit set it is a command, the
//! low bits say which one, its payload follows directly.

use serde::Serialize;

use crate::time::Nanos;

pub mod decoder;
pub mod encoder;
mod window;

pub use decoder::{Decoder, HeaderError, ReadError};
pub use encoder::{EncodeError, Encoder, Session};

pub const PROTOCOL_VERSION: u16 = 1;
pub(crate) const PADDING: [u8; 6] = [0; 6];

pub(crate) const DATA_OFFSET_POS: usize = 8;
pub(crate) const START_TIME_POS: usize = 32;
pub(crate) const NAMES_POS: usize = 40;
/// Data section offsets and therefore data sections are aligned to this
pub(crate) const ALIGNMENT: usize = 8;
/// version plus padding, both for the file and the data section
pub(crate) const VERSION_BLOCK: usize = 8;

pub(crate) const RECORD_SIZE: usize = 4;
pub const ESCAPE: u32 = 1 << 31;
/// Largest sample delta, anything further from the reference needs a new
/// reference
pub const MAX_DELTA: Nanos = (ESCAPE - 1) as Nanos;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickHeader {
    pub version: u16,
    /// Session identifier, reserved. Always zero for now.
    pub uuid: [u8; 16],
    /// Session start, nanoseconds since the unix epoch
    pub start_time: Nanos,
    /// Process that emitted the ticks
    pub process: String,
    /// Task (series) within the process
    pub name: String,
    pub data_section_offset: u64,
    pub data_version: u16,
}

impl TickHeader {
    /// Turn a decoded sample (relative to the session start) into nanoseconds
    /// since the unix epoch.
    pub fn to_absolute(&self, sample: Nanos) -> Nanos {
        self.start_time + sample
    }
}

/// Out of band information interleaved with the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Task period in nanoseconds
    UpdatePeriod(u64),
    UpdatePriority(u32),
    /// New absolute reference in nanoseconds since the epoch
    UpdateReference(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    UpdatePeriod,
    UpdatePriority,
    UpdateReference,
}

impl CommandKind {
    const fn mask(self) -> u32 {
        match self {
            CommandKind::UpdatePeriod => 1 << 0,
            CommandKind::UpdatePriority => 1 << 1,
            CommandKind::UpdateReference => 1 << 2,
        }
    }

    pub(crate) const fn payload_len(self) -> usize {
        match self {
            CommandKind::UpdatePeriod | CommandKind::UpdateReference => 8,
            CommandKind::UpdatePriority => 4,
        }
    }

    /// `payload` must be exactly [`payload_len`](Self::payload_len) long.
    pub(crate) fn decode(self, payload: &[u8]) -> Option<Command> {
        Some(match self {
            CommandKind::UpdatePeriod => Command::UpdatePeriod(u64::from_le_bytes(
                payload.try_into().ok()?,
            )),
            CommandKind::UpdatePriority => Command::UpdatePriority(u32::from_le_bytes(
                payload.try_into().ok()?,
            )),
            CommandKind::UpdateReference => Command::UpdateReference(u64::from_le_bytes(
                payload.try_into().ok()?,
            )),
        })
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::UpdatePeriod(_) => CommandKind::UpdatePeriod,
            Command::UpdatePriority(_) => CommandKind::UpdatePriority,
            Command::UpdateReference(_) => CommandKind::UpdateReference,
        }
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        let tag = ESCAPE | self.kind().mask();
        buf.extend_from_slice(&tag.to_le_bytes());
        match *self {
            Command::UpdatePeriod(period) => buf.extend_from_slice(&period.to_le_bytes()),
            Command::UpdatePriority(prio) => buf.extend_from_slice(&prio.to_le_bytes()),
            Command::UpdateReference(reference) => {
                buf.extend_from_slice(&reference.to_le_bytes())
            }
        }
    }
}

/// What a 4 byte word in the sample stream turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Record {
    Sample(u32),
    /// Payload still has to be read
    Command(CommandKind),
    /// Escape bit set but no (or more then one) known command
    Unknown(u32),
}

impl Record {
    pub(crate) fn from_word(word: u32) -> Self {
        if word & ESCAPE == 0 {
            return Record::Sample(word);
        }

        [
            CommandKind::UpdatePeriod,
            CommandKind::UpdatePriority,
            CommandKind::UpdateReference,
        ]
        .into_iter()
        .find(|kind| word & !ESCAPE == kind.mask())
        .map_or(Record::Unknown(word), Record::Command)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Name is {len} bytes long, at most {} fit in a tick header", u16::MAX)]
pub struct NameTooLong {
    pub len: usize,
}

/// Everything up to and including the data section's version block.
pub(crate) fn encode_header(
    process: &str,
    task: &str,
    start_time: Nanos,
) -> Result<Vec<u8>, NameTooLong> {
    let mut header = Vec::with_capacity(64);
    header.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    header.extend_from_slice(&PADDING);
    // placeholder, filled in once the names are written
    header.extend_from_slice(&0u64.to_le_bytes());
    header.extend_from_slice(&[0u8; 16]);
    header.extend_from_slice(&start_time.to_le_bytes());
    push_name(&mut header, process)?;
    push_name(&mut header, task)?;

    let data_offset = header.len().next_multiple_of(ALIGNMENT);
    header.resize(data_offset, 0);
    header[DATA_OFFSET_POS..DATA_OFFSET_POS + 8]
        .copy_from_slice(&(data_offset as u64).to_le_bytes());

    header.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    header.extend_from_slice(&PADDING);
    Ok(header)
}

fn push_name(header: &mut Vec<u8>, name: &str) -> Result<(), NameTooLong> {
    let len = u16::try_from(name.len()).map_err(|_| NameTooLong { len: name.len() })?;
    header.extend_from_slice(&len.to_le_bytes());
    header.extend_from_slice(name.as_bytes());
    Ok(())
}

/// The part of a header that identifies where ticks come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    pub start_time: Nanos,
    pub process: String,
    pub task: String,
}

impl SourceId {
    /// Read the identity from the first bytes of a tick stream without
    /// consuming them. Returns `None` while the names are not completely in
    /// `buf` yet. Names that are not valid utf8 are converted lossily.
    pub fn peek(buf: &[u8]) -> Option<Self> {
        let start_time = buf.get(START_TIME_POS..NAMES_POS)?;
        let start_time = Nanos::from_le_bytes(start_time.try_into().ok()?);
        let (process, rest) = peek_name(buf.get(NAMES_POS..)?)?;
        let (task, _) = peek_name(rest)?;
        Some(Self {
            start_time,
            process: String::from_utf8_lossy(process).into_owned(),
            task: String::from_utf8_lossy(task).into_owned(),
        })
    }
}

fn peek_name(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let len = buf.get(..2)?;
    let len = usize::from(u16::from_le_bytes(len.try_into().ok()?));
    let name = buf.get(2..2 + len)?;
    Some((name, &buf[2 + len..]))
}
