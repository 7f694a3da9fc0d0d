use std::io::{self, Read, Seek, SeekFrom};
use std::string::FromUtf8Error;

use tracing::{debug, instrument, warn};

use super::window::{Window, WINDOW_SIZE};
use super::{
    Command, CommandKind, Record, TickHeader, ALIGNMENT, DATA_OFFSET_POS, NAMES_POS,
    PROTOCOL_VERSION, RECORD_SIZE, VERSION_BLOCK,
};
use crate::time::Nanos;

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("Could not read header: {0}")]
    Io(#[from] io::Error),
    #[error(
        "The library version ({needed}) is incompatible with the version \
        of the file ({file})."
    )]
    VersionMismatch { needed: u16, file: u16 },
    #[error("Name in header should be valid utf8 however: {0}")]
    NotText(FromUtf8Error),
    #[error(
        "Data section offset ({offset}) must be a multiple of 8 and lie \
        past the end of the header ({header_end})"
    )]
    BadDataOffset { offset: u64, header_end: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not load header: {0}")]
    Header(#[from] HeaderError),
    #[error("Could not read data section: {0}")]
    Io(#[from] io::Error),
    #[error(
        "The data section version ({needed}) is incompatible with the version \
        of the file ({file})."
    )]
    VersionMismatch { needed: u16, file: u16 },
    #[error("Stream ended inside the payload of a {kind:?} command")]
    TruncatedCommand { kind: CommandKind },
    #[error("The file contains no samples")]
    NoSamples,
    #[error(
        "Timestamp {reference}ns (+{delta}ns) can not be expressed relative \
        to the session start ({start_time}ns)"
    )]
    TimeOutOfRange {
        reference: u64,
        delta: u32,
        start_time: Nanos,
    },
}

/// Reads back a tick file.
///
/// Samples are nanoseconds since the session start found in the header, use
/// [`TickHeader::to_absolute`] to get time since the epoch.
#[derive(Debug)]
pub struct Decoder<R> {
    source: R,
    header: Option<TickHeader>,
    samples: Vec<Nanos>,
    period: Option<u64>,
    priority: Option<u32>,
}

impl<R: Read + Seek> Decoder<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            header: None,
            samples: Vec::new(),
            period: None,
            priority: None,
        }
    }

    pub fn load_header(&mut self) -> Result<&TickHeader, HeaderError> {
        let header = read_header(&mut self.source)?;
        Ok(self.header.insert(header))
    }

    /// Decode the entire data section, loads the header first if that did
    /// not happen yet.
    ///
    /// # Errors
    /// Returns [`ReadError::NoSamples`] if the data section holds no samples.
    /// A command cut short by the end of the file is an error, a partial
    /// sample at the very end is ignored.
    #[instrument(level = "debug", skip(self))]
    pub fn load_samples(&mut self) -> Result<&[Nanos], ReadError> {
        let header = match self.header.take() {
            Some(header) => header,
            None => read_header(&mut self.source)?,
        };
        let header = self.header.insert(header);

        self.source
            .seek(SeekFrom::Start(header.data_section_offset))?;
        let mut data_version = [0u8; 2];
        self.source.read_exact(&mut data_version)?;
        header.data_version = u16::from_le_bytes(data_version);
        if header.data_version != PROTOCOL_VERSION {
            return Err(ReadError::VersionMismatch {
                needed: PROTOCOL_VERSION,
                file: header.data_version,
            });
        }
        self.source.seek(SeekFrom::Start(
            header.data_section_offset + VERSION_BLOCK as u64,
        ))?;

        let start_time = header.start_time;
        self.samples.clear();
        let mut window = Window::new(WINDOW_SIZE);
        // the reference starts out at zero, as in the encoder
        let mut reference = 0;

        while window.ensure(RECORD_SIZE, &mut self.source)? {
            let word = window
                .take_u32()
                .expect("ensure guarantees a full record is available");
            let kind = match Record::from_word(word) {
                Record::Sample(delta) => {
                    self.samples.push(relative(reference, delta, start_time)?);
                    continue;
                }
                Record::Unknown(word) => {
                    warn!("unrecognized command ({word:#010x}), skipping record");
                    continue;
                }
                Record::Command(kind) => kind,
            };

            if !window.ensure(kind.payload_len(), &mut self.source)? {
                return Err(ReadError::TruncatedCommand { kind });
            }
            let command = window
                .take(kind.payload_len())
                .and_then(|payload| kind.decode(payload))
                .expect("ensure guarantees the payload is available");
            match command {
                Command::UpdateReference(new_reference) => {
                    reference = new_reference;
                    self.samples.push(relative(reference, 0, start_time)?);
                }
                Command::UpdatePeriod(period) => {
                    debug!("task period is now {period}ns");
                    self.period = Some(period);
                }
                Command::UpdatePriority(priority) => {
                    debug!("task priority is now {priority}");
                    self.priority = Some(priority);
                }
            }
        }

        if window.available() > 0 {
            warn!(
                "ignoring {} trailing bytes, too few for a record",
                window.available()
            );
        }

        if self.samples.is_empty() {
            return Err(ReadError::NoSamples);
        }
        Ok(&self.samples)
    }

    pub fn header(&self) -> Option<&TickHeader> {
        self.header.as_ref()
    }

    pub fn samples(&self) -> &[Nanos] {
        &self.samples
    }

    /// First sample, only available after samples are loaded
    pub fn begin(&self) -> Option<Nanos> {
        self.samples.first().copied()
    }

    /// Last sample, only available after samples are loaded
    pub fn end(&self) -> Option<Nanos> {
        self.samples.last().copied()
    }

    /// Last period (ns) seen in the data section
    pub fn period(&self) -> Option<u64> {
        self.period
    }

    /// Last priority seen in the data section
    pub fn priority(&self) -> Option<u32> {
        self.priority
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}

/// `reference + delta - start_time` or an error if that does not fit.
fn relative(reference: u64, delta: u32, start_time: Nanos) -> Result<Nanos, ReadError> {
    Nanos::try_from(reference)
        .ok()
        .and_then(|reference| reference.checked_add(Nanos::from(delta)))
        .and_then(|absolute| absolute.checked_sub(start_time))
        .ok_or(ReadError::TimeOutOfRange {
            reference,
            delta,
            start_time,
        })
}

fn read_header(source: &mut (impl Read + Seek)) -> Result<TickHeader, HeaderError> {
    source.seek(SeekFrom::Start(0))?;
    let version = u16::from_le_bytes(read_array(source)?);
    if version != PROTOCOL_VERSION {
        return Err(HeaderError::VersionMismatch {
            needed: PROTOCOL_VERSION,
            file: version,
        });
    }

    // padding is skipped, not checked
    source.seek(SeekFrom::Start(DATA_OFFSET_POS as u64))?;
    let data_section_offset = u64::from_le_bytes(read_array(source)?);
    let uuid = read_array(source)?;
    let start_time = Nanos::from_le_bytes(read_array(source)?);
    let process = read_name(source)?;
    let name = read_name(source)?;

    let header_end = (NAMES_POS + 4 + process.len() + name.len()) as u64;
    if data_section_offset < header_end || data_section_offset % ALIGNMENT as u64 != 0 {
        return Err(HeaderError::BadDataOffset {
            offset: data_section_offset,
            header_end,
        });
    }

    Ok(TickHeader {
        version,
        uuid,
        start_time,
        process,
        name,
        data_section_offset,
        // read together with the data section
        data_version: 0,
    })
}

fn read_array<const N: usize>(source: &mut impl Read) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    source.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_name(source: &mut impl Read) -> Result<String, HeaderError> {
    let len = u16::from_le_bytes(read_array(source)?);
    let mut name = vec![0u8; usize::from(len)];
    source.read_exact(&mut name)?;
    String::from_utf8(name).map_err(HeaderError::NotText)
}
