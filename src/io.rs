//! The byte stream contract the codec and recorder run on.
//!
//! A [`Device`] is opened with an access [`Mode`] that must be a subset of
//! the modes the device supports. After that it reads, writes, seeks and
//! syncs bytes. Reading zero bytes means end of file or, for sockets, that
//! the peer hung up.

use core::fmt;
use std::io;

pub mod file;
pub mod null;
pub mod socket;

pub use file::File;
pub use null::Null;
pub use socket::{LocalListener, LocalSocket, DEFAULT_LISTEN_PATH};

bitflags::bitflags! {
    /// Access modes, freely combinable.
    #[derive(Default)]
    pub struct Mode: u32 {
        const READ_ONLY     = 0x001;
        const WRITE_ONLY    = 0x002;
        const READ_WRITE    = 0x004;
        const APPEND        = 0x008;
        const TRUNCATE      = 0x010;
        const NEW_ONLY      = 0x040;
        const EXISTING_ONLY = 0x080;
        const NON_BLOCKING  = 0x100;
    }
}

impl Mode {
    pub fn is_readable(self) -> bool {
        self.intersects(Mode::READ_ONLY | Mode::READ_WRITE)
    }

    pub fn is_writable(self) -> bool {
        self.intersects(Mode::WRITE_ONLY | Mode::READ_WRITE)
    }

    pub fn is_blocking(self) -> bool {
        !self.contains(Mode::NON_BLOCKING)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Device is already open")]
    AlreadyOpen,
    #[error("Device does not support access mode {requested:?}, it supports: {supported:?}")]
    Unsupported { requested: Mode, supported: Mode },
    #[error("Os returned io-error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CloseError {
    #[error("Device is not open")]
    NotOpen,
    #[error("Os returned io-error while closing: {0}")]
    Io(#[from] io::Error),
}

pub trait Device: fmt::Debug + Send {
    /// Every mode passed to [`open`](Device::open) must be contained in this.
    fn supported_modes(&self) -> Mode;
    /// Current access mode, empty while closed.
    fn mode(&self) -> Mode;

    fn open(&mut self, mode: Mode) -> Result<(), OpenError>;
    fn close(&mut self) -> Result<(), CloseError>;

    /// Returns 0 at end of file or once a peer disconnected. A non blocking
    /// device without data returns [`io::ErrorKind::WouldBlock`].
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Move to an absolute position, measured from the start.
    fn seek(&mut self, _pos: u64) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    /// Make written data durable.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.mode().is_empty()
    }

    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Checks shared by every [`Device::open`] implementation.
pub(crate) fn check_open(current: Mode, requested: Mode, supported: Mode) -> Result<(), OpenError> {
    if !current.is_empty() {
        return Err(OpenError::AlreadyOpen);
    }
    if !supported.contains(requested) {
        return Err(OpenError::Unsupported {
            requested,
            supported,
        });
    }
    Ok(())
}

pub(crate) fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "device is not open")
}
