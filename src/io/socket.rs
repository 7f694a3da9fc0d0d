use std::io::{self, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::{fs, net};

use tracing::{debug, warn};

use super::{check_open, not_open, CloseError, Device, Mode, OpenError};

pub const DEFAULT_LISTEN_PATH: &str = "/tmp/rtm_recorder";

/// Listens on a unix domain socket path, accepted peers are [`LocalSocket`]s.
#[derive(Debug)]
pub struct LocalListener {
    path: PathBuf,
    listener: UnixListener,
}

impl LocalListener {
    /// Any stale socket at `path` is removed first.
    pub fn bind(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        match fs::remove_file(&path) {
            Ok(()) => debug!("removed stale socket at {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (),
            Err(e) => return Err(e),
        }
        let listener = UnixListener::bind(&path)?;
        listener.set_nonblocking(true)?;
        Ok(Self { path, listener })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never blocks, returns `None` if no peer is waiting. Accepted sockets
    /// are open for reading and writing and never block either.
    pub fn accept(&self) -> io::Result<Option<LocalSocket>> {
        let stream = match self.listener.accept() {
            Ok((stream, _)) => stream,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e),
        };
        stream.set_nonblocking(true)?;
        Ok(Some(LocalSocket {
            path: None,
            stream: Some(stream),
            mode: Mode::READ_WRITE | Mode::NON_BLOCKING,
        }))
    }
}

impl Drop for LocalListener {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("could not remove socket {}: {e}", self.path.display());
        }
    }
}

/// Stream socket to a [`LocalListener`].
#[derive(Debug)]
pub struct LocalSocket {
    /// where to connect on open, None for accepted sockets
    path: Option<PathBuf>,
    stream: Option<UnixStream>,
    mode: Mode,
}

impl LocalSocket {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            stream: None,
            mode: Mode::empty(),
        }
    }

    /// Connect to the listener at `path`, the usual way a probe reaches the
    /// recorder.
    pub fn connect(path: impl Into<PathBuf>) -> Result<Self, OpenError> {
        let mut socket = Self::new(path);
        socket.open(Mode::READ_WRITE)?;
        Ok(socket)
    }

    fn stream(&mut self) -> io::Result<&mut UnixStream> {
        self.stream.as_mut().ok_or_else(not_open)
    }
}

impl Device for LocalSocket {
    fn supported_modes(&self) -> Mode {
        Mode::READ_WRITE | Mode::NON_BLOCKING
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn open(&mut self, mode: Mode) -> Result<(), OpenError> {
        check_open(self.mode, mode, self.supported_modes())?;
        let path = self.path.as_ref().ok_or_else(|| {
            OpenError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "accepted sockets can not be reopened",
            ))
        })?;
        let stream = UnixStream::connect(path)?;
        stream.set_nonblocking(!mode.is_blocking())?;
        self.stream = Some(stream);
        self.mode = mode;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CloseError> {
        let stream = self.stream.take().ok_or(CloseError::NotOpen)?;
        self.mode = Mode::empty();
        match stream.shutdown(net::Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream()?.write(buf)
    }
}

impl Read for LocalSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Device::read(self, buf)
    }
}

impl Write for LocalSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Device::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream()?.flush()
    }
}
