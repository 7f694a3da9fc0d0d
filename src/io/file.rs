use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::instrument;

use super::{check_open, not_open, CloseError, Device, Mode, OpenError};

/// A file on disk, closed until [`Device::open`] is called.
#[derive(Debug)]
pub struct File {
    path: PathBuf,
    handle: Option<fs::File>,
    mode: Mode,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
            mode: Mode::empty(),
        }
    }

    /// Shorthand for [`File::new`] followed by [`Device::open`].
    pub fn open_with(path: impl Into<PathBuf>, mode: Mode) -> Result<Self, OpenError> {
        let mut file = Self::new(path);
        file.open(mode)?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&mut self) -> io::Result<&mut fs::File> {
        self.handle.as_mut().ok_or_else(not_open)
    }
}

fn options(mode: Mode) -> OpenOptions {
    let mut options = OpenOptions::new();
    if mode.contains(Mode::READ_ONLY) {
        options.read(true);
    }
    if mode.contains(Mode::WRITE_ONLY) {
        options.write(true).create(true);
    }
    if mode.contains(Mode::READ_WRITE) {
        options.read(true).write(true);
    }
    if mode.contains(Mode::APPEND) {
        options.append(true);
    }
    if mode.contains(Mode::TRUNCATE) {
        options.truncate(true);
    }
    if mode.contains(Mode::NEW_ONLY) {
        options.create_new(true);
    }
    if mode.contains(Mode::EXISTING_ONLY) {
        options.create(false);
    }
    // NON_BLOCKING is accepted but has no effect, regular files never block
    options
}

impl Device for File {
    fn supported_modes(&self) -> Mode {
        Mode::all()
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn open(&mut self, mode: Mode) -> Result<(), OpenError> {
        check_open(self.mode, mode, self.supported_modes())?;
        self.handle = Some(options(mode).open(&self.path)?);
        self.mode = mode;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CloseError> {
        let handle = self.handle.take().ok_or(CloseError::NotOpen)?;
        let was_writable = self.mode.is_writable();
        self.mode = Mode::empty();
        if was_writable {
            handle.sync_all()?;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle()?.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle()?.write(buf)
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.handle()?.seek(SeekFrom::Start(pos)).map(|_| ())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.handle()?.sync_data()
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Device::read(self, buf)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Device::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle()?.flush()
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.handle()?.seek(pos)
    }
}
