use std::io;

use super::{check_open, CloseError, Device, Mode, OpenError};

/// Accepts every write and persists nothing, reads are always at end of file.
#[derive(Debug, Default)]
pub struct Null {
    mode: Mode,
}

impl Null {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Device for Null {
    fn supported_modes(&self) -> Mode {
        Mode::all()
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn open(&mut self, mode: Mode) -> Result<(), OpenError> {
        check_open(self.mode, mode, self.supported_modes())?;
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

    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn seek(&mut self, _: u64) -> io::Result<()> {
        Ok(())
    }
}
