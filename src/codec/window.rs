use std::io::{self, Read};

pub(crate) const WINDOW_SIZE: usize = 64 * 1024;

/// Fixed size view on a byte stream. Bytes before `pos` are consumed, bytes
/// in `pos..len` are available. Refilling moves the available tail to the
/// front before reading more, a record therefore never spans a refill.
pub(crate) struct Window {
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl Window {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            buf: vec![0; size].into_boxed_slice(),
            pos: 0,
            len: 0,
        }
    }

    pub(crate) fn available(&self) -> usize {
        self.len - self.pos
    }

    /// Returns the number of bytes read, zero means end of stream.
    fn refill(&mut self, source: &mut impl Read) -> io::Result<usize> {
        let tail = self.available();
        self.buf.copy_within(self.pos..self.len, 0);
        self.pos = 0;
        self.len = tail;

        let read = loop {
            match source.read(&mut self.buf[tail..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.len += read;
        Ok(read)
    }

    /// Refill until at least `needed` bytes are available. Returns false if
    /// the stream ended first.
    pub(crate) fn ensure(&mut self, needed: usize, source: &mut impl Read) -> io::Result<bool> {
        debug_assert!(needed <= self.buf.len());
        while self.available() < needed {
            if self.refill(source)? == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Consume `n` bytes, `None` if fewer are available.
    pub(crate) fn take(&mut self, n: usize) -> Option<&[u8]> {
        if self.available() < n {
            return None;
        }
        let start = self.pos;
        self.pos += n;
        Some(&self.buf[start..self.pos])
    }

    pub(crate) fn take_u32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }
}
