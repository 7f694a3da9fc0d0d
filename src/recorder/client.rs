use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::SourceId;
use crate::io::{Device, File, Mode, Null, OpenError};
use crate::time::format_iso_timestamp;

/// Headers shorter than this are never inspected
pub(crate) const HEADER_PEEK_LEN: usize = 64;
/// Most bytes taken from a client per pass
pub(crate) const READ_CHUNK: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Bytes end up in a file named after the source
    Persist,
    /// This source was already recorded, bytes are dropped
    Discard,
}

#[derive(Debug)]
enum State {
    Accumulating,
    Resolved {
        name: PathBuf,
        sink: Box<dyn Device>,
        policy: Policy,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("Could not open {}: {source}", path.display())]
pub(crate) struct SinkError {
    path: PathBuf,
    #[source]
    source: OpenError,
}

/// One probe connection.
#[derive(Debug)]
pub(crate) struct Client {
    /// None once the peer disconnected or failed
    io: Option<Box<dyn Device>>,
    buffer: Vec<u8>,
    state: State,
}

impl Client {
    pub(crate) fn new(io: Box<dyn Device>) -> Self {
        Self {
            io: Some(io),
            buffer: Vec::with_capacity(2 * READ_CHUNK),
            state: State::Accumulating,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.io.is_none()
    }

    pub(crate) fn close(&mut self) {
        if let Some(mut device) = self.io.take() {
            if let Err(e) = device.close() {
                debug!("closing client connection failed: {e}");
            }
        }
    }

    pub(crate) fn policy(&self) -> Option<Policy> {
        match &self.state {
            State::Accumulating => None,
            State::Resolved { policy, .. } => Some(*policy),
        }
    }

    pub(crate) fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating)
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// A single read, never more then [`READ_CHUNK`] bytes.
    pub(crate) fn poll(&mut self) {
        let Some(device) = self.io.as_mut() else {
            return;
        };

        let mut chunk = [0u8; READ_CHUNK];
        match device.read(&mut chunk) {
            Ok(0) => {
                info!("client disconnected");
                self.close();
            }
            Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("dropping client, read failed: {e}");
                self.close();
            }
        }
    }

    /// The name this client records under, once enough of the header
    /// arrived.
    pub(crate) fn peek_name(&self, root: &Path) -> Option<PathBuf> {
        if !self.is_accumulating() || self.buffer.len() < HEADER_PEEK_LEN {
            return None;
        }
        SourceId::peek(&self.buffer).map(|id| file_name(root, &id))
    }

    /// Attach a sink and write out everything buffered so far.
    pub(crate) fn resolve(&mut self, name: PathBuf, policy: Policy) -> Result<(), SinkError> {
        let sink: Box<dyn Device> = match policy {
            Policy::Persist => {
                let file = File::open_with(&name, Mode::WRITE_ONLY | Mode::TRUNCATE).map_err(
                    |source| SinkError {
                        path: name.clone(),
                        source,
                    },
                )?;
                info!("recording to {}", name.display());
                Box::new(file)
            }
            Policy::Discard => {
                warn!(
                    "{} was already recorded, dropping data of new client",
                    name.display()
                );
                let mut null = Null::new();
                null.open(Mode::WRITE_ONLY)
                    .map_err(|source| SinkError {
                        path: name.clone(),
                        source,
                    })?;
                Box::new(null)
            }
        };
        self.state = State::Resolved { name, sink, policy };
        self.flush();
        Ok(())
    }

    /// Write and sync the buffer if there is a sink, the buffer is emptied
    /// either way.
    pub(crate) fn flush(&mut self) {
        if let State::Resolved { name, sink, .. } = &mut self.state {
            let res = sink.write_all(&self.buffer).and_then(|()| sink.sync());
            if let Err(e) = res {
                warn!("lost {} bytes for {}: {e}", self.buffer.len(), name.display());
            }
        }
        self.buffer.clear();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.flush();
    }
}

/// `{root}/{iso start}_{process}_{task}.tick`
pub(crate) fn file_name(root: &Path, id: &SourceId) -> PathBuf {
    let start = format_iso_timestamp(id.start_time).unwrap_or_else(|| id.start_time.to_string());
    root.join(format!(
        "{start}_{}_{}.tick",
        sanitize(&id.process),
        sanitize(&id.task)
    ))
}

/// Names come from the peer, they must not escape the recording root
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sanitized() {
        let id = SourceId {
            start_time: 0,
            process: "../etc".to_owned(),
            task: "a/b".to_owned(),
        };
        assert_eq!(
            file_name(Path::new("/rec"), &id),
            PathBuf::from("/rec/19700101T000000Z_.._etc_a_b.tick")
        );
    }
}
