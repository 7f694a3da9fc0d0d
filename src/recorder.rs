//! Collects the tick streams of many probes into one file per task.
//!
//! Probes connect to a [`LocalListener`] and start writing a tick stream.
//! The recorder does not decode the stream, it only peeks at the header to
//! decide on a file name and then copies bytes. A later connection for a
//! task that was already recorded by this recorder is read but its data is
//! dropped, even if the first connection has since hung up.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use std::{fs, io, thread};

use tracing::{debug, info, instrument, warn};

use crate::io::{Device, LocalListener};

mod client;
mod config;

use client::Client;
pub use client::Policy;
pub use config::{ConfigError, RecorderConfig};

pub const DEFAULT_FLUSH_THRESHOLD: usize = 2048;

#[derive(Debug, thiserror::Error)]
#[error("Could not create recording directory {}: {source}", path.display())]
pub struct CreateError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

#[derive(Debug)]
pub struct Recorder {
    root: PathBuf,
    clients: Vec<Client>,
    /// Every file opened for recording so far, finished or not
    recorded: HashSet<PathBuf>,
    flush_threshold: usize,
}

impl Recorder {
    /// Records into `root`, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CreateError> {
        Self::with_flush_threshold(root, DEFAULT_FLUSH_THRESHOLD)
    }

    pub fn from_config(config: &RecorderConfig) -> Result<Self, CreateError> {
        Self::with_flush_threshold(&config.recording_root, config.flush_threshold)
    }

    /// Client data is written out once more then `flush_threshold` bytes are
    /// buffered.
    pub fn with_flush_threshold(
        root: impl Into<PathBuf>,
        flush_threshold: usize,
    ) -> Result<Self, CreateError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CreateError {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            clients: Vec::new(),
            recorded: HashSet::new(),
            flush_threshold,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of connections still being served
    pub fn clients(&self) -> usize {
        self.clients.len()
    }

    /// Take ownership of a connected device. It should be non blocking,
    /// a blocking read stalls every other client.
    pub fn add_client(&mut self, device: Box<dyn Device>) {
        if device.mode().is_blocking() {
            debug!("new client uses a blocking device");
        }
        self.clients.push(Client::new(device));
        info!("new client, {} connected", self.clients.len());
    }

    /// One pass over every client: read what is available, start recording
    /// clients whose header arrived and write out full buffers. Clients that
    /// disconnected are flushed one last time and removed.
    #[instrument(level = "trace", skip(self), fields(clients = self.clients.len()))]
    pub fn process(&mut self) {
        for i in 0..self.clients.len() {
            self.clients[i].poll();

            if let Some(name) = self.clients[i].peek_name(&self.root) {
                let policy = if self.recorded.contains(&name) {
                    Policy::Discard
                } else {
                    Policy::Persist
                };
                match self.clients[i].resolve(name.clone(), policy) {
                    Ok(()) if policy == Policy::Persist => {
                        self.recorded.insert(name);
                    }
                    Ok(()) => (),
                    Err(e) => {
                        warn!("dropping client: {e}");
                        self.clients[i].close();
                    }
                }
            }

            let client = &mut self.clients[i];
            if client.policy().is_some() && client.buffered() > self.flush_threshold {
                client.flush();
            }
        }

        // dropping flushes whatever is left
        self.clients.retain(|client| !client.is_closed());
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Could not accept connection on {}: {source}", path.display())]
pub struct ServeError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

/// Feed peers connecting to `listener` into `recorder` until `shutdown` is
/// set. Each round accepts at most one new peer, processes all clients and
/// then sleeps for `poll_interval`.
pub fn serve(
    listener: &LocalListener,
    recorder: &mut Recorder,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) -> Result<(), ServeError> {
    info!(
        "recording into {}, listening on {}",
        recorder.root().display(),
        listener.path().display()
    );
    while !shutdown.load(Ordering::Relaxed) {
        let accepted = listener.accept().map_err(|source| ServeError {
            path: listener.path().to_owned(),
            source,
        })?;
        if let Some(socket) = accepted {
            recorder.add_client(Box::new(socket));
        }

        recorder.process();
        thread::sleep(poll_interval);
    }
    info!("shutting down, {} clients still connected", recorder.clients());
    Ok(())
}
