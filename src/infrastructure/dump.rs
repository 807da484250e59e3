//! Signal-triggered dumps.
//!
//! Registering a `CounterLayer` for a signal installs (once per signal number)
//! a listener thread running a current-thread tokio runtime that waits on
//! `tokio::signal`. The OS-level handler only wakes that thread; the dump
//! itself runs as ordinary code, taking the counter's mutex like any other
//! reader.
//!
//! Each signal number has at most one owner. A newer registration replaces
//! the older one, and dropping a [`DumpRegistration`] only removes the owner
//! it installed.

use crate::domain::signal::Signal;
use crate::domain::tally::DumpFormat;
use crate::infrastructure::counter::CounterLayer;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex, OnceLock, PoisonError};
use std::thread;
use tokio::signal::unix::SignalKind;

/// Where and how to dump when a signal arrives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DumpConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub signal: Signal,
    #[serde(default)]
    pub format: DumpFormat,
}

impl DumpConfig {
    /// JSON dumps to `path` on `SIGUSR2`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            signal: Signal::default(),
            format: DumpFormat::default(),
        }
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_format(mut self, format: DumpFormat) -> Self {
        self.format = format;
        self
    }
}

/// Failure to produce a dump or to listen for its signal.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("failed to serialize tallies: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write dump {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot listen for {signal}: {source}")]
    Listen {
        signal: Signal,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
struct Owner {
    id: u64,
    counter: CounterLayer,
    path: PathBuf,
    format: DumpFormat,
}

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_STAGING_ID: AtomicU64 = AtomicU64::new(1);

fn owners() -> &'static DashMap<libc::c_int, Owner> {
    static OWNERS: OnceLock<DashMap<libc::c_int, Owner>> = OnceLock::new();
    OWNERS.get_or_init(DashMap::new)
}

fn listening() -> &'static Mutex<HashSet<libc::c_int>> {
    static LISTENING: OnceLock<Mutex<HashSet<libc::c_int>>> = OnceLock::new();
    LISTENING.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Active signal registration. Dumping stops when this is dropped.
///
/// The OS-level handler for the signal stays installed for the rest of the
/// process. Once no registration owns the signal, deliveries are ignored:
/// the signal no longer triggers its default action (for `SIGUSR2`,
/// terminating the process).
#[derive(Debug)]
#[must_use = "dropping the registration stops dumping on its signal"]
pub struct DumpRegistration {
    id: u64,
    signal: Signal,
    path: PathBuf,
}

impl DumpRegistration {
    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this registration still owns its signal.
    pub fn is_active(&self) -> bool {
        owners()
            .get(&self.signal.number())
            .is_some_and(|owner| owner.id == self.id)
    }

    /// Stop dumping on the signal, unless a newer registration took over.
    ///
    /// The signal stays caught afterwards and is silently ignored.
    pub fn unregister(self) {}
}

impl Drop for DumpRegistration {
    fn drop(&mut self) {
        owners().remove_if(&self.signal.number(), |_, owner| owner.id == self.id);
    }
}

pub(crate) fn register(
    counter: CounterLayer,
    config: DumpConfig,
) -> Result<DumpRegistration, DumpError> {
    let signal = config.signal;
    ensure_listener(signal)?;

    let id = NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed);
    let owner = Owner {
        id,
        counter,
        path: config.path.clone(),
        format: config.format,
    };
    if let Some(previous) = owners().insert(signal.number(), owner) {
        tracing::debug!(
            %signal,
            previous = %previous.path.display(),
            path = %config.path.display(),
            "replacing dump registration"
        );
    }

    Ok(DumpRegistration {
        id,
        signal,
        path: config.path,
    })
}

/// Start the listener for `signal` unless one is already running. Returns
/// once the OS-level handler is installed.
fn ensure_listener(signal: Signal) -> Result<(), DumpError> {
    let mut listening = listening().lock().unwrap_or_else(PoisonError::into_inner);
    if listening.contains(&signal.number()) {
        return Ok(());
    }

    let listen_error = |source| DumpError::Listen { signal, source };
    let (ready_tx, ready_rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("tally-dump-{}", signal.number()))
        .spawn(move || listen(signal, ready_tx))
        .map_err(listen_error)?;

    ready_rx
        .recv()
        .unwrap_or_else(|_| Err(io::Error::other("signal listener exited")))
        .map_err(listen_error)?;

    listening.insert(signal.number());
    Ok(())
}

fn listen(signal: Signal, ready: mpsc::Sender<io::Result<()>>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    runtime.block_on(async move {
        let mut stream = match tokio::signal::unix::signal(SignalKind::from_raw(signal.number())) {
            Ok(stream) => stream,
            Err(err) => {
                let _ = ready.send(Err(err));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        while stream.recv().await.is_some() {
            deliver(signal);
        }
    });
}

fn deliver(signal: Signal) {
    // Clone out of the map so no shard lock is held during I/O
    let Some(owner) = owners()
        .get(&signal.number())
        .map(|owner| owner.value().clone())
    else {
        return;
    };

    if let Err(err) = owner.counter.write_dump(&owner.path, owner.format) {
        tracing::error!(%signal, error = %err, "failed to write tally dump");
    }
}

/// Replace `path` with `content` so readers never see a partial dump.
pub(crate) fn write_atomically(path: &Path, content: &str) -> Result<(), DumpError> {
    let write_error = |source| DumpError::Write {
        path: path.to_path_buf(),
        source,
    };
    // Unique per write: listeners for different signals may share a path
    let mut staging = path.as_os_str().to_owned();
    staging.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        NEXT_STAGING_ID.fetch_add(1, Ordering::Relaxed)
    ));
    let staging = PathBuf::from(staging);

    fs::write(&staging, content).map_err(write_error)?;
    fs::rename(&staging, path).map_err(|err| {
        let _ = fs::remove_file(&staging);
        write_error(err)
    })
}
