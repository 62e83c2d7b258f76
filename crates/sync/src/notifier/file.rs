//! Cross-process change detection through small files.
//!
//! Processes that share a session file have no broadcast channel between
//! them. A [`ChangeMarker`] is rewritten after every confirmed mutation and a
//! [`FileWatchSource`] polls it, together with the session file, signalling
//! whenever either one changes or disappears.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use uuid::Uuid;

use super::{Notifier, TriggerSource};

/// File contents, `None` while the file does not exist.
type Fingerprint = Option<Vec<u8>>;

fn fingerprint(path: &Path) -> Fingerprint {
    std::fs::read(path).ok()
}

async fn fingerprint_async(path: &Path) -> Fingerprint {
    tokio::fs::read(path).await.ok()
}

/// Signals when any watched file changes, appears or is removed.
///
/// Files are compared by content, so they should stay small. The baseline is
/// read when the source is spawned.
pub struct FileWatchSource {
    period: Duration,
    paths: Vec<PathBuf>,
}

impl FileWatchSource {
    /// Poll every `period`.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            paths: Vec::new(),
        }
    }

    /// Add a file to watch.
    #[must_use]
    pub fn watch(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }
}

impl TriggerSource for FileWatchSource {
    fn spawn(self, notifier: Notifier) -> JoinHandle<()> {
        let Self { period, paths } = self;
        let mut seen: Vec<Fingerprint> = paths.iter().map(|path| fingerprint(path)).collect();

        tokio::spawn(async move {
            let mut ticks = interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticks.tick().await;
                let mut changed = false;
                for (path, last) in paths.iter().zip(seen.iter_mut()) {
                    let current = fingerprint_async(path).await;
                    if current != *last {
                        tracing::debug!(path = %path.display(), "watched file changed");
                        *last = current;
                        changed = true;
                    }
                }
                if changed {
                    notifier.signal();
                }
            }
        })
    }
}

/// A file rewritten to announce a change to other processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMarker {
    path: PathBuf,
}

impl ChangeMarker {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The marker path, for [`FileWatchSource::watch`].
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the marker with fresh contents.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the marker cannot be written.
    pub fn touch(&self) -> std::io::Result<()> {
        std::fs::write(&self.path, Uuid::new_v4().to_string())
    }
}
