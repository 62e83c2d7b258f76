//! CLI command implementations.

pub mod cart;
pub mod counts;
pub mod session;
pub mod wishlist;

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use basket_sync::{
    ChangeMarker, FileWatchSource, HttpGateway, LocalSession, Notifier, SessionFile, SyncConfig,
    SyncOptions, Synchronizer,
};
use basket_sync_core::{LineKey, ProductId, Size, SizeError, VariantId};

/// Session file used when `BASKET_SESSION_FILE` is unset.
const DEFAULT_SESSION_FILE: &str = ".basket-session.json";

/// How often `watch` checks for changes made by other `bsync` processes.
const FILE_POLL: Duration = Duration::from_secs(1);

pub type CliSync = Synchronizer<HttpGateway, LocalSession>;

/// Everything a command needs, built from the environment.
pub struct Context {
    pub config: SyncConfig,
    pub session: LocalSession,
    pub sync: CliSync,
    session_path: PathBuf,
    marker: ChangeMarker,
}

impl Context {
    /// Restore the session and wire up the synchronizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be read or the HTTP client
    /// cannot be built.
    pub fn load(config: SyncConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let session_path = config
            .session_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
        let marker = ChangeMarker::new(session_path.with_extension("changes"));
        let session = LocalSession::open(Some(SessionFile::new(&session_path)), None)?;
        let gateway = HttpGateway::new(&config, session.clone())?;
        let sync = Synchronizer::new(
            gateway,
            session.clone(),
            Notifier::new(),
            SyncOptions::from_config(&config),
        );

        Ok(Self {
            config,
            session,
            sync,
            session_path,
            marker,
        })
    }

    /// Trigger source for logins, logouts and mutations made by other
    /// `bsync` processes sharing this session file.
    pub fn other_processes(&self) -> FileWatchSource {
        FileWatchSource::new(FILE_POLL)
            .watch(&self.session_path)
            .watch(self.marker.path())
    }

    /// Tell other `bsync` processes that counts changed.
    pub fn announce_change(&self) {
        if let Err(e) = self.marker.touch() {
            tracing::warn!(path = %self.marker.path().display(), error = %e, "failed to write change marker");
        }
    }
}

/// Composite key arguments of a cart or wishlist line.
#[derive(Args)]
pub struct LineArgs {
    /// Product ID
    #[arg(short, long)]
    pub product: String,

    /// Variant ID (defaults to the product ID)
    #[arg(short, long)]
    pub variant: Option<String>,

    /// Size label (defaults to "Free Size")
    #[arg(short, long)]
    pub size: Option<String>,
}

impl LineArgs {
    /// Build the line key.
    ///
    /// # Errors
    ///
    /// Returns `SizeError` if the size label is blank or too long.
    pub fn key(&self) -> Result<LineKey, SizeError> {
        let size = self.size.as_deref().map_or_else(|| Ok(Size::free()), Size::parse)?;
        Ok(LineKey::new(
            ProductId::new(self.product.as_str()),
            VariantId::new(self.variant.clone().unwrap_or_else(|| self.product.clone())),
            size,
        ))
    }
}
