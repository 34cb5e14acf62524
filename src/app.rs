//! App Core for Bookmark Sentinel.
//!
//! Wires the database, stores, settings, checkers and the bookmark session
//! together, and runs the startup sequence.

use std::sync::Arc;

use log::{info, warn};
use tokio::task::JoinHandle;

use crate::database::connection::Database;
use crate::managers::bookmark_session::BookmarkSession;
use crate::managers::bookmark_store::{BookmarkStore, SqliteBookmarkStore};
use crate::managers::verification_scheduler::{PassSummary, VerificationScheduler};
use crate::services::clock::SystemClock;
use crate::services::kv_store::SqliteKeyValueStore;
use crate::services::safety_checker::VirusTotalChecker;
use crate::services::settings_engine::SettingsEngine;
use crate::services::status_checker::HttpStatusChecker;
use crate::services::verification_cache::VerificationCache;
use crate::types::errors::SessionError;
use crate::types::settings::SessionConfig;

/// Central application struct holding the store, settings and session.
pub struct App {
    pub db: Arc<Database>,
    pub store: Arc<SqliteBookmarkStore>,
    pub settings: Arc<SettingsEngine>,
    pub session: Arc<BookmarkSession>,
}

/// Tasks started by [`App::start`].
pub struct BackgroundTasks {
    /// Reloads the tree on store changes. Runs until aborted.
    pub watcher: JoinHandle<()>,
    /// The initial verification run.
    pub verification: JoinHandle<PassSummary>,
}

impl App {
    /// Creates a new App over the database at `db_path` with default config.
    pub fn new(db_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::open(db_path)?;
        Self::with_database(db, SessionConfig::default())
    }

    /// Creates an App over an in-memory database.
    pub fn open_in_memory(config: SessionConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::open_in_memory()?;
        Self::with_database(db, config)
    }

    fn with_database(db: Database, config: SessionConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(db);
        let kv = Arc::new(SqliteKeyValueStore::new(db.clone()));

        let settings = Arc::new(SettingsEngine::new(kv.clone()));
        if let Err(e) = settings.load() {
            warn!("Settings unreadable, using defaults: {}", e);
        }

        let cache = Arc::new(VerificationCache::new(kv, Arc::new(SystemClock)));
        let status_checker = HttpStatusChecker::new(config.status_timeout)
            .map_err(|e| format!("Status checker init failed: {}", e))?;
        let safety_checker = VirusTotalChecker::new(&config.safety_api_base)
            .map_err(|e| format!("Safety checker init failed: {}", e))?;
        let scheduler = VerificationScheduler::new(
            cache,
            Arc::new(status_checker),
            Arc::new(safety_checker),
            settings.clone(),
        );

        let store = Arc::new(SqliteBookmarkStore::new(db.clone()));
        let session = BookmarkSession::new(store.clone(), scheduler, config);

        Ok(Self {
            db,
            store,
            settings,
            session,
        })
    }

    /// Startup sequence: subscribe to store changes, load the tree, then start
    /// verification in the background.
    pub async fn start(&self) -> Result<BackgroundTasks, SessionError> {
        let events = self.store.subscribe();
        self.session.load().await?;
        let watcher = self.session.clone().watch(events);
        let verification = self.session.spawn_verification();
        info!("Bookmark session started");
        Ok(BackgroundTasks {
            watcher,
            verification,
        })
    }

    /// Shutdown sequence: commit any pending deletion.
    pub async fn shutdown(&self) {
        self.session.flush_pending_deletion().await;
    }
}
