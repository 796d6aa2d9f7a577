use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

use crate::api::client::ApiClient;
use crate::stream::reply::ReplyState;

pub struct AppState {
    /// SQLite-backed key-value store (the localStorage surface)
    pub db: Arc<Mutex<Connection>>,
    /// HTTP client for the assistant backend
    pub api: ApiClient,
    /// Shared in-flight reply state observed by the chat surface
    pub reply: Arc<ReplyState>,
    /// Admission guard: at most one in-flight reply per state
    pub reply_busy: Arc<AtomicBool>,
    /// Cancellation token of the in-flight reply, if any
    pub reply_cancel: Arc<Mutex<Option<CancellationToken>>>,
}

impl AppState {
    pub fn new(conn: Connection, api: ApiClient) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            api,
            reply: Arc::new(ReplyState::new()),
            reply_busy: Arc::new(AtomicBool::new(false)),
            reply_cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// State over an in-memory store; used by tests and embedders that do
    /// not want a data directory.
    pub fn in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("open in-memory database");
        crate::db::migrations::run_migrations(&conn).expect("run migrations");
        Self::new(conn, ApiClient::from_env())
    }
}

// Implement Clone manually to allow state sharing in spawned tasks
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            api: self.api.clone(),
            reply: Arc::clone(&self.reply),
            reply_busy: Arc::clone(&self.reply_busy),
            reply_cancel: Arc::clone(&self.reply_cancel),
        }
    }
}
