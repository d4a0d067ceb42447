use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::BookingEvent;
use crate::services::notifications::Notifier;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Box<dyn Notifier>,
    pub events_tx: broadcast::Sender<BookingEvent>,
}

impl AppState {
    /// The connection mutex serializes writers; mutations additionally run
    /// inside an IMMEDIATE transaction.
    ///
    /// A poisoned lock is recovered. The panicking request's transaction was
    /// rolled back when it unwound, and anything still open is rolled back here.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        if !self.db.is_poisoned() {
            return Ok(self.db.lock().unwrap_or_else(PoisonError::into_inner));
        }

        tracing::warn!("recovering poisoned database lock");
        let conn = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        self.db.clear_poison();
        Ok(conn)
    }
}
