use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The DB Broker is the thin waist for state access: every mutation routes
/// through it, serialized in-process and recorded in the audit log.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join(schemas::LEDGER_AUDIT_NAME),
        }
    }

    /// Execute a closure with a serialized connection to the specified DB.
    /// The connection is handed out mutable so operations can open
    /// transactions; cross-process writers are held off by WAL busy timeouts.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, error::LedgerError>
    where
        F: FnOnce(&mut Connection) -> Result<R, error::LedgerError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mut conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&mut conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, op_name, &db_id, status)?;

        result
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), error::LedgerError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: time::now_utc(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::LedgerError::IoError)?;

        let line = serde_json::to_string(&ev)
            .map_err(|e| error::LedgerError::ValidationError(e.to_string()))?;
        writeln!(f, "{}", line).map_err(error::LedgerError::IoError)?;
        Ok(())
    }
}
