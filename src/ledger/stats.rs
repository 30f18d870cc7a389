//! Per-user statistics, derived from count queries at read time and never
//! stored.

use crate::core::db;
use crate::core::error::LedgerError;
use crate::core::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub flags_owned: i64,
    pub total_captures: i64,
    pub flags_requested: i64,
}

pub fn compute_stats(store: &Store, user_id: &str) -> Result<UserStats, LedgerError> {
    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;

    let flags_owned: i64 = conn.query_row(
        "SELECT COUNT(*) FROM flags WHERE current_owner_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    let total_captures: i64 = conn.query_row(
        "SELECT COUNT(*) FROM captures WHERE captured_by_user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    let flags_requested: i64 = conn.query_row(
        "SELECT COUNT(*) FROM flags WHERE original_requester_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;

    Ok(UserStats {
        flags_owned,
        total_captures,
        flags_requested,
    })
}
