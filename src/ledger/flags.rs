//! Flag reads and admin deletion. A flag's captures cascade at the store
//! level when the flag goes away, so deletion carries no ownership
//! recomputation.

use crate::core::authz::{self, Actor};
use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::LedgerError;
use crate::core::store::Store;
use crate::ledger::captures::CaptureWithUser;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Flag {
    pub id: String,
    pub flag_number: i64,
    pub current_owner_id: String,
    pub original_requester_id: String,
    pub created_at: String,
    pub last_captured_at: Option<String>,
}

/// Admin listing row: flag joined with current owner identity.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlagWithOwner {
    #[serde(flatten)]
    pub flag: Flag,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
}

/// Full view of one flag: the row, the current owner, and the capture
/// history newest first.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlagView {
    pub flag: Flag,
    pub current_owner_name: Option<String>,
    pub current_owner_email: Option<String>,
    pub capture_history: Vec<CaptureWithUser>,
}

/// Flag detail by public number, with owner and history.
pub fn get_flag(store: &Store, flag_number: i64) -> Result<FlagView, LedgerError> {
    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;

    let row = conn
        .query_row(
            "SELECT f.id, f.flag_number, f.current_owner_id, f.original_requester_id,
                    f.created_at, f.last_captured_at, u.name, u.email
             FROM flags f LEFT JOIN users u ON f.current_owner_id = u.id
             WHERE f.flag_number = ?1",
            [flag_number],
            |row| {
                Ok((
                    map_flag_row(row)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            },
        )
        .optional()
        .map_err(LedgerError::RusqliteError)?;

    let (flag, owner_name, owner_email) = match row {
        Some(r) => r,
        None => return Err(LedgerError::NotFound(format!("flag #{}", flag_number))),
    };

    let capture_history = crate::ledger::captures::history_for_flag(&conn, &flag.id)?;

    Ok(FlagView {
        flag,
        current_owner_name: owner_name,
        current_owner_email: owner_email,
        capture_history,
    })
}

/// Flags currently held by `user_id`, most recently captured first.
pub fn list_flags_owned_by(store: &Store, user_id: &str) -> Result<Vec<Flag>, LedgerError> {
    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    let mut stmt = conn.prepare(
        "SELECT id, flag_number, current_owner_id, original_requester_id, created_at,
                last_captured_at
         FROM flags WHERE current_owner_id = ?1
         ORDER BY last_captured_at DESC, flag_number DESC",
    )?;
    let rows = stmt.query_map([user_id], map_flag_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// All flags with owner identity, highest number first. Admin only.
pub fn list_all_flags(store: &Store, admin: &Actor) -> Result<Vec<FlagWithOwner>, LedgerError> {
    authz::require_admin(admin)?;

    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    let mut stmt = conn.prepare(
        "SELECT f.id, f.flag_number, f.current_owner_id, f.original_requester_id,
                f.created_at, f.last_captured_at, u.name, u.email
         FROM flags f LEFT JOIN users u ON f.current_owner_id = u.id
         ORDER BY f.flag_number DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            map_flag_row(row)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;
    let mut out = Vec::new();
    for r in rows {
        let (flag, owner_name, owner_email) = r?;
        out.push(FlagWithOwner {
            flag,
            owner_name,
            owner_email,
        });
    }
    Ok(out)
}

/// Delete a flag by id. Captures referencing it are removed by the
/// ON DELETE CASCADE foreign key. Admin only.
pub fn delete_flag(store: &Store, flag_id: &str, admin: &Actor) -> Result<(), LedgerError> {
    authz::require_admin(admin)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, &admin.id, "flag.delete", |conn| {
        let deleted = conn.execute("DELETE FROM flags WHERE id = ?1", [flag_id])?;
        if deleted == 0 {
            return Err(LedgerError::NotFound(format!("flag '{}'", flag_id)));
        }
        Ok(())
    })
}

pub(crate) fn map_flag_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Flag> {
    Ok(Flag {
        id: row.get(0)?,
        flag_number: row.get(1)?,
        current_owner_id: row.get(2)?,
        original_requester_id: row.get(3)?,
        created_at: row.get(4)?,
        last_captured_at: row.get(5)?,
    })
}

/// Fetch a flag row by internal id on an open connection.
pub(crate) fn flag_by_id(conn: &Connection, flag_id: &str) -> Result<Option<Flag>, LedgerError> {
    conn.query_row(
        "SELECT id, flag_number, current_owner_id, original_requester_id, created_at,
                last_captured_at
         FROM flags WHERE id = ?1",
        [flag_id],
        map_flag_row,
    )
    .optional()
    .map_err(LedgerError::RusqliteError)
}
