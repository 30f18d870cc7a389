//! Capture recording and deletion. Both mutations pair a capture-row change
//! with the flag ownership update inside one transaction, so a concurrent
//! reader never observes a capture without its ownership effect.

use crate::core::authz::{self, Actor};
use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::LedgerError;
use crate::core::store::Store;
use crate::core::time;
use crate::ledger::flags;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Capture {
    pub id: String,
    pub flag_id: String,
    pub captured_by_user_id: String,
    pub captured_at: String,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: String,
}

/// Capture joined with capturer identity (flag detail history rows).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureWithUser {
    #[serde(flatten)]
    pub capture: Capture,
    pub captured_by_name: Option<String>,
    pub captured_by_email: Option<String>,
}

/// Admin listing row: capture with capturer identity and flag number.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureWithContext {
    #[serde(flatten)]
    pub capture: Capture,
    pub captured_by_name: Option<String>,
    pub flag_number: Option<i64>,
}

/// Record a capture of flag `flag_number` by `user`. The capture timestamp
/// is caller-supplied and may be backdated; it is normalized to RFC 3339 UTC
/// before storage. Ownership transfers to the capturer.
pub fn record_capture(
    store: &Store,
    flag_number: i64,
    user: &Actor,
    captured_at: &str,
    notes: Option<&str>,
    photo_url: Option<&str>,
) -> Result<Capture, LedgerError> {
    let captured_at = time::normalize_timestamp(captured_at)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);
    let capture = Capture {
        id: Ulid::new().to_string(),
        flag_id: String::new(),
        captured_by_user_id: user.id.clone(),
        captured_at,
        notes: notes.map(str::to_string),
        photo_url: photo_url.map(str::to_string),
        created_at: time::now_utc(),
    };

    broker.with_conn(&db_path, &user.id, "capture.record", |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row: Option<(String, String)> = tx
            .query_row(
                "SELECT id, current_owner_id FROM flags WHERE flag_number = ?1",
                [flag_number],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(LedgerError::RusqliteError)?;
        let (flag_id, current_owner_id) = match row {
            Some(r) => r,
            None => return Err(LedgerError::NotFound(format!("flag #{}", flag_number))),
        };
        if current_owner_id == user.id {
            return Err(LedgerError::InvalidState(
                "you cannot capture your own flag".into(),
            ));
        }

        tx.execute(
            "INSERT INTO captures(id, flag_id, captured_by_user_id, captured_at, notes,
                                  photo_url, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                capture.id,
                flag_id,
                capture.captured_by_user_id,
                capture.captured_at,
                capture.notes,
                capture.photo_url,
                capture.created_at
            ],
        )?;

        tx.execute(
            "UPDATE flags SET current_owner_id = ?1, last_captured_at = ?2 WHERE id = ?3",
            params![capture.captured_by_user_id, capture.captured_at, flag_id],
        )?;

        tx.commit()?;
        Ok(flag_id)
    })
    .map(|flag_id| Capture { flag_id, ..capture })
}

/// Delete a capture and revert the flag to its previous holder: the
/// remaining capture with the greatest `captured_at` wins, falling back to
/// the original requester (and a NULL `last_captured_at`) when none remain.
/// Admin only.
pub fn delete_capture(store: &Store, capture_id: &str, admin: &Actor) -> Result<(), LedgerError> {
    authz::require_admin(admin)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, &admin.id, "capture.delete", |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let flag_id: Option<String> = tx
            .query_row(
                "SELECT flag_id FROM captures WHERE id = ?1",
                [capture_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(LedgerError::RusqliteError)?;
        let flag_id = match flag_id {
            Some(f) => f,
            None => return Err(LedgerError::NotFound(format!("capture '{}'", capture_id))),
        };

        tx.execute("DELETE FROM captures WHERE id = ?1", [capture_id])?;

        // Equal timestamps are broken by insertion order so the revert is
        // deterministic.
        let previous: Option<(String, String)> = tx
            .query_row(
                "SELECT captured_by_user_id, captured_at FROM captures
                 WHERE flag_id = ?1
                 ORDER BY captured_at DESC, created_at DESC, id DESC LIMIT 1",
                [&flag_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(LedgerError::RusqliteError)?;

        match previous {
            Some((owner_id, captured_at)) => {
                tx.execute(
                    "UPDATE flags SET current_owner_id = ?1, last_captured_at = ?2 WHERE id = ?3",
                    params![owner_id, captured_at, flag_id],
                )?;
            }
            None => {
                let flag = flags::flag_by_id(&tx, &flag_id)?.ok_or_else(|| {
                    LedgerError::NotFound(format!("flag '{}' for capture '{}'", flag_id, capture_id))
                })?;
                tx.execute(
                    "UPDATE flags SET current_owner_id = ?1, last_captured_at = NULL WHERE id = ?2",
                    params![flag.original_requester_id, flag_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    })
}

/// All captures with capturer identity and flag number, newest first.
/// Admin only.
pub fn list_all_captures(
    store: &Store,
    admin: &Actor,
) -> Result<Vec<CaptureWithContext>, LedgerError> {
    authz::require_admin(admin)?;

    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.flag_id, c.captured_by_user_id, c.captured_at, c.notes,
                c.photo_url, c.created_at, u.name, f.flag_number
         FROM captures c
         LEFT JOIN users u ON c.captured_by_user_id = u.id
         LEFT JOIN flags f ON c.flag_id = f.id
         ORDER BY c.captured_at DESC, c.created_at DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            map_capture_row(row)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, Option<i64>>(8)?,
        ))
    })?;
    let mut out = Vec::new();
    for r in rows {
        let (capture, captured_by_name, flag_number) = r?;
        out.push(CaptureWithContext {
            capture,
            captured_by_name,
            flag_number,
        });
    }
    Ok(out)
}

/// Capture history for one flag, newest first, with capturer identity.
pub(crate) fn history_for_flag(
    conn: &Connection,
    flag_id: &str,
) -> Result<Vec<CaptureWithUser>, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.flag_id, c.captured_by_user_id, c.captured_at, c.notes,
                c.photo_url, c.created_at, u.name, u.email
         FROM captures c LEFT JOIN users u ON c.captured_by_user_id = u.id
         WHERE c.flag_id = ?1
         ORDER BY c.captured_at DESC, c.created_at DESC",
    )?;
    let rows = stmt.query_map([flag_id], |row| {
        Ok((
            map_capture_row(row)?,
            row.get::<_, Option<String>>(7)?,
            row.get::<_, Option<String>>(8)?,
        ))
    })?;
    let mut out = Vec::new();
    for r in rows {
        let (capture, captured_by_name, captured_by_email) = r?;
        out.push(CaptureWithUser {
            capture,
            captured_by_name,
            captured_by_email,
        });
    }
    Ok(out)
}

fn map_capture_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Capture> {
    Ok(Capture {
        id: row.get(0)?,
        flag_id: row.get(1)?,
        captured_by_user_id: row.get(2)?,
        captured_at: row.get(3)?,
        notes: row.get(4)?,
        photo_url: row.get(5)?,
        created_at: row.get(6)?,
    })
}
