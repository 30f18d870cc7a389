//! Flag request lifecycle: submission by players, approval or rejection by
//! admins. Approval mints the flag itself, so the flag number assignment
//! (a meta-table high-water mark, never reused after deletion) and the
//! insert run inside one IMMEDIATE transaction; the UNIQUE constraint on
//! flag_number backstops the race and surfaces as a retryable Conflict.

use crate::core::authz::{self, Actor};
use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::LedgerError;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<RequestStatus, LedgerError> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(LedgerError::ValidationError(format!(
                "unknown request status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlagRequest {
    pub id: String,
    pub user_id: String,
    pub status: RequestStatus,
    pub requested_at: String,
    pub processed_at: Option<String>,
    pub processed_by_admin_id: Option<String>,
}

/// Admin listing row: request joined with requester identity.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequestWithUser {
    #[serde(flatten)]
    pub request: FlagRequest,
    pub requested_by_name: Option<String>,
    pub requested_by_email: Option<String>,
}

/// Submit a new flag request for `user`. A user may hold at most one
/// pending request at a time.
pub fn submit_request(store: &Store, user: &Actor) -> Result<FlagRequest, LedgerError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);
    let request = FlagRequest {
        id: Ulid::new().to_string(),
        user_id: user.id.clone(),
        status: RequestStatus::Pending,
        requested_at: time::now_utc(),
        processed_at: None,
        processed_by_admin_id: None,
    };

    broker.with_conn(&db_path, &user.id, "request.submit", |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending: Option<String> = tx
            .query_row(
                "SELECT id FROM flag_requests WHERE user_id = ?1 AND status = 'pending'",
                [&user.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(LedgerError::RusqliteError)?;
        if pending.is_some() {
            return Err(LedgerError::InvalidState(
                "you already have a pending flag request".into(),
            ));
        }

        tx.execute(
            "INSERT INTO flag_requests(id, user_id, status, requested_at) VALUES(?1, ?2, ?3, ?4)",
            params![
                request.id,
                request.user_id,
                request.status.as_str(),
                request.requested_at
            ],
        )?;
        tx.commit()?;
        Ok(())
    })?;

    Ok(request)
}

/// Approve a pending request: mint the next flag number, create the flag
/// owned by the original requester, and mark the request processed. Returns
/// the assigned flag number.
pub fn approve_request(
    store: &Store,
    request_id: &str,
    admin: &Actor,
) -> Result<i64, LedgerError> {
    authz::require_admin(admin)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);
    let processed_at = time::now_utc();

    broker.with_conn(&db_path, &admin.id, "request.approve", |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row: Option<(String, String)> = tx
            .query_row(
                "SELECT user_id, status FROM flag_requests WHERE id = ?1",
                [request_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(LedgerError::RusqliteError)?;
        let (requester_id, status) = match row {
            Some(r) => r,
            None => return Err(LedgerError::NotFound(format!("request '{}'", request_id))),
        };
        if RequestStatus::parse(&status)? != RequestStatus::Pending {
            return Err(LedgerError::InvalidState(format!(
                "request '{}' is not pending (status: {})",
                request_id, status
            )));
        }

        // The high-water mark lives in meta so that deleting the
        // highest-numbered flag can never recycle its number.
        let high_water: i64 = tx.query_row(
            "SELECT COALESCE((SELECT CAST(value AS INTEGER) FROM meta
                              WHERE key = 'max_flag_number'), 0)",
            [],
            |row| row.get(0),
        )?;
        let max_existing: i64 = tx.query_row(
            "SELECT COALESCE(MAX(flag_number), 0) FROM flags",
            [],
            |row| row.get(0),
        )?;
        let next_flag_number = high_water.max(max_existing) + 1;

        tx.execute(
            "INSERT INTO flags(id, flag_number, current_owner_id, original_requester_id, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![
                Ulid::new().to_string(),
                next_flag_number,
                requester_id,
                requester_id,
                processed_at
            ],
        )
        .map_err(map_flag_number_conflict)?;

        tx.execute(
            "INSERT INTO meta(key, value) VALUES('max_flag_number', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [next_flag_number.to_string()],
        )?;

        tx.execute(
            "UPDATE flag_requests
             SET status = 'approved', processed_at = ?1, processed_by_admin_id = ?2
             WHERE id = ?3",
            params![processed_at, admin.id, request_id],
        )?;

        tx.commit()?;
        Ok(next_flag_number)
    })
}

/// Reject a pending request. No flag is created.
pub fn reject_request(store: &Store, request_id: &str, admin: &Actor) -> Result<(), LedgerError> {
    authz::require_admin(admin)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);
    let processed_at = time::now_utc();

    broker.with_conn(&db_path, &admin.id, "request.reject", |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM flag_requests WHERE id = ?1",
                [request_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(LedgerError::RusqliteError)?;
        let status = match status {
            Some(s) => s,
            None => return Err(LedgerError::NotFound(format!("request '{}'", request_id))),
        };
        if RequestStatus::parse(&status)? != RequestStatus::Pending {
            return Err(LedgerError::InvalidState(format!(
                "request '{}' is not pending (status: {})",
                request_id, status
            )));
        }

        tx.execute(
            "UPDATE flag_requests
             SET status = 'rejected', processed_at = ?1, processed_by_admin_id = ?2
             WHERE id = ?3",
            params![processed_at, admin.id, request_id],
        )?;

        tx.commit()?;
        Ok(())
    })
}

/// The caller's own requests, newest first.
pub fn list_requests_for(store: &Store, user_id: &str) -> Result<Vec<FlagRequest>, LedgerError> {
    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, status, requested_at, processed_at, processed_by_admin_id
         FROM flag_requests WHERE user_id = ?1 ORDER BY requested_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([user_id], map_request_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(request_from_parts(r?)?);
    }
    Ok(out)
}

/// All requests with requester identity, newest first. Admin only.
pub fn list_all_requests(store: &Store, admin: &Actor) -> Result<Vec<RequestWithUser>, LedgerError> {
    authz::require_admin(admin)?;

    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    let mut stmt = conn.prepare(
        "SELECT r.id, r.user_id, r.status, r.requested_at, r.processed_at,
                r.processed_by_admin_id, u.name, u.email
         FROM flag_requests r LEFT JOIN users u ON r.user_id = u.id
         ORDER BY r.requested_at DESC, r.id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            (
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ),
            row.get::<_, Option<String>>(6)?,
            row.get::<_, Option<String>>(7)?,
        ))
    })?;
    let mut out = Vec::new();
    for r in rows {
        let (parts, name, email) = r?;
        out.push(RequestWithUser {
            request: request_from_parts(parts)?,
            requested_by_name: name,
            requested_by_email: email,
        });
    }
    Ok(out)
}

type RequestParts = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

fn map_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn request_from_parts(parts: RequestParts) -> Result<FlagRequest, LedgerError> {
    let (id, user_id, status, requested_at, processed_at, processed_by_admin_id) = parts;
    Ok(FlagRequest {
        id,
        user_id,
        status: RequestStatus::parse(&status)?,
        requested_at,
        processed_at,
        processed_by_admin_id,
    })
}

fn map_flag_number_conflict(e: rusqlite::Error) -> LedgerError {
    match &e {
        rusqlite::Error::SqliteFailure(code, Some(msg))
            if code.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("flags.flag_number") =>
        {
            LedgerError::Conflict(
                "flag number was assigned by a concurrent approval; retry the approval".into(),
            )
        }
        _ => LedgerError::RusqliteError(e),
    }
}
