//! Authorization policy for ledger operations.
//!
//! Admin determination is a per-user stored role, not a configured email.
//! Operations resolve the calling user to an `Actor` and gate admin-only
//! mutations through `require_admin`.

use crate::core::error::LedgerError;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Role, LedgerError> {
        match s {
            "player" => Ok(Role::Player),
            "admin" => Ok(Role::Admin),
            other => Err(LedgerError::ValidationError(format!(
                "unknown role '{}' (expected 'player' or 'admin')",
                other
            ))),
        }
    }
}

/// A resolved caller: identity plus stored role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Look up the calling user. Unknown ids surface as NotFound so boundary
/// layers never have to distinguish "no session" from "stale session".
pub fn resolve_actor(conn: &Connection, user_id: &str) -> Result<Actor, LedgerError> {
    let row = conn
        .query_row(
            "SELECT id, name, email, role FROM users WHERE id = ?1",
            [user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
        .map_err(LedgerError::RusqliteError)?;

    match row {
        Some((id, name, email, role)) => Ok(Actor {
            id,
            name,
            email,
            role: Role::parse(&role)?,
        }),
        None => Err(LedgerError::NotFound(format!("user '{}'", user_id))),
    }
}

pub fn require_admin(actor: &Actor) -> Result<(), LedgerError> {
    if actor.role != Role::Admin {
        return Err(LedgerError::Forbidden(format!(
            "user '{}' is not an admin",
            actor.id
        )));
    }
    Ok(())
}
