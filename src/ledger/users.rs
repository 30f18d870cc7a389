use crate::core::authz::{Actor, Role};
use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::LedgerError;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

pub fn add_user(store: &Store, name: &str, email: &str, role: Role) -> Result<User, LedgerError> {
    if name.trim().is_empty() {
        return Err(LedgerError::ValidationError("name must not be empty".into()));
    }
    if !email.contains('@') {
        return Err(LedgerError::ValidationError(format!(
            "'{}' is not an email address",
            email
        )));
    }

    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);
    let user = User {
        id: Ulid::new().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        role,
        created_at: time::now_utc(),
    };

    broker.with_conn(&db_path, &user.id, "user.add", |conn| {
        let existing: Option<String> = conn
            .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| {
                row.get(0)
            })
            .optional()
            .map_err(LedgerError::RusqliteError)?;
        if existing.is_some() {
            return Err(LedgerError::InvalidState(format!(
                "a user with email '{}' already exists",
                email
            )));
        }

        conn.execute(
            "INSERT INTO users(id, name, email, role, created_at) VALUES(?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.name, user.email, user.role.as_str(), user.created_at],
        )?;
        Ok(())
    })?;

    Ok(user)
}

pub fn get_user(store: &Store, user_id: &str) -> Result<User, LedgerError> {
    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    let row = conn
        .query_row(
            "SELECT id, name, email, role, created_at FROM users WHERE id = ?1",
            [user_id],
            map_user_row,
        )
        .optional()
        .map_err(LedgerError::RusqliteError)?;
    match row {
        Some(parts) => user_from_parts(parts),
        None => Err(LedgerError::NotFound(format!("user '{}'", user_id))),
    }
}

pub fn list_users(store: &Store) -> Result<Vec<User>, LedgerError> {
    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    let mut stmt = conn
        .prepare("SELECT id, name, email, role, created_at FROM users ORDER BY created_at ASC")?;
    let rows = stmt.query_map([], map_user_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(user_from_parts(r?)?);
    }
    Ok(out)
}

type UserParts = (String, String, String, String, String);

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn user_from_parts(parts: UserParts) -> Result<User, LedgerError> {
    let (id, name, email, role, created_at) = parts;
    Ok(User {
        id,
        name,
        email,
        role: Role::parse(&role)?,
        created_at,
    })
}

impl From<User> for Actor {
    fn from(u: User) -> Actor {
        Actor {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
        }
    }
}
