//! Database schema definitions for the flag ledger.
//!
//! A single SQLite database (`ledger.db`) holds four tables: users,
//! flag_requests, flags, and captures. Schema DDL lives here as constants so
//! every consumer initializes state identically. The `meta` table carries the
//! schema version for forward migrations.

pub const LEDGER_DB_NAME: &str = "ledger.db";
pub const LEDGER_AUDIT_NAME: &str = "ledger.audit.jsonl";
pub const LEDGER_SCHEMA_VERSION: u32 = 1;

pub const LEDGER_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const LEDGER_DB_SCHEMA_USERS: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL DEFAULT 'player',
        created_at TEXT NOT NULL
    )
";

pub const LEDGER_DB_SCHEMA_FLAG_REQUESTS: &str = "
    CREATE TABLE IF NOT EXISTS flag_requests (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        requested_at TEXT NOT NULL,
        processed_at TEXT,
        processed_by_admin_id TEXT,
        FOREIGN KEY(user_id) REFERENCES users(id),
        FOREIGN KEY(processed_by_admin_id) REFERENCES users(id)
    )
";

pub const LEDGER_DB_SCHEMA_FLAGS: &str = "
    CREATE TABLE IF NOT EXISTS flags (
        id TEXT PRIMARY KEY,
        flag_number INTEGER NOT NULL UNIQUE,
        current_owner_id TEXT NOT NULL,
        original_requester_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        last_captured_at TEXT,
        FOREIGN KEY(current_owner_id) REFERENCES users(id),
        FOREIGN KEY(original_requester_id) REFERENCES users(id)
    )
";

pub const LEDGER_DB_SCHEMA_CAPTURES: &str = "
    CREATE TABLE IF NOT EXISTS captures (
        id TEXT PRIMARY KEY,
        flag_id TEXT NOT NULL,
        captured_by_user_id TEXT NOT NULL,
        captured_at TEXT NOT NULL,
        notes TEXT,
        photo_url TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY(flag_id) REFERENCES flags(id) ON DELETE CASCADE,
        FOREIGN KEY(captured_by_user_id) REFERENCES users(id)
    )
";

pub const LEDGER_DB_SCHEMA_INDEX_REQUESTS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_requests_user ON flag_requests(user_id, status)";

// Safety net for the one-pending-request-per-user invariant. The application
// checks first and reports InvalidState; this index catches anything that
// slips past under concurrency.
pub const LEDGER_DB_SCHEMA_INDEX_REQUESTS_PENDING: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     idx_requests_one_pending ON flag_requests(user_id) WHERE status = 'pending'";

pub const LEDGER_DB_SCHEMA_INDEX_FLAGS_OWNER: &str =
    "CREATE INDEX IF NOT EXISTS idx_flags_owner ON flags(current_owner_id)";

pub const LEDGER_DB_SCHEMA_INDEX_CAPTURES_FLAG: &str =
    "CREATE INDEX IF NOT EXISTS idx_captures_flag ON captures(flag_id, captured_at)";

pub const LEDGER_DB_SCHEMA_INDEX_CAPTURES_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_captures_user ON captures(captured_by_user_id)";

/// All DDL statements in creation order.
pub const LEDGER_DB_STATEMENTS: &[&str] = &[
    LEDGER_DB_SCHEMA_META,
    LEDGER_DB_SCHEMA_USERS,
    LEDGER_DB_SCHEMA_FLAG_REQUESTS,
    LEDGER_DB_SCHEMA_FLAGS,
    LEDGER_DB_SCHEMA_CAPTURES,
    LEDGER_DB_SCHEMA_INDEX_REQUESTS_USER,
    LEDGER_DB_SCHEMA_INDEX_REQUESTS_PENDING,
    LEDGER_DB_SCHEMA_INDEX_FLAGS_OWNER,
    LEDGER_DB_SCHEMA_INDEX_CAPTURES_FLAG,
    LEDGER_DB_SCHEMA_INDEX_CAPTURES_USER,
];
