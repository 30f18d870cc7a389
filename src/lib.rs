//! flagledger: a local-first ownership ledger for physical flag games.
//!
//! Players request flags, admins approve or reject the requests, and whoever
//! finds a flag in the field records a capture to take ownership. All state
//! lives in a project-local SQLite database; every mutation runs as a single
//! transaction and is recorded in an append-only audit log.
//!
//! # Architecture
//!
//! - [`core`]: shared primitives (store handle, DB access, broker, errors,
//!   authorization policy)
//! - [`ledger`]: the ownership ledger operations (requests, flags, captures,
//!   stats, users)
//!
//! The CLI is the transport: every ledger operation is exposed as a
//! subcommand, with `--format json` envelopes for machine consumption.
//!
//! # Consistency
//!
//! All writes route through the `DbBroker` thin waist: serialized in-process,
//! executed inside IMMEDIATE transactions, and appended to
//! `ledger.audit.jsonl`. Flag numbers are minted from a persisted high-water
//! mark inside the approval transaction, with a UNIQUE constraint as the
//! safety net; a constraint hit surfaces as a retryable `Conflict`, never
//! corrupt state.

pub mod cli;
pub mod core;
pub mod ledger;

use crate::cli::{
    CaptureCli, CaptureCommand, Cli, Command, FlagCli, FlagCommand, InitCli, OutputFormat,
    RequestCli, RequestCommand, StatsCli, UserCli, UserCommand,
};
use crate::core::authz::{self, Actor, Role};
use crate::core::error::LedgerError;
use crate::core::store::Store;
use crate::core::{db, time};
use crate::ledger::{captures, flags, requests, stats, users};

use clap::Parser;
use colored::Colorize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

const WORKSPACE_DIR: &str = ".flagledger";

fn find_project_root(start_dir: &Path) -> Result<PathBuf, LedgerError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(WORKSPACE_DIR).exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(LedgerError::NotFound(format!(
                "'{}' directory not found in current or parent directories. Run `flagledger init` first.",
                WORKSPACE_DIR
            )));
        }
    }
}

fn run_init(init: InitCli) -> Result<(), LedgerError> {
    let target_dir = match init.dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    let target_dir = std::fs::canonicalize(&target_dir).map_err(LedgerError::IoError)?;

    let store_root = target_dir.join(WORKSPACE_DIR).join("data");
    std::fs::create_dir_all(&store_root).map_err(LedgerError::IoError)?;

    let db_path = db::ledger_db_path(&store_root);
    let existed = db_path.exists();
    db::initialize_ledger_db(&store_root)?;

    if existed {
        println!(
            "{} {} {}",
            "✓".bright_green(),
            "ledger.db".bright_white(),
            "(preserved - existing data kept)".bright_black()
        );
    } else {
        println!("{} {}", "●".bright_green(), "ledger.db".bright_white());
    }
    println!(
        "Ledger workspace ready at {}",
        store_root.display().to_string().bright_cyan()
    );
    Ok(())
}

/// Resolve a caller id to an actor with its stored role.
fn resolve_actor(store: &Store, user_id: &str) -> Result<Actor, LedgerError> {
    let conn = db::db_connect(&db::ledger_db_path(&store.root).to_string_lossy())?;
    authz::resolve_actor(&conn, user_id)
}

pub fn run() -> Result<(), LedgerError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Init(init) => run_init(init),
        other => {
            let project_root = find_project_root(&current_dir)?;
            let store = Store::new(project_root.join(WORKSPACE_DIR).join("data"));
            db::initialize_ledger_db(&store.root)?;

            match other {
                Command::User(user_cli) => run_user_cli(&store, user_cli),
                Command::Request(request_cli) => run_request_cli(&store, request_cli),
                Command::Flag(flag_cli) => run_flag_cli(&store, flag_cli),
                Command::Capture(capture_cli) => run_capture_cli(&store, capture_cli),
                Command::Stats(stats_cli) => run_stats_cli(&store, stats_cli),
                Command::Init(_) => unreachable!(),
            }
        }
    }
}

fn print_envelope(format: OutputFormat, envelope: &JsonValue, text: impl FnOnce()) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(envelope) {
            Ok(s) => println!("{}", s),
            Err(_) => println!("{}", envelope),
        },
        OutputFormat::Text => text(),
    }
}

fn run_user_cli(store: &Store, cli: UserCli) -> Result<(), LedgerError> {
    match cli.command {
        UserCommand::Add { name, email, admin } => {
            let role = if admin { Role::Admin } else { Role::Player };
            let user = users::add_user(store, &name, &email, role)?;
            let envelope =
                time::command_envelope("user.add", "ok", serde_json::json!({ "user": &user }));
            print_envelope(cli.format, &envelope, || {
                println!(
                    "{} Registered {} <{}> as {} (id: {})",
                    "✓".bright_green(),
                    user.name.bright_white(),
                    user.email,
                    user.role.as_str().bright_cyan(),
                    user.id
                );
            });
        }
        UserCommand::List => {
            let items = users::list_users(store)?;
            let envelope =
                time::command_envelope("user.list", "ok", serde_json::json!({ "users": &items }));
            print_envelope(cli.format, &envelope, || {
                if items.is_empty() {
                    println!("No users registered.");
                    return;
                }
                for u in &items {
                    println!("- {} [{}] {} <{}>", u.id, u.role.as_str(), u.name, u.email);
                }
            });
        }
        UserCommand::Show { id } => {
            let user = users::get_user(store, &id)?;
            let envelope =
                time::command_envelope("user.show", "ok", serde_json::json!({ "user": &user }));
            print_envelope(cli.format, &envelope, || {
                println!(
                    "{} [{}] {} <{}> since {}",
                    user.id,
                    user.role.as_str(),
                    user.name,
                    user.email,
                    user.created_at
                );
            });
        }
    }
    Ok(())
}

fn run_request_cli(store: &Store, cli: RequestCli) -> Result<(), LedgerError> {
    match cli.command {
        RequestCommand::Submit { user } => {
            let actor = resolve_actor(store, &user)?;
            let request = requests::submit_request(store, &actor)?;
            let envelope = time::command_envelope(
                "request.submit",
                "ok",
                serde_json::json!({ "request": &request }),
            );
            print_envelope(cli.format, &envelope, || {
                println!(
                    "{} Flag request {} submitted for {} (pending admin review)",
                    "✓".bright_green(),
                    request.id.bright_white(),
                    actor.name
                );
            });
        }
        RequestCommand::List { user } => {
            let items = requests::list_requests_for(store, &user)?;
            let envelope = time::command_envelope(
                "request.list",
                "ok",
                serde_json::json!({ "requests": &items }),
            );
            print_envelope(cli.format, &envelope, || {
                if items.is_empty() {
                    println!("No flag requests.");
                    return;
                }
                for r in &items {
                    println!(
                        "- {} [{}] requested {}",
                        r.id,
                        r.status.as_str(),
                        r.requested_at
                    );
                }
            });
        }
        RequestCommand::ListAll { admin } => {
            let actor = resolve_actor(store, &admin)?;
            let items = requests::list_all_requests(store, &actor)?;
            let envelope = time::command_envelope(
                "request.list_all",
                "ok",
                serde_json::json!({ "requests": &items }),
            );
            print_envelope(cli.format, &envelope, || {
                if items.is_empty() {
                    println!("No flag requests.");
                    return;
                }
                for r in &items {
                    println!(
                        "- {} [{}] by {} ({})",
                        r.request.id,
                        r.request.status.as_str(),
                        r.requested_by_name.as_deref().unwrap_or("?"),
                        r.requested_by_email.as_deref().unwrap_or("?")
                    );
                }
            });
        }
        RequestCommand::Approve { id, admin } => {
            let actor = resolve_actor(store, &admin)?;
            let flag_number = requests::approve_request(store, &id, &actor)?;
            let envelope = time::command_envelope(
                "request.approve",
                "ok",
                serde_json::json!({ "flag_number": flag_number }),
            );
            print_envelope(cli.format, &envelope, || {
                println!(
                    "{} Request approved: flag {} minted",
                    "✓".bright_green(),
                    format!("#{}", flag_number).bright_white().bold()
                );
            });
        }
        RequestCommand::Reject { id, admin } => {
            let actor = resolve_actor(store, &admin)?;
            requests::reject_request(store, &id, &actor)?;
            let envelope = time::command_envelope("request.reject", "ok", serde_json::json!({}));
            print_envelope(cli.format, &envelope, || {
                println!("{} Request {} rejected", "✓".bright_green(), id);
            });
        }
    }
    Ok(())
}

fn run_flag_cli(store: &Store, cli: FlagCli) -> Result<(), LedgerError> {
    match cli.command {
        FlagCommand::Show { number } => {
            let view = flags::get_flag(store, number)?;
            let envelope =
                time::command_envelope("flag.show", "ok", serde_json::json!({ "flag": &view }));
            print_envelope(cli.format, &envelope, || {
                println!(
                    "Flag {} held by {} (original requester: {})",
                    format!("#{}", view.flag.flag_number).bright_white().bold(),
                    view.current_owner_name.as_deref().unwrap_or("?"),
                    view.flag.original_requester_id
                );
                if view.capture_history.is_empty() {
                    println!("  never captured");
                }
                for c in &view.capture_history {
                    println!(
                        "  {} captured by {} ({})",
                        c.capture.captured_at,
                        c.captured_by_name.as_deref().unwrap_or("?"),
                        c.capture.id
                    );
                }
            });
        }
        FlagCommand::Mine { user } => {
            let items = flags::list_flags_owned_by(store, &user)?;
            let envelope =
                time::command_envelope("flag.mine", "ok", serde_json::json!({ "flags": &items }));
            print_envelope(cli.format, &envelope, || {
                if items.is_empty() {
                    println!("No flags held.");
                    return;
                }
                for f in &items {
                    println!(
                        "- #{} (last captured: {})",
                        f.flag_number,
                        f.last_captured_at.as_deref().unwrap_or("never")
                    );
                }
            });
        }
        FlagCommand::ListAll { admin } => {
            let actor = resolve_actor(store, &admin)?;
            let items = flags::list_all_flags(store, &actor)?;
            let envelope = time::command_envelope(
                "flag.list_all",
                "ok",
                serde_json::json!({ "flags": &items }),
            );
            print_envelope(cli.format, &envelope, || {
                if items.is_empty() {
                    println!("No flags minted.");
                    return;
                }
                for f in &items {
                    println!(
                        "- #{} held by {} ({})",
                        f.flag.flag_number,
                        f.owner_name.as_deref().unwrap_or("?"),
                        f.flag.id
                    );
                }
            });
        }
        FlagCommand::Delete { id, admin } => {
            let actor = resolve_actor(store, &admin)?;
            flags::delete_flag(store, &id, &actor)?;
            let envelope = time::command_envelope("flag.delete", "ok", serde_json::json!({}));
            print_envelope(cli.format, &envelope, || {
                println!(
                    "{} Flag {} deleted (captures removed with it)",
                    "✓".bright_green(),
                    id
                );
            });
        }
    }
    Ok(())
}

fn run_capture_cli(store: &Store, cli: CaptureCli) -> Result<(), LedgerError> {
    match cli.command {
        CaptureCommand::Record {
            flag_number,
            user,
            at,
            notes,
            photo_url,
        } => {
            let actor = resolve_actor(store, &user)?;
            let capture = captures::record_capture(
                store,
                flag_number,
                &actor,
                &at,
                notes.as_deref(),
                photo_url.as_deref(),
            )?;
            let envelope = time::command_envelope(
                "capture.record",
                "ok",
                serde_json::json!({ "capture": &capture, "flag_number": flag_number }),
            );
            print_envelope(cli.format, &envelope, || {
                println!(
                    "{} Flag {} captured by {} at {}",
                    "✓".bright_green(),
                    format!("#{}", flag_number).bright_white().bold(),
                    actor.name,
                    capture.captured_at
                );
            });
        }
        CaptureCommand::ListAll { admin } => {
            let actor = resolve_actor(store, &admin)?;
            let items = captures::list_all_captures(store, &actor)?;
            let envelope = time::command_envelope(
                "capture.list_all",
                "ok",
                serde_json::json!({ "captures": &items }),
            );
            print_envelope(cli.format, &envelope, || {
                if items.is_empty() {
                    println!("No captures recorded.");
                    return;
                }
                for c in &items {
                    println!(
                        "- {} flag #{} by {} at {}",
                        c.capture.id,
                        c.flag_number.map_or("?".to_string(), |n| n.to_string()),
                        c.captured_by_name.as_deref().unwrap_or("?"),
                        c.capture.captured_at
                    );
                }
            });
        }
        CaptureCommand::Delete { id, admin } => {
            let actor = resolve_actor(store, &admin)?;
            captures::delete_capture(store, &id, &actor)?;
            let envelope = time::command_envelope("capture.delete", "ok", serde_json::json!({}));
            print_envelope(cli.format, &envelope, || {
                println!(
                    "{} Capture {} deleted, flag ownership reverted",
                    "✓".bright_green(),
                    id
                );
            });
        }
    }
    Ok(())
}

fn run_stats_cli(store: &Store, cli: StatsCli) -> Result<(), LedgerError> {
    // Resolving the actor doubles as the "user exists" check.
    let actor = resolve_actor(store, &cli.user)?;
    let s = stats::compute_stats(store, &actor.id)?;
    let envelope = time::command_envelope("stats", "ok", serde_json::json!({ "stats": &s }));
    print_envelope(cli.format, &envelope, || {
        println!("Stats for {}:", actor.name.bright_white());
        println!("  flags owned:     {}", s.flags_owned);
        println!("  total captures:  {}", s.total_captures);
        println!("  flags requested: {}", s.flags_requested);
    });
    Ok(())
}
