//! CLI struct definitions for the flagledger command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[clap(
    name = "flagledger",
    version = env!("CARGO_PKG_VERSION"),
    about = "Flag capture ledger: request flags, approve them, and record captures against a local SQLite store."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a ledger workspace in the current directory
    #[clap(name = "init")]
    Init(InitCli),

    /// Manage players and admins
    #[clap(name = "user", visible_alias = "u")]
    User(UserCli),

    /// Submit and process flag requests
    #[clap(name = "request", visible_alias = "r")]
    Request(RequestCli),

    /// Inspect and manage flags
    #[clap(name = "flag", visible_alias = "f")]
    Flag(FlagCli),

    /// Record and manage captures
    #[clap(name = "capture", visible_alias = "c")]
    Capture(CaptureCli),

    /// Per-user statistics derived from the ledger
    #[clap(name = "stats")]
    Stats(StatsCli),
}

#[derive(clap::Args, Debug)]
pub struct InitCli {
    /// Directory to initialize (defaults to current working directory).
    #[clap(short, long)]
    pub dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct UserCli {
    /// Output format for this command group.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a user.
    Add {
        #[clap(long)]
        name: String,
        #[clap(long)]
        email: String,
        /// Grant the admin role instead of the default player role.
        #[clap(long)]
        admin: bool,
    },
    /// List all users.
    List,
    /// Show one user by id.
    Show {
        #[clap(long)]
        id: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct RequestCli {
    /// Output format for this command group.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: RequestCommand,
}

#[derive(Subcommand, Debug)]
pub enum RequestCommand {
    /// Submit a flag request for a user.
    Submit {
        #[clap(long)]
        user: String,
    },
    /// List a user's own requests, newest first.
    List {
        #[clap(long)]
        user: String,
    },
    /// List every request with requester details (admin).
    ListAll {
        #[clap(long)]
        admin: String,
    },
    /// Approve a pending request and mint its flag (admin).
    Approve {
        #[clap(long)]
        id: String,
        #[clap(long)]
        admin: String,
    },
    /// Reject a pending request (admin).
    Reject {
        #[clap(long)]
        id: String,
        #[clap(long)]
        admin: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct FlagCli {
    /// Output format for this command group.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: FlagCommand,
}

#[derive(Subcommand, Debug)]
pub enum FlagCommand {
    /// Show a flag with its owner and capture history.
    Show {
        #[clap(long)]
        number: i64,
    },
    /// List flags currently held by a user.
    Mine {
        #[clap(long)]
        user: String,
    },
    /// List every flag with owner details (admin).
    ListAll {
        #[clap(long)]
        admin: String,
    },
    /// Delete a flag and its captures (admin).
    Delete {
        #[clap(long)]
        id: String,
        #[clap(long)]
        admin: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct CaptureCli {
    /// Output format for this command group.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: CaptureCommand,
}

#[derive(Subcommand, Debug)]
pub enum CaptureCommand {
    /// Record a capture of a flag by a user.
    Record {
        #[clap(long)]
        flag_number: i64,
        #[clap(long)]
        user: String,
        /// Capture timestamp (RFC 3339). Backdated values are accepted.
        #[clap(long)]
        at: String,
        #[clap(long)]
        notes: Option<String>,
        #[clap(long)]
        photo_url: Option<String>,
    },
    /// List every capture with capturer and flag details (admin).
    ListAll {
        #[clap(long)]
        admin: String,
    },
    /// Delete a capture and revert flag ownership (admin).
    Delete {
        #[clap(long)]
        id: String,
        #[clap(long)]
        admin: String,
    },
}

#[derive(clap::Args, Debug)]
pub struct StatsCli {
    /// Output format.
    #[clap(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// User to compute statistics for.
    #[clap(long)]
    pub user: String,
}
