//! Store handle for the ledger's state workspace.
//!
//! A Store is the logical container for `ledger.db` and the mutation audit
//! log. All ledger operations are scoped to a store root, discovered by
//! upward search for a `.flagledger/` directory.

use std::path::PathBuf;

/// Handle to a ledger state workspace (`<project>/.flagledger/data/`).
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory.
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}
