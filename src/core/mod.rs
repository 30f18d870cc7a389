//! Core modules: shared primitives for the flag ledger.

pub mod authz;
pub mod broker;
pub mod db;
pub mod error;
pub mod schemas;
pub mod store;
pub mod time;
