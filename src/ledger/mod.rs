//! The Ownership Ledger: the consistency-preserving set of operations over
//! flag requests, flags, and captures.
//!
//! Invariants maintained here:
//! - a flag's current owner equals the capturer of its most recent capture,
//!   or the original requester when no captures exist;
//! - a flag's current owner can never capture it (no self-capture);
//! - deleting a capture reverts ownership to the next-most-recent holder;
//! - flag numbers are assigned sequentially and never reused, even after
//!   deletion.

pub mod captures;
pub mod flags;
pub mod requests;
pub mod stats;
pub mod users;
