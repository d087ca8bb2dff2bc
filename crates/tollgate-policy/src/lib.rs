//! # tollgate-policy
//!
//! Denylist policy evaluation for Tollgate.
//!
//! Given the table references extracted from a statement and the configured
//! denylist, this crate decides whether the statement may proceed. The
//! engine fails closed: SQL that cannot be parsed is blocked, and in
//! multi-schema mode so is any table reference whose schema cannot be
//! determined. Decisions are values, produced fresh per query and never
//! cached.

pub mod denylist;

pub use denylist::{DenylistPolicy, PolicyDecision};
