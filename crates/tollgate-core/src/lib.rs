//! # tollgate-core
//!
//! Shared configuration types for Tollgate.
//!
//! Configuration is loaded once from a YAML file (`tollgate.yaml`) and the
//! resulting snapshot is treated as immutable for the lifetime of a query
//! evaluation. The permission flags all default to `false` so that a missing
//! or partial configuration denies writes rather than permitting them.

// Configuration types shared across all Tollgate crates
pub mod config;

pub use config::{
    ConfigError, DenylistEntry, GateConfig, PermissionsConfig, PoolConfig, UpstreamConfig,
};
