//! Configuration types for the Tollgate gateway.
//!
//! Configuration can be loaded from a YAML file (`tollgate.yaml`) and combined
//! into a single [`GateConfig`] structure:
//!
//! - **upstream**: the MySQL server to mediate access to
//! - **permissions**: per-operation allow flags, the table denylist, the
//!   default schema, and the multi-schema flag

pub mod permissions;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use permissions::{DenylistEntry, PermissionsConfig};
pub use upstream::{PoolConfig, UpstreamConfig};

/// Complete Tollgate configuration loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GateConfig {
    /// Project name.
    #[serde(default)]
    pub project: Option<String>,

    /// Upstream MySQL connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Permission flags and the table denylist.
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

impl GateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: GateConfig = serde_yaml::from_str(&raw)?;
        Ok(config)
    }

    /// The permissions snapshot with the default schema resolved.
    ///
    /// When `permissions.default_schema` is not set explicitly, the upstream
    /// database name (if any) serves as the default schema for resolving
    /// unqualified table references.
    pub fn effective_permissions(&self) -> PermissionsConfig {
        let mut permissions = self.permissions.clone();
        if permissions.default_schema.is_none() {
            permissions.default_schema = self.upstream.database.clone();
        }
        permissions
    }
}

/// Errors that can occur while loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for the expected shape.
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A denylist entry could not be parsed.
    #[error("invalid denylist entry '{entry}': expected 'table' or 'schema.table'")]
    InvalidDenylistEntry { entry: String },

    /// A referenced environment variable is not set.
    #[error("environment variable {name} is not set")]
    MissingEnv { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let yaml = r#"
upstream:
  host: db.internal
  database: prod
"#;
        let config: GateConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.upstream.host, "db.internal");
        assert_eq!(config.upstream.database.as_deref(), Some("prod"));

        // All write permissions default to denied.
        assert!(!config.permissions.allow_insert);
        assert!(!config.permissions.allow_update);
        assert!(!config.permissions.allow_delete);
        assert!(!config.permissions.allow_ddl);
        assert!(config.permissions.denylist.is_empty());
    }

    #[test]
    fn effective_permissions_falls_back_to_upstream_database() {
        let yaml = r#"
upstream:
  database: prod
permissions:
  denylist:
    - users
"#;
        let config: GateConfig = serde_yaml::from_str(yaml).unwrap();
        let permissions = config.effective_permissions();
        assert_eq!(permissions.default_schema.as_deref(), Some("prod"));
    }

    #[test]
    fn explicit_default_schema_wins() {
        let yaml = r#"
upstream:
  database: prod
permissions:
  default_schema: analytics
"#;
        let config: GateConfig = serde_yaml::from_str(yaml).unwrap();
        let permissions = config.effective_permissions();
        assert_eq!(permissions.default_schema.as_deref(), Some("analytics"));
    }
}
