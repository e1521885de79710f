// Rolekeep
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use anyhow::{Context, Result, bail};
use rolekeep_core::SecurityConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "ROLEKEEP_CONFIG";
pub const DEFINITIONS_ENV: &str = "ROLEKEEP_DEFINITIONS";
pub const HOT_DEPLOY_ENV: &str = "ROLEKEEP_HOT_DEPLOY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Directory holding `*.toml` role definition files
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,
    #[serde(flatten)]
    pub security: SecurityConfig,
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from("roles")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            definitions_dir: default_definitions_dir(),
            security: SecurityConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.security.validate()?;
        Ok(config)
    }

    /// `--config`, then `$ROLEKEEP_CONFIG`, then defaults. The definitions
    /// directory and hot deploy flag can be overridden afterwards.
    pub fn resolve(cli_config: Option<PathBuf>, cli_definitions: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        if let Some(definitions) = cli_definitions {
            config.definitions_dir = definitions;
        } else if let Ok(env_definitions) = std::env::var(DEFINITIONS_ENV) {
            config.definitions_dir = PathBuf::from(env_definitions);
        }

        if let Ok(flag) = std::env::var(HOT_DEPLOY_ENV) {
            config.security.hot_deploy_enabled = parse_flag(&flag).with_context(|| format!("invalid {}", HOT_DEPLOY_ENV))?;
        }

        Ok(config)
    }
}

pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolekeep_core::{RoleScope, UnresolvedRolePolicy};

    #[test]
    fn test_parse_config() {
        let config = CliConfig::from_toml_str(
            r#"
            definitions_dir = "/etc/rolekeep/roles"
            hot_deploy_enabled = true
            unresolved_roles = "error"
            default_scope = "api"

            [authorities]
            resource_role_prefix = "R_"
            "#,
        )
        .unwrap();
        assert_eq!(config.definitions_dir, PathBuf::from("/etc/rolekeep/roles"));
        assert!(config.security.hot_deploy_enabled);
        assert_eq!(config.security.unresolved_roles, UnresolvedRolePolicy::Error);
        assert_eq!(config.security.default_scope, RoleScope::Api);
        assert_eq!(config.security.authorities.resource_role_prefix, "R_");
        assert_eq!(config.security.authorities.row_level_role_prefix, "ROW_LEVEL_ROLE_");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(CliConfig::from_toml_str("").unwrap(), CliConfig::default());
    }

    #[test]
    fn test_overlapping_prefixes_rejected() {
        assert!(CliConfig::from_toml_str("[authorities]\nresource_role_prefix = \"ROW_\"").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(" TRUE ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
