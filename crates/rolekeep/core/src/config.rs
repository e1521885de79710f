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

//! Security Configuration
//!
//! Settings shared by providers, the authority mapper and the current-user
//! resolver. Loaded from TOML; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RoleError, RoleResult};
use crate::model::RoleScope;

/// Default authority prefix for resource roles
pub const DEFAULT_RESOURCE_ROLE_PREFIX: &str = "ROLE_";
/// Default authority prefix for row-level roles
pub const DEFAULT_ROW_LEVEL_ROLE_PREFIX: &str = "ROW_LEVEL_ROLE_";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Allow `refresh_roles()` to rescan definition sources at runtime
    pub hot_deploy_enabled: bool,
    /// Authority string prefixes
    pub authorities: AuthorityConfig,
    /// What to do with an authority that names an unknown role
    pub unresolved_roles: UnresolvedRolePolicy,
    /// Scope used when the caller does not request one
    pub default_scope: RoleScope,
}

/// Authority prefixes for the two role kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    pub resource_role_prefix: String,
    pub row_level_role_prefix: String,
}

/// Handling of stale role references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedRolePolicy {
    /// Drop the reference and log a warning
    #[default]
    Skip,
    /// Fail the resolution
    Error,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hot_deploy_enabled: false,
            authorities: AuthorityConfig::default(),
            unresolved_roles: UnresolvedRolePolicy::Skip,
            default_scope: RoleScope::Ui,
        }
    }
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            resource_role_prefix: DEFAULT_RESOURCE_ROLE_PREFIX.to_string(),
            row_level_role_prefix: DEFAULT_ROW_LEVEL_ROLE_PREFIX.to_string(),
        }
    }
}

impl SecurityConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> RoleResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| RoleError::SourceIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            RoleError::SourceParse { reason, .. } => RoleError::SourceParse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> RoleResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| RoleError::SourceParse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RoleResult<()> {
        self.authorities.validate()
    }
}

impl AuthorityConfig {
    /// Both prefixes must be non-empty and neither may start the other,
    /// otherwise a decoded authority could belong to either kind.
    pub fn validate(&self) -> RoleResult<()> {
        let resource = self.resource_role_prefix.as_str();
        let row_level = self.row_level_role_prefix.as_str();
        if resource.is_empty() || row_level.is_empty() {
            return Err(RoleError::InvalidAuthorityPrefixes {
                reason: "prefixes must not be empty".to_string(),
            });
        }
        if resource.starts_with(row_level) || row_level.starts_with(resource) {
            return Err(RoleError::InvalidAuthorityPrefixes {
                reason: format!("'{}' and '{}' overlap", resource, row_level),
            });
        }
        Ok(())
    }
}
