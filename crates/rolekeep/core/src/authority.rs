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

//! Authority mapping
//!
//! Roles reach a user as granted authority strings: the role code behind a
//! kind-specific prefix. The mapping is a bijection within each kind, and the
//! validated prefixes keep the two kinds from colliding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::AuthorityConfig;
use crate::error::RoleResult;

/// Authority string granted to a user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantedAuthority(String);

impl GrantedAuthority {
    pub fn new(authority: impl Into<String>) -> Self {
        Self(authority.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GrantedAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GrantedAuthority {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GrantedAuthority {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Role named by an authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityRole<'a> {
    Resource(&'a str),
    RowLevel(&'a str),
}

/// Encodes role codes as authorities and decodes them back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAuthorityMapper {
    config: AuthorityConfig,
}

impl RoleAuthorityMapper {
    pub fn new(config: AuthorityConfig) -> RoleResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn resource_role_authority(&self, code: &str) -> GrantedAuthority {
        GrantedAuthority(format!("{}{}", self.config.resource_role_prefix, code))
    }

    pub fn row_level_role_authority(&self, code: &str) -> GrantedAuthority {
        GrantedAuthority(format!("{}{}", self.config.row_level_role_prefix, code))
    }

    /// Role code behind an authority, or `None` for authorities that are not roles
    pub fn decode<'a>(&self, authority: &'a GrantedAuthority) -> Option<AuthorityRole<'a>> {
        let value = authority.as_str();
        if let Some(code) = value.strip_prefix(self.config.resource_role_prefix.as_str()) {
            return (!code.is_empty()).then_some(AuthorityRole::Resource(code));
        }
        if let Some(code) = value.strip_prefix(self.config.row_level_role_prefix.as_str()) {
            return (!code.is_empty()).then_some(AuthorityRole::RowLevel(code));
        }
        None
    }
}

impl Default for RoleAuthorityMapper {
    fn default() -> Self {
        Self {
            config: AuthorityConfig::default(),
        }
    }
}
