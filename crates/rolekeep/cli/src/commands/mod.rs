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

pub mod authority;
pub mod check;
pub mod query;
pub mod resolve;
pub mod roles;

use anyhow::{Context, Result, anyhow};
use rolekeep_core::{
    AccessManager, AuthenticatedUser, CurrentUserRolesResolver, DefinitionResourceRoleProvider, DefinitionRowLevelRoleProvider, DirectoryDefinitionSource, RoleBuilder,
    RoleScope,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::UserArgs;
use crate::config::CliConfig;

/// Shared state for commands that evaluate role definitions
pub struct CommandContext {
    pub config: CliConfig,
    pub resource_roles: Arc<DefinitionResourceRoleProvider>,
    pub row_level_roles: Arc<DefinitionRowLevelRoleProvider>,
    pub access: AccessManager,
}

impl CommandContext {
    pub fn new(config: CliConfig) -> Result<Self> {
        let source = Arc::new(DirectoryDefinitionSource::new(&config.definitions_dir));
        let builder = RoleBuilder::new();
        let resource_roles = Arc::new(DefinitionResourceRoleProvider::new(source.clone(), builder.clone(), &config.security)?);
        let row_level_roles = Arc::new(DefinitionRowLevelRoleProvider::new(source, builder, &config.security)?);
        let resolver = CurrentUserRolesResolver::new(&config.security, resource_roles.clone(), row_level_roles.clone())?;
        info!("Using role definitions from {}", config.definitions_dir.display());
        Ok(Self {
            config,
            resource_roles,
            row_level_roles,
            access: AccessManager::new(Arc::new(resolver)),
        })
    }

    pub fn scope(&self, user: &UserArgs) -> RoleScope {
        user.scope.map(RoleScope::from).unwrap_or(self.config.security.default_scope)
    }
}

/// Build the authentication described on the command line
pub fn authenticated_user(args: &UserArgs) -> Result<AuthenticatedUser> {
    let mut user = AuthenticatedUser::new(args.user.as_str());
    for authority in &args.authorities {
        user = user.with_authority(authority.as_str());
    }
    for attribute in &args.attributes {
        let (name, value) = parse_attribute(attribute).with_context(|| format!("invalid --attribute '{}'", attribute))?;
        user = user.with_attribute(name, value);
    }
    Ok(user)
}

fn parse_attribute(input: &str) -> Result<(String, Value)> {
    let (name, raw) = input.split_once('=').ok_or_else(|| anyhow!("expected key=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("attribute name is empty"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

pub fn verdict(permitted: bool) -> &'static str {
    if permitted { "permitted" } else { "denied" }
}
