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

//! Current-user role resolution
//!
//! Maps the granted authorities of an authentication to resource and
//! row-level roles, expands child roles and applies the configured handling
//! of codes that no provider knows.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::authority::{AuthorityRole, RoleAuthorityMapper};
use crate::config::{SecurityConfig, UnresolvedRolePolicy};
use crate::error::{RoleError, RoleResult};
use crate::model::{ResourceRole, Role, RoleScope, RowLevelRole};
use crate::principal::Authentication;
use crate::provider::RoleProvider;

/// Roles held by one user
#[derive(Debug, Clone, Default)]
pub struct ResolvedRoles {
    /// Direct roles in authority order, followed by their children
    pub resource_roles: Vec<Arc<ResourceRole>>,
    pub row_level_roles: Vec<Arc<RowLevelRole>>,
}

impl ResolvedRoles {
    pub fn is_empty(&self) -> bool {
        self.resource_roles.is_empty() && self.row_level_roles.is_empty()
    }
}

pub struct CurrentUserRolesResolver {
    mapper: RoleAuthorityMapper,
    resource_roles: Arc<dyn RoleProvider<ResourceRole>>,
    row_level_roles: Arc<dyn RoleProvider<RowLevelRole>>,
    unresolved_roles: UnresolvedRolePolicy,
    default_scope: RoleScope,
}

impl CurrentUserRolesResolver {
    pub fn new(config: &SecurityConfig, resource_roles: Arc<dyn RoleProvider<ResourceRole>>, row_level_roles: Arc<dyn RoleProvider<RowLevelRole>>) -> RoleResult<Self> {
        Ok(Self {
            mapper: RoleAuthorityMapper::new(config.authorities.clone())?,
            resource_roles,
            row_level_roles,
            unresolved_roles: config.unresolved_roles,
            default_scope: config.default_scope,
        })
    }

    pub fn mapper(&self) -> &RoleAuthorityMapper {
        &self.mapper
    }

    pub fn default_scope(&self) -> RoleScope {
        self.default_scope
    }

    pub fn resource_role_provider(&self) -> &Arc<dyn RoleProvider<ResourceRole>> {
        &self.resource_roles
    }

    pub fn row_level_role_provider(&self) -> &Arc<dyn RoleProvider<RowLevelRole>> {
        &self.row_level_roles
    }

    /// Resolve for the default scope
    pub fn resolve(&self, auth: &dyn Authentication) -> RoleResult<ResolvedRoles> {
        self.resolve_for_scope(auth, self.default_scope)
    }

    /// Resolve both kinds; resource roles outside `scope` are dropped
    pub fn resolve_for_scope(&self, auth: &dyn Authentication, scope: RoleScope) -> RoleResult<ResolvedRoles> {
        let mut resource_codes = Vec::new();
        let mut row_level_codes = Vec::new();
        for authority in auth.authorities() {
            match self.mapper.decode(authority) {
                Some(AuthorityRole::Resource(code)) => resource_codes.push(code),
                Some(AuthorityRole::RowLevel(code)) => row_level_codes.push(code),
                None => {}
            }
        }

        let mut resource_roles = self.expand(self.resource_roles.as_ref(), &resource_codes)?;
        resource_roles.retain(|role| role.has_scope(scope));
        let row_level_roles = self.expand(self.row_level_roles.as_ref(), &row_level_codes)?;

        debug!(
            user = auth.username(),
            %scope,
            "Resolved {} resource and {} row-level roles",
            resource_roles.len(),
            row_level_roles.len()
        );
        Ok(ResolvedRoles {
            resource_roles,
            row_level_roles,
        })
    }

    pub fn resource_roles(&self, auth: &dyn Authentication, scope: RoleScope) -> RoleResult<Vec<Arc<ResourceRole>>> {
        Ok(self.resolve_for_scope(auth, scope)?.resource_roles)
    }

    pub fn row_level_roles(&self, auth: &dyn Authentication) -> RoleResult<Vec<Arc<RowLevelRole>>> {
        Ok(self.resolve(auth)?.row_level_roles)
    }

    /// Direct roles first, then children depth-first; each code once
    fn expand<R: Role>(&self, provider: &dyn RoleProvider<R>, codes: &[&str]) -> RoleResult<Vec<Arc<R>>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut direct = Vec::with_capacity(codes.len());
        for code in codes {
            if !visited.insert(code.to_string()) {
                continue;
            }
            if let Some(role) = self.lookup(provider, code)? {
                direct.push(role);
            }
        }

        let mut roles = direct.clone();
        for role in &direct {
            self.expand_children(provider, role, &mut visited, &mut roles)?;
        }
        Ok(roles)
    }

    fn expand_children<R: Role>(&self, provider: &dyn RoleProvider<R>, parent: &Arc<R>, visited: &mut HashSet<String>, roles: &mut Vec<Arc<R>>) -> RoleResult<()> {
        for child in parent.child_roles() {
            if !visited.insert(child.clone()) {
                continue;
            }
            if let Some(role) = self.lookup(provider, child)? {
                roles.push(Arc::clone(&role));
                self.expand_children(provider, &role, visited, roles)?;
            }
        }
        Ok(())
    }

    fn lookup<R: Role>(&self, provider: &dyn RoleProvider<R>, code: &str) -> RoleResult<Option<Arc<R>>> {
        match provider.find_role_by_code(code) {
            Some(role) => Ok(Some(role)),
            None => match self.unresolved_roles {
                UnresolvedRolePolicy::Skip => {
                    warn!("Skipping unknown {} role '{}'", R::KIND, code);
                    Ok(None)
                }
                UnresolvedRolePolicy::Error => Err(RoleError::UnresolvedRole {
                    kind: R::KIND,
                    code: code.to_string(),
                }),
            },
        }
    }
}
