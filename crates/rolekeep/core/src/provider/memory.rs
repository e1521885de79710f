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

//! Roles registered at runtime

use std::sync::Arc;
use tracing::debug;

use super::{RoleProvider, RoleRegistry};
use crate::error::{RoleError, RoleResult};
use crate::model::Role;

/// Provider for roles created in code rather than declared in a source
pub struct InMemoryRoleProvider<R> {
    registry: RoleRegistry<R>,
}

impl<R: Role + PartialEq> InMemoryRoleProvider<R> {
    pub fn new() -> Self {
        Self { registry: RoleRegistry::new() }
    }

    /// Register a role. Registering the same role twice is a no-op; a
    /// different role under a taken code is rejected.
    pub fn register(&self, role: R) -> RoleResult<()> {
        self.registry.modify(|map| match map.get(role.code()) {
            Some(existing) if **existing == role => Ok(()),
            Some(_) => Err(RoleError::AlreadyRegistered {
                kind: R::KIND,
                code: role.code().to_string(),
            }),
            None => {
                debug!("Registered {} role '{}'", R::KIND, role.code());
                map.insert(role.code().to_string(), Arc::new(role));
                Ok(())
            }
        })
    }
}

impl<R: Role + PartialEq> Default for InMemoryRoleProvider<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Role + PartialEq> RoleProvider<R> for InMemoryRoleProvider<R> {
    fn all_roles(&self) -> Vec<Arc<R>> {
        self.registry.all()
    }

    fn find_role_by_code(&self, code: &str) -> Option<Arc<R>> {
        self.registry.get(code)
    }

    fn delete_role(&self, role: &R) -> bool {
        self.registry.modify(|map| map.remove(role.code()).is_some())
    }

    fn refresh_roles(&self) -> RoleResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ResourceRoleDefinition, RoleBuilder};
    use crate::model::{EntityPolicyAction, ResourceRole};

    fn role(definition: ResourceRoleDefinition) -> ResourceRole {
        RoleBuilder::new().build_resource_role(&definition).unwrap()
    }

    #[test]
    fn test_register_is_idempotent_for_identical_role() {
        let provider = InMemoryRoleProvider::new();
        let definition = ResourceRoleDefinition::new("reader").allow_entity("*", [EntityPolicyAction::Read]);
        provider.register(role(definition.clone())).unwrap();
        provider.register(role(definition)).unwrap();
        assert_eq!(provider.all_roles().len(), 1);
    }

    #[test]
    fn test_register_rejects_conflicting_role() {
        let provider = InMemoryRoleProvider::new();
        provider.register(role(ResourceRoleDefinition::new("reader"))).unwrap();
        let err = provider.register(role(ResourceRoleDefinition::new("reader").with_name("Other"))).unwrap_err();
        assert!(matches!(err, RoleError::AlreadyRegistered { ref code, .. } if code == "reader"));
    }

    #[test]
    fn test_delete_and_refresh() {
        let provider = InMemoryRoleProvider::new();
        let reader = role(ResourceRoleDefinition::new("reader"));
        provider.register(reader.clone()).unwrap();
        assert!(provider.delete_role(&reader));
        provider.refresh_roles().unwrap();
        assert!(provider.find_role_by_code("reader").is_none());
    }
}
