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

//! Role repository
//!
//! Aggregates several providers of the same role kind. The first provider
//! that knows a code wins; later providers with the same code are shadowed.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RoleResult;
use crate::model::Role;
use crate::provider::RoleProvider;

pub struct RoleRepository<R> {
    providers: Vec<Arc<dyn RoleProvider<R>>>,
}

impl<R: Role> RoleRepository<R> {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    pub fn with_provider(mut self, provider: Arc<dyn RoleProvider<R>>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn RoleProvider<R>>] {
        &self.providers
    }
}

impl<R: Role> Default for RoleRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Role> RoleProvider<R> for RoleRepository<R> {
    fn all_roles(&self) -> Vec<Arc<R>> {
        let mut roles: BTreeMap<String, Arc<R>> = BTreeMap::new();
        for provider in &self.providers {
            for role in provider.all_roles() {
                match roles.get(role.code()) {
                    Some(winner) => warn!(
                        "{} role '{}' from '{}' is shadowed by '{}'",
                        R::KIND,
                        role.code(),
                        role.source(),
                        winner.source()
                    ),
                    None => {
                        roles.insert(role.code().to_string(), role);
                    }
                }
            }
        }
        roles.into_values().collect()
    }

    fn find_role_by_code(&self, code: &str) -> Option<Arc<R>> {
        self.providers.iter().find_map(|p| p.find_role_by_code(code))
    }

    /// Deletes from every provider that holds the code
    fn delete_role(&self, role: &R) -> bool {
        let mut removed = false;
        for provider in &self.providers {
            removed |= provider.delete_role(role);
        }
        removed
    }

    /// Refreshes every provider; stops at the first failure
    fn refresh_roles(&self) -> RoleResult<()> {
        for provider in &self.providers {
            provider.refresh_roles()?;
        }
        debug!("Refreshed {} {} role providers", self.providers.len(), R::KIND);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ResourceRoleDefinition, RoleBuilder};
    use crate::model::ResourceRole;
    use crate::provider::InMemoryRoleProvider;

    fn role(code: &str, origin: &str) -> ResourceRole {
        RoleBuilder::new()
            .build_resource_role(&ResourceRoleDefinition::new(code).with_origin(origin))
            .unwrap()
    }

    #[test]
    fn test_first_provider_wins() {
        let first = Arc::new(InMemoryRoleProvider::new());
        first.register(role("shared", "first")).unwrap();
        let second = Arc::new(InMemoryRoleProvider::new());
        second.register(role("shared", "second")).unwrap();
        second.register(role("extra", "second")).unwrap();

        let repository = RoleRepository::<ResourceRole>::new().with_provider(first).with_provider(second.clone());

        assert_eq!(repository.find_role_by_code("shared").unwrap().source(), "first");
        let all = repository.all_roles();
        assert_eq!(all.iter().map(|r| r.code()).collect::<Vec<_>>(), vec!["extra", "shared"]);
        assert_eq!(all[1].source(), "first");

        assert!(repository.delete_role(&role("shared", "any")));
        assert!(repository.find_role_by_code("shared").is_none());
        assert!(second.find_role_by_code("extra").is_some());
    }
}
