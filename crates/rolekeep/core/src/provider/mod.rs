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

//! # Role Providers
//!
//! A provider owns a [`RoleRegistry`]: a code to role map published as an
//! immutable snapshot. Readers clone the snapshot handle and never hold a lock
//! while they inspect it; writers build a complete new map and swap it in.

pub mod definition;
pub mod memory;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::{RoleBuilder, RoleDefinitionSource};
use crate::error::{RoleError, RoleResult};
use crate::model::{ResourceRole, Role, RowLevelRole};

pub use definition::{DefinitionResourceRoleProvider, DefinitionRoleProvider, DefinitionRowLevelRoleProvider};
pub use memory::InMemoryRoleProvider;

/// Source of roles of one kind
pub trait RoleProvider<R: Role>: Send + Sync {
    /// All roles, ordered by code
    fn all_roles(&self) -> Vec<Arc<R>>;

    fn find_role_by_code(&self, code: &str) -> Option<Arc<R>>;

    /// Remove a role from the in-memory registry. Returns whether it was present.
    fn delete_role(&self, role: &R) -> bool;

    /// Rebuild the registry from the provider's source
    fn refresh_roles(&self) -> RoleResult<()>;
}

pub(crate) type RoleMap<R> = HashMap<String, Arc<R>>;

/// Copy-on-write role map
pub struct RoleRegistry<R> {
    snapshot: RwLock<Arc<RoleMap<R>>>,
}

impl<R: Role> RoleRegistry<R> {
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    pub(crate) fn from_map(map: RoleMap<R>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(map)),
        }
    }

    /// Current complete map
    pub fn snapshot(&self) -> Arc<RoleMap<R>> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn get(&self, code: &str) -> Option<Arc<R>> {
        self.snapshot().get(code).cloned()
    }

    pub fn all(&self) -> Vec<Arc<R>> {
        let mut roles: Vec<Arc<R>> = self.snapshot().values().cloned().collect();
        roles.sort_by(|a, b| a.code().cmp(b.code()));
        roles
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publish a new map in one step
    pub(crate) fn replace(&self, map: RoleMap<R>) {
        *self.snapshot.write() = Arc::new(map);
    }

    /// Derive a new map from the current one under the write lock
    pub(crate) fn modify<T>(&self, f: impl FnOnce(&mut RoleMap<R>) -> T) -> T {
        let mut guard = self.snapshot.write();
        let mut next = (**guard).clone();
        let result = f(&mut next);
        *guard = Arc::new(next);
        result
    }
}

impl<R: Role> Default for RoleRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Index roles by code, rejecting duplicates
pub(crate) fn build_role_map<R: Role>(roles: Vec<R>) -> RoleResult<RoleMap<R>> {
    let mut map: RoleMap<R> = HashMap::with_capacity(roles.len());
    for role in roles {
        if let Some(existing) = map.get(role.code()) {
            return Err(RoleError::DuplicateRoleCode {
                kind: R::KIND,
                code: role.code().to_string(),
                first: existing.source().to_string(),
                second: role.source().to_string(),
            });
        }
        map.insert(role.code().to_string(), Arc::new(role));
    }
    Ok(map)
}

/// A role kind that can be built from a definition source
pub trait DefinedRole: Role + Sized {
    fn load(source: &dyn RoleDefinitionSource, builder: &RoleBuilder) -> RoleResult<Vec<Self>>;
}

impl DefinedRole for ResourceRole {
    fn load(source: &dyn RoleDefinitionSource, builder: &RoleBuilder) -> RoleResult<Vec<Self>> {
        source.resource_role_definitions()?.iter().map(|d| builder.build_resource_role(d)).collect()
    }
}

impl DefinedRole for RowLevelRole {
    fn load(source: &dyn RoleDefinitionSource, builder: &RoleBuilder) -> RoleResult<Vec<Self>> {
        source.row_level_role_definitions()?.iter().map(|d| builder.build_row_level_role(d)).collect()
    }
}
