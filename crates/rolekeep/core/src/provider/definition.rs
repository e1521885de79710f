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

//! Providers backed by a definition source

use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{DefinedRole, RoleProvider, RoleRegistry, build_role_map};
use crate::config::SecurityConfig;
use crate::definition::{RoleBuilder, RoleDefinitionSource};
use crate::error::{RoleError, RoleResult};
use crate::model::{ResourceRole, RowLevelRole};

/// Loads every role of one kind from a [`RoleDefinitionSource`] at startup
/// and reloads them on refresh when hot deploy is enabled
pub struct DefinitionRoleProvider<R> {
    source: Arc<dyn RoleDefinitionSource>,
    builder: RoleBuilder,
    hot_deploy_enabled: bool,
    registry: RoleRegistry<R>,
    /// Held across scan and swap so an older scan never replaces a newer one
    refresh_lock: Mutex<()>,
    _kind: PhantomData<fn() -> R>,
}

pub type DefinitionResourceRoleProvider = DefinitionRoleProvider<ResourceRole>;
pub type DefinitionRowLevelRoleProvider = DefinitionRoleProvider<RowLevelRole>;

impl<R: DefinedRole> DefinitionRoleProvider<R> {
    /// Build the initial registry. Any malformed or duplicate definition fails construction.
    pub fn new(source: Arc<dyn RoleDefinitionSource>, builder: RoleBuilder, config: &SecurityConfig) -> RoleResult<Self> {
        let map = build_role_map(R::load(source.as_ref(), &builder)?)?;
        info!("Loaded {} {} roles", map.len(), R::KIND);
        Ok(Self {
            source,
            builder,
            hot_deploy_enabled: config.hot_deploy_enabled,
            registry: RoleRegistry::from_map(map),
            refresh_lock: Mutex::new(()),
            _kind: PhantomData,
        })
    }

    pub fn registry(&self) -> &RoleRegistry<R> {
        &self.registry
    }

    pub fn hot_deploy_enabled(&self) -> bool {
        self.hot_deploy_enabled
    }
}

impl<R: DefinedRole> RoleProvider<R> for DefinitionRoleProvider<R> {
    fn all_roles(&self) -> Vec<Arc<R>> {
        self.registry.all()
    }

    fn find_role_by_code(&self, code: &str) -> Option<Arc<R>> {
        self.registry.get(code)
    }

    fn delete_role(&self, role: &R) -> bool {
        let removed = self.registry.modify(|map| map.remove(role.code()).is_some());
        if removed {
            debug!("Deleted {} role '{}' until next refresh", R::KIND, role.code());
        }
        removed
    }

    fn refresh_roles(&self) -> RoleResult<()> {
        if !self.hot_deploy_enabled {
            warn!("Refusing to refresh {} roles: hot deploy is disabled", R::KIND);
            return Err(RoleError::HotDeployForbidden { kind: R::KIND });
        }
        // Readers only ever take the registry lock; refreshes queue on this one
        let _guard = self.refresh_lock.lock();
        let map = build_role_map(R::load(self.source.as_ref(), &self.builder)?)?;
        let count = map.len();
        self.registry.replace(map);
        info!("Refreshed {} roles: {} loaded", R::KIND, count);
        Ok(())
    }
}
