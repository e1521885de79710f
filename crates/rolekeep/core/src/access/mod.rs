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

//! # Access Evaluation
//!
//! The [`AccessManager`] resolves the current user's roles and applies them
//! to access contexts.

pub mod context;
pub mod decision;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::entity::Entity;
use crate::error::RoleResult;
use crate::model::{RoleScope, RowLevelPolicyAction};
use crate::principal::Authentication;
use crate::query::{AugmentedQuery, JpqlQuery};
use crate::resolver::CurrentUserRolesResolver;

pub use context::{
    CrudEntityContext, EntityAttributeContext, InMemoryCrudEntityContext, MenuItemContext, QueryCondition, ReadEntityQueryContext, ResourceAccessContext,
    RowLevelAccessContext, ScreenContext, SpecificOperationContext,
};
pub use decision::Decision;

pub struct AccessManager {
    resolver: Arc<CurrentUserRolesResolver>,
}

impl AccessManager {
    pub fn new(resolver: Arc<CurrentUserRolesResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &CurrentUserRolesResolver {
        &self.resolver
    }

    /// Apply the user's resource roles for the default scope
    pub fn apply_resource_constraints<C: ResourceAccessContext + ?Sized>(&self, auth: &dyn Authentication, ctx: &mut C) -> RoleResult<()> {
        self.apply_resource_constraints_in(auth, self.resolver.default_scope(), ctx)
    }

    pub fn apply_resource_constraints_in<C: ResourceAccessContext + ?Sized>(&self, auth: &dyn Authentication, scope: RoleScope, ctx: &mut C) -> RoleResult<()> {
        let roles = self.resolver.resource_roles(auth, scope)?;
        ctx.apply_resource_roles(&roles);
        Ok(())
    }

    pub fn apply_row_level_constraints<C: RowLevelAccessContext + ?Sized>(&self, auth: &dyn Authentication, ctx: &mut C) -> RoleResult<()> {
        let roles = self.resolver.row_level_roles(auth)?;
        ctx.apply_row_level_roles(&roles);
        Ok(())
    }

    pub fn check_entity(&self, auth: &dyn Authentication, entity: &str) -> RoleResult<CrudEntityContext> {
        let mut ctx = CrudEntityContext::new(entity);
        self.apply_resource_constraints(auth, &mut ctx)?;
        Ok(ctx)
    }

    pub fn check_attribute(&self, auth: &dyn Authentication, entity: &str, attribute: &str) -> RoleResult<EntityAttributeContext> {
        let mut ctx = EntityAttributeContext::new(entity, attribute);
        self.apply_resource_constraints(auth, &mut ctx)?;
        Ok(ctx)
    }

    pub fn check_screen(&self, auth: &dyn Authentication, screen: &str) -> RoleResult<bool> {
        let mut ctx = ScreenContext::new(screen);
        self.apply_resource_constraints(auth, &mut ctx)?;
        Ok(ctx.is_permitted())
    }

    pub fn check_menu_item(&self, auth: &dyn Authentication, menu_item: &str) -> RoleResult<bool> {
        let mut ctx = MenuItemContext::new(menu_item);
        self.apply_resource_constraints(auth, &mut ctx)?;
        Ok(ctx.is_permitted())
    }

    pub fn check_specific(&self, auth: &dyn Authentication, resource: &str) -> RoleResult<bool> {
        let mut ctx = SpecificOperationContext::new(resource);
        self.apply_resource_constraints(auth, &mut ctx)?;
        Ok(ctx.is_permitted())
    }

    /// Add the user's JPQL row-level constraints to a read query
    pub fn augment_query(&self, auth: &dyn Authentication, query_text: &str) -> RoleResult<AugmentedQuery> {
        let query = JpqlQuery::parse(query_text)?;
        let mut ctx = ReadEntityQueryContext::new(query.entity);
        self.apply_row_level_constraints(auth, &mut ctx)?;
        ctx.augment(query_text, auth)
    }

    /// Instances the user may act on. Mixed entity types are checked against
    /// the predicates of their own type.
    pub fn filter_entities<'e, E: Entity>(&self, auth: &dyn Authentication, action: RowLevelPolicyAction, entities: &'e [E]) -> RoleResult<Vec<&'e E>> {
        let roles = self.resolver.row_level_roles(auth)?;
        let mut contexts: HashMap<&str, InMemoryCrudEntityContext> = HashMap::new();
        let mut permitted = Vec::with_capacity(entities.len());
        for entity in entities {
            let ctx = contexts.entry(entity.entity_name()).or_insert_with(|| {
                let mut ctx = InMemoryCrudEntityContext::new(entity.entity_name());
                ctx.apply_row_level_roles(&roles);
                ctx
            });
            if ctx.is_permitted(entity, action) {
                permitted.push(entity);
            }
        }
        debug!(user = auth.username(), ?action, "Permitted {} of {} entities", permitted.len(), entities.len());
        Ok(permitted)
    }
}
