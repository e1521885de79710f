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

//! Access contexts
//!
//! A context describes one permission question. It starts permissive and can
//! only move to denied. Resource contexts fold the votes of every resolved
//! role with deny-overrides and deny unless the aggregate is a permit.
//! Row-level contexts collect the constraints that apply to one entity.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::Decision;
use crate::entity::Entity;
use crate::error::{RoleError, RoleResult};
use crate::model::{AttributeAction, EntityOperation, ResourceRole, Role, RowLevelPolicy, RowLevelPolicyAction, RowLevelPredicate, RowLevelRole};
use crate::principal::{Authentication, CURRENT_USER_PARAMETER_PREFIX, current_user_parameter};
use crate::query::lexer::parameter_names;
use crate::query::{AugmentedQuery, JpqlQuery, rename_parameters, substitute_alias};

/// Context populated from resource roles
pub trait ResourceAccessContext {
    fn apply_resource_roles(&mut self, roles: &[Arc<ResourceRole>]);
}

/// Context populated from row-level roles
pub trait RowLevelAccessContext {
    fn apply_row_level_roles(&mut self, roles: &[Arc<RowLevelRole>]);
}

fn aggregate<F>(roles: &[Arc<ResourceRole>], vote: F) -> Decision
where
    F: Fn(&ResourceRole) -> Decision,
{
    Decision::aggregate(roles.iter().map(|role| vote(role)))
}

/// CRUD permissions on an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrudEntityContext {
    entity: String,
    create_permitted: bool,
    read_permitted: bool,
    update_permitted: bool,
    delete_permitted: bool,
}

impl CrudEntityContext {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            create_permitted: true,
            read_permitted: true,
            update_permitted: true,
            delete_permitted: true,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn deny(&mut self, operation: EntityOperation) {
        *self.flag(operation) = false;
    }

    pub fn is_permitted(&self, operation: EntityOperation) -> bool {
        match operation {
            EntityOperation::Create => self.create_permitted,
            EntityOperation::Read => self.read_permitted,
            EntityOperation::Update => self.update_permitted,
            EntityOperation::Delete => self.delete_permitted,
        }
    }

    fn flag(&mut self, operation: EntityOperation) -> &mut bool {
        match operation {
            EntityOperation::Create => &mut self.create_permitted,
            EntityOperation::Read => &mut self.read_permitted,
            EntityOperation::Update => &mut self.update_permitted,
            EntityOperation::Delete => &mut self.delete_permitted,
        }
    }
}

impl ResourceAccessContext for CrudEntityContext {
    fn apply_resource_roles(&mut self, roles: &[Arc<ResourceRole>]) {
        for operation in EntityOperation::ALL {
            if !aggregate(roles, |role| role.entity_vote(&self.entity, operation)).is_permit() {
                self.deny(operation);
            }
        }
    }
}

/// View and modify permissions on an entity attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAttributeContext {
    entity: String,
    attribute: String,
    view_permitted: bool,
    modify_permitted: bool,
}

impl EntityAttributeContext {
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
            view_permitted: true,
            modify_permitted: true,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// An attribute that cannot be viewed cannot be modified either
    pub fn deny_view(&mut self) {
        self.view_permitted = false;
        self.modify_permitted = false;
    }

    pub fn deny_modify(&mut self) {
        self.modify_permitted = false;
    }

    pub fn can_view(&self) -> bool {
        self.view_permitted
    }

    pub fn can_modify(&self) -> bool {
        self.modify_permitted
    }
}

impl ResourceAccessContext for EntityAttributeContext {
    fn apply_resource_roles(&mut self, roles: &[Arc<ResourceRole>]) {
        if !aggregate(roles, |role| role.attribute_vote(&self.entity, &self.attribute, AttributeAction::View)).is_permit() {
            self.deny_view();
        }
        if !aggregate(roles, |role| role.attribute_vote(&self.entity, &self.attribute, AttributeAction::Modify)).is_permit() {
            self.deny_modify();
        }
    }
}

macro_rules! single_permission_context {
    ($(#[$meta:meta])* $name:ident, $field:ident, $vote:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            $field: String,
            permitted: bool,
        }

        impl $name {
            pub fn new($field: impl Into<String>) -> Self {
                Self {
                    $field: $field.into(),
                    permitted: true,
                }
            }

            pub fn $field(&self) -> &str {
                &self.$field
            }

            pub fn deny(&mut self) {
                self.permitted = false;
            }

            pub fn is_permitted(&self) -> bool {
                self.permitted
            }
        }

        impl ResourceAccessContext for $name {
            fn apply_resource_roles(&mut self, roles: &[Arc<ResourceRole>]) {
                if !aggregate(roles, |role| role.$vote(&self.$field)).is_permit() {
                    self.deny();
                }
            }
        }
    };
}

single_permission_context!(
    /// Permission to open a screen
    ScreenContext,
    screen,
    screen_vote
);
single_permission_context!(
    /// Permission to see a menu item
    MenuItemContext,
    menu_item,
    menu_vote
);
single_permission_context!(
    /// Permission for an application-defined operation, e.g. `reports.run`
    SpecificOperationContext,
    resource,
    specific_vote
);

/// Row-level predicates for in-memory entity instances
#[derive(Debug, Clone, Default)]
pub struct InMemoryCrudEntityContext {
    entity: String,
    predicates: BTreeMap<RowLevelPolicyAction, Vec<RowLevelPredicate>>,
}

impl InMemoryCrudEntityContext {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicates: BTreeMap::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn add_predicate(&mut self, action: RowLevelPolicyAction, predicate: RowLevelPredicate) {
        self.predicates.entry(action).or_default().push(predicate);
    }

    pub fn predicates(&self, action: RowLevelPolicyAction) -> &[RowLevelPredicate] {
        self.predicates.get(&action).map(Vec::as_slice).unwrap_or_default()
    }

    /// An instance passes only if every predicate for the action holds
    pub fn is_permitted(&self, entity: &dyn Entity, action: RowLevelPolicyAction) -> bool {
        self.predicates(action).iter().all(|predicate| predicate.test(entity))
    }

    pub fn filter<'e, E: Entity>(&self, action: RowLevelPolicyAction, entities: &'e [E]) -> Vec<&'e E> {
        entities.iter().filter(|entity| self.is_permitted(*entity, action)).collect()
    }
}

impl RowLevelAccessContext for InMemoryCrudEntityContext {
    fn apply_row_level_roles(&mut self, roles: &[Arc<RowLevelRole>]) {
        let entity = self.entity.clone();
        for role in roles {
            for policy in role.policies_for(&entity) {
                if let RowLevelPolicy::Predicate { action, predicate, .. } = policy {
                    self.add_predicate(*action, predicate.clone());
                }
            }
        }
    }
}

/// JPQL constraint contributed by one role
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCondition {
    pub role: String,
    pub where_clause: String,
    pub join_clause: Option<String>,
    pub properties: BTreeMap<String, Value>,
}

/// JPQL constraints for read queries on an entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadEntityQueryContext {
    entity: String,
    conditions: Vec<QueryCondition>,
}

impl ReadEntityQueryContext {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            conditions: Vec::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn add_condition(&mut self, condition: QueryCondition) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[QueryCondition] {
        &self.conditions
    }

    /// AND every collected condition onto `query_text` and bind the
    /// parameters they introduce. Parameters that clash with the base query
    /// or with a differently valued parameter of another role get a fresh name.
    pub fn augment(&self, query_text: &str, auth: &dyn Authentication) -> RoleResult<AugmentedQuery> {
        let mut query = JpqlQuery::parse(query_text)?;
        let mut parameters: BTreeMap<String, Value> = BTreeMap::new();
        if query.entity != self.entity {
            debug!("Query on {} is not constrained by row-level policies for {}", query.entity, self.entity);
            return Ok(AugmentedQuery { query, parameters });
        }

        let reserved: HashSet<String> = parameter_names(query_text)?.into_iter().collect();
        for condition in &self.conditions {
            let mut names = parameter_names(&condition.where_clause)?;
            if let Some(join) = &condition.join_clause {
                names.extend(parameter_names(join)?);
            }

            let mut renames = HashMap::new();
            for name in names {
                let value = bind_parameter(&name, condition, auth)?;
                let target = if reserved.contains(&name) || parameters.get(&name).is_some_and(|bound| *bound != value) {
                    let fresh = fresh_name(&name, &reserved, &parameters);
                    renames.insert(name, fresh.clone());
                    fresh
                } else {
                    name
                };
                parameters.insert(target, value);
            }

            if let Some(join) = &condition.join_clause {
                query.add_join(&rename_parameters(&substitute_alias(join, &query.alias), &renames)?);
            }
            let where_clause = rename_parameters(&substitute_alias(&condition.where_clause, &query.alias), &renames)?;
            query.add_condition(&where_clause);
        }

        debug!("Augmented query on {} with {} row-level conditions", self.entity, self.conditions.len());
        Ok(AugmentedQuery { query, parameters })
    }
}

impl RowLevelAccessContext for ReadEntityQueryContext {
    fn apply_row_level_roles(&mut self, roles: &[Arc<RowLevelRole>]) {
        let entity = self.entity.clone();
        for role in roles {
            for policy in role.policies_for(&entity) {
                if let RowLevelPolicy::Jpql { where_clause, join_clause, .. } = policy {
                    self.add_condition(QueryCondition {
                        role: role.code().to_string(),
                        where_clause: where_clause.clone(),
                        join_clause: join_clause.clone(),
                        properties: role.custom_properties().clone(),
                    });
                }
            }
        }
    }
}

fn bind_parameter(name: &str, condition: &QueryCondition, auth: &dyn Authentication) -> RoleResult<Value> {
    let value = if name.starts_with(CURRENT_USER_PARAMETER_PREFIX) {
        current_user_parameter(auth, name)
    } else {
        condition.properties.get(name).cloned()
    };
    value.ok_or_else(|| RoleError::UnboundParameter { name: name.to_string() })
}

fn fresh_name(name: &str, reserved: &HashSet<String>, bound: &BTreeMap<String, Value>) -> String {
    (1..)
        .map(|n| format!("{}_{}", name, n))
        .find(|candidate| !reserved.contains(candidate) && !bound.contains_key(candidate))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ResourceRoleDefinition, RoleBuilder, RowLevelRoleDefinition};
    use crate::entity::EntityRecord;
    use crate::model::EntityPolicyAction;
    use crate::principal::AuthenticatedUser;
    use serde_json::json;

    fn resource(definition: ResourceRoleDefinition) -> Arc<ResourceRole> {
        Arc::new(RoleBuilder::new().build_resource_role(&definition).unwrap())
    }

    fn row_level(definition: RowLevelRoleDefinition) -> Arc<RowLevelRole> {
        Arc::new(RoleBuilder::new().build_row_level_role(&definition).unwrap())
    }

    #[test]
    fn test_crud_context_requires_permit() {
        let roles = vec![resource(ResourceRoleDefinition::new("reader").allow_entity("sales_Order", [EntityPolicyAction::Read]))];
        let mut ctx = CrudEntityContext::new("sales_Order");
        ctx.apply_resource_roles(&roles);
        assert!(ctx.is_permitted(EntityOperation::Read));
        assert!(!ctx.is_permitted(EntityOperation::Update));

        let mut empty = CrudEntityContext::new("sales_Order");
        empty.apply_resource_roles(&[]);
        assert!(!empty.is_permitted(EntityOperation::Read));
    }

    #[test]
    fn test_denied_context_stays_denied() {
        let mut ctx = ScreenContext::new("sales_Order.browse");
        ctx.deny();
        ctx.apply_resource_roles(&[resource(ResourceRoleDefinition::new("all").allow_screens(["*"]))]);
        assert!(!ctx.is_permitted());
    }

    #[test]
    fn test_attribute_view_deny_blocks_modify() {
        let mut ctx = EntityAttributeContext::new("sales_Order", "total");
        ctx.deny_view();
        assert!(!ctx.can_view());
        assert!(!ctx.can_modify());
    }

    #[test]
    fn test_in_memory_context_collects_predicates_per_action() {
        let role = row_level(
            RowLevelRoleDefinition::new("eu")
                .with_property("region", "EU")
                .with_predicate("sales_Order", [RowLevelPolicyAction::Update], "{E}.region = :region")
                .with_jpql("sales_Order", "{E}.region = :region"),
        );
        let mut ctx = InMemoryCrudEntityContext::new("sales_Order");
        ctx.apply_row_level_roles(&[role]);

        let eu = EntityRecord::new("sales_Order").with("region", "EU");
        let us = EntityRecord::new("sales_Order").with("region", "US");
        assert!(ctx.is_permitted(&us, RowLevelPolicyAction::Read));
        assert!(!ctx.is_permitted(&us, RowLevelPolicyAction::Update));
        assert_eq!(ctx.filter(RowLevelPolicyAction::Update, &[eu.clone(), us]), vec![&eu]);
    }

    #[test]
    fn test_augment_renames_conflicting_parameters() {
        let roles = vec![
            row_level(RowLevelRoleDefinition::new("eu").with_property("region", "EU").with_jpql("sales_Order", "{E}.region = :region")),
            row_level(RowLevelRoleDefinition::new("us").with_property("region", "US").with_jpql("sales_Order", "{E}.region = :region")),
            row_level(RowLevelRoleDefinition::new("own").with_jpql("sales_Order", "{E}.owner = :current_user_username")),
        ];
        let mut ctx = ReadEntityQueryContext::new("sales_Order");
        ctx.apply_row_level_roles(&roles);

        let user = AuthenticatedUser::new("alice");
        let augmented = ctx.augment("select o from sales_Order o where o.total > :region", &user).unwrap();

        assert_eq!(
            augmented.text(),
            "select o from sales_Order o where (o.total > :region) and (o.region = :region_1) and (o.region = :region_2) and (o.owner = :current_user_username)"
        );
        assert_eq!(augmented.parameters.get("region_1"), Some(&json!("EU")));
        assert_eq!(augmented.parameters.get("region_2"), Some(&json!("US")));
        assert_eq!(augmented.parameters.get("current_user_username"), Some(&json!("alice")));
        assert!(!augmented.parameters.contains_key("region"));
    }

    #[test]
    fn test_augment_join_and_unbound_parameter() {
        let mut ctx = ReadEntityQueryContext::new("sales_Order");
        ctx.apply_row_level_roles(&[row_level(RowLevelRoleDefinition::new("dept").with_jpql_join(
            "sales_Order",
            "join {E}.department d",
            "d.code = :current_user_department",
        ))]);

        let err = ctx.augment("select o from sales_Order o", &AuthenticatedUser::new("bob")).unwrap_err();
        assert_eq!(err, RoleError::UnboundParameter { name: "current_user_department".to_string() });

        let user = AuthenticatedUser::new("bob").with_attribute("department", "sales");
        let augmented = ctx.augment("select o from sales_Order o", &user).unwrap();
        assert_eq!(augmented.text(), "select o from sales_Order o join o.department d where (d.code = :current_user_department)");
    }
}
