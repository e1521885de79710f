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

//! # Role Definitions
//!
//! Declarative descriptions of roles, as written in definition files or
//! assembled in code. A [`RoleDefinitionSource`] supplies the full current
//! set of definitions each time it is asked; providers turn them into roles
//! through the [`RoleBuilder`].

pub mod builder;
pub mod file;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::RoleResult;
use crate::model::{AttributeAction, EntityPolicyAction, PolicyEffect, RoleScope, RowLevelPolicyAction, RowLevelPredicate};

pub use builder::RoleBuilder;
pub use file::DirectoryDefinitionSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPolicyDefinition {
    pub entity: String,
    pub actions: Vec<EntityPolicyAction>,
    #[serde(default)]
    pub effect: PolicyEffect,
}

/// `attributes` is a comma separated list of attribute names, or `*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributePolicyDefinition {
    pub entity: String,
    pub attributes: String,
    pub action: AttributeAction,
    #[serde(default)]
    pub effect: PolicyEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenPolicyDefinition {
    pub screens: Vec<String>,
    #[serde(default)]
    pub effect: PolicyEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuPolicyDefinition {
    pub menu_items: Vec<String>,
    #[serde(default)]
    pub effect: PolicyEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificPolicyDefinition {
    pub resources: Vec<String>,
    #[serde(default)]
    pub effect: PolicyEffect,
}

/// Declarative resource role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRoleDefinition {
    /// Where the definition came from; filled in by the source
    #[serde(skip)]
    pub origin: String,
    pub code: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// `None` applies the role to every scope
    pub scopes: Option<Vec<RoleScope>>,
    pub child_roles: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    pub entity_policies: Vec<EntityPolicyDefinition>,
    pub attribute_policies: Vec<AttributePolicyDefinition>,
    pub screen_policies: Vec<ScreenPolicyDefinition>,
    pub menu_policies: Vec<MenuPolicyDefinition>,
    pub specific_policies: Vec<SpecificPolicyDefinition>,
}

impl ResourceRoleDefinition {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = RoleScope>) -> Self {
        self.scopes = Some(scopes.into_iter().collect());
        self
    }

    pub fn with_child(mut self, code: impl Into<String>) -> Self {
        self.child_roles.push(code.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn allow_entity(self, entity: impl Into<String>, actions: impl IntoIterator<Item = EntityPolicyAction>) -> Self {
        self.entity_policy(entity, actions, PolicyEffect::Allow)
    }

    pub fn deny_entity(self, entity: impl Into<String>, actions: impl IntoIterator<Item = EntityPolicyAction>) -> Self {
        self.entity_policy(entity, actions, PolicyEffect::Deny)
    }

    fn entity_policy(mut self, entity: impl Into<String>, actions: impl IntoIterator<Item = EntityPolicyAction>, effect: PolicyEffect) -> Self {
        self.entity_policies.push(EntityPolicyDefinition {
            entity: entity.into(),
            actions: actions.into_iter().collect(),
            effect,
        });
        self
    }

    pub fn allow_attributes(self, entity: impl Into<String>, attributes: impl Into<String>, action: AttributeAction) -> Self {
        self.attribute_policy(entity, attributes, action, PolicyEffect::Allow)
    }

    pub fn deny_attributes(self, entity: impl Into<String>, attributes: impl Into<String>, action: AttributeAction) -> Self {
        self.attribute_policy(entity, attributes, action, PolicyEffect::Deny)
    }

    fn attribute_policy(mut self, entity: impl Into<String>, attributes: impl Into<String>, action: AttributeAction, effect: PolicyEffect) -> Self {
        self.attribute_policies.push(AttributePolicyDefinition {
            entity: entity.into(),
            attributes: attributes.into(),
            action,
            effect,
        });
        self
    }

    pub fn allow_screens<I, S>(self, screens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.screen_policy(screens, PolicyEffect::Allow)
    }

    pub fn deny_screens<I, S>(self, screens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.screen_policy(screens, PolicyEffect::Deny)
    }

    fn screen_policy<I, S>(mut self, screens: I, effect: PolicyEffect) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.screen_policies.push(ScreenPolicyDefinition {
            screens: screens.into_iter().map(Into::into).collect(),
            effect,
        });
        self
    }

    pub fn allow_menus<I, S>(mut self, menu_items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.menu_policies.push(MenuPolicyDefinition {
            menu_items: menu_items.into_iter().map(Into::into).collect(),
            effect: PolicyEffect::Allow,
        });
        self
    }

    pub fn allow_specific<I, S>(self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specific_policy(resources, PolicyEffect::Allow)
    }

    pub fn deny_specific<I, S>(self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specific_policy(resources, PolicyEffect::Deny)
    }

    fn specific_policy<I, S>(mut self, resources: I, effect: PolicyEffect) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specific_policies.push(SpecificPolicyDefinition {
            resources: resources.into_iter().map(Into::into).collect(),
            effect,
        });
        self
    }
}

/// Declarative row-level policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RowLevelPolicyDefinition {
    Jpql {
        entity: String,
        #[serde(rename = "where")]
        where_clause: String,
        #[serde(rename = "join", default)]
        join_clause: Option<String>,
    },
    Predicate {
        entity: String,
        actions: Vec<RowLevelPolicyAction>,
        condition: String,
    },
    /// Code-defined predicate; cannot be written in a definition file
    #[serde(skip)]
    Custom {
        entity: String,
        actions: Vec<RowLevelPolicyAction>,
        predicate: RowLevelPredicate,
    },
}

/// Declarative row-level role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowLevelRoleDefinition {
    #[serde(skip)]
    pub origin: String,
    pub code: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub child_roles: Vec<String>,
    pub properties: BTreeMap<String, Value>,
    pub policies: Vec<RowLevelPolicyDefinition>,
}

impl RowLevelRoleDefinition {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_child(mut self, code: impl Into<String>) -> Self {
        self.child_roles.push(code.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_jpql(mut self, entity: impl Into<String>, where_clause: impl Into<String>) -> Self {
        self.policies.push(RowLevelPolicyDefinition::Jpql {
            entity: entity.into(),
            where_clause: where_clause.into(),
            join_clause: None,
        });
        self
    }

    pub fn with_jpql_join(mut self, entity: impl Into<String>, join_clause: impl Into<String>, where_clause: impl Into<String>) -> Self {
        self.policies.push(RowLevelPolicyDefinition::Jpql {
            entity: entity.into(),
            where_clause: where_clause.into(),
            join_clause: Some(join_clause.into()),
        });
        self
    }

    pub fn with_predicate(mut self, entity: impl Into<String>, actions: impl IntoIterator<Item = RowLevelPolicyAction>, condition: impl Into<String>) -> Self {
        self.policies.push(RowLevelPolicyDefinition::Predicate {
            entity: entity.into(),
            actions: actions.into_iter().collect(),
            condition: condition.into(),
        });
        self
    }

    pub fn with_custom_predicate(mut self, entity: impl Into<String>, actions: impl IntoIterator<Item = RowLevelPolicyAction>, predicate: RowLevelPredicate) -> Self {
        self.policies.push(RowLevelPolicyDefinition::Custom {
            entity: entity.into(),
            actions: actions.into_iter().collect(),
            predicate,
        });
        self
    }
}

/// Supplies role definitions. Every call returns the complete current set.
#[cfg_attr(test, mockall::automock)]
pub trait RoleDefinitionSource: Send + Sync {
    fn resource_role_definitions(&self) -> RoleResult<Vec<ResourceRoleDefinition>>;

    fn row_level_role_definitions(&self) -> RoleResult<Vec<RowLevelRoleDefinition>>;
}

/// Definitions held in memory and edited at runtime
#[derive(Default)]
pub struct StaticDefinitionSource {
    resource_roles: RwLock<Vec<ResourceRoleDefinition>>,
    row_level_roles: RwLock<Vec<RowLevelRoleDefinition>>,
}

impl StaticDefinitionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_role(self, definition: ResourceRoleDefinition) -> Self {
        self.add_resource_role(definition);
        self
    }

    pub fn with_row_level_role(self, definition: RowLevelRoleDefinition) -> Self {
        self.add_row_level_role(definition);
        self
    }

    pub fn add_resource_role(&self, definition: ResourceRoleDefinition) {
        self.resource_roles.write().push(with_default_origin(definition, |d| &mut d.origin));
    }

    pub fn add_row_level_role(&self, definition: RowLevelRoleDefinition) {
        self.row_level_roles.write().push(with_default_origin(definition, |d| &mut d.origin));
    }

    /// Remove every definition with the code; returns whether any was removed
    pub fn remove_resource_role(&self, code: &str) -> bool {
        let mut roles = self.resource_roles.write();
        let before = roles.len();
        roles.retain(|d| d.code != code);
        roles.len() != before
    }

    pub fn remove_row_level_role(&self, code: &str) -> bool {
        let mut roles = self.row_level_roles.write();
        let before = roles.len();
        roles.retain(|d| d.code != code);
        roles.len() != before
    }

    pub fn clear(&self) {
        self.resource_roles.write().clear();
        self.row_level_roles.write().clear();
    }
}

fn with_default_origin<D>(mut definition: D, origin: impl Fn(&mut D) -> &mut String) -> D {
    let field = origin(&mut definition);
    if field.is_empty() {
        *field = "static".to_string();
    }
    definition
}

impl RoleDefinitionSource for StaticDefinitionSource {
    fn resource_role_definitions(&self) -> RoleResult<Vec<ResourceRoleDefinition>> {
        Ok(self.resource_roles.read().clone())
    }

    fn row_level_role_definitions(&self) -> RoleResult<Vec<RowLevelRoleDefinition>> {
        Ok(self.row_level_roles.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_edits() {
        let source = StaticDefinitionSource::new()
            .with_resource_role(ResourceRoleDefinition::new("viewer"))
            .with_row_level_role(RowLevelRoleDefinition::new("own-orders").with_jpql("sales_Order", "{E}.owner = :current_user_username"));

        let roles = source.resource_role_definitions().unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].origin, "static");

        assert!(source.remove_resource_role("viewer"));
        assert!(!source.remove_resource_role("viewer"));
        assert!(source.resource_role_definitions().unwrap().is_empty());

        source.clear();
        assert!(source.row_level_role_definitions().unwrap().is_empty());
    }

    #[test]
    fn test_row_level_policy_toml_shape() {
        let definition: RowLevelRoleDefinition = toml::from_str(
            r#"
            code = "eu-orders"
            properties = { region = "EU" }

            [[policies]]
            type = "jpql"
            entity = "sales_Order"
            where = "{E}.region = :region"

            [[policies]]
            type = "predicate"
            entity = "sales_Order"
            actions = ["update", "delete"]
            condition = "{E}.region = :region"
            "#,
        )
        .unwrap();

        assert_eq!(definition.policies.len(), 2);
        assert!(matches!(
            &definition.policies[0],
            RowLevelPolicyDefinition::Jpql { join_clause: None, where_clause, .. } if where_clause == "{E}.region = :region"
        ));
    }
}
