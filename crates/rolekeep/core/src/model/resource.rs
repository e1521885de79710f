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

//! Resource roles and their policies

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::{Role, RoleScope};
use crate::access::Decision;
use crate::error::RoleKind;

/// Wildcard matching every entity, attribute, screen, menu item or resource
pub const WILDCARD: &str = "*";

/// Effect of a policy when it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    #[default]
    Allow,
    Deny,
}

impl PolicyEffect {
    fn vote(self) -> Decision {
        match self {
            PolicyEffect::Allow => Decision::Permit,
            PolicyEffect::Deny => Decision::Deny,
        }
    }
}

/// CRUD operation on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOperation {
    Create,
    Read,
    Update,
    Delete,
}

impl EntityOperation {
    pub const ALL: [EntityOperation; 4] = [EntityOperation::Create, EntityOperation::Read, EntityOperation::Update, EntityOperation::Delete];
}

/// Action named by an entity policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityPolicyAction {
    Create,
    Read,
    Update,
    Delete,
    All,
}

impl EntityPolicyAction {
    pub fn covers(self, operation: EntityOperation) -> bool {
        matches!(
            (self, operation),
            (EntityPolicyAction::All, _)
                | (EntityPolicyAction::Create, EntityOperation::Create)
                | (EntityPolicyAction::Read, EntityOperation::Read)
                | (EntityPolicyAction::Update, EntityOperation::Update)
                | (EntityPolicyAction::Delete, EntityOperation::Delete)
        )
    }
}

/// Action on an entity attribute. Modify implies view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeAction {
    View,
    Modify,
}

/// A single permission statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourcePolicy {
    Entity { entity: String, action: EntityPolicyAction, effect: PolicyEffect },
    EntityAttribute { entity: String, attribute: String, action: AttributeAction, effect: PolicyEffect },
    Screen { screen: String, effect: PolicyEffect },
    Menu { menu_item: String, effect: PolicyEffect },
    Specific { resource: String, effect: PolicyEffect },
}

/// Named bundle of permissions
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRole {
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) source: String,
    pub(crate) scopes: BTreeSet<RoleScope>,
    pub(crate) child_roles: Vec<String>,
    pub(crate) custom_properties: BTreeMap<String, Value>,
    pub(crate) policies: Vec<ResourcePolicy>,
}

impl ResourceRole {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn scopes(&self) -> &BTreeSet<RoleScope> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: RoleScope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn policies(&self) -> &[ResourcePolicy] {
        &self.policies
    }

    /// Vote on a CRUD operation
    pub fn entity_vote(&self, entity: &str, operation: EntityOperation) -> Decision {
        self.vote(|policy| match policy {
            ResourcePolicy::Entity { entity: target, action, effect } if matches_name(target, entity) && action.covers(operation) => Some(*effect),
            _ => None,
        })
    }

    /// Vote on viewing or modifying an attribute. A view deny also blocks modification;
    /// a view allow says nothing about modification.
    pub fn attribute_vote(&self, entity: &str, attribute: &str, requested: AttributeAction) -> Decision {
        self.vote(|policy| match policy {
            ResourcePolicy::EntityAttribute {
                entity: target_entity,
                attribute: target_attribute,
                action,
                effect,
            } if matches_name(target_entity, entity) && matches_name(target_attribute, attribute) => match (requested, action, effect) {
                (AttributeAction::View, _, PolicyEffect::Allow) => Some(PolicyEffect::Allow),
                (AttributeAction::View, AttributeAction::View, PolicyEffect::Deny) => Some(PolicyEffect::Deny),
                (AttributeAction::View, AttributeAction::Modify, PolicyEffect::Deny) => None,
                (AttributeAction::Modify, AttributeAction::Modify, PolicyEffect::Allow) => Some(PolicyEffect::Allow),
                (AttributeAction::Modify, AttributeAction::View, PolicyEffect::Allow) => None,
                (AttributeAction::Modify, _, PolicyEffect::Deny) => Some(PolicyEffect::Deny),
            },
            _ => None,
        })
    }

    pub fn screen_vote(&self, screen: &str) -> Decision {
        self.vote(|policy| match policy {
            ResourcePolicy::Screen { screen: target, effect } if matches_name(target, screen) => Some(*effect),
            _ => None,
        })
    }

    pub fn menu_vote(&self, menu_item: &str) -> Decision {
        self.vote(|policy| match policy {
            ResourcePolicy::Menu { menu_item: target, effect } if matches_name(target, menu_item) => Some(*effect),
            _ => None,
        })
    }

    pub fn specific_vote(&self, resource: &str) -> Decision {
        self.vote(|policy| match policy {
            ResourcePolicy::Specific { resource: target, effect } if matches_name(target, resource) => Some(*effect),
            _ => None,
        })
    }

    fn vote<F>(&self, matcher: F) -> Decision
    where
        F: Fn(&ResourcePolicy) -> Option<PolicyEffect>,
    {
        Decision::aggregate(self.policies.iter().filter_map(|p| matcher(p)).map(PolicyEffect::vote))
    }
}

impl Role for ResourceRole {
    const KIND: RoleKind = RoleKind::Resource;

    fn code(&self) -> &str {
        &self.code
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn child_roles(&self) -> &[String] {
        &self.child_roles
    }

    fn custom_properties(&self) -> &BTreeMap<String, Value> {
        &self.custom_properties
    }
}

fn matches_name(pattern: &str, name: &str) -> bool {
    pattern == WILDCARD || pattern == name
}
