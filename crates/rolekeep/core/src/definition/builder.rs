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

//! Turns definitions into validated roles

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{ResourceRoleDefinition, RowLevelPolicyDefinition, RowLevelRoleDefinition};
use crate::error::{RoleError, RoleResult};
use crate::metadata::EntityMetadata;
use crate::model::resource::WILDCARD;
use crate::model::{ResourcePolicy, ResourceRole, RoleScope, RowLevelPolicy, RowLevelPredicate, RowLevelRole};
use crate::query::lexer::{Keyword, TokenKind, parameter_names, tokenize};
use crate::query::{ENTITY_ALIAS_PLACEHOLDER, Expr, JpqlQuery};

/// Builds roles from definitions. With entity metadata attached, entity and
/// attribute names are checked against it.
#[derive(Clone, Default)]
pub struct RoleBuilder {
    metadata: Option<Arc<dyn EntityMetadata>>,
}

impl RoleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn EntityMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn build_resource_role(&self, definition: &ResourceRoleDefinition) -> RoleResult<ResourceRole> {
        let origin = definition.origin.as_str();
        let code = self.check_code(origin, &definition.code, &definition.child_roles)?;

        let scopes = match &definition.scopes {
            None => [RoleScope::Ui, RoleScope::Api].into_iter().collect(),
            Some(declared) => {
                let mut scopes = BTreeSet::new();
                for scope in declared {
                    if !scopes.insert(*scope) {
                        return Err(invalid(origin, code, format!("conflicting scope '{}' declared twice", scope)));
                    }
                }
                if scopes.is_empty() {
                    return Err(invalid(origin, code, "role must apply to at least one scope"));
                }
                scopes
            }
        };

        let mut policies = Vec::new();
        for policy in &definition.entity_policies {
            if policy.actions.is_empty() {
                return Err(invalid(origin, code, format!("entity policy for '{}' names no actions", policy.entity)));
            }
            self.check_entity(origin, code, &policy.entity)?;
            policies.extend(policy.actions.iter().map(|action| ResourcePolicy::Entity {
                entity: policy.entity.clone(),
                action: *action,
                effect: policy.effect,
            }));
        }

        for policy in &definition.attribute_policies {
            let attributes: Vec<&str> = policy.attributes.split(',').map(str::trim).filter(|a| !a.is_empty()).collect();
            if attributes.is_empty() {
                return Err(invalid(origin, code, format!("attribute policy for '{}' names no attributes", policy.entity)));
            }
            if policy.entity == WILDCARD && attributes != [WILDCARD] {
                return Err(invalid(origin, code, "attribute policy on every entity must cover every attribute"));
            }
            self.check_entity(origin, code, &policy.entity)?;
            for attribute in attributes {
                self.check_attribute(origin, code, &policy.entity, attribute)?;
                policies.push(ResourcePolicy::EntityAttribute {
                    entity: policy.entity.clone(),
                    attribute: attribute.to_string(),
                    action: policy.action,
                    effect: policy.effect,
                });
            }
        }

        for policy in &definition.screen_policies {
            let screens = non_empty(origin, code, "screen", &policy.screens)?;
            policies.extend(screens.map(|screen| ResourcePolicy::Screen {
                screen: screen.to_string(),
                effect: policy.effect,
            }));
        }

        for policy in &definition.menu_policies {
            let items = non_empty(origin, code, "menu", &policy.menu_items)?;
            policies.extend(items.map(|item| ResourcePolicy::Menu {
                menu_item: item.to_string(),
                effect: policy.effect,
            }));
        }

        for policy in &definition.specific_policies {
            let resources = non_empty(origin, code, "specific", &policy.resources)?;
            policies.extend(resources.map(|resource| ResourcePolicy::Specific {
                resource: resource.to_string(),
                effect: policy.effect,
            }));
        }

        Ok(ResourceRole {
            code: code.to_string(),
            name: definition.name.clone().unwrap_or_else(|| code.to_string()),
            description: definition.description.clone(),
            source: origin.to_string(),
            scopes,
            child_roles: definition.child_roles.clone(),
            custom_properties: definition.properties.clone(),
            policies,
        })
    }

    pub fn build_row_level_role(&self, definition: &RowLevelRoleDefinition) -> RoleResult<RowLevelRole> {
        let origin = definition.origin.as_str();
        let code = self.check_code(origin, &definition.code, &definition.child_roles)?;

        let mut policies = Vec::new();
        for policy in &definition.policies {
            match policy {
                RowLevelPolicyDefinition::Jpql {
                    entity,
                    where_clause,
                    join_clause,
                } => {
                    self.check_entity(origin, code, entity)?;
                    if where_clause.trim().is_empty() {
                        return Err(invalid(origin, code, format!("JPQL policy for '{}' has an empty where clause", entity)));
                    }
                    check_where_fragment(where_clause).map_err(|e| invalid(origin, code, format!("where clause for '{}': {}", entity, e)))?;
                    let join_clause = join_clause.as_deref().map(str::trim).filter(|j| !j.is_empty());
                    if let Some(join) = join_clause {
                        check_join_fragment(join).map_err(|e| invalid(origin, code, format!("join clause for '{}': {}", entity, e)))?;
                    }
                    policies.push(RowLevelPolicy::Jpql {
                        entity: entity.clone(),
                        where_clause: where_clause.trim().to_string(),
                        join_clause: join_clause.map(str::to_string),
                    });
                }
                RowLevelPolicyDefinition::Predicate { entity, actions, condition } => {
                    self.check_entity(origin, code, entity)?;
                    check_actions(origin, code, entity, actions.len())?;
                    check_condition_parameters(origin, code, condition, &definition.properties)?;
                    let predicate =
                        RowLevelPredicate::from_condition(condition, &definition.properties).map_err(|e| invalid(origin, code, format!("condition for '{}': {}", entity, e)))?;
                    policies.extend(actions.iter().map(|action| RowLevelPolicy::Predicate {
                        entity: entity.clone(),
                        action: *action,
                        predicate: predicate.clone(),
                    }));
                }
                RowLevelPolicyDefinition::Custom { entity, actions, predicate } => {
                    self.check_entity(origin, code, entity)?;
                    check_actions(origin, code, entity, actions.len())?;
                    policies.extend(actions.iter().map(|action| RowLevelPolicy::Predicate {
                        entity: entity.clone(),
                        action: *action,
                        predicate: predicate.clone(),
                    }));
                }
            }
        }

        Ok(RowLevelRole {
            code: code.to_string(),
            name: definition.name.clone().unwrap_or_else(|| code.to_string()),
            description: definition.description.clone(),
            source: origin.to_string(),
            child_roles: definition.child_roles.clone(),
            custom_properties: definition.properties.clone(),
            policies,
        })
    }

    fn check_code<'d>(&self, origin: &str, code: &'d str, children: &[String]) -> RoleResult<&'d str> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(RoleError::invalid(origin, "role code is missing"));
        }
        if trimmed != code {
            return Err(invalid(origin, trimmed, "role code has surrounding whitespace"));
        }
        if children.iter().any(|child| child == code) {
            return Err(invalid(origin, code, "role lists itself as a child"));
        }
        Ok(code)
    }

    fn check_entity(&self, origin: &str, code: &str, entity: &str) -> RoleResult<()> {
        if entity.is_empty() {
            return Err(invalid(origin, code, "policy names no entity"));
        }
        match &self.metadata {
            Some(metadata) if entity != WILDCARD && metadata.find_entity(entity).is_none() => Err(invalid(origin, code, format!("unknown entity '{}'", entity))),
            _ => Ok(()),
        }
    }

    fn check_attribute(&self, origin: &str, code: &str, entity: &str, attribute: &str) -> RoleResult<()> {
        if attribute == WILDCARD || entity == WILDCARD {
            return Ok(());
        }
        let Some(meta_class) = self.metadata.as_ref().and_then(|m| m.find_entity(entity)) else {
            return Ok(());
        };
        if meta_class.has_attribute(attribute) {
            Ok(())
        } else {
            Err(invalid(origin, code, format!("unknown attribute '{}.{}'", entity, attribute)))
        }
    }
}

fn non_empty<'a>(origin: &str, code: &str, kind: &str, targets: &'a [String]) -> RoleResult<impl Iterator<Item = &'a str> + 'a> {
    if targets.is_empty() || targets.iter().any(|t| t.trim().is_empty()) {
        return Err(invalid(origin, code, format!("{} policy has an empty target", kind)));
    }
    Ok(targets.iter().map(String::as_str))
}

fn check_actions(origin: &str, code: &str, entity: &str, count: usize) -> RoleResult<()> {
    if count == 0 {
        return Err(invalid(origin, code, format!("predicate policy for '{}' names no actions", entity)));
    }
    Ok(())
}

/// Constructs the in-memory evaluator does not know are still valid JPQL
fn check_where_fragment(where_clause: &str) -> RoleResult<()> {
    match Expr::parse(where_clause) {
        Ok(_) | Err(RoleError::UnsupportedQuery { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

fn check_join_fragment(join: &str) -> RoleResult<()> {
    let tokens = tokenize(join)?;
    if !matches!(tokens[0].kind, TokenKind::Keyword(Keyword::Join | Keyword::Left | Keyword::Inner)) {
        return Err(RoleError::QuerySyntax {
            offset: tokens[0].span.start,
            message: "join fragment must start with JOIN, LEFT or INNER".to_string(),
        });
    }
    let query = JpqlQuery::parse(&format!("select {0} from Root {0} {1}", ENTITY_ALIAS_PLACEHOLDER, join))?;
    if query.where_clause.is_some() || query.tail.is_some() {
        return Err(RoleError::QuerySyntax {
            offset: 0,
            message: "join fragment may only contain joins".to_string(),
        });
    }
    Ok(())
}

fn check_condition_parameters(origin: &str, code: &str, condition: &str, properties: &BTreeMap<String, Value>) -> RoleResult<()> {
    let names = parameter_names(condition).map_err(|e| invalid(origin, code, format!("condition '{}': {}", condition, e)))?;
    match names.into_iter().find(|name| !properties.contains_key(name)) {
        Some(missing) => Err(invalid(origin, code, format!("condition parameter ':{}' has no matching role property", missing))),
        None => Ok(()),
    }
}

fn invalid(origin: &str, code: &str, reason: impl std::fmt::Display) -> RoleError {
    RoleError::invalid(origin, format!("role '{}': {}", code, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{InMemoryMetadata, MetaClass};
    use crate::model::{AttributeAction, EntityPolicyAction, Role, RowLevelPolicyAction};

    fn metadata() -> Arc<dyn EntityMetadata> {
        Arc::new(InMemoryMetadata::new().with_entity(MetaClass::new("sales_Order", ["number", "total", "status"])))
    }

    #[test]
    fn test_build_resource_role_expands_policies() {
        let definition = ResourceRoleDefinition::new("order-manager")
            .with_origin("tests")
            .allow_entity("sales_Order", [EntityPolicyAction::Read, EntityPolicyAction::Update])
            .allow_attributes("sales_Order", "number, total", AttributeAction::View)
            .allow_screens(["sales_Order.browse", "sales_Order.edit"]);

        let role = RoleBuilder::new().with_metadata(metadata()).build_resource_role(&definition).unwrap();
        assert_eq!(role.code(), "order-manager");
        assert_eq!(role.name(), "order-manager");
        assert_eq!(role.source(), "tests");
        assert_eq!(role.policies().len(), 6);
        assert!(role.has_scope(RoleScope::Ui) && role.has_scope(RoleScope::Api));
    }

    #[test]
    fn test_unknown_entity_and_attribute_rejected() {
        let builder = RoleBuilder::new().with_metadata(metadata());

        let unknown_entity = ResourceRoleDefinition::new("r").allow_entity("sales_Invoice", [EntityPolicyAction::Read]);
        assert!(matches!(builder.build_resource_role(&unknown_entity), Err(RoleError::InvalidDefinition { reason, .. }) if reason.contains("sales_Invoice")));

        let unknown_attribute = ResourceRoleDefinition::new("r").allow_attributes("sales_Order", "secret", AttributeAction::View);
        assert!(builder.build_resource_role(&unknown_attribute).is_err());

        assert!(RoleBuilder::new().build_resource_role(&unknown_entity).is_ok());
    }

    #[test]
    fn test_structural_errors() {
        let builder = RoleBuilder::new();
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("")).is_err());
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("a").with_child("a")).is_err());
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("a").with_scopes([RoleScope::Ui, RoleScope::Ui])).is_err());
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("a").with_scopes([])).is_err());
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("a").allow_entity("x", [])).is_err());
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("a").allow_attributes("*", "total", AttributeAction::View)).is_err());
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("a").allow_attributes("*", "*", AttributeAction::Modify)).is_ok());
        assert!(builder.build_resource_role(&ResourceRoleDefinition::new("a").allow_screens(Vec::<String>::new())).is_err());
    }

    #[test]
    fn test_build_row_level_role() {
        let definition = RowLevelRoleDefinition::new("eu-orders")
            .with_property("region", "EU")
            .with_jpql("sales_Order", "  {E}.region = :region ")
            .with_predicate("sales_Order", [RowLevelPolicyAction::Update, RowLevelPolicyAction::Delete], "{E}.region = :region");

        let role = RoleBuilder::new().with_metadata(metadata()).build_row_level_role(&definition).unwrap();
        assert_eq!(role.policies().len(), 3);
        assert!(matches!(&role.policies()[0], RowLevelPolicy::Jpql { where_clause, .. } if where_clause == "{E}.region = :region"));
    }

    #[test]
    fn test_row_level_validation() {
        let builder = RoleBuilder::new();
        assert!(builder.build_row_level_role(&RowLevelRoleDefinition::new("r").with_jpql("sales_Order", "  ")).is_err());
        assert!(builder.build_row_level_role(&RowLevelRoleDefinition::new("r").with_jpql("sales_Order", "{E}.name = 'open")).is_err());
        assert!(
            builder
                .build_row_level_role(&RowLevelRoleDefinition::new("r").with_predicate("sales_Order", [RowLevelPolicyAction::Read], "{E}.region = :region"))
                .is_err()
        );
        assert!(builder.build_row_level_role(&RowLevelRoleDefinition::new("r").with_predicate("sales_Order", [], "{E}.a = 1")).is_err());
    }

    #[test]
    fn test_jpql_fragments_parsed_at_build_time() {
        let builder = RoleBuilder::new();
        let build = |where_clause: &str| builder.build_row_level_role(&RowLevelRoleDefinition::new("r").with_jpql("sales_Order", where_clause));

        assert!(matches!(build("{E}.status ="), Err(RoleError::InvalidDefinition { .. })));
        assert!(matches!(build("{E}.a = 1 {E}.b"), Err(RoleError::InvalidDefinition { .. })));
        assert!(matches!(build("({E}.a = 1"), Err(RoleError::InvalidDefinition { .. })));
        assert!(build("{E}.status = 'ACTIVE' and {E}.owner.login = :current_user_username").is_ok());
        // valid JPQL outside the in-memory subset
        assert!(build("upper({E}.status) = 'ACTIVE'").is_ok());
        assert!(build("{E}.total between 1 and 10").is_ok());

        let build_join = |join: &str| {
            builder.build_row_level_role(&RowLevelRoleDefinition::new("r").with_jpql_join("sales_Order", join, "d.code = :current_user_department"))
        };
        assert!(build_join("left join {E}.department d").is_ok());
        assert!(build_join("join {E}.department d join d.company c").is_ok());
        assert!(matches!(build_join("{E}.department d"), Err(RoleError::InvalidDefinition { .. })));
        assert!(matches!(build_join("join {E}.department d where d.x = 1"), Err(RoleError::InvalidDefinition { .. })));
    }
}
