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

use rolekeep_core::model::{AttributeAction, EntityOperation, EntityPolicyAction, RowLevelPolicyAction};
use rolekeep_core::{
    AccessManager, AuthenticatedUser, CurrentUserRolesResolver, DefinitionResourceRoleProvider, DefinitionRowLevelRoleProvider, DirectoryDefinitionSource, EntityRecord,
    InMemoryQueryRunner, InMemoryRoleProvider, ResourceRole, ResourceRoleDefinition, RoleBuilder, RowLevelRole, RowLevelRoleDefinition, SecurityConfig,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn manager(resource: Vec<ResourceRoleDefinition>, row_level: Vec<RowLevelRoleDefinition>) -> AccessManager {
    let builder = RoleBuilder::new();
    let resource_provider: Arc<InMemoryRoleProvider<ResourceRole>> = Arc::new(InMemoryRoleProvider::new());
    for definition in &resource {
        resource_provider.register(builder.build_resource_role(definition).unwrap()).unwrap();
    }
    let row_level_provider: Arc<InMemoryRoleProvider<RowLevelRole>> = Arc::new(InMemoryRoleProvider::new());
    for definition in &row_level {
        row_level_provider.register(builder.build_row_level_role(definition).unwrap()).unwrap();
    }
    let resolver = CurrentUserRolesResolver::new(&SecurityConfig::default(), resource_provider, row_level_provider).unwrap();
    AccessManager::new(Arc::new(resolver))
}

fn attribute_roles() -> Vec<ResourceRoleDefinition> {
    vec![
        ResourceRoleDefinition::new("viewer").allow_attributes("sales_Order", "*", AttributeAction::View),
        ResourceRoleDefinition::new("restricted").deny_attributes("sales_Order", "discount", AttributeAction::View),
    ]
}

#[test]
fn test_deny_overrides_in_both_orders() {
    let access = manager(attribute_roles(), Vec::new());
    for authorities in [["ROLE_viewer", "ROLE_restricted"], ["ROLE_restricted", "ROLE_viewer"]] {
        let user = authorities.iter().fold(AuthenticatedUser::new("alice"), |user, a| user.with_authority(*a));

        let discount = access.check_attribute(&user, "sales_Order", "discount").unwrap();
        assert!(!discount.can_view());
        assert!(!discount.can_modify());

        let total = access.check_attribute(&user, "sales_Order", "total").unwrap();
        assert!(total.can_view());
        assert!(!total.can_modify());
    }
}

#[test]
fn test_permit_from_one_role_is_enough() {
    let access = manager(
        vec![
            ResourceRoleDefinition::new("reader").allow_entity("*", [EntityPolicyAction::Read]),
            ResourceRoleDefinition::new("editor")
                .allow_entity("sales_Order", [EntityPolicyAction::All])
                .allow_screens(["sales_Order.edit"])
                .allow_menus(["sales"])
                .deny_specific(["reports.export"]),
        ],
        Vec::new(),
    );
    let user = AuthenticatedUser::new("alice").with_authority("ROLE_reader").with_authority("ROLE_editor");

    let order = access.check_entity(&user, "sales_Order").unwrap();
    assert!(EntityOperation::ALL.iter().all(|op| order.is_permitted(*op)));
    let customer = access.check_entity(&user, "sales_Customer").unwrap();
    assert!(customer.is_permitted(EntityOperation::Read));
    assert!(!customer.is_permitted(EntityOperation::Delete));

    assert!(access.check_screen(&user, "sales_Order.edit").unwrap());
    assert!(!access.check_screen(&user, "sales_Customer.edit").unwrap());
    assert!(access.check_menu_item(&user, "sales").unwrap());
    assert!(!access.check_specific(&user, "reports.export").unwrap());

    let anonymous = AuthenticatedUser::new("guest");
    assert!(!access.check_entity(&anonymous, "sales_Order").unwrap().is_permitted(EntityOperation::Read));
}

#[test]
fn test_jpql_policies_combine_with_and() {
    let access = manager(
        Vec::new(),
        vec![
            RowLevelRoleDefinition::new("active-only").with_jpql("sales_Order", "{E}.status = 'ACTIVE'"),
            RowLevelRoleDefinition::new("own-orders").with_jpql("sales_Order", "{E}.owner = :current_user_username"),
        ],
    );
    let user = AuthenticatedUser::new("alice")
        .with_authority("ROW_LEVEL_ROLE_active-only")
        .with_authority("ROW_LEVEL_ROLE_own-orders");

    let rows = vec![
        EntityRecord::new("sales_Order").with("id", 1).with("status", "ACTIVE").with("owner", "alice"),
        EntityRecord::new("sales_Order").with("id", 2).with("status", "ACTIVE").with("owner", "alice"),
        EntityRecord::new("sales_Order").with("id", 3).with("status", "ACTIVE").with("owner", "bob"),
        EntityRecord::new("sales_Order").with("id", 4).with("status", "CLOSED").with("owner", "bob"),
    ];

    let augmented = access.augment_query(&user, "select o from sales_Order o").unwrap();
    assert_eq!(
        augmented.text(),
        "select o from sales_Order o where (o.status = 'ACTIVE') and (o.owner = :current_user_username)"
    );

    let result = InMemoryQueryRunner::new().run(&augmented, &rows).unwrap();
    let ids: Vec<_> = result.iter().map(|r| r.attributes["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(2)]);
}

#[test]
fn test_predicate_policies_filter_per_action() {
    let access = manager(
        Vec::new(),
        vec![RowLevelRoleDefinition::new("eu")
            .with_property("region", "EU")
            .with_predicate("sales_Order", [RowLevelPolicyAction::Update, RowLevelPolicyAction::Delete], "{E}.region = :region")],
    );
    let user = AuthenticatedUser::new("alice").with_authority("ROW_LEVEL_ROLE_eu");
    let entities = vec![
        EntityRecord::new("sales_Order").with("region", "EU"),
        EntityRecord::new("sales_Order").with("region", "US"),
        EntityRecord::new("sales_Customer").with("region", "US"),
    ];

    assert_eq!(access.filter_entities(&user, RowLevelPolicyAction::Read, &entities).unwrap().len(), 3);
    let updatable = access.filter_entities(&user, RowLevelPolicyAction::Update, &entities).unwrap();
    assert_eq!(updatable, vec![&entities[0], &entities[2]]);
}

#[test]
fn test_definition_directory_end_to_end() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("sales.toml"),
        r#"
        [[resource_roles]]
        code = "sales-manager"
        name = "Sales manager"
        child_roles = ["sales-reader"]

        [[resource_roles.entity_policies]]
        entity = "sales_Order"
        actions = ["create", "update"]

        [[resource_roles]]
        code = "sales-reader"
        scopes = ["ui"]

        [[resource_roles.entity_policies]]
        entity = "sales_Order"
        actions = ["read"]

        [[row_level_roles]]
        code = "tenant"

        [[row_level_roles.policies]]
        type = "jpql"
        entity = "sales_Order"
        where = "{E}.tenant = :current_user_tenant"
        "#,
    )
    .unwrap();

    let source = Arc::new(DirectoryDefinitionSource::new(dir.path()));
    let config = SecurityConfig::default();
    let resource = DefinitionResourceRoleProvider::new(source.clone(), RoleBuilder::new(), &config).unwrap();
    let row_level = DefinitionRowLevelRoleProvider::new(source, RoleBuilder::new(), &config).unwrap();
    let resolver = CurrentUserRolesResolver::new(&config, Arc::new(resource), Arc::new(row_level)).unwrap();
    let access = AccessManager::new(Arc::new(resolver));

    let user = AuthenticatedUser::new("carol")
        .with_authority("ROLE_sales-manager")
        .with_authority("ROW_LEVEL_ROLE_tenant")
        .with_attribute("tenant", "acme");

    let order = access.check_entity(&user, "sales_Order").unwrap();
    assert!(order.is_permitted(EntityOperation::Read));
    assert!(order.is_permitted(EntityOperation::Update));
    assert!(!order.is_permitted(EntityOperation::Delete));

    let augmented = access.augment_query(&user, "select o from sales_Order o order by o.number").unwrap();
    assert_eq!(augmented.text(), "select o from sales_Order o where (o.tenant = :current_user_tenant) order by o.number");
    assert_eq!(augmented.parameters["current_user_tenant"], json!("acme"));
}

#[test]
fn test_demo_definitions() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../demos/roles");
    let source = Arc::new(DirectoryDefinitionSource::new(dir));
    let config = SecurityConfig::default();
    let resource = DefinitionResourceRoleProvider::new(source.clone(), RoleBuilder::new(), &config).unwrap();
    let row_level = DefinitionRowLevelRoleProvider::new(source, RoleBuilder::new(), &config).unwrap();
    let resolver = CurrentUserRolesResolver::new(&config, Arc::new(resource), Arc::new(row_level)).unwrap();
    let access = AccessManager::new(Arc::new(resolver));

    let user = AuthenticatedUser::new("alice")
        .with_authority("ROLE_sales-manager")
        .with_authority("ROLE_no-discounts")
        .with_authority("ROW_LEVEL_ROLE_eu-region");

    let discount = access.check_attribute(&user, "sales_Order", "discount").unwrap();
    assert!(!discount.can_view());
    let total = access.check_attribute(&user, "sales_Order", "total").unwrap();
    assert!(total.can_view() && total.can_modify());
    assert!(!access.check_specific(&user, "reports.export").unwrap());
    assert!(access.check_entity(&user, "sales_Customer").unwrap().is_permitted(EntityOperation::Read));

    let orders: Vec<EntityRecord> = serde_json::from_str(include_str!("../../../../demos/orders.json")).unwrap();
    let deletable = access.filter_entities(&user, RowLevelPolicyAction::Delete, &orders).unwrap();
    let numbers: Vec<_> = deletable.iter().map(|o| o.attributes["number"].clone()).collect();
    assert_eq!(numbers, vec![json!("SO-1"), json!("SO-3")]);
}
