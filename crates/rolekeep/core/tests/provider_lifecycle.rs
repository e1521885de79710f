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

use proptest::prelude::*;
use rolekeep_core::definition::ResourceRoleDefinition;
use rolekeep_core::model::EntityPolicyAction;
use rolekeep_core::{
    DefinitionResourceRoleProvider, DefinitionRowLevelRoleProvider, Role, RoleBuilder, RoleError, RoleKind, RoleProvider, RowLevelRoleDefinition, SecurityConfig,
    StaticDefinitionSource,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn hot_deploy() -> SecurityConfig {
    SecurityConfig {
        hot_deploy_enabled: true,
        ..SecurityConfig::default()
    }
}

#[test]
fn test_duplicate_codes_fail_startup() {
    let source = Arc::new(
        StaticDefinitionSource::new()
            .with_resource_role(ResourceRoleDefinition::new("manager").with_origin("roles/a.toml"))
            .with_resource_role(ResourceRoleDefinition::new("manager").with_origin("roles/b.toml")),
    );
    let err = DefinitionResourceRoleProvider::new(source, RoleBuilder::new(), &hot_deploy()).err();
    assert_eq!(
        err,
        Some(RoleError::DuplicateRoleCode {
            kind: RoleKind::Resource,
            code: "manager".to_string(),
            first: "roles/a.toml".to_string(),
            second: "roles/b.toml".to_string(),
        })
    );
}

#[test]
fn test_same_code_in_different_kinds_is_allowed() {
    let source = Arc::new(
        StaticDefinitionSource::new()
            .with_resource_role(ResourceRoleDefinition::new("sales"))
            .with_row_level_role(RowLevelRoleDefinition::new("sales")),
    );
    let resource = DefinitionResourceRoleProvider::new(source.clone(), RoleBuilder::new(), &hot_deploy()).unwrap();
    let row_level = DefinitionRowLevelRoleProvider::new(source, RoleBuilder::new(), &hot_deploy()).unwrap();
    assert!(resource.find_role_by_code("sales").is_some());
    assert!(row_level.find_role_by_code("sales").is_some());
}

#[test]
fn test_delete_is_transient_until_refresh() {
    let source = Arc::new(StaticDefinitionSource::new().with_resource_role(ResourceRoleDefinition::new("reader").allow_entity("*", [EntityPolicyAction::Read])));
    let provider = DefinitionResourceRoleProvider::new(source, RoleBuilder::new(), &hot_deploy()).unwrap();

    let reader = provider.find_role_by_code("reader").unwrap();
    assert!(provider.delete_role(&reader));
    assert!(provider.find_role_by_code("reader").is_none());
    assert!(provider.all_roles().is_empty());

    provider.refresh_roles().unwrap();
    let restored = provider.find_role_by_code("reader").unwrap();
    assert_eq!(*restored, *reader);
}

#[test]
fn test_refresh_drops_removed_definitions() {
    let source = Arc::new(
        StaticDefinitionSource::new()
            .with_resource_role(ResourceRoleDefinition::new("reader"))
            .with_resource_role(ResourceRoleDefinition::new("writer")),
    );
    let provider = DefinitionResourceRoleProvider::new(source.clone(), RoleBuilder::new(), &hot_deploy()).unwrap();

    assert!(source.remove_resource_role("writer"));
    assert!(provider.find_role_by_code("writer").is_some());

    provider.refresh_roles().unwrap();
    assert!(provider.find_role_by_code("writer").is_none());
    assert_eq!(provider.all_roles().iter().map(|r| r.code().to_string()).collect::<Vec<_>>(), vec!["reader"]);
}

#[test]
fn test_refresh_forbidden_without_hot_deploy() {
    let source = Arc::new(StaticDefinitionSource::new().with_row_level_role(RowLevelRoleDefinition::new("own-orders")));
    let provider = DefinitionRowLevelRoleProvider::new(source.clone(), RoleBuilder::new(), &SecurityConfig::default()).unwrap();

    source.clear();
    let err = provider.refresh_roles().unwrap_err();
    assert!(err.is_permanent());
    assert!(!err.is_configuration_error());
    assert!(provider.find_role_by_code("own-orders").is_some());
}

fn generation(codes: &BTreeSet<String>, generation: u64) -> Vec<ResourceRoleDefinition> {
    codes
        .iter()
        .map(|code| {
            ResourceRoleDefinition::new(code.clone())
                .with_name(format!("{}@{}", code, generation))
                .with_property("generation", generation)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn concurrent_refresh_never_mixes_generations(
        first in prop::collection::btree_set("[a-z]{1,6}", 1..8),
        second in prop::collection::btree_set("[a-z]{1,6}", 1..8),
    ) {
        let source = Arc::new(StaticDefinitionSource::new());
        for definition in generation(&first, 0) {
            source.add_resource_role(definition);
        }
        let provider = DefinitionResourceRoleProvider::new(source.clone(), RoleBuilder::new(), &hot_deploy()).unwrap();
        let done = AtomicBool::new(false);
        let lookups: Vec<String> = first.union(&second).cloned().collect();

        std::thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut checked = 0usize;
                        while !done.load(Ordering::Acquire) {
                            let snapshot = provider.registry().snapshot();
                            let generations: BTreeSet<Option<u64>> = snapshot.values().map(|r| r.custom_properties()["generation"].as_u64()).collect();
                            assert_eq!(generations.len(), 1, "snapshot mixes generations: {:?}", generations);

                            for code in &lookups {
                                if let Some(role) = provider.find_role_by_code(code) {
                                    let stamp = role.custom_properties()["generation"].as_u64().unwrap();
                                    assert_eq!(role.name(), format!("{}@{}", code, stamp));
                                }
                            }
                            checked += 1;
                        }
                        checked
                    })
                })
                .collect();

            for round in 1..=32u64 {
                let codes = if round % 2 == 0 { &first } else { &second };
                source.clear();
                for definition in generation(codes, round) {
                    source.add_resource_role(definition);
                }
                provider.refresh_roles().unwrap();
                let snapshot = provider.registry().snapshot();
                assert_eq!(snapshot.len(), codes.len());
            }
            done.store(true, Ordering::Release);

            for reader in readers {
                reader.join().unwrap();
            }
        });

        let final_codes: BTreeSet<String> = provider.all_roles().iter().map(|r| r.code().to_string()).collect();
        prop_assert_eq!(final_codes, first);
    }
}
