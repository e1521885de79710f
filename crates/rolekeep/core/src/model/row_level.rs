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

//! Row-level roles
//!
//! A row-level role restricts which entity instances a user sees or may
//! change. JPQL policies add conditions to read queries; predicate policies
//! are evaluated against instances already in memory.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::Role;
use crate::entity::Entity;
use crate::error::{RoleKind, RoleResult};
use crate::query::{ENTITY_ALIAS_PLACEHOLDER, EvalContext, Expr};

/// Alias the entity placeholder is bound to inside predicate conditions
const PREDICATE_ALIAS: &str = "this";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowLevelPolicyAction {
    Create,
    Read,
    Update,
    Delete,
}

impl RowLevelPolicyAction {
    pub const ALL: [RowLevelPolicyAction; 4] = [
        RowLevelPolicyAction::Create,
        RowLevelPolicyAction::Read,
        RowLevelPolicyAction::Update,
        RowLevelPolicyAction::Delete,
    ];
}

#[derive(Clone)]
enum PredicateKind {
    Condition { text: String, expr: Arc<Expr> },
    Custom { description: String },
}

/// In-memory test applied to an entity instance
#[derive(Clone)]
pub struct RowLevelPredicate {
    kind: PredicateKind,
    test: Arc<dyn Fn(&dyn Entity) -> bool + Send + Sync>,
}

impl RowLevelPredicate {
    /// Wrap an arbitrary closure
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&dyn Entity) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: PredicateKind::Custom { description: description.into() },
            test: Arc::new(test),
        }
    }

    /// Compile a declarative condition such as `{E}.region = :region`.
    /// Parameters are bound from `properties` when the predicate is tested.
    /// An evaluation failure counts as a failed test.
    pub fn from_condition(condition: &str, properties: &BTreeMap<String, Value>) -> RoleResult<Self> {
        let expr = Arc::new(Expr::parse(&condition.replace(ENTITY_ALIAS_PLACEHOLDER, PREDICATE_ALIAS))?);
        let parameters = properties.clone();
        let compiled = Arc::clone(&expr);
        let text = condition.to_string();
        let logged = text.clone();
        let test = move |entity: &dyn Entity| {
            let ctx = EvalContext {
                entity,
                alias: PREDICATE_ALIAS,
                parameters: &parameters,
            };
            match compiled.matches(&ctx) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!(condition = %logged, entity = entity.entity_name(), "Predicate evaluation failed: {}", e);
                    false
                }
            }
        };
        Ok(Self {
            kind: PredicateKind::Condition { text, expr },
            test: Arc::new(test),
        })
    }

    pub fn test(&self, entity: &dyn Entity) -> bool {
        (self.test)(entity)
    }

    /// Condition text for declarative predicates
    pub fn condition(&self) -> Option<&str> {
        match &self.kind {
            PredicateKind::Condition { text, .. } => Some(text),
            PredicateKind::Custom { .. } => None,
        }
    }

    pub fn description(&self) -> &str {
        match &self.kind {
            PredicateKind::Condition { text, .. } => text,
            PredicateKind::Custom { description } => description,
        }
    }
}

impl fmt::Debug for RowLevelPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PredicateKind::Condition { expr, .. } => f.debug_tuple("Condition").field(expr).finish(),
            PredicateKind::Custom { description } => f.debug_tuple("Custom").field(description).finish(),
        }
    }
}

impl PartialEq for RowLevelPredicate {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (PredicateKind::Condition { text: a, .. }, PredicateKind::Condition { text: b, .. }) => a == b,
            (PredicateKind::Custom { .. }, PredicateKind::Custom { .. }) => Arc::ptr_eq(&self.test, &other.test),
            _ => false,
        }
    }
}

/// A data filter
#[derive(Debug, Clone, PartialEq)]
pub enum RowLevelPolicy {
    /// Condition appended to read queries for the entity. `{E}` stands for the root alias.
    Jpql { entity: String, where_clause: String, join_clause: Option<String> },
    /// Test applied to in-memory instances for one action
    Predicate {
        entity: String,
        action: RowLevelPolicyAction,
        predicate: RowLevelPredicate,
    },
}

impl RowLevelPolicy {
    pub fn entity(&self) -> &str {
        match self {
            RowLevelPolicy::Jpql { entity, .. } | RowLevelPolicy::Predicate { entity, .. } => entity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowLevelRole {
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) source: String,
    pub(crate) child_roles: Vec<String>,
    pub(crate) custom_properties: BTreeMap<String, Value>,
    pub(crate) policies: Vec<RowLevelPolicy>,
}

impl RowLevelRole {
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn policies(&self) -> &[RowLevelPolicy] {
        &self.policies
    }

    /// Policies applying to an entity
    pub fn policies_for<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a RowLevelPolicy> + 'a {
        self.policies.iter().filter(move |p| p.entity() == entity)
    }
}

impl Role for RowLevelRole {
    const KIND: RoleKind = RoleKind::RowLevel;

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
