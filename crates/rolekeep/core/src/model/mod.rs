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

//! # Role Model
//!
//! Immutable role values. Resource roles bundle permissions over entities,
//! attributes, screens, menu items and specific resources. Row-level roles
//! bundle data filters. Both are identified by a code that is unique within
//! their kind.

pub mod resource;
pub mod row_level;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::RoleKind;

pub use resource::{AttributeAction, EntityOperation, EntityPolicyAction, PolicyEffect, ResourcePolicy, ResourceRole};
pub use row_level::{RowLevelPolicy, RowLevelPolicyAction, RowLevelPredicate, RowLevelRole};

/// Client surface a resource role applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    Ui,
    Api,
}

impl std::fmt::Display for RoleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleScope::Ui => write!(f, "ui"),
            RoleScope::Api => write!(f, "api"),
        }
    }
}

/// Behaviour shared by both role kinds
pub trait Role: Send + Sync + 'static {
    const KIND: RoleKind;

    fn code(&self) -> &str;

    fn name(&self) -> &str;

    /// Where the role was declared, e.g. a definition file path
    fn source(&self) -> &str;

    fn child_roles(&self) -> &[String];

    /// Custom properties, also used to bind JPQL parameters
    fn custom_properties(&self) -> &BTreeMap<String, Value>;
}
