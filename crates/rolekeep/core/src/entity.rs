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

//! Entity instances as seen by row-level predicates and the in-memory
//! query runner.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Read access to an entity instance
pub trait Entity {
    /// Entity name, e.g. `sales_Order`
    fn entity_name(&self) -> &str;

    /// Value of a top-level attribute
    fn attribute(&self, name: &str) -> Option<&Value>;
}

/// Resolve a dotted attribute path. Nested segments walk JSON objects.
pub fn resolve_path<'a, E: Entity + ?Sized>(entity: &'a E, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = entity.attribute(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Generic entity record backed by a JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "entity")]
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(attribute.into(), value.into());
        self
    }
}

impl Entity for EntityRecord {
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}
