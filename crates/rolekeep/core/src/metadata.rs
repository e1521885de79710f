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

//! Entity Metadata
//!
//! Lookup of entity names and their attributes, used to validate policy
//! targets when roles are built. The data layer owns the real metadata;
//! `InMemoryMetadata` is enough for configuration-driven setups and tests.

use std::collections::{BTreeSet, HashMap};

/// Entity metadata lookup
pub trait EntityMetadata: Send + Sync {
    /// Metadata for an entity, if it is known
    fn find_entity(&self, name: &str) -> Option<&MetaClass>;
}

/// Metadata for a single entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaClass {
    pub name: String,
    pub attributes: BTreeSet<String>,
}

impl MetaClass {
    pub fn new<I, S>(name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }
}

/// Metadata registry held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadata {
    entities: HashMap<String, MetaClass>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, meta_class: MetaClass) -> Self {
        self.register(meta_class);
        self
    }

    pub fn register(&mut self, meta_class: MetaClass) {
        self.entities.insert(meta_class.name.clone(), meta_class);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityMetadata for InMemoryMetadata {
    fn find_entity(&self, name: &str) -> Option<&MetaClass> {
        self.entities.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let metadata = InMemoryMetadata::new().with_entity(MetaClass::new("sales_Order", ["number", "status", "total"]));

        let order = metadata.find_entity("sales_Order").unwrap();
        assert!(order.has_attribute("status"));
        assert!(!order.has_attribute("owner"));
        assert!(metadata.find_entity("sales_Customer").is_none());
        assert_eq!(metadata.len(), 1);
    }
}
