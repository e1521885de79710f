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

//! In-memory query runner
//!
//! Executes the where expression of a query against entity records. Joins
//! are not evaluated; a query carrying join clauses is rejected.

use tracing::debug;

use super::condition::{EvalContext, Expr};
use super::{AugmentedQuery, JpqlQuery};
use crate::entity::Entity;
use crate::error::{RoleError, RoleResult};

/// Runs queries over in-memory entities
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryQueryRunner;

impl InMemoryQueryRunner {
    pub fn new() -> Self {
        Self
    }

    /// Entities of the query's root type that satisfy its where expression
    pub fn run<'e, E: Entity>(&self, query: &AugmentedQuery, entities: &'e [E]) -> RoleResult<Vec<&'e E>> {
        let filter = Self::compile(&query.query)?;
        let mut rows = Vec::new();
        for entity in entities.iter().filter(|e| e.entity_name() == query.query.entity) {
            let admitted = match &filter {
                Some(expr) => {
                    let ctx = EvalContext {
                        entity,
                        alias: &query.query.alias,
                        parameters: &query.parameters,
                    };
                    expr.matches(&ctx)?
                }
                None => true,
            };
            if admitted {
                rows.push(entity);
            }
        }
        debug!("Query on {} admitted {} of {} entities", query.query.entity, rows.len(), entities.len());
        Ok(rows)
    }

    fn compile(query: &JpqlQuery) -> RoleResult<Option<Expr>> {
        if let Some(join) = query.joins.first() {
            return Err(RoleError::UnsupportedQuery {
                construct: format!("join clause '{}'", join),
            });
        }
        query.where_expression().map(|text| Expr::parse(&text)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRecord;
    use std::collections::BTreeMap;

    fn augmented(text: &str) -> AugmentedQuery {
        AugmentedQuery {
            query: JpqlQuery::parse(text).unwrap(),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn test_filters_by_entity_and_where() {
        let entities = vec![
            EntityRecord::new("sales_Order").with("total", 5),
            EntityRecord::new("sales_Order").with("total", 50),
            EntityRecord::new("sales_Customer").with("total", 50),
        ];
        let runner = InMemoryQueryRunner::new();

        let rows = runner.run(&augmented("select e from sales_Order e where e.total > 10"), &entities).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attributes["total"], 50);

        let all = runner.run(&augmented("select e from sales_Order e"), &entities).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_rejects_joins() {
        let entities: Vec<EntityRecord> = Vec::new();
        let result = InMemoryQueryRunner::new().run(&augmented("select e from sales_Order e join e.lines l"), &entities);
        assert!(matches!(result, Err(RoleError::UnsupportedQuery { .. })));
    }
}
