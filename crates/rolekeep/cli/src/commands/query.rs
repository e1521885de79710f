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

use anyhow::{Context, Result};
use rolekeep_core::{AugmentedQuery, EntityRecord, InMemoryQueryRunner};
use std::path::Path;

use super::{CommandContext, authenticated_user};
use crate::UserArgs;

pub fn run_query(ctx: &CommandContext, query: &str, data: Option<&Path>, args: &UserArgs) -> Result<()> {
    let augmented = augment(ctx, query, args)?;

    println!("{}", augmented.text());
    if !augmented.parameters.is_empty() {
        println!("Parameters:");
        for (name, value) in &augmented.parameters {
            println!("  :{} = {}", name, value);
        }
    }

    let Some(path) = data else {
        return Ok(());
    };
    let records = load_records(path)?;
    let rows = InMemoryQueryRunner::new().run(&augmented, &records)?;

    println!("{} of {} records:", rows.len(), records.len());
    for row in rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

/// Apply the user's row-level roles to `query`
pub fn augment(ctx: &CommandContext, query: &str, args: &UserArgs) -> Result<AugmentedQuery> {
    let user = authenticated_user(args)?;
    Ok(ctx.access.augment_query(&user, query)?)
}

/// Records file: a JSON array of objects, each carrying its `entity` name
pub fn load_records(path: &Path) -> Result<Vec<EntityRecord>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}
