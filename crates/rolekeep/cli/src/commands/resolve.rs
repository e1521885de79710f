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

use anyhow::Result;
use rolekeep_core::Role;

use super::{CommandContext, authenticated_user};
use crate::UserArgs;

pub fn resolve_user(ctx: &CommandContext, args: &UserArgs) -> Result<()> {
    let user = authenticated_user(args)?;
    let scope = ctx.scope(args);
    let roles = ctx.access.resolver().resolve_for_scope(&user, scope)?;

    println!("User: {} (scope: {})", args.user, scope);
    if roles.is_empty() {
        println!("No roles resolved.");
        return Ok(());
    }

    println!("Resource roles:");
    for role in &roles.resource_roles {
        println!("  {:<28} {}", role.code(), role.name());
    }
    println!("Row-level roles:");
    for role in &roles.row_level_roles {
        println!("  {:<28} {}", role.code(), role.name());
    }
    Ok(())
}
