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

use anyhow::{Result, anyhow};
use rolekeep_core::model::{ResourcePolicy, RowLevelPolicy};
use rolekeep_core::{ResourceRole, Role, RoleProvider, RowLevelRole};

use super::CommandContext;
use crate::{KindArg, RoleCommands};

pub fn handle_role_command(ctx: &CommandContext, command: RoleCommands) -> Result<()> {
    match command {
        RoleCommands::List { kind } => list_roles(ctx, kind),
        RoleCommands::Show { code, kind } => show_role(ctx, &code, kind),
    }
}

fn list_roles(ctx: &CommandContext, kind: Option<KindArg>) -> Result<()> {
    println!("{:<10} {:<28} {:<28} {:<10} {}", "Kind", "Code", "Name", "Policies", "Source");
    println!("{}", "-".repeat(100));

    if kind != Some(KindArg::RowLevel) {
        for role in ctx.resource_roles.all_roles() {
            println!("{:<10} {:<28} {:<28} {:<10} {}", "resource", role.code(), role.name(), role.policies().len(), role.source());
        }
    }
    if kind != Some(KindArg::Resource) {
        for role in ctx.row_level_roles.all_roles() {
            println!("{:<10} {:<28} {:<28} {:<10} {}", "row-level", role.code(), role.name(), role.policies().len(), role.source());
        }
    }
    Ok(())
}

fn show_role(ctx: &CommandContext, code: &str, kind: KindArg) -> Result<()> {
    match kind {
        KindArg::Resource => {
            let role = ctx.resource_roles.find_role_by_code(code).ok_or_else(|| anyhow!("Resource role '{}' not found", code))?;
            print_resource_role(&role);
        }
        KindArg::RowLevel => {
            let role = ctx.row_level_roles.find_role_by_code(code).ok_or_else(|| anyhow!("Row-level role '{}' not found", code))?;
            print_row_level_role(&role);
        }
    }
    Ok(())
}

fn print_header<R: Role>(role: &R, description: Option<&str>) {
    println!("Code:        {}", role.code());
    println!("Name:        {}", role.name());
    if let Some(description) = description {
        println!("Description: {}", description);
    }
    println!("Source:      {}", role.source());
    if !role.child_roles().is_empty() {
        println!("Children:    {}", role.child_roles().join(", "));
    }
    for (name, value) in role.custom_properties() {
        println!("Property:    {} = {}", name, value);
    }
}

fn print_resource_role(role: &ResourceRole) {
    print_header(role, role.description());
    let scopes: Vec<String> = role.scopes().iter().map(ToString::to_string).collect();
    println!("Scopes:      {}", scopes.join(", "));
    println!("Policies:");
    for policy in role.policies() {
        let line = match policy {
            ResourcePolicy::Entity { entity, action, effect } => format!("{:?} entity {} {:?}", effect, entity, action),
            ResourcePolicy::EntityAttribute {
                entity,
                attribute,
                action,
                effect,
            } => format!("{:?} attribute {}.{} {:?}", effect, entity, attribute, action),
            ResourcePolicy::Screen { screen, effect } => format!("{:?} screen {}", effect, screen),
            ResourcePolicy::Menu { menu_item, effect } => format!("{:?} menu {}", effect, menu_item),
            ResourcePolicy::Specific { resource, effect } => format!("{:?} specific {}", effect, resource),
        };
        println!("  {}", line);
    }
}

fn print_row_level_role(role: &RowLevelRole) {
    print_header(role, role.description());
    println!("Policies:");
    for policy in role.policies() {
        match policy {
            RowLevelPolicy::Jpql {
                entity,
                where_clause,
                join_clause,
            } => {
                println!("  JPQL {} where {}", entity, where_clause);
                if let Some(join) = join_clause {
                    println!("       {}", join);
                }
            }
            RowLevelPolicy::Predicate { entity, action, predicate } => {
                println!("  Predicate {} {:?}: {}", entity, action, predicate.description());
            }
        }
    }
}
