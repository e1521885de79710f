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
use rolekeep_core::access::{CrudEntityContext, EntityAttributeContext, MenuItemContext, ResourceAccessContext, ScreenContext, SpecificOperationContext};
use rolekeep_core::model::EntityOperation;

use super::{CommandContext, authenticated_user, verdict};
use crate::{CheckCommands, UserArgs};

pub fn handle_check_command(ctx: &CommandContext, command: CheckCommands) -> Result<()> {
    match command {
        CheckCommands::Entity { entity, user } => check_entity(ctx, &entity, &user),
        CheckCommands::Attribute { entity, attribute, user } => check_attribute(ctx, &entity, &attribute, &user),
        CheckCommands::Screen { screen, user } => {
            let mut check = ScreenContext::new(screen.as_str());
            apply(ctx, &user, &mut check)?;
            println!("screen {}: {}", screen, verdict(check.is_permitted()));
            Ok(())
        }
        CheckCommands::Menu { menu_item, user } => {
            let mut check = MenuItemContext::new(menu_item.as_str());
            apply(ctx, &user, &mut check)?;
            println!("menu {}: {}", menu_item, verdict(check.is_permitted()));
            Ok(())
        }
        CheckCommands::Specific { resource, user } => {
            let mut check = SpecificOperationContext::new(resource.as_str());
            apply(ctx, &user, &mut check)?;
            println!("specific {}: {}", resource, verdict(check.is_permitted()));
            Ok(())
        }
    }
}

fn apply<C: ResourceAccessContext>(ctx: &CommandContext, args: &UserArgs, check: &mut C) -> Result<()> {
    let user = authenticated_user(args)?;
    ctx.access.apply_resource_constraints_in(&user, ctx.scope(args), check)?;
    Ok(())
}

/// CRUD permissions of the user described by `args`
pub fn entity_permissions(ctx: &CommandContext, entity: &str, args: &UserArgs) -> Result<CrudEntityContext> {
    let mut check = CrudEntityContext::new(entity);
    apply(ctx, args, &mut check)?;
    Ok(check)
}

/// View and modify permissions on one attribute
pub fn attribute_permissions(ctx: &CommandContext, entity: &str, attribute: &str, args: &UserArgs) -> Result<EntityAttributeContext> {
    let mut check = EntityAttributeContext::new(entity, attribute);
    apply(ctx, args, &mut check)?;
    Ok(check)
}

fn check_entity(ctx: &CommandContext, entity: &str, args: &UserArgs) -> Result<()> {
    let check = entity_permissions(ctx, entity, args)?;
    for operation in EntityOperation::ALL {
        println!("{:<8} {}: {}", format!("{:?}", operation).to_lowercase(), entity, verdict(check.is_permitted(operation)));
    }
    Ok(())
}

fn check_attribute(ctx: &CommandContext, entity: &str, attribute: &str, args: &UserArgs) -> Result<()> {
    let check = attribute_permissions(ctx, entity, attribute, args)?;
    println!("view   {}.{}: {}", entity, attribute, verdict(check.can_view()));
    println!("modify {}.{}: {}", entity, attribute, verdict(check.can_modify()));
    Ok(())
}
