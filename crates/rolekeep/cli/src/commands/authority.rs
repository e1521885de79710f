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
use rolekeep_core::{AuthorityRole, GrantedAuthority, RoleAuthorityMapper};

use crate::config::CliConfig;
use crate::{AuthorityCommands, KindArg};

pub fn handle_authority_command(config: &CliConfig, command: AuthorityCommands) -> Result<()> {
    let mapper = RoleAuthorityMapper::new(config.security.authorities.clone())?;
    match command {
        AuthorityCommands::Encode { code, kind } => {
            let authority = match kind {
                KindArg::Resource => mapper.resource_role_authority(&code),
                KindArg::RowLevel => mapper.row_level_role_authority(&code),
            };
            println!("{}", authority);
        }
        AuthorityCommands::Decode { authority } => {
            let authority = GrantedAuthority::new(authority);
            match mapper.decode(&authority) {
                Some(AuthorityRole::Resource(code)) => println!("resource role {}", code),
                Some(AuthorityRole::RowLevel(code)) => println!("row-level role {}", code),
                None => println!("{} is not a role authority", authority),
            }
        }
    }
    Ok(())
}
