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

//! Rolekeep CLI
//!
//! Inspect role definitions and evaluate access decisions against a
//! directory of definition files.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rolekeep_core::RoleScope;
use std::path::PathBuf;
use std::process;
use tracing::error;

use crate::commands::CommandContext;
use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "rolekeep", about = "Role-based and row-level access control toolkit")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Role definition directory (overrides $ROLEKEEP_DEFINITIONS)
    #[arg(long, short = 'd', global = true)]
    pub definitions: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Role kind selector
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Resource,
    RowLevel,
}

/// Client scope selector
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeArg {
    Ui,
    Api,
}

impl From<ScopeArg> for RoleScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Ui => RoleScope::Ui,
            ScopeArg::Api => RoleScope::Api,
        }
    }
}

/// The user a command evaluates access for
#[derive(clap::Args, Debug, Clone)]
pub struct UserArgs {
    /// Username
    #[arg(long, short = 'u', default_value = "anonymous")]
    pub user: String,

    /// Granted authority, e.g. ROLE_sales-manager (repeatable)
    #[arg(long = "authority", short = 'a')]
    pub authorities: Vec<String>,

    /// User attribute as key=value; the value is parsed as JSON when possible (repeatable)
    #[arg(long = "attribute")]
    pub attributes: Vec<String>,

    /// Evaluate resource roles for this scope instead of the configured default
    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,
}

#[derive(Subcommand, Debug)]
pub enum RoleCommands {
    /// List roles of one or both kinds
    List {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Show a role with its policies
    Show {
        code: String,
        #[arg(long, value_enum, default_value = "resource")]
        kind: KindArg,
    },
}

#[derive(Subcommand, Debug)]
pub enum CheckCommands {
    /// CRUD permissions on an entity
    Entity {
        entity: String,
        #[command(flatten)]
        user: UserArgs,
    },
    /// View and modify permissions on an entity attribute
    Attribute {
        entity: String,
        attribute: String,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Permission to open a screen
    Screen {
        screen: String,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Permission to see a menu item
    Menu {
        menu_item: String,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Permission for a specific operation
    Specific {
        resource: String,
        #[command(flatten)]
        user: UserArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthorityCommands {
    /// Authority string for a role code
    Encode {
        code: String,
        #[arg(long, value_enum, default_value = "resource")]
        kind: KindArg,
    },
    /// Role behind an authority string
    Decode { authority: String },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect loaded roles
    Roles {
        #[command(subcommand)]
        command: RoleCommands,
    },
    /// Resolve the roles held by a user
    Resolve {
        #[command(flatten)]
        user: UserArgs,
    },
    /// Evaluate a permission check
    Check {
        #[command(subcommand)]
        command: CheckCommands,
    },
    /// Apply row-level constraints to a JPQL query
    Query {
        query: String,
        /// JSON file with an array of entity records to run the query against
        #[arg(long)]
        data: Option<PathBuf>,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Encode or decode authority strings
    Authority {
        #[command(subcommand)]
        command: AuthorityCommands,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = CliConfig::resolve(cli.config, cli.definitions)?;

    match cli.command {
        // Authority mapping needs no definitions
        Commands::Authority { command } => commands::authority::handle_authority_command(&config, command),
        Commands::Roles { command } => commands::roles::handle_role_command(&CommandContext::new(config)?, command),
        Commands::Resolve { user } => commands::resolve::resolve_user(&CommandContext::new(config)?, &user),
        Commands::Check { command } => commands::check::handle_check_command(&CommandContext::new(config)?, command),
        Commands::Query { query, data, user } => commands::query::run_query(&CommandContext::new(config)?, &query, data.as_deref(), &user),
    }
}
