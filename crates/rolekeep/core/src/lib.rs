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

//! Rolekeep Core Library
//!
//! Role-based access control with row-level security: resource and row-level
//! role providers, current-user role resolution, deny-overrides access
//! contexts and JPQL query augmentation.

pub mod access;
pub mod authority;
pub mod config;
pub mod definition;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod model;
pub mod principal;
pub mod provider;
pub mod query;
pub mod repository;
pub mod resolver;

// Re-export the types most callers need
pub use access::{AccessManager, Decision};
pub use authority::{AuthorityRole, GrantedAuthority, RoleAuthorityMapper};
pub use config::{AuthorityConfig, SecurityConfig, UnresolvedRolePolicy};
pub use definition::{DirectoryDefinitionSource, ResourceRoleDefinition, RoleBuilder, RoleDefinitionSource, RowLevelRoleDefinition, StaticDefinitionSource};
pub use entity::{Entity, EntityRecord};
pub use error::{RoleError, RoleKind, RoleResult};
pub use metadata::{EntityMetadata, InMemoryMetadata, MetaClass};
pub use model::{ResourceRole, Role, RoleScope, RowLevelRole};
pub use principal::{AuthenticatedUser, Authentication};
pub use provider::{DefinitionResourceRoleProvider, DefinitionRowLevelRoleProvider, InMemoryRoleProvider, RoleProvider, RoleRegistry};
pub use query::{AugmentedQuery, InMemoryQueryRunner, JpqlQuery};
pub use repository::RoleRepository;
pub use resolver::{CurrentUserRolesResolver, ResolvedRoles};
