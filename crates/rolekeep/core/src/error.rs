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

//! Error Types
//!
//! A single error enum covers role definition mistakes, provider guards,
//! role resolution and query augmentation. Permission denial is not an
//! error: it is reported through access contexts.

use thiserror::Error;

/// Main error type for role and access operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoleError {
    /// Role definition is malformed
    #[error("Invalid role definition '{origin}': {reason}")]
    InvalidDefinition { origin: String, reason: String },

    /// Two definitions of the same kind declare the same code
    #[error("Duplicate {kind} role code '{code}' declared by '{first}' and '{second}'")]
    DuplicateRoleCode { kind: RoleKind, code: String, first: String, second: String },

    /// A different role is already registered under the code
    #[error("{kind} role '{code}' is already registered")]
    AlreadyRegistered { kind: RoleKind, code: String },

    /// Refresh was requested while hot deploy is disabled
    #[error("Hot deploy of {kind} roles is disabled by configuration")]
    HotDeployForbidden { kind: RoleKind },

    /// An authority or child role references a code no provider knows
    #[error("{kind} role '{code}' could not be resolved")]
    UnresolvedRole { kind: RoleKind, code: String },

    /// Authority prefixes cannot be inverted unambiguously
    #[error("Invalid authority prefixes: {reason}")]
    InvalidAuthorityPrefixes { reason: String },

    /// Query or condition text could not be parsed
    #[error("Query syntax error at offset {offset}: {message}")]
    QuerySyntax { offset: usize, message: String },

    /// A named parameter has no value in role properties or user attributes
    #[error("Query parameter ':{name}' is not bound")]
    UnboundParameter { name: String },

    /// The in-memory runner met a construct it does not evaluate
    #[error("Unsupported query construct: {construct}")]
    UnsupportedQuery { construct: String },

    /// Definition source could not be read
    #[error("Failed to read role definitions from '{path}': {reason}")]
    SourceIo { path: String, reason: String },

    /// Definition or configuration file could not be parsed
    #[error("Failed to parse '{path}': {reason}")]
    SourceParse { path: String, reason: String },
}

/// Role kind, used to keep resource and row-level namespaces apart in errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Resource,
    RowLevel,
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleKind::Resource => write!(f, "resource"),
            RoleKind::RowLevel => write!(f, "row-level"),
        }
    }
}

impl RoleError {
    /// Development or configuration mistake that should abort startup or the refresh call
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RoleError::InvalidDefinition { .. }
                | RoleError::DuplicateRoleCode { .. }
                | RoleError::AlreadyRegistered { .. }
                | RoleError::InvalidAuthorityPrefixes { .. }
                | RoleError::QuerySyntax { .. }
                | RoleError::SourceParse { .. }
        )
    }

    /// Retrying will not help: the environment forbids the operation
    pub fn is_permanent(&self) -> bool {
        matches!(self, RoleError::HotDeployForbidden { .. })
    }

    pub(crate) fn invalid(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        RoleError::InvalidDefinition {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for role operations
pub type RoleResult<T> = Result<T, RoleError>;
