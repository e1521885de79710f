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

//! Authenticated principal

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::authority::GrantedAuthority;

/// Prefix of query parameters bound from the current user
pub const CURRENT_USER_PARAMETER_PREFIX: &str = "current_user_";

/// The current user as seen by the access engine
pub trait Authentication: Send + Sync {
    fn username(&self) -> &str;

    /// Granted authorities in grant order
    fn authorities(&self) -> &[GrantedAuthority];

    /// User attribute, e.g. `tenant` or `department`
    fn attribute(&self, name: &str) -> Option<&Value>;
}

/// Plain authentication value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub username: String,
    #[serde(default)]
    pub authorities: Vec<GrantedAuthority>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl AuthenticatedUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_authority(mut self, authority: impl Into<GrantedAuthority>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

impl Authentication for AuthenticatedUser {
    fn username(&self) -> &str {
        &self.username
    }

    fn authorities(&self) -> &[GrantedAuthority] {
        &self.authorities
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Value of a `current_user_<attr>` parameter. `current_user_username`
/// is always the username; other names read user attributes.
pub fn current_user_parameter(auth: &dyn Authentication, parameter: &str) -> Option<Value> {
    let attribute = parameter.strip_prefix(CURRENT_USER_PARAMETER_PREFIX)?;
    match attribute {
        "username" => Some(Value::String(auth.username().to_string())),
        _ => auth.attribute(attribute).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_user_parameters() {
        let user = AuthenticatedUser::new("alice").with_attribute("tenant", "acme");
        assert_eq!(current_user_parameter(&user, "current_user_username"), Some(json!("alice")));
        assert_eq!(current_user_parameter(&user, "current_user_tenant"), Some(json!("acme")));
        assert_eq!(current_user_parameter(&user, "current_user_region"), None);
        assert_eq!(current_user_parameter(&user, "tenant"), None);
    }
}
