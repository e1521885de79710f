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

//! Access decisions
//!
//! Each role votes on a check; votes combine with deny-overrides. The
//! combination is commutative and associative with `Abstain` as identity,
//! so the order in which roles are consulted never changes the outcome.

use serde::{Deserialize, Serialize};

/// A single vote, or the aggregate of many
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Permit,
    Deny,
    /// The voter has no policy for the resource
    #[default]
    Abstain,
}

impl Decision {
    /// Deny-overrides combination
    pub fn combine(self, other: Decision) -> Decision {
        match (self, other) {
            (Decision::Deny, _) | (_, Decision::Deny) => Decision::Deny,
            (Decision::Permit, _) | (_, Decision::Permit) => Decision::Permit,
            _ => Decision::Abstain,
        }
    }

    /// Fold any number of votes
    pub fn aggregate<I>(votes: I) -> Decision
    where
        I: IntoIterator<Item = Decision>,
    {
        let mut result = Decision::Abstain;
        for vote in votes {
            result = result.combine(vote);
            if result == Decision::Deny {
                break;
            }
        }
        result
    }

    /// Only an explicit permit grants access; abstention does not
    pub fn is_permit(self) -> bool {
        self == Decision::Permit
    }
}
