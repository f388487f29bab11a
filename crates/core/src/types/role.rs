use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// What a registered processor does for a given service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Content ingestion for a collection.
    Content,
    /// Ranked retrieval.
    Search,
    /// Pairwise scoring of a query against given candidates.
    Score,
    /// Raw query forwarding, the legacy name of `Search`.
    Query,
}

impl Role {
    /// All roles, in declaration order.
    pub const ALL: [Role; 4] = [Role::Content, Role::Search, Role::Score, Role::Query];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Content => "content",
            Role::Search => "search",
            Role::Score => "score",
            Role::Query => "query",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "content" => Ok(Role::Content),
            "search" => Ok(Role::Search),
            "score" => Ok(Role::Score),
            "query" => Ok(Role::Query),
            other => Err(Error::invalid_request(format!("unknown role `{}`", other))),
        }
    }
}
