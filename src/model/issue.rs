//! Release-tracking issue types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A repository on the issue-hosting platform, identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Repository {
    type Err = String;

    /// Parses `owner/name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("expected owner/name, got '{s}'")),
        }
    }
}

/// The issue that tracks an in-progress security release.
///
/// Fetched once per run and never persisted.
#[derive(Debug, Clone)]
pub struct ReleaseIssue {
    pub number: u64,
    pub title: String,

    /// Rendered issue body. Report references are links inside it.
    pub body_html: String,
}
