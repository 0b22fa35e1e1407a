//! Shared identifier types used across the scheduler.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned to each operation at submission.
pub type OperationId = u64;

/// An independently rate-limited API surface, e.g. `core` or `search`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceClass(String);

impl ResourceClass {
    /// REST endpoints.
    pub const CORE: &'static str = "core";
    /// Search endpoints.
    pub const SEARCH: &'static str = "search";
    /// GraphQL endpoint.
    pub const GRAPHQL: &'static str = "graphql";

    /// Create a resource class from any name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The `core` class.
    #[must_use]
    pub fn core() -> Self {
        Self::new(Self::CORE)
    }

    /// The `search` class.
    #[must_use]
    pub fn search() -> Self {
        Self::new(Self::SEARCH)
    }

    /// Class name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// One of the classes GitHub reports: `core`, `search` or `graphql`.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(self.0.as_str(), Self::CORE | Self::SEARCH | Self::GRAPHQL)
    }

    /// Whether this is the `core` class, the one that reveals authentication.
    #[must_use]
    pub fn is_core(&self) -> bool {
        self.0 == Self::CORE
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceClass {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceClass {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&ResourceClass> for ResourceClass {
    fn from(value: &ResourceClass) -> Self {
        value.clone()
    }
}

impl AsRef<str> for ResourceClass {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ResourceClass {
    fn borrow(&self) -> &str {
        &self.0
    }
}
