use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Stable, server-assigned primary key for an [`Asset`](crate::Asset).
///
/// Distinct from [`ItemId`] even though both are plain integers on the
/// wire: mixing the two spaces up is exactly the bug the split into two
/// newtypes exists to prevent (see §9's "pair of parallel id spaces" note).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(pub u64);

impl UniqueId {
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned id used inside an [`Asset`](crate::Asset)'s ancestor
/// `path` array. Parallel to, but never interchangeable with, [`UniqueId`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl ItemId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
