//! Opaque 128-bit identifiers shared by the data model (session, context,
//! browser instance, page).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A newtype around a v4 UUID, serialized as its hyphenated string form.
///
/// Every top-level record (`Session`, `Context`, `BrowserInstance`, `Page`)
/// is keyed by one of these rather than a raw `Uuid` so the types can't be
/// mixed up across components at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(Id::new(), Id::new());
    }

    #[test]
    fn round_trips_through_string() {
        let id = Id::new();
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
