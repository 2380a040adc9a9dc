//! Strongly-typed identifiers for tally entities.
//!
//! Entity identities are assigned by the backing store as 64-bit integers.
//! Wrapping them keeps a branch id from being passed where a text-unit id is
//! expected:
//!
//! ```rust
//! use tally_core::id::{BranchId, TextUnitId};
//!
//! let branch = BranchId::new(7);
//! let text_unit = TextUnitId::new(7);
//!
//! // IDs are different types - this won't compile:
//! // let wrong: BranchId = text_unit;
//! assert_eq!(branch.get(), text_unit.get());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw store-assigned identity.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw identity.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                s.trim().parse::<i64>().map(Self).map_err(|e| Error::InvalidId {
                    message: format!(concat!("invalid ", $label, " ID '{}': {}"), s, e),
                })
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identifies a repository, the owner of branches and text units.
    RepositoryId,
    "repository"
);

entity_id!(
    /// Identifies a branch of a repository.
    BranchId,
    "branch"
);

entity_id!(
    /// Identifies the cached aggregate statistic row of a branch.
    BranchStatisticId,
    "branch statistic"
);

entity_id!(
    /// Identifies a per-text-unit statistic row of a branch.
    BranchTextUnitStatisticId,
    "branch text unit statistic"
);

entity_id!(
    /// Identifies a translatable text unit.
    TextUnitId,
    "text unit"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrips_through_display() {
        let id = BranchId::new(1234);
        let parsed: BranchId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "abc".parse::<TextUnitId>().unwrap_err();
        assert!(err.to_string().contains("invalid text unit ID 'abc'"));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&RepositoryId::new(9)).unwrap();
        assert_eq!(json, "9");
    }

    #[test]
    fn ids_order_by_raw_value() {
        assert!(TextUnitId::new(1) < TextUnitId::new(2));
    }
}
