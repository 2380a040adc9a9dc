//! # tally-core
//!
//! Core abstractions for the tally translation-statistics reconciler.
//!
//! This crate provides the foundational types shared by every tally component:
//!
//! - **Identifiers**: Strongly-typed IDs for repositories, branches, statistics and text units
//! - **Diff Engine**: Set-difference between a desired and a currently stored key set
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashSet;
//!
//! use tally_core::prelude::*;
//!
//! let desired: HashSet<TextUnitId> = [2, 3, 4].into_iter().map(TextUnitId::new).collect();
//! let current: HashSet<TextUnitId> = [1, 2, 3].into_iter().map(TextUnitId::new).collect();
//!
//! let diff = KeyDiff::compute(&desired, &current);
//! assert!(diff.stale.contains(&TextUnitId::new(1)));
//! assert!(diff.missing.contains(&TextUnitId::new(4)));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod diff;
pub mod error;
pub mod id;
pub mod observability;

pub use diff::{missing_keys, stale_keys, KeyDiff};
pub use error::{Error, Result};
pub use id::{BranchId, BranchStatisticId, BranchTextUnitStatisticId, RepositoryId, TextUnitId};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use tally_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::diff::{missing_keys, stale_keys, KeyDiff};
    pub use crate::error::{Error, Result};
    pub use crate::id::{
        BranchId, BranchStatisticId, BranchTextUnitStatisticId, RepositoryId, TextUnitId,
    };
}
