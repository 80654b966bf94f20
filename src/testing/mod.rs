//! Testing infrastructure for correctness verification
//!
//! This module provides:
//! - In-memory corpus fixtures that can be assembled into an `Api` or
//!   written to disk as feature files
//! - An invariant checking framework over loaded datasets
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tapestry::testing::prelude::*;
//!
//! let api = CorpusBuilder::bible().api()?;
//! let violations = check_all_invariants(&api, &default_invariants());
//! assert!(violations.is_empty());
//! ```
//!
//! # Invariants
//!
//! - **RankInvertsOrder**: rank is the inverse of the canonical order
//! - **StrictOrder**: the canonical order is strict and total
//! - **SlotsIncreasing**: slot lists increase and agree with the boundary
//! - **EmbeddingConsistent**: up and down navigation agree
//! - **LevelsCoverAllNodes**: the type hierarchy counts every node

pub mod corpus;
pub mod invariants;

pub use corpus::CorpusBuilder;
pub use invariants::{
    check_all_invariants, default_invariants, EmbeddingConsistent, Invariant,
    LevelsCoverAllNodes, RankInvertsOrder, SlotsIncreasing, StrictOrder, Violation,
};

/// Prelude for easy imports
pub mod prelude {
    pub use super::corpus::CorpusBuilder;
    pub use super::invariants::{
        check_all_invariants, default_invariants, Invariant, Violation,
    };
}
