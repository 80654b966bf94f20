//! Template search
//!
//! A template describes a tuple of nodes by their types, features and the
//! relations between them. Searching runs in stages:
//! - `syntax`: parse the template text into atoms, relations and quantifiers
//! - `compile`: resolve atoms to yarns (candidate node sets) and relations
//!   to executable `Relation`s, reporting every problem at once
//! - `plan`: spin yarns, estimate spreads and fix the binding order
//! - `executor`: backtrack over the plan with a resumable cursor
//!
//! `Search` ties the stages together and keeps the last study around for
//! `fetch`, `count` and `show_plan`.
//!
//! # Example
//!
//! ```text
//! book book=Genesis
//!   chapter chapter=1
//!     w1:word pos=art
//!     <: word pos=noun
//! ```

pub mod compile;
mod engine;
pub mod executor;
pub mod plan;
pub mod relations;
pub mod syntax;

pub use compile::{Query, Sets};
pub use engine::Search;
pub use executor::{Cursor, Tuple};
pub use plan::Plan;
pub use relations::{Relation, LEGEND};
pub use syntax::{parse, Template};
