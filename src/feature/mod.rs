//! Feature store
//!
//! Features are typed partial mappings from nodes (or node pairs) to values,
//! stored one per file in a line oriented text format and kept in memory as
//! compact columns:
//! - `format`: reading and writing feature files
//! - `column`: dictionary encoded node columns, edge adjacency with inverse
//! - `warp`: node types and slot links, which define the node space
//! - `validate`: consistency checks of the slot links
//! - `cache`: versioned binary caches
//! - `store`: discovery, lazy loading and unloading

pub mod cache;
pub mod column;
pub mod format;
pub mod store;
pub mod types;
pub mod validate;
pub mod warp;

pub use column::{EdgeColumn, NodeColumn};
pub use store::{FeatureData, FeatureState, FeatureStore};
pub use types::{
    EdgeMap, FeatureKind, FeatureMeta, Node, NodeMap, RawData, RawFeature, Value, ValueType,
    MAX_NODE, OSLOTS, OTEXT, OTYPE, WARP,
};
pub use warp::{OslotsData, OtypeData};
