pub mod api;
pub mod config;
pub mod error;
pub mod fabric;
pub mod feature;
pub mod log;
pub mod prepare;
pub mod search;
pub mod testing;

pub use api::Api;
pub use config::{FabricConfig, SearchProfile, SearchSettings, TextConfig};
pub use error::{Result, TapestryError};
pub use fabric::{Fabric, FeatureOverview};
pub use feature::{FeatureKind, FeatureMeta, Node, RawFeature, Value, ValueType};
pub use log::{MessageLog, Severity, Silence};
pub use search::{Search, Sets, Tuple};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
