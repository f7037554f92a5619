pub mod config;
pub mod error;
pub mod finding;
pub mod table;

pub use config::{AnalysisConfig, CorePartitionSource};
pub use error::*;
pub use finding::*;
pub use table::*;
