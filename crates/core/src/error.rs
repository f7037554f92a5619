use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceLensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Arrow error: {0}")]
    Arrow(String),

    /// A column exists but one of its cells cannot be read as the expected type.
    #[error("Schema error in table '{table}', column '{column}': {detail}")]
    Schema {
        table: String,
        column: String,
        detail: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Run-wide configuration failures. Raised before any detector runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("LITTLE and BIG core sets overlap on cores {cores:?}")]
    OverlappingCores { cores: Vec<u32> },

    #[error("Invalid value {value} for '{name}': {reason}")]
    InvalidThreshold {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("critical_thread_names must not be empty")]
    EmptyCriticalThreads,

    #[error("target_process must not be empty")]
    EmptyTargetProcess,

    #[error("Config parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, TraceLensError>;
