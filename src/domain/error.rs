//! Domain error types.

/// Why a sandboxed strategy run could not produce a signal sequence.
///
/// Any of these fails the whole dataset trial; no partial output is used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionFailure {
    #[error("failed to start strategy process: {reason}")]
    Spawn { reason: String },

    #[error("i/o error while talking to strategy process: {reason}")]
    Io { reason: String },

    #[error("strategy process exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("strategy process exceeded its {seconds}s budget")]
    Timeout { seconds: u64 },

    #[error("failed to parse strategy output: {reason}")]
    MalformedOutput { reason: String },

    #[error("strategy produced {actual} signals for a series of {expected} points")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Top-level error type for zkquant.
#[derive(Debug, thiserror::Error)]
pub enum ZkquantError {
    #[error("market generation error: {reason}")]
    Generation { reason: String },

    #[error(transparent)]
    Execution(#[from] ExecutionFailure),

    #[error("strategy did not generate enough trades: {trades} (minimum {minimum} required)")]
    InsufficientTrades { trades: usize, minimum: usize },

    #[error("persistence error at {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("master model state is poisoned by a panicked writer")]
    StatePoisoned,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZkquantError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ZkquantError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&ZkquantError> for std::process::ExitCode {
    fn from(err: &ZkquantError) -> Self {
        let code: u8 = match err {
            ZkquantError::Io(_) => 1,
            ZkquantError::ConfigParse { .. } | ZkquantError::ConfigInvalid { .. } => 2,
            ZkquantError::Execution(_) => 3,
            ZkquantError::InsufficientTrades { .. } => 4,
            ZkquantError::Persistence { .. } | ZkquantError::StatePoisoned => 5,
            ZkquantError::Generation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
