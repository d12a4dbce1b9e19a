use std::{io, path::PathBuf};

/// Error kinds the engine distinguishes. `TargetParse`, `InvalidPattern`,
/// `UnknownMember` and `MissingMember` abort a run; `FileRead` and `Decode`
/// only skip the file they belong to.
#[derive(Debug, thiserror::Error)]
pub enum FinderError {
    #[error("no class, interface, enum or object declaration found in {0}")]
    TargetParse(String),

    #[error("invalid member pattern '/{pattern}/': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown {kind}: {names} (available: {available})")]
    UnknownMember { kind: &'static str, names: String, available: String },

    #[error("--member is required when --mode is {0}")]
    MissingMember(String),

    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid UTF-8 text", path.display())]
    Decode { path: PathBuf },
}

impl FinderError {
    /// Whether the error stops the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FinderError::FileRead { .. } | FinderError::Decode { .. })
    }
}

/// A syntax adapter could not produce a usable tree. Always recoverable: the
/// caller scans the file with the heuristic engine instead.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{dialect} parse failed: {reason}")]
pub struct ParseError {
    pub dialect: &'static str,
    pub reason: String,
}
