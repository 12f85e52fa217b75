use std::path::PathBuf;

/// Error taxonomy for the reconciliation engine (SPEC_FULL §7).
#[derive(Debug, thiserror::Error)]
pub enum DnsMgrError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("transport error ({op}): {message}")]
    Transport { op: String, message: String },

    #[error("serial error in {file}: {message}")]
    Serial { file: PathBuf, message: String },

    #[error("not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, DnsMgrError>;

impl DnsMgrError {
    pub fn transport(op: impl Into<String>, message: impl Into<String>) -> Self {
        DnsMgrError::Transport {
            op: op.into(),
            message: message.into(),
        }
    }

    pub fn serial(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DnsMgrError::Serial {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        DnsMgrError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
