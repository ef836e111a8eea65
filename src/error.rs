use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node radius must be positive and finite, got {0}")]
    InvalidRadius(f32),
    #[error("node mass must be positive and finite, got {0}")]
    InvalidMass(f32),
    #[error("no node with id `{0}` in the working set")]
    UnknownNode(String),
    #[error("entity id `{0}` appears more than once in the working set")]
    DuplicateEntity(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
