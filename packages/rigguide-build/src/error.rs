use rigguide_model::{ComponentKey, ModelError, Phase};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("unknown component: {0}")]
    UnknownComponent(ComponentKey),

    #[error("unknown component type tag: {0}")]
    UnknownType(String),

    #[error("cannot split non-bilateral component {0}")]
    InvalidSplit(ComponentKey),

    #[error("phase {phase} failed on {key}: {source}")]
    PhaseExecution {
        phase: Phase,
        key: ComponentKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("build state corrupt: {0}")]
    StoreCorruption(String),

    #[error("scene backend error: {0}")]
    Scene(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ModelError> for BuildError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Io(io) => BuildError::Io(io),
            other => BuildError::StoreCorruption(other.to_string()),
        }
    }
}

impl BuildError {
    pub fn scene<E: std::fmt::Display>(e: E) -> Self {
        Self::Scene(e.to_string())
    }

    pub fn phase(phase: Phase, key: ComponentKey, source: anyhow::Error) -> Self {
        Self::PhaseExecution { phase, key, source }
    }
}
