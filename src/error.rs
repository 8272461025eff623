use std::error::Error;

use thiserror::Error;

// TransientNetwork and MalformedIndexerData are address-scoped and never
// abort a sibling scan; InconsistentStoreState is fatal for the enclosing
// operation; ConfigError/AlreadyStarted are fatal at construction/start().
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("malformed indexer data: {0}")]
    MalformedIndexerData(String),

    #[error("inconsistent store state: {0}")]
    InconsistentStoreState(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("engine already started")]
    AlreadyStarted,
}

impl EngineError {
    pub fn is_scoped_to_address(&self) -> bool {
        matches!(
            self,
            EngineError::TransientNetwork(_) | EngineError::MalformedIndexerData(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

pub trait ResultExt<T> {
    fn to_transient(self) -> EngineResult<T>;
    fn to_malformed(self) -> EngineResult<T>;
    fn to_inconsistent(self) -> EngineResult<T>;
    fn to_config_error(self) -> EngineResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Error + Send + Sync,
{
    fn to_transient(self) -> EngineResult<T> {
        self.map_err(|e| EngineError::TransientNetwork(e.to_string()))
    }

    fn to_malformed(self) -> EngineResult<T> {
        self.map_err(|e| EngineError::MalformedIndexerData(e.to_string()))
    }

    fn to_inconsistent(self) -> EngineResult<T> {
        self.map_err(|e| EngineError::InconsistentStoreState(e.to_string()))
    }

    fn to_config_error(self) -> EngineResult<T> {
        self.map_err(|e| EngineError::ConfigError(e.to_string()))
    }
}
