use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has been shut down")]
    Closed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid file key: {0}")]
    Key(#[from] vellum_types::TypeError),

    #[error("store error: {0}")]
    Store(#[from] vellum_store::StoreError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] vellum_checkpoint::CheckpointError),

    #[error("recovery log error: {0}")]
    Wal(#[from] vellum_wal::WalError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
