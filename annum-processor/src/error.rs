use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("user directory unavailable: {0}")]
    Directory(#[from] annum_common::CoreError),

    #[error("store unavailable: {0}")]
    Store(#[from] annum_store::StoreError),
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
