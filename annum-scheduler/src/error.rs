use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("materialiser error: {0}")]
    Materialiser(#[from] annum_materialiser::MaterialiserError),

    #[error("processor error: {0}")]
    Processor(#[from] annum_processor::ProcessorError),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
