use std::any::Any;
use std::io;

use thiserror::Error;

/// Unrecoverable failure inside the parsing engine. Once raised the session
/// cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parser engine failure: {message}")]
pub struct EngineFault {
    pub message: String,
}

impl EngineFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "engine panicked".to_string()
        };
        Self::new(message)
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already disposed")]
    Disposed,
    #[error("scheduler halted after unhandled failure: {0}")]
    Faulted(EngineFault),
    #[error("failed to spawn parser worker: {0}")]
    Spawn(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("parser connection already disposed")]
    Disposed,
    #[error("parser connection faulted: {0}")]
    Faulted(EngineFault),
    #[error("word form must not be empty")]
    EmptyForm,
    #[error(transparent)]
    Scheduler(SchedulerError),
}

impl From<SchedulerError> for ConnectionError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Disposed => ConnectionError::Disposed,
            SchedulerError::Faulted(fault) => ConnectionError::Faulted(fault),
            other => ConnectionError::Scheduler(other),
        }
    }
}
