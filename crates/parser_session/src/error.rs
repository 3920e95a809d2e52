use std::io;

use parser_engine::ConnectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no parser connection (empty lexicon or parser failed to start)")]
    NotConnected,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
