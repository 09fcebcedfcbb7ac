use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomlinkError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("room already open: {0}")]
    DuplicateSession(String),
    #[error("not connected: {0}")]
    NotConnected(String),
}
