use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization/Deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Sway IPC error: {0}")]
    Sway(#[from] swayipc_async::Error),
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),
    #[error("Output {0} not found")]
    OutputNotFound(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;
