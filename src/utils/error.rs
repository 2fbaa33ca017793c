use thiserror::Error;

use crate::modbus::ExceptionCode;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Modbus exception {}: {}", .0.code(), .0)]
    Exception(ExceptionCode),

    /// The device answered with an exception code outside the standard set.
    #[error("Unmapped Modbus exception code {0}")]
    UnknownException(u8),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl GatewayError {
    pub fn from_exception_code(code: u8) -> Self {
        match ExceptionCode::try_from(code) {
            Ok(exception) => GatewayError::Exception(exception),
            Err(()) => GatewayError::UnknownException(code),
        }
    }
}

impl From<ExceptionCode> for GatewayError {
    fn from(exception: ExceptionCode) -> Self {
        GatewayError::Exception(exception)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for GatewayError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        GatewayError::Timeout
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::ConfigError(format!("Invalid TOML: {}", err))
    }
}

impl From<toml::ser::Error> for GatewayError {
    fn from(err: toml::ser::Error) -> Self {
        GatewayError::ConfigError(format!("Cannot serialize configuration: {}", err))
    }
}
