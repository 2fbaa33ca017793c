use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::modbus::ExceptionCode;
use crate::utils::error::GatewayError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, "Parse error").with_data(detail.into())
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request").with_data(detail.into())
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found").with_data(method.to_string())
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, "Invalid params").with_data(detail.into())
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, "Internal error").with_data(detail.into())
    }
}

pub fn exception_error_code(exception: ExceptionCode) -> i64 {
    match exception {
        ExceptionCode::IllegalFunction => -32001,
        ExceptionCode::IllegalDataAddress => -32002,
        ExceptionCode::IllegalDataValue => -32003,
        ExceptionCode::SlaveDeviceFailure => -32004,
        ExceptionCode::Acknowledge => -32005,
        ExceptionCode::SlaveDeviceBusy => -32006,
        ExceptionCode::NegativeAcknowledge => -32007,
        ExceptionCode::MemoryParityError => -32008,
        ExceptionCode::GatewayPathUnavailable => -32010,
        ExceptionCode::GatewayTargetDeviceFailedToRespond => -32011,
    }
}

pub fn exception_message(exception: ExceptionCode) -> &'static str {
    match exception {
        ExceptionCode::IllegalFunction => "Function code is not valid.",
        ExceptionCode::IllegalDataAddress => "Data address is not valid.",
        ExceptionCode::IllegalDataValue => "Data value is not valid.",
        ExceptionCode::SlaveDeviceFailure => "Slave device could not perform requested action.",
        ExceptionCode::Acknowledge => {
            "Slave device has accepted the request and is processing it, but a long \
             duration of time will be required to do so. This response is returned to \
             prevent a timeout error from occurring in the master."
        }
        ExceptionCode::SlaveDeviceBusy => "Slave device is busy.",
        ExceptionCode::NegativeAcknowledge => {
            "Slave device cannot perform the program function received in the query."
        }
        ExceptionCode::MemoryParityError => {
            "Slave device failed to read extended memory or record file."
        }
        ExceptionCode::GatewayPathUnavailable => {
            "Gateway is unable to allocate an internal communication path from the input \
             port to the output port."
        }
        ExceptionCode::GatewayTargetDeviceFailedToRespond => {
            "No response obtained from the target device."
        }
    }
}

impl From<ExceptionCode> for JsonRpcError {
    fn from(exception: ExceptionCode) -> Self {
        JsonRpcError::new(exception_error_code(exception), exception_message(exception))
    }
}

impl From<GatewayError> for JsonRpcError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Exception(exception) => exception.into(),
            GatewayError::Timeout => {
                JsonRpcError::from(ExceptionCode::GatewayTargetDeviceFailedToRespond)
                    .with_data("Modbus transaction timed out")
            }
            GatewayError::UnknownException(code) => {
                error!("Modbus exception code {} has no JSON-RPC mapping", code);
                JsonRpcError::internal_error(format!("Unmapped Modbus exception code {}", code))
            }
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}
