use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::JsonRpcError;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    pub method: String,
    pub params: Params,
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    ByName(Map<String, Value>),
    ByPosition(Vec<Value>),
}

impl Params {
    pub fn get(&self, position: usize, name: &str) -> Option<&Value> {
        match self {
            Params::None => None,
            Params::ByName(map) => map.get(name),
            Params::ByPosition(values) => values.get(position),
        }
        .filter(|value| !value.is_null())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Params::None => Value::Null,
            Params::ByName(map) => Value::Object(map.clone()),
            Params::ByPosition(values) => Value::Array(values.clone()),
        }
    }
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Params, id: Value) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }

    /// Parses one request envelope. On failure returns the error together
    /// with whatever id could be recovered (or null).
    pub fn parse(payload: &[u8]) -> Result<Self, (Value, JsonRpcError)> {
        let value: Value = serde_json::from_slice(payload.trim_ascii())
            .map_err(|e| (Value::Null, JsonRpcError::parse_error(e.to_string())))?;

        let mut object = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Err((
                    Value::Null,
                    JsonRpcError::invalid_request("batch requests are not supported"),
                ))
            }
            _ => {
                return Err((
                    Value::Null,
                    JsonRpcError::invalid_request("request must be a JSON object"),
                ))
            }
        };

        let id = match object.remove("id") {
            Some(id @ (Value::Number(_) | Value::String(_))) => id,
            Some(Value::Null) | None => {
                return Err((
                    Value::Null,
                    JsonRpcError::invalid_request("request id is required; notifications are not supported"),
                ))
            }
            Some(_) => {
                return Err((
                    Value::Null,
                    JsonRpcError::invalid_request("request id must be a number or a string"),
                ))
            }
        };

        match object.get("jsonrpc") {
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            _ => {
                return Err((id, JsonRpcError::invalid_request("jsonrpc must be exactly \"2.0\"")))
            }
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err((id, JsonRpcError::invalid_request("method must be a string"))),
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => Params::None,
            Some(Value::Object(map)) => Params::ByName(map),
            Some(Value::Array(values)) => Params::ByPosition(values),
            Some(_) => {
                return Err((id, JsonRpcError::invalid_request("params must be an object or an array")))
            }
        };

        Ok(Self { method, params, id })
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut object = Map::new();
        object.insert("jsonrpc".to_string(), Value::from(JSONRPC_VERSION));
        object.insert("method".to_string(), Value::from(self.method.clone()));
        if self.params != Params::None {
            object.insert("params".to_string(), self.params.to_value());
        }
        object.insert("id".to_string(), self.id.clone());
        serde_json::to_vec(&Value::Object(object))
    }
}

/// A JSON-RPC 2.0 response; exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Vec<u16>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
