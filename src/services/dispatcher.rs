use log::{debug, error, warn};
use serde_json::Value;
use std::sync::Arc;

use super::operations::Operation;
use crate::modbus::{ModbusClientTrait, ModbusRequest};
use crate::rpc::envelope::{JsonRpcRequest, JsonRpcResponse};
use crate::rpc::error::JsonRpcError;

pub struct Dispatcher {
    client: Arc<dyn ModbusClientTrait>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn ModbusClientTrait>) -> Self {
        Self { client }
    }

    /// Handles one raw request and returns the raw response. Never fails:
    /// every failure becomes a JSON-RPC error envelope.
    pub async fn call(&self, payload: &[u8]) -> Vec<u8> {
        let response = self.handle(payload).await;
        match response.to_vec() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("❌ Failed to serialize response: {}", e);
                let fallback = JsonRpcResponse::error(Value::Null, JsonRpcError::internal_error(e.to_string()));
                fallback.to_vec().unwrap_or_else(|_| {
                    br#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"},"id":null}"#
                        .to_vec()
                })
            }
        }
    }

    pub async fn handle(&self, payload: &[u8]) -> JsonRpcResponse {
        let request = match JsonRpcRequest::parse(payload) {
            Ok(request) => request,
            Err((id, error)) => {
                warn!("Rejected request: {} ({:?})", error.message, error.data);
                return JsonRpcResponse::error(id, error);
            }
        };

        let result = match request.method.parse::<Operation>() {
            Ok(operation) => self.dispatch(operation, &request).await,
            Err(error) => {
                warn!("Unknown method '{}'", request.method);
                Err(error)
            }
        };

        match result {
            Ok(values) => JsonRpcResponse::success(request.id, values),
            Err(error) => JsonRpcResponse::error(request.id, error),
        }
    }

    async fn dispatch(&self, operation: Operation, request: &JsonRpcRequest) -> Result<Vec<u16>, JsonRpcError> {
        let modbus_request = operation.build_request(&request.params)?;
        debug!("{} -> {:?}", operation, modbus_request);
        self.execute(&modbus_request).await
    }

    async fn execute(&self, request: &ModbusRequest) -> Result<Vec<u16>, JsonRpcError> {
        self.client
            .execute(request)
            .await
            .map(|response| response.into_values())
            .map_err(|e| {
                warn!(
                    "Function {} on slave {} failed: {}",
                    request.function_code(),
                    request.slave_id(),
                    e
                );
                JsonRpcError::from(e)
            })
    }

    pub async fn read_coils(&self, slave_id: u8, address: u16, quantity: u16) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::ReadCoils { slave_id, address, quantity }).await
    }

    pub async fn read_discrete_inputs(
        &self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::ReadDiscreteInputs { slave_id, address, quantity }).await
    }

    pub async fn read_holding_registers(
        &self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::ReadHoldingRegisters { slave_id, address, quantity }).await
    }

    pub async fn read_input_registers(
        &self,
        slave_id: u8,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::ReadInputRegisters { slave_id, address, quantity }).await
    }

    pub async fn write_single_coil(&self, slave_id: u8, address: u16, value: bool) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::WriteSingleCoil { slave_id, address, value }).await
    }

    pub async fn write_single_register(
        &self,
        slave_id: u8,
        address: u16,
        value: u16,
    ) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::WriteSingleRegister { slave_id, address, value }).await
    }

    pub async fn write_multiple_coils(
        &self,
        slave_id: u8,
        address: u16,
        values: Vec<bool>,
    ) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::WriteMultipleCoils { slave_id, address, values }).await
    }

    pub async fn write_multiple_registers(
        &self,
        slave_id: u8,
        address: u16,
        values: Vec<u16>,
    ) -> Result<Vec<u16>, JsonRpcError> {
        self.execute(&ModbusRequest::WriteMultipleRegisters { slave_id, address, values }).await
    }
}
