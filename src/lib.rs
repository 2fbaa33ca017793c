//! Tolk: a JSON-RPC to Modbus gateway
//!
//! Clients send one JSON-RPC 2.0 request per connection over a Unix or TCP
//! socket. Each request names one of eight Modbus operations; the gateway
//! runs it against a single shared Modbus master (TCP, RTU or an in-memory
//! simulator) and answers with the result or a mapped error.

pub mod cli;
pub mod config;
pub mod modbus;
pub mod rpc;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use modbus::{ModbusClient, ModbusClientTrait, SimulatedClient};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcClient};
pub use services::{Dispatcher, GatewayServer, Operation};
pub use utils::error::GatewayError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
