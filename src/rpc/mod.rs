pub mod client;
pub mod envelope;
pub mod error;
pub mod framing;

pub use client::RpcClient;
pub use envelope::{JsonRpcRequest, JsonRpcResponse, Params, JSONRPC_VERSION};
pub use error::{
    JsonRpcError, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
