pub mod dispatcher;
pub mod operations;
pub mod socket_server;

pub use dispatcher::Dispatcher;
pub use operations::{Operation, DEFAULT_SLAVE_ID};
pub use socket_server::{ConnectionHandler, GatewayServer};
