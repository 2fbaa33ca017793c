pub mod settings;

pub use settings::{
    Config,
    ListenAddress,
    ModbusConfig,
    ParityConfig,
    ServerConfig,
    TransportKind,
    DEFAULT_SOCKET_PATH,
};
