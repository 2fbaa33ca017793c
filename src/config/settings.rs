use clap::ArgMatches;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::error::GatewayError;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/tolk.sock";
/// Size of the single read performed per request in legacy mode.
pub const LEGACY_READ_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub server: ServerConfig,
    pub modbus: ModbusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub tcp_listen: Option<String>,
    pub max_request_bytes: usize,
    pub single_read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub serial_port: String,
    pub baud_rate: u32,
    pub parity: ParityConfig,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub timeout_ms: u64,
    pub simulator_slave_ids: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Rtu,
    Simulator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    Unix(PathBuf),
    Tcp(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            modbus: ModbusConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            tcp_listen: None,
            max_request_bytes: 64 * 1024,
            single_read: false,
        }
    }
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            host: "localhost".to_string(),
            port: 502,
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            parity: ParityConfig::None,
            data_bits: 8,
            stop_bits: 1,
            timeout_ms: 1000,
            simulator_slave_ids: vec![1],
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> ListenAddress {
        match &self.tcp_listen {
            Some(addr) => ListenAddress::Tcp(addr.clone()),
            None => ListenAddress::Unix(self.socket_path.clone()),
        }
    }
}

impl ModbusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn describe(&self) -> String {
        match self.transport {
            TransportKind::Tcp => format!("tcp://{}:{}", self.host, self.port),
            TransportKind::Rtu => format!(
                "rtu:{} ({} baud, {:?} parity, {} data bits, {} stop bits)",
                self.serial_port,
                self.baud_rate,
                self.parity,
                self.data_bits,
                self.stop_bits
            ),
            TransportKind::Simulator => {
                format!("simulator (slaves {:?})", self.simulator_slave_ids)
            }
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "rtu" => Ok(TransportKind::Rtu),
            "simulator" => Ok(TransportKind::Simulator),
            other => Err(GatewayError::ConfigError(format!(
                "Unknown transport '{}', expected tcp, rtu or simulator",
                other
            ))),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GatewayError> {
        // Create directory if it doesn't exist
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_matches(matches: &ArgMatches) -> Result<Self, GatewayError> {
        let mut config = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(level) = matches.get_one::<String>("log-level") {
            config.log_level = level.clone();
        }
        if let Some(socket) = matches.get_one::<String>("socket") {
            config.server.socket_path = PathBuf::from(socket);
        }
        if let Some(addr) = matches.get_one::<String>("tcp-listen") {
            config.server.tcp_listen = Some(addr.clone());
        }
        if matches.get_flag("single-read") {
            config.server.single_read = true;
        }
        if let Some(transport) = matches.get_one::<String>("transport") {
            config.modbus.transport = transport.parse()?;
        }
        if let Some(host) = matches.get_one::<String>("modbus-host") {
            config.modbus.host = host.clone();
        }
        if let Some(port) = matches.get_one::<String>("modbus-port") {
            config.modbus.port = parse_number(port, "modbus-port")?;
        }
        if let Some(serial_port) = matches.get_one::<String>("serial-port") {
            config.modbus.serial_port = serial_port.clone();
        }
        if let Some(baud) = matches.get_one::<String>("baud") {
            config.modbus.baud_rate = parse_number(baud, "baud")?;
        }
        if let Some(timeout) = matches.get_one::<String>("timeout-ms") {
            config.modbus.timeout_ms = parse_number(timeout, "timeout-ms")?;
        }

        config.validate()?;
        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.modbus.timeout_ms == 0 {
            return Err(GatewayError::ConfigError(
                "modbus.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.server.max_request_bytes < LEGACY_READ_SIZE {
            return Err(GatewayError::ConfigError(format!(
                "server.max_request_bytes must be at least {}",
                LEGACY_READ_SIZE
            )));
        }
        if !(5..=8).contains(&self.modbus.data_bits) {
            return Err(GatewayError::ConfigError(format!(
                "modbus.data_bits must be between 5 and 8, got {}",
                self.modbus.data_bits
            )));
        }
        if !matches!(self.modbus.stop_bits, 1 | 2) {
            return Err(GatewayError::ConfigError(format!(
                "modbus.stop_bits must be 1 or 2, got {}",
                self.modbus.stop_bits
            )));
        }
        if self.modbus.transport == TransportKind::Simulator
            && self.modbus.simulator_slave_ids.is_empty()
        {
            return Err(GatewayError::ConfigError(
                "modbus.simulator_slave_ids must name at least one slave".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<T, GatewayError> {
    raw.trim()
        .parse()
        .map_err(|_| GatewayError::ConfigError(format!("--{} expects a number, got '{}'", flag, raw)))
}
