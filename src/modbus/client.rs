use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_modbus::client::{Context, Reader, Writer};
use tokio_modbus::prelude::{Slave, SlaveContext};

use super::protocol::{ModbusRequest, ModbusResponse, COIL_OFF, COIL_ON};
use super::simulator::SimulatedClient;
use crate::config::settings::{ModbusConfig, TransportKind};
#[cfg(feature = "rtu")]
use crate::config::settings::ParityConfig;
use crate::utils::error::GatewayError;

/// Capability to run one Modbus transaction against a field device.
///
/// Implementations must be safe to call from many tasks at once; the
/// gateway shares a single instance across every connection.
#[async_trait]
pub trait ModbusClientTrait: Send + Sync {
    async fn execute(&self, request: &ModbusRequest) -> Result<ModbusResponse, GatewayError>;
}

/// Modbus master over TCP or RTU.
///
/// The link is opened lazily and guarded by a mutex so that at most one
/// transaction is in flight. A transport failure or timeout drops the link;
/// the next transaction reopens it.
pub struct ModbusClient {
    config: ModbusConfig,
    context: Mutex<Option<Context>>,
}

impl ModbusClient {
    pub fn new(config: &ModbusConfig) -> Self {
        Self {
            config: config.clone(),
            context: Mutex::new(None),
        }
    }

    pub async fn connect(config: &ModbusConfig) -> Self {
        let client = Self::new(config);
        match client.open().await {
            Ok(context) => {
                info!("🔌 Modbus link established: {}", config.describe());
                *client.context.lock().await = Some(context);
            }
            Err(e) => {
                warn!("⚠️  Modbus link {} not available yet: {}", config.describe(), e);
            }
        }
        client
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn open(&self) -> Result<Context, GatewayError> {
        match self.config.transport {
            TransportKind::Tcp => {
                let target = (self.config.host.as_str(), self.config.port);
                let stream = timeout(self.timeout(), TcpStream::connect(target))
                    .await?
                    .map_err(|e| {
                        GatewayError::ConnectionError(format!(
                            "Failed to connect to {}:{}: {}",
                            self.config.host, self.config.port, e
                        ))
                    })?;
                Ok(tokio_modbus::client::tcp::attach_slave(stream, Slave(1)))
            }
            TransportKind::Rtu => self.open_serial(),
            TransportKind::Simulator => Err(GatewayError::ConfigError(
                "The simulator transport has no Modbus link".to_string(),
            )),
        }
    }

    #[cfg(feature = "rtu")]
    fn open_serial(&self) -> Result<Context, GatewayError> {
        let parity = match self.config.parity {
            ParityConfig::None => tokio_serial::Parity::None,
            ParityConfig::Even => tokio_serial::Parity::Even,
            ParityConfig::Odd => tokio_serial::Parity::Odd,
        };
        let data_bits = match self.config.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match self.config.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        let builder = tokio_serial::new(&self.config.serial_port, self.config.baud_rate)
            .parity(parity)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .timeout(self.timeout());
        let port = tokio_serial::SerialStream::open(&builder).map_err(|e| {
            error!("❌ Failed to open serial port {}: {}", self.config.serial_port, e);
            GatewayError::ConnectionError(format!("Failed to open port: {}", e))
        })?;

        Ok(tokio_modbus::client::rtu::attach_slave(port, Slave(1)))
    }

    #[cfg(not(feature = "rtu"))]
    fn open_serial(&self) -> Result<Context, GatewayError> {
        Err(GatewayError::ConfigError(
            "This build has no serial support; enable the `rtu` feature".to_string(),
        ))
    }

    async fn transact(
        context: &mut Context,
        request: &ModbusRequest,
    ) -> tokio_modbus::Result<ModbusResponse> {
        context.set_slave(Slave(request.slave_id()));

        let response = match request {
            ModbusRequest::ReadCoils { address, quantity, .. } => context
                .read_coils(*address, *quantity)
                .await?
                .map(ModbusResponse::Bits),
            ModbusRequest::ReadDiscreteInputs { address, quantity, .. } => context
                .read_discrete_inputs(*address, *quantity)
                .await?
                .map(ModbusResponse::Bits),
            ModbusRequest::ReadHoldingRegisters { address, quantity, .. } => context
                .read_holding_registers(*address, *quantity)
                .await?
                .map(ModbusResponse::Registers),
            ModbusRequest::ReadInputRegisters { address, quantity, .. } => context
                .read_input_registers(*address, *quantity)
                .await?
                .map(ModbusResponse::Registers),
            ModbusRequest::WriteSingleCoil { address, value, .. } => context
                .write_single_coil(*address, *value)
                .await?
                .map(|()| ModbusResponse::SingleWrite {
                    address: *address,
                    value: if *value { COIL_ON } else { COIL_OFF },
                }),
            ModbusRequest::WriteSingleRegister { address, value, .. } => context
                .write_single_register(*address, *value)
                .await?
                .map(|()| ModbusResponse::SingleWrite {
                    address: *address,
                    value: *value,
                }),
            ModbusRequest::WriteMultipleCoils { address, values, .. } => context
                .write_multiple_coils(*address, values)
                .await?
                .map(|()| ModbusResponse::MultipleWrite {
                    address: *address,
                    quantity: quantity_of(values.len()),
                }),
            ModbusRequest::WriteMultipleRegisters { address, values, .. } => context
                .write_multiple_registers(*address, values)
                .await?
                .map(|()| ModbusResponse::MultipleWrite {
                    address: *address,
                    quantity: quantity_of(values.len()),
                }),
        };

        Ok(response)
    }
}

#[async_trait]
impl ModbusClientTrait for ModbusClient {
    async fn execute(&self, request: &ModbusRequest) -> Result<ModbusResponse, GatewayError> {
        debug!(
            "📊 Function {} for slave {} at address {}",
            request.function_code(),
            request.slave_id(),
            request.address()
        );

        // Held for the whole transaction: one outstanding request per link.
        let mut guard = self.context.lock().await;
        let mut context = match guard.take() {
            Some(context) => context,
            None => self.open().await?,
        };

        match timeout(self.timeout(), Self::transact(&mut context, request)).await {
            Ok(Ok(Ok(response))) => {
                *guard = Some(context);
                Ok(response)
            }
            Ok(Ok(Err(exception))) => {
                *guard = Some(context);
                let code = u8::from(exception);
                warn!("Slave {} answered with exception code {}", request.slave_id(), code);
                Err(GatewayError::from_exception_code(code))
            }
            Ok(Err(e)) => {
                error!("❌ Modbus transport failure, dropping link: {}", e);
                Err(GatewayError::CommunicationError(e.to_string()))
            }
            Err(_) => {
                warn!(
                    "⏰ No response from slave {} within {:?}, dropping link",
                    request.slave_id(),
                    self.timeout()
                );
                Err(GatewayError::Timeout)
            }
        }
    }
}

fn quantity_of(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

pub async fn connect(config: &ModbusConfig) -> Arc<dyn ModbusClientTrait> {
    match config.transport {
        TransportKind::Simulator => {
            info!("🧪 Using simulated Modbus slaves {:?}", config.simulator_slave_ids);
            Arc::new(SimulatedClient::new(&config.simulator_slave_ids))
        }
        TransportKind::Tcp | TransportKind::Rtu => Arc::new(ModbusClient::connect(config).await),
    }
}
