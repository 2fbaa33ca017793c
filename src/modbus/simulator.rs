use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::client::ModbusClientTrait;
use super::exception::ExceptionCode;
use super::protocol::{
    ModbusRequest, ModbusResponse, COIL_OFF, COIL_ON, MAX_READ_BITS, MAX_READ_REGISTERS, MAX_WRITE_BITS,
    MAX_WRITE_REGISTERS,
};
use crate::utils::error::GatewayError;

#[derive(Debug, Clone)]
pub struct DataBlock {
    start: u16,
    values: Vec<u16>,
}

impl DataBlock {
    pub fn new(start: u16, size: u16) -> Self {
        Self {
            start,
            values: vec![0; size.into()],
        }
    }

    fn range(&self, address: u16, quantity: usize) -> Result<std::ops::Range<usize>, ExceptionCode> {
        let offset = address
            .checked_sub(self.start)
            .map(usize::from)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        let end = offset + quantity;
        if end > self.values.len() {
            debug!("Address {} + {} is outside block at {}", address, quantity, self.start);
            return Err(ExceptionCode::IllegalDataAddress);
        }
        Ok(offset..end)
    }

    pub fn read(&self, address: u16, quantity: u16) -> Result<&[u16], ExceptionCode> {
        let range = self.range(address, quantity.into())?;
        Ok(&self.values[range])
    }

    pub fn write(&mut self, address: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        let range = self.range(address, values.len())?;
        self.values[range].copy_from_slice(values);
        Ok(())
    }
}

/// Data model of one simulated slave.
#[derive(Debug, Clone)]
pub struct SlaveMemory {
    coils: DataBlock,
    discrete_inputs: DataBlock,
    holding_registers: DataBlock,
    input_registers: DataBlock,
}

impl Default for SlaveMemory {
    fn default() -> Self {
        Self {
            coils: DataBlock::new(100, 100),
            discrete_inputs: DataBlock::new(0, 100),
            holding_registers: DataBlock::new(100, 100),
            input_registers: DataBlock::new(0, 100),
        }
    }
}

impl SlaveMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_discrete_inputs(&mut self, address: u16, values: &[bool]) -> Result<(), ExceptionCode> {
        let values: Vec<u16> = values.iter().map(|v| u16::from(*v)).collect();
        self.discrete_inputs.write(address, &values)
    }

    pub fn set_input_registers(&mut self, address: u16, values: &[u16]) -> Result<(), ExceptionCode> {
        self.input_registers.write(address, values)
    }

    /// Applies one request the way a conforming slave would.
    pub fn process(&mut self, request: &ModbusRequest) -> Result<ModbusResponse, ExceptionCode> {
        match request {
            ModbusRequest::ReadCoils { address, quantity, .. } => {
                check_quantity(*quantity, MAX_READ_BITS)?;
                Ok(ModbusResponse::Bits(to_bits(self.coils.read(*address, *quantity)?)))
            }
            ModbusRequest::ReadDiscreteInputs { address, quantity, .. } => {
                check_quantity(*quantity, MAX_READ_BITS)?;
                Ok(ModbusResponse::Bits(to_bits(
                    self.discrete_inputs.read(*address, *quantity)?,
                )))
            }
            ModbusRequest::ReadHoldingRegisters { address, quantity, .. } => {
                check_quantity(*quantity, MAX_READ_REGISTERS)?;
                Ok(ModbusResponse::Registers(
                    self.holding_registers.read(*address, *quantity)?.to_vec(),
                ))
            }
            ModbusRequest::ReadInputRegisters { address, quantity, .. } => {
                check_quantity(*quantity, MAX_READ_REGISTERS)?;
                Ok(ModbusResponse::Registers(
                    self.input_registers.read(*address, *quantity)?.to_vec(),
                ))
            }
            ModbusRequest::WriteSingleCoil { address, value, .. } => {
                self.coils.write(*address, &[u16::from(*value)])?;
                Ok(ModbusResponse::SingleWrite {
                    address: *address,
                    value: if *value { COIL_ON } else { COIL_OFF },
                })
            }
            ModbusRequest::WriteSingleRegister { address, value, .. } => {
                self.holding_registers.write(*address, &[*value])?;
                Ok(ModbusResponse::SingleWrite {
                    address: *address,
                    value: *value,
                })
            }
            ModbusRequest::WriteMultipleCoils { address, values, .. } => {
                let quantity = check_count(values.len(), MAX_WRITE_BITS)?;
                let bits: Vec<u16> = values.iter().map(|v| u16::from(*v)).collect();
                self.coils.write(*address, &bits)?;
                Ok(ModbusResponse::MultipleWrite {
                    address: *address,
                    quantity,
                })
            }
            ModbusRequest::WriteMultipleRegisters { address, values, .. } => {
                let quantity = check_count(values.len(), MAX_WRITE_REGISTERS)?;
                self.holding_registers.write(*address, values)?;
                Ok(ModbusResponse::MultipleWrite {
                    address: *address,
                    quantity,
                })
            }
        }
    }
}

fn check_quantity(quantity: u16, max: u16) -> Result<(), ExceptionCode> {
    if quantity == 0 || quantity > max {
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

fn check_count(count: usize, max: usize) -> Result<u16, ExceptionCode> {
    if count == 0 || count > max {
        return Err(ExceptionCode::IllegalDataValue);
    }
    u16::try_from(count).map_err(|_| ExceptionCode::IllegalDataValue)
}

fn to_bits(values: &[u16]) -> Vec<bool> {
    values.iter().map(|v| *v != 0).collect()
}

pub struct SimulatedClient {
    slaves: Mutex<HashMap<u8, SlaveMemory>>,
}

impl SimulatedClient {
    pub fn new(slave_ids: &[u8]) -> Self {
        let slaves = slave_ids.iter().map(|id| (*id, SlaveMemory::new())).collect();
        Self {
            slaves: Mutex::new(slaves),
        }
    }

    pub async fn with_slave<R>(&self, slave_id: u8, f: impl FnOnce(&mut SlaveMemory) -> R) -> Option<R> {
        let mut slaves = self.slaves.lock().await;
        slaves.get_mut(&slave_id).map(f)
    }
}

#[async_trait]
impl ModbusClientTrait for SimulatedClient {
    async fn execute(&self, request: &ModbusRequest) -> Result<ModbusResponse, GatewayError> {
        let mut slaves = self.slaves.lock().await;
        let Some(memory) = slaves.get_mut(&request.slave_id()) else {
            warn!("No simulated slave with id {}", request.slave_id());
            return Err(ExceptionCode::GatewayTargetDeviceFailedToRespond.into());
        };

        memory.process(request).map_err(GatewayError::from)
    }
}
