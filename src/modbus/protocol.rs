use std::fmt;

/// Value a device echoes for a coil switched on by function 05.
pub const COIL_ON: u16 = 0xFF00;
pub const COIL_OFF: u16 = 0x0000;

pub const MAX_READ_BITS: u16 = 2000;
pub const MAX_READ_REGISTERS: u16 = 125;
/// Largest write that still fits one PDU.
pub const MAX_WRITE_BITS: usize = 1968;
pub const MAX_WRITE_REGISTERS: usize = 123;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
    WriteSingleCoil = 0x05,
    WriteSingleRegister = 0x06,
    WriteMultipleCoils = 0x0F,
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusRequest {
    ReadCoils {
        slave_id: u8,
        address: u16,
        quantity: u16,
    },
    ReadDiscreteInputs {
        slave_id: u8,
        address: u16,
        quantity: u16,
    },
    ReadHoldingRegisters {
        slave_id: u8,
        address: u16,
        quantity: u16,
    },
    ReadInputRegisters {
        slave_id: u8,
        address: u16,
        quantity: u16,
    },
    WriteSingleCoil {
        slave_id: u8,
        address: u16,
        value: bool,
    },
    WriteSingleRegister {
        slave_id: u8,
        address: u16,
        value: u16,
    },
    WriteMultipleCoils {
        slave_id: u8,
        address: u16,
        values: Vec<bool>,
    },
    WriteMultipleRegisters {
        slave_id: u8,
        address: u16,
        values: Vec<u16>,
    },
}

impl ModbusRequest {
    pub fn slave_id(&self) -> u8 {
        match self {
            ModbusRequest::ReadCoils { slave_id, .. }
            | ModbusRequest::ReadDiscreteInputs { slave_id, .. }
            | ModbusRequest::ReadHoldingRegisters { slave_id, .. }
            | ModbusRequest::ReadInputRegisters { slave_id, .. }
            | ModbusRequest::WriteSingleCoil { slave_id, .. }
            | ModbusRequest::WriteSingleRegister { slave_id, .. }
            | ModbusRequest::WriteMultipleCoils { slave_id, .. }
            | ModbusRequest::WriteMultipleRegisters { slave_id, .. } => *slave_id,
        }
    }

    pub fn address(&self) -> u16 {
        match self {
            ModbusRequest::ReadCoils { address, .. }
            | ModbusRequest::ReadDiscreteInputs { address, .. }
            | ModbusRequest::ReadHoldingRegisters { address, .. }
            | ModbusRequest::ReadInputRegisters { address, .. }
            | ModbusRequest::WriteSingleCoil { address, .. }
            | ModbusRequest::WriteSingleRegister { address, .. }
            | ModbusRequest::WriteMultipleCoils { address, .. }
            | ModbusRequest::WriteMultipleRegisters { address, .. } => *address,
        }
    }

    pub fn function_code(&self) -> FunctionCode {
        match self {
            ModbusRequest::ReadCoils { .. } => FunctionCode::ReadCoils,
            ModbusRequest::ReadDiscreteInputs { .. } => FunctionCode::ReadDiscreteInputs,
            ModbusRequest::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            ModbusRequest::ReadInputRegisters { .. } => FunctionCode::ReadInputRegisters,
            ModbusRequest::WriteSingleCoil { .. } => FunctionCode::WriteSingleCoil,
            ModbusRequest::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            ModbusRequest::WriteMultipleCoils { .. } => FunctionCode::WriteMultipleCoils,
            ModbusRequest::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusResponse {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
    SingleWrite { address: u16, value: u16 },
    MultipleWrite { address: u16, quantity: u16 },
}

impl ModbusResponse {
    pub fn into_values(self) -> Vec<u16> {
        match self {
            ModbusResponse::Bits(bits) => bits.into_iter().map(u16::from).collect(),
            ModbusResponse::Registers(registers) => registers,
            ModbusResponse::SingleWrite { address, value } => vec![address, value],
            ModbusResponse::MultipleWrite { address, quantity } => vec![address, quantity],
        }
    }
}
