pub mod client;
pub mod exception;
pub mod protocol;
pub mod simulator;

pub use client::{connect, ModbusClient, ModbusClientTrait};
pub use exception::ExceptionCode;
pub use protocol::{
    FunctionCode, ModbusRequest, ModbusResponse, COIL_OFF, COIL_ON, MAX_READ_BITS, MAX_READ_REGISTERS,
    MAX_WRITE_BITS, MAX_WRITE_REGISTERS,
};
pub use simulator::{SimulatedClient, SlaveMemory};
