//! Shared fixtures: a real Modbus TCP slave backed by `SlaveMemory`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::prelude::{ExceptionCode as WireException, Request, Response, SlaveRequest};
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use tolk::config::{ModbusConfig, TransportKind};
use tolk::modbus::{ExceptionCode, ModbusRequest, ModbusResponse, SlaveMemory};

#[derive(Clone, Default)]
struct SlaveService {
    slaves: Arc<Mutex<HashMap<u8, SlaveMemory>>>,
    forced_exception: Arc<Mutex<Option<u8>>>,
}

impl tokio_modbus::server::Service for SlaveService {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = WireException;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        future::ready(self.process(req.slave, req.request))
    }
}

impl SlaveService {
    fn process(&self, slave_id: u8, request: Request<'static>) -> Result<Response, WireException> {
        if let Some(code) = *self.forced_exception.lock().unwrap() {
            return Err(WireException::Custom(code));
        }

        let request = to_request(slave_id, request)?;
        let mut slaves = self.slaves.lock().unwrap();
        let memory = slaves
            .get_mut(&slave_id)
            .ok_or(wire(ExceptionCode::GatewayTargetDeviceFailedToRespond))?;
        let response = memory.process(&request).map_err(wire)?;
        Ok(to_response(&request, response))
    }
}

fn wire(exception: ExceptionCode) -> WireException {
    WireException::Custom(exception.code())
}

fn to_request(slave_id: u8, request: Request<'static>) -> Result<ModbusRequest, WireException> {
    let request = match request {
        Request::ReadCoils(address, quantity) => ModbusRequest::ReadCoils { slave_id, address, quantity },
        Request::ReadDiscreteInputs(address, quantity) => {
            ModbusRequest::ReadDiscreteInputs { slave_id, address, quantity }
        }
        Request::ReadHoldingRegisters(address, quantity) => {
            ModbusRequest::ReadHoldingRegisters { slave_id, address, quantity }
        }
        Request::ReadInputRegisters(address, quantity) => {
            ModbusRequest::ReadInputRegisters { slave_id, address, quantity }
        }
        Request::WriteSingleCoil(address, value) => ModbusRequest::WriteSingleCoil { slave_id, address, value },
        Request::WriteSingleRegister(address, value) => {
            ModbusRequest::WriteSingleRegister { slave_id, address, value }
        }
        Request::WriteMultipleCoils(address, values) => ModbusRequest::WriteMultipleCoils {
            slave_id,
            address,
            values: values.into_owned(),
        },
        Request::WriteMultipleRegisters(address, values) => ModbusRequest::WriteMultipleRegisters {
            slave_id,
            address,
            values: values.into_owned(),
        },
        _ => return Err(wire(ExceptionCode::IllegalFunction)),
    };
    Ok(request)
}

fn to_response(request: &ModbusRequest, response: ModbusResponse) -> Response {
    match (request, response) {
        (ModbusRequest::ReadCoils { .. }, ModbusResponse::Bits(bits)) => Response::ReadCoils(bits),
        (ModbusRequest::ReadDiscreteInputs { .. }, ModbusResponse::Bits(bits)) => {
            Response::ReadDiscreteInputs(bits)
        }
        (ModbusRequest::ReadInputRegisters { .. }, ModbusResponse::Registers(words)) => {
            Response::ReadInputRegisters(words)
        }
        (ModbusRequest::ReadHoldingRegisters { .. }, ModbusResponse::Registers(words)) => {
            Response::ReadHoldingRegisters(words)
        }
        (ModbusRequest::WriteSingleCoil { address, value, .. }, _) => Response::WriteSingleCoil(*address, *value),
        (ModbusRequest::WriteSingleRegister { address, value, .. }, _) => {
            Response::WriteSingleRegister(*address, *value)
        }
        (ModbusRequest::WriteMultipleCoils { address, values, .. }, _) => {
            Response::WriteMultipleCoils(*address, values.len() as u16)
        }
        (ModbusRequest::WriteMultipleRegisters { address, values, .. }, _) => {
            Response::WriteMultipleRegisters(*address, values.len() as u16)
        }
        (request, response) => panic!("simulator answered {:?} with {:?}", request, response),
    }
}

/// Modbus TCP slave on an ephemeral localhost port.
pub struct ModbusSlave {
    pub addr: SocketAddr,
    service: SlaveService,
    task: JoinHandle<()>,
}

impl ModbusSlave {
    pub async fn start(slave_ids: &[u8]) -> Self {
        let service = SlaveService::default();
        {
            let mut slaves = service.slaves.lock().unwrap();
            for id in slave_ids {
                slaves.insert(*id, SlaveMemory::new());
            }
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(listener);

        let shared = service.clone();
        let task = tokio::spawn(async move {
            let on_connected = |stream, socket_addr| {
                let service = shared.clone();
                async move { accept_tcp_connection(stream, socket_addr, move |_| Ok(Some(service.clone()))) }
            };
            let on_process_error = |err| {
                eprintln!("modbus slave: {err}");
            };
            if let Err(err) = server.serve(&on_connected, on_process_error).await {
                eprintln!("modbus slave stopped: {err}");
            }
        });

        Self { addr, service, task }
    }

    /// Gateway configuration pointing at this slave.
    pub fn config(&self) -> ModbusConfig {
        ModbusConfig {
            transport: TransportKind::Tcp,
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            timeout_ms: 2000,
            ..ModbusConfig::default()
        }
    }

    pub fn with_slave<R>(&self, slave_id: u8, f: impl FnOnce(&mut SlaveMemory) -> R) -> R {
        let mut slaves = self.service.slaves.lock().unwrap();
        f(slaves.get_mut(&slave_id).expect("unknown slave"))
    }

    /// Makes every following request fail with the raw exception `code`.
    pub fn fail_with(&self, code: Option<u8>) {
        *self.service.forced_exception.lock().unwrap() = code;
    }
}

impl Drop for ModbusSlave {
    fn drop(&mut self) {
        self.task.abort();
    }
}
