use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::modbus::{FunctionCode, ModbusRequest, MAX_WRITE_BITS, MAX_WRITE_REGISTERS};
use crate::rpc::envelope::Params;
use crate::rpc::error::JsonRpcError;

pub const DEFAULT_SLAVE_ID: u8 = 1;

const READ_PARAMS: [&str; 3] = ["starting_address", "quantity", "slave_id"];
const SINGLE_WRITE_PARAMS: [&str; 3] = ["address", "value", "slave_id"];
const MULTIPLE_WRITE_PARAMS: [&str; 3] = ["starting_address", "values", "slave_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::ReadCoils,
        Operation::ReadDiscreteInputs,
        Operation::ReadHoldingRegisters,
        Operation::ReadInputRegisters,
        Operation::WriteSingleCoil,
        Operation::WriteSingleRegister,
        Operation::WriteMultipleCoils,
        Operation::WriteMultipleRegisters,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            Operation::ReadCoils => "read_coils",
            Operation::ReadDiscreteInputs => "read_discrete_inputs",
            Operation::ReadHoldingRegisters => "read_holding_registers",
            Operation::ReadInputRegisters => "read_input_registers",
            Operation::WriteSingleCoil => "write_single_coil",
            Operation::WriteSingleRegister => "write_single_register",
            Operation::WriteMultipleCoils => "write_multiple_coils",
            Operation::WriteMultipleRegisters => "write_multiple_registers",
        }
    }

    pub fn function_code(self) -> FunctionCode {
        match self {
            Operation::ReadCoils => FunctionCode::ReadCoils,
            Operation::ReadDiscreteInputs => FunctionCode::ReadDiscreteInputs,
            Operation::ReadHoldingRegisters => FunctionCode::ReadHoldingRegisters,
            Operation::ReadInputRegisters => FunctionCode::ReadInputRegisters,
            Operation::WriteSingleCoil => FunctionCode::WriteSingleCoil,
            Operation::WriteSingleRegister => FunctionCode::WriteSingleRegister,
            Operation::WriteMultipleCoils => FunctionCode::WriteMultipleCoils,
            Operation::WriteMultipleRegisters => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// Declared parameters, in positional order. The last one is optional.
    pub fn parameter_names(self) -> [&'static str; 3] {
        match self {
            Operation::ReadCoils
            | Operation::ReadDiscreteInputs
            | Operation::ReadHoldingRegisters
            | Operation::ReadInputRegisters => READ_PARAMS,
            Operation::WriteSingleCoil | Operation::WriteSingleRegister => SINGLE_WRITE_PARAMS,
            Operation::WriteMultipleCoils | Operation::WriteMultipleRegisters => {
                MULTIPLE_WRITE_PARAMS
            }
        }
    }

    pub fn build_request(self, params: &Params) -> Result<ModbusRequest, JsonRpcError> {
        let [first, second, _] = self.parameter_names();
        if let Params::ByPosition(values) = params {
            if values.len() > 3 {
                return Err(JsonRpcError::invalid_params(format!(
                    "{} takes at most 3 positional parameters, got {}",
                    self,
                    values.len()
                )));
            }
        }

        let slave_id = slave_id_param(params)?;
        let address = u16_param(params, 0, first)?;

        let request = match self {
            Operation::ReadCoils => ModbusRequest::ReadCoils {
                slave_id,
                address,
                quantity: u16_param(params, 1, second)?,
            },
            Operation::ReadDiscreteInputs => ModbusRequest::ReadDiscreteInputs {
                slave_id,
                address,
                quantity: u16_param(params, 1, second)?,
            },
            Operation::ReadHoldingRegisters => ModbusRequest::ReadHoldingRegisters {
                slave_id,
                address,
                quantity: u16_param(params, 1, second)?,
            },
            Operation::ReadInputRegisters => ModbusRequest::ReadInputRegisters {
                slave_id,
                address,
                quantity: u16_param(params, 1, second)?,
            },
            Operation::WriteSingleCoil => ModbusRequest::WriteSingleCoil {
                slave_id,
                address,
                value: integer(required(params, 1, second)?, second)? != 0,
            },
            Operation::WriteSingleRegister => ModbusRequest::WriteSingleRegister {
                slave_id,
                address,
                value: u16_param(params, 1, second)?,
            },
            Operation::WriteMultipleCoils => ModbusRequest::WriteMultipleCoils {
                slave_id,
                address,
                values: within_limit(
                    integer_list(required(params, 1, second)?, second)?,
                    MAX_WRITE_BITS,
                    second,
                )?
                .into_iter()
                .map(|v| v != 0)
                .collect(),
            },
            Operation::WriteMultipleRegisters => ModbusRequest::WriteMultipleRegisters {
                slave_id,
                address,
                values: within_limit(
                    integer_list(required(params, 1, second)?, second)?,
                    MAX_WRITE_REGISTERS,
                    second,
                )?
                .into_iter()
                .map(|v| to_u16(v, second))
                .collect::<Result<_, _>>()?,
            },
        };

        Ok(request)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

impl FromStr for Operation {
    type Err = JsonRpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.method_name() == s)
            .ok_or_else(|| JsonRpcError::method_not_found(s))
    }
}

fn required<'a>(params: &'a Params, position: usize, name: &str) -> Result<&'a Value, JsonRpcError> {
    params
        .get(position, name)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("missing required parameter '{}'", name)))
}

fn u16_param(params: &Params, position: usize, name: &str) -> Result<u16, JsonRpcError> {
    to_u16(integer(required(params, position, name)?, name)?, name)
}

fn slave_id_param(params: &Params) -> Result<u8, JsonRpcError> {
    match params.get(2, "slave_id") {
        None => Ok(DEFAULT_SLAVE_ID),
        Some(value) => {
            let id = integer(value, "slave_id")?;
            u8::try_from(id).map_err(|_| {
                JsonRpcError::invalid_params(format!("'slave_id' must be between 0 and 255, got {}", id))
            })
        }
    }
}

fn to_u16(value: i64, name: &str) -> Result<u16, JsonRpcError> {
    u16::try_from(value).map_err(|_| {
        JsonRpcError::invalid_params(format!("'{}' must be between 0 and 65535, got {}", name, value))
    })
}

/// Accepts integers, integral floats, numeric strings and booleans.
fn integer(value: &Value, name: &str) -> Result<i64, JsonRpcError> {
    let parsed = match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => parse_integer(s),
        _ => None,
    };
    parsed.ok_or_else(|| {
        JsonRpcError::invalid_params(format!("'{}' must be an integer, got {}", name, value))
    })
}

fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().and_then(integral))
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn integer_list(value: &Value, name: &str) -> Result<Vec<i64>, JsonRpcError> {
    let values = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| integer(item, name))
            .collect::<Result<Vec<_>, _>>()?,
        Value::String(joined) if joined.trim().is_empty() => Vec::new(),
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .map(|item| {
                parse_integer(item).ok_or_else(|| {
                    JsonRpcError::invalid_params(format!(
                        "'{}' must be integers, got '{}'",
                        name, item
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        scalar => vec![integer(scalar, name)?],
    };

    if values.is_empty() {
        return Err(JsonRpcError::invalid_params(format!("'{}' must not be empty", name)));
    }
    Ok(values)
}

fn within_limit(values: Vec<i64>, max: usize, name: &str) -> Result<Vec<i64>, JsonRpcError> {
    if values.len() > max {
        return Err(JsonRpcError::invalid_params(format!(
            "'{}' holds {} items, at most {} fit one request",
            name,
            values.len(),
            max
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::error::{INVALID_PARAMS, METHOD_NOT_FOUND};
    use serde_json::{json, Map};

    fn named(value: Value) -> Params {
        match value {
            Value::Object(map) => Params::ByName(map),
            _ => Params::ByName(Map::new()),
        }
    }

    fn invalid_detail(op: Operation, params: Value) -> String {
        let error = op.build_request(&named(params)).unwrap_err();
        assert_eq!(error.code, INVALID_PARAMS);
        error.data.and_then(|d| d.as_str().map(str::to_string)).unwrap_or_default()
    }

    #[test]
    fn test_method_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.method_name().parse::<Operation>().unwrap(), op);
        }
        let error = "read_everything".parse::<Operation>().unwrap_err();
        assert_eq!(error.code, METHOD_NOT_FOUND);
    }

    #[test]
    fn test_read_defaults_slave_id() {
        let request = Operation::ReadHoldingRegisters
            .build_request(&named(json!({"starting_address": 100, "quantity": 2})))
            .unwrap();
        assert_eq!(
            request,
            ModbusRequest::ReadHoldingRegisters { slave_id: 1, address: 100, quantity: 2 }
        );
        assert_eq!(request.function_code(), Operation::ReadHoldingRegisters.function_code());
    }

    #[test]
    fn test_legacy_client_params() {
        // Legacy clients send strings and an extra `port` entry.
        let request = Operation::WriteMultipleRegisters
            .build_request(&named(json!({
                "starting_address": "100",
                "values": "0, 2674",
                "slave_id": "3",
                "port": "/tmp/tolk.sock"
            })))
            .unwrap();
        assert_eq!(
            request,
            ModbusRequest::WriteMultipleRegisters { slave_id: 3, address: 100, values: vec![0, 2674] }
        );
    }

    #[test]
    fn test_positional_params() {
        let params = Params::ByPosition(vec![json!(100), json!(1.0), json!(7)]);
        assert_eq!(
            Operation::WriteSingleCoil.build_request(&params).unwrap(),
            ModbusRequest::WriteSingleCoil { slave_id: 7, address: 100, value: true }
        );

        let too_many = Params::ByPosition(vec![json!(1), json!(1), json!(1), json!(1)]);
        assert!(Operation::ReadCoils.build_request(&too_many).is_err());
    }

    #[test]
    fn test_coil_values_are_truthy() {
        let request = Operation::WriteMultipleCoils
            .build_request(&named(json!({"starting_address": 100, "values": [0, 1, 5, true]})))
            .unwrap();
        assert_eq!(
            request,
            ModbusRequest::WriteMultipleCoils {
                slave_id: 1,
                address: 100,
                values: vec![false, true, true, true]
            }
        );
    }

    #[test]
    fn test_scalar_values() {
        let request = Operation::WriteMultipleRegisters
            .build_request(&named(json!({"starting_address": 100, "values": 9})))
            .unwrap();
        assert_eq!(
            request,
            ModbusRequest::WriteMultipleRegisters { slave_id: 1, address: 100, values: vec![9] }
        );
    }

    #[test]
    fn test_argument_errors_name_the_parameter() {
        assert!(invalid_detail(Operation::ReadCoils, json!({"quantity": 1})).contains("starting_address"));
        assert!(invalid_detail(
            Operation::ReadCoils,
            json!({"starting_address": 70000, "quantity": 1})
        )
        .contains("starting_address"));
        assert!(invalid_detail(
            Operation::WriteSingleRegister,
            json!({"address": 1, "value": -1})
        )
        .contains("value"));
        assert!(invalid_detail(
            Operation::ReadInputRegisters,
            json!({"starting_address": 0, "quantity": 1.5})
        )
        .contains("quantity"));
        assert!(invalid_detail(
            Operation::ReadCoils,
            json!({"starting_address": 0, "quantity": 1, "slave_id": 256})
        )
        .contains("slave_id"));
        assert!(invalid_detail(
            Operation::WriteMultipleCoils,
            json!({"starting_address": 0, "values": "1,x"})
        )
        .contains("values"));
        assert!(invalid_detail(
            Operation::WriteMultipleRegisters,
            json!({"starting_address": 0, "values": []})
        )
        .contains("empty"));
        assert!(invalid_detail(
            Operation::WriteMultipleRegisters,
            json!({"starting_address": 0, "values": {"a": 1}})
        )
        .contains("values"));
    }

    #[test]
    fn test_empty_list_items_are_rejected() {
        for values in ["1,,2", "1,", ",1", " , "] {
            let detail = invalid_detail(
                Operation::WriteMultipleRegisters,
                json!({"starting_address": 100, "values": values}),
            );
            assert!(detail.contains("values"), "{:?} gave {}", values, detail);
        }
    }

    #[test]
    fn test_write_counts_fit_one_request() {
        let registers = vec![0; MAX_WRITE_REGISTERS];
        assert!(Operation::WriteMultipleRegisters
            .build_request(&named(json!({"starting_address": 0, "values": registers})))
            .is_ok());
        let coils = vec![1; MAX_WRITE_BITS];
        assert!(Operation::WriteMultipleCoils
            .build_request(&named(json!({"starting_address": 0, "values": coils})))
            .is_ok());

        let registers = vec![0; MAX_WRITE_REGISTERS + 1];
        assert!(invalid_detail(
            Operation::WriteMultipleRegisters,
            json!({"starting_address": 0, "values": registers})
        )
        .contains("at most 123"));
        let coils = vec![1; MAX_WRITE_BITS + 1];
        assert!(invalid_detail(
            Operation::WriteMultipleCoils,
            json!({"starting_address": 0, "values": coils})
        )
        .contains("at most 1968"));
    }
}
