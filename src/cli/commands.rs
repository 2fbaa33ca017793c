use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::settings::{ListenAddress, DEFAULT_SOCKET_PATH};
use crate::rpc::envelope::Params;
use crate::services::operations::{Operation, DEFAULT_SLAVE_ID};
use crate::utils::error::GatewayError;
use crate::VERSION;

pub fn build_server_cli() -> Command {
    Command::new("tolk")
        .version(VERSION)
        .about("JSON-RPC to Modbus gateway")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("socket")
                .short('s')
                .long("socket")
                .value_name("PATH")
                .help("Unix socket to listen on"),
        )
        .arg(
            Arg::new("tcp-listen")
                .long("tcp-listen")
                .value_name("ADDR")
                .help("Listen on TCP (e.g. 127.0.0.1:7000) instead of the Unix socket"),
        )
        .arg(
            Arg::new("transport")
                .short('t')
                .long("transport")
                .value_parser(["tcp", "rtu", "simulator"])
                .help("Modbus transport"),
        )
        .arg(
            Arg::new("modbus-host")
                .long("modbus-host")
                .value_name("HOST")
                .help("Modbus TCP device host"),
        )
        .arg(
            Arg::new("modbus-port")
                .long("modbus-port")
                .value_name("PORT")
                .help("Modbus TCP device port"),
        )
        .arg(
            Arg::new("serial-port")
                .long("serial-port")
                .value_name("DEVICE")
                .help("Serial device for Modbus RTU"),
        )
        .arg(Arg::new("baud").long("baud").value_name("RATE").help("Serial baud rate"))
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .help("Per-transaction Modbus timeout in milliseconds"),
        )
        .arg(
            Arg::new("single-read")
                .long("single-read")
                .action(ArgAction::SetTrue)
                .help("Read each request with a single 1024-byte read"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .help("Log level (RUST_LOG takes precedence)"),
        )
        .arg(
            Arg::new("write-config")
                .long("write-config")
                .value_name("FILE")
                .help("Write the effective configuration to FILE and exit"),
        )
}

pub fn build_client_cli() -> Command {
    let operations = Operation::ALL.into_iter().map(|operation| {
        let [first, second, _] = operation.parameter_names();
        Command::new(operation.method_name())
            .about(format!("Call {} (function {})", operation, operation.function_code()))
            .arg(Arg::new(first).value_name(first).required(true))
            .arg(
                Arg::new(second)
                    .value_name(second)
                    .required(true)
                    .allow_negative_numbers(true),
            )
    });

    Command::new("tolk-client")
        .version(VERSION)
        .about("Send one JSON-RPC request to a tolk gateway")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("slave-id")
                .long("slave-id")
                .value_name("ID")
                .default_value("1")
                .global(true)
                .help("Target slave id"),
        )
        .arg(
            Arg::new("socket")
                .short('s')
                .long("socket")
                .value_name("PATH")
                .default_value(DEFAULT_SOCKET_PATH)
                .global(true)
                .help("Gateway Unix socket"),
        )
        .arg(
            Arg::new("tcp")
                .long("tcp")
                .value_name("ADDR")
                .global(true)
                .help("Connect over TCP instead of the Unix socket"),
        )
        .arg(
            Arg::new("timeout-ms")
                .long("timeout-ms")
                .value_name("MS")
                .default_value("10000")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("Give up when the gateway has not answered in time"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .default_value("warn")
                .global(true)
                .value_parser(["error", "warn", "info", "debug", "trace"]),
        )
        .subcommands(operations)
}

pub fn client_target(matches: &ArgMatches) -> ListenAddress {
    match matches.get_one::<String>("tcp") {
        Some(addr) => ListenAddress::Tcp(addr.clone()),
        None => ListenAddress::Unix(
            matches
                .get_one::<String>("socket")
                .map(String::as_str)
                .unwrap_or(DEFAULT_SOCKET_PATH)
                .into(),
        ),
    }
}

pub fn client_timeout(matches: &ArgMatches) -> Duration {
    Duration::from_millis(matches.get_one::<u64>("timeout-ms").copied().unwrap_or(10_000))
}

/// Turns the client subcommand into a method and named parameters.
///
/// Multi-value arguments are forwarded as the comma-joined string the
/// user typed; the gateway splits them.
pub fn request_from_matches(matches: &ArgMatches) -> Result<(Operation, Params), GatewayError> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| GatewayError::InvalidData("No operation given".to_string()))?;
    let operation: Operation = name
        .parse()
        .map_err(|_| GatewayError::InvalidData(format!("Unknown operation '{}'", name)))?;

    let [first, second, slave] = operation.parameter_names();
    let mut params = Map::new();
    for param in [first, second] {
        let raw = sub.get_one::<String>(param).ok_or_else(|| {
            GatewayError::InvalidData(format!("Missing argument '{}'", param))
        })?;
        params.insert(param.to_string(), argument_value(param, raw));
    }

    let slave_id = match sub.get_one::<String>("slave-id") {
        Some(raw) => raw.trim().parse::<u8>().map_err(|_| {
            GatewayError::InvalidData(format!("--slave-id expects 0-255, got '{}'", raw))
        })?,
        None => DEFAULT_SLAVE_ID,
    };
    params.insert(slave.to_string(), Value::from(slave_id));

    Ok((operation, Params::ByName(params)))
}

fn argument_value(param: &str, raw: &str) -> Value {
    if param == "values" {
        return Value::from(raw);
    }
    match raw.trim().parse::<i64>() {
        Ok(number) => Value::from(number),
        Err(_) => Value::from(raw),
    }
}
