use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use tolk::cli::{build_client_cli, client_target, client_timeout, request_from_matches};
use tolk::rpc::{JsonRpcRequest, JsonRpcResponse, RpcClient};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_client_cli().get_matches();
    let sub = matches.subcommand().map(|(_, sub)| sub).unwrap_or(&matches);

    let level = sub
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("warn");
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level));

    let (operation, params) = request_from_matches(&matches)?;
    let id = serde_json::to_value(uuid::Uuid::new_v4().as_u128())?;
    let request = JsonRpcRequest::new(operation.method_name(), params, id);

    let target = client_target(sub);
    debug!("Sending {} to {:?}", operation, target);
    let response = RpcClient::new(target)
        .with_timeout(client_timeout(sub))
        .call(&request)
        .await
        .context("Request failed")?;

    println!("{}", pretty(&response)?);
    let envelope: JsonRpcResponse = serde_json::from_value(response).context("Malformed response")?;
    if envelope.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

/// Four-space indented JSON; object keys come out sorted.
fn pretty(value: &Value) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(out)?)
}
