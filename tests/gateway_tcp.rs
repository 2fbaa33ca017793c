//! End to end through `ModbusClient` against a real Modbus TCP slave.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;

use common::ModbusSlave;
use tolk::modbus::{ExceptionCode, ModbusClient, ModbusClientTrait, ModbusRequest, ModbusResponse};
use tolk::rpc::{JsonRpcError, INTERNAL_ERROR, INVALID_PARAMS};
use tolk::services::Dispatcher;

async fn dispatcher_for(slave: &ModbusSlave) -> Dispatcher {
    let client: Arc<dyn ModbusClientTrait> = Arc::new(ModbusClient::connect(&slave.config()).await);
    Dispatcher::new(client)
}

async fn call(dispatcher: &Dispatcher, method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1});
    let payload = serde_json::to_vec(&request).unwrap();
    serde_json::from_slice(&dispatcher.call(&payload).await).unwrap()
}

#[tokio::test]
async fn test_coil_round_trip() {
    let slave = ModbusSlave::start(&[1]).await;
    let dispatcher = dispatcher_for(&slave).await;
    let read = json!({"starting_address": 100, "quantity": 1});

    assert_eq!(call(&dispatcher, "read_coils", read.clone()).await["result"], json!([0]));
    assert_eq!(
        call(&dispatcher, "write_single_coil", json!({"address": 100, "value": 1})).await["result"],
        json!([100, 65280])
    );
    assert_eq!(call(&dispatcher, "read_coils", read).await["result"], json!([1]));
}

#[tokio::test]
async fn test_multiple_writes() {
    let slave = ModbusSlave::start(&[1]).await;
    let dispatcher = dispatcher_for(&slave).await;

    let coils = call(
        &dispatcher,
        "write_multiple_coils",
        json!({"starting_address": 100, "values": [0, 1]}),
    )
    .await;
    assert_eq!(coils["result"], json!([100, 2]));

    let registers = call(
        &dispatcher,
        "write_multiple_registers",
        json!({"starting_address": 100, "values": "0,2674"}),
    )
    .await;
    assert_eq!(registers["result"], json!([100, 2]));

    let read = json!({"starting_address": 100, "quantity": 2});
    let first = call(&dispatcher, "read_holding_registers", read.clone()).await;
    let second = call(&dispatcher, "read_holding_registers", read).await;
    assert_eq!(first["result"], json!([0, 2674]));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_seeded_inputs() {
    let slave = ModbusSlave::start(&[1]).await;
    slave.with_slave(1, |memory| {
        memory.set_discrete_inputs(0, &[true, false]).unwrap();
        memory.set_input_registers(0, &[17, 4711]).unwrap();
    });
    let dispatcher = dispatcher_for(&slave).await;

    let bits = call(&dispatcher, "read_discrete_inputs", json!({"starting_address": 0, "quantity": 2})).await;
    assert_eq!(bits["result"], json!([1, 0]));

    let words = call(&dispatcher, "read_input_registers", json!({"starting_address": 0, "quantity": 2})).await;
    assert_eq!(words["result"], json!([17, 4711]));
}

#[tokio::test]
async fn test_slave_id_selects_the_device() {
    let slave = ModbusSlave::start(&[1, 2]).await;
    let dispatcher = dispatcher_for(&slave).await;

    call(
        &dispatcher,
        "write_single_register",
        json!({"address": 150, "value": 99, "slave_id": 2}),
    )
    .await;

    let on_two = call(
        &dispatcher,
        "read_holding_registers",
        json!({"starting_address": 150, "quantity": 1, "slave_id": 2}),
    )
    .await;
    let on_one = call(&dispatcher, "read_holding_registers", json!({"starting_address": 150, "quantity": 1})).await;

    assert_eq!(on_two["result"], json!([99]));
    assert_eq!(on_one["result"], json!([0]));
}

#[tokio::test]
async fn test_device_exceptions_are_mapped() {
    let slave = ModbusSlave::start(&[1]).await;
    let dispatcher = dispatcher_for(&slave).await;

    for exception in ExceptionCode::ALL {
        slave.fail_with(Some(exception.code()));
        let response = call(&dispatcher, "read_coils", json!({"starting_address": 100, "quantity": 1})).await;
        let expected = JsonRpcError::from(exception);

        assert_eq!(response["error"]["code"], json!(expected.code), "{:?}", exception);
        assert_eq!(response["error"]["message"], json!(expected.message), "{:?}", exception);
        assert_eq!(response["id"], json!(1));
    }

    slave.fail_with(Some(9));
    let response = call(&dispatcher, "read_coils", json!({"starting_address": 100, "quantity": 1})).await;
    assert_eq!(response["error"]["code"], json!(INTERNAL_ERROR));

    // The link survives exceptions.
    slave.fail_with(None);
    let response = call(&dispatcher, "read_coils", json!({"starting_address": 100, "quantity": 1})).await;
    assert_eq!(response["result"], json!([0]));
}

#[tokio::test]
async fn test_out_of_range_address_from_device() {
    let slave = ModbusSlave::start(&[1]).await;
    let dispatcher = dispatcher_for(&slave).await;

    let response = call(&dispatcher, "read_holding_registers", json!({"starting_address": 0, "quantity": 1})).await;
    assert_eq!(response["error"]["code"], json!(-32002));
    assert_eq!(response["error"]["message"], json!("Data address is not valid."));
}

#[tokio::test]
async fn test_oversized_writes_never_reach_the_link() {
    let slave = ModbusSlave::start(&[1]).await;
    let dispatcher = dispatcher_for(&slave).await;

    let registers = vec![7; 124];
    let response = call(
        &dispatcher,
        "write_multiple_registers",
        json!({"starting_address": 100, "values": registers}),
    )
    .await;
    assert_eq!(response["error"]["code"], json!(INVALID_PARAMS));

    let coils = vec![1; 1969];
    let response = call(
        &dispatcher,
        "write_multiple_coils",
        json!({"starting_address": 100, "values": coils}),
    )
    .await;
    assert_eq!(response["error"]["code"], json!(INVALID_PARAMS));

    // Nothing was written and the link is still usable.
    let read = call(&dispatcher, "read_holding_registers", json!({"starting_address": 100, "quantity": 1})).await;
    assert_eq!(read["result"], json!([0]));
}

#[tokio::test]
async fn test_concurrent_transactions_share_one_link() {
    let slave = ModbusSlave::start(&[1]).await;
    let client = Arc::new(ModbusClient::connect(&slave.config()).await);

    let tasks: Vec<_> = (0..16u16)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let write = ModbusRequest::WriteSingleRegister { slave_id: 1, address: 100 + i, value: i * 10 };
                client.execute(&write).await.unwrap();
                let read = ModbusRequest::ReadHoldingRegisters { slave_id: 1, address: 100 + i, quantity: 1 };
                client.execute(&read).await.unwrap()
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), ModbusResponse::Registers(vec![i as u16 * 10]));
    }
}
