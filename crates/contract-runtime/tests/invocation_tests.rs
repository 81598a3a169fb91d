//! Invocation integration tests for contract-runtime
//!
//! Tests simulate, estimate, access lists and submission against a mock node.

use std::sync::Arc;

use contract_abi::revert::{ERROR_SELECTOR, PANIC_SELECTOR};
use contract_abi::{encode_function_call, selector_of, AbiTable, Address, ParamType, RevertReason, Token, U256};
use contract_runtime::{
    AwaitOptions, BlockId, Contract, ContractError, MockReply, MockTransport, RpcClient,
    RuntimeConfig, SubmitOptions, TxRequest,
};
use serde_json::{json, Value};

const EXCHANGE_ABI: &str = r#"[
    {"type":"function","name":"getBalance","inputs":[{"name":"owner","type":"address"}],
     "outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
    {"type":"function","name":"fillOrder","inputs":[{"name":"orderHash","type":"bytes32"},{"name":"amount","type":"uint256"}],
     "outputs":[{"name":"filled","type":"uint256"}],"stateMutability":"nonpayable"},
    {"type":"function","name":"cancel","inputs":[],"outputs":[],"stateMutability":"nonpayable"},
    {"type":"event","name":"Fill","inputs":[
        {"name":"maker","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false}]},
    {"type":"error","name":"OrderExpired","inputs":[{"name":"expiry","type":"uint256"}]}
]"#;

const TOKEN_ABI: &str = r#"[
    {"type":"event","name":"Transfer","inputs":[
        {"name":"from","type":"address","indexed":true},
        {"name":"to","type":"address","indexed":true},
        {"name":"value","type":"uint256","indexed":false}]}
]"#;

const TX_HASH: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

/// Log to the test output; `RUST_LOG=contract_runtime=debug` shows RPC traffic
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn exchange(transport: &MockTransport) -> Contract {
    init_tracing();
    Contract::new(
        Address::repeat_byte(0x11),
        Arc::new(AbiTable::from_json(EXCHANGE_ABI).unwrap()),
        RpcClient::with_transport(transport.clone()),
    )
}

fn word(value: u64) -> String {
    format!("0x{:064x}", value)
}

fn fill_args() -> Vec<Token> {
    vec![Token::FixedBytes(vec![0xab; 32]), Token::uint(500)]
}

fn error_string(message: &str) -> Vec<u8> {
    encode_function_call(
        ERROR_SELECTOR,
        &[ParamType::String],
        &[Token::String(message.to_string())],
    )
    .unwrap()
}

// ==================== Simulate Tests ====================

#[tokio::test]
async fn test_simulate_decodes_outputs() {
    let transport = MockTransport::new();
    transport.set_response("eth_call", json!(word(42)));
    let contract = exchange(&transport);

    let out = contract
        .method("getBalance", vec![Token::Address(Address::zero())])
        .unwrap()
        .simulate(TxRequest::default(), BlockId::Latest)
        .await
        .unwrap();
    assert_eq!(out, vec![Token::uint(42)]);

    let (_, params) = &transport.requests()[0];
    assert_eq!(params[0]["to"], "0x1111111111111111111111111111111111111111");
    assert_eq!(params[1], "latest");
    // simulate never estimates gas
    assert_eq!(transport.request_count("eth_estimateGas"), 0);
}

#[tokio::test]
async fn test_simulate_is_idempotent() {
    let transport = MockTransport::new();
    transport.set_response("eth_call", json!(word(7)));
    let contract = exchange(&transport);
    let handle = contract.method("fillOrder", fill_args()).unwrap();

    let first = handle.simulate(TxRequest::default(), BlockId::Latest).await.unwrap();
    let second = handle.simulate(TxRequest::default(), BlockId::Latest).await.unwrap();
    assert_eq!(first, second);

    let requests = transport.requests();
    assert_eq!(requests[0].1, requests[1].1);
    assert_eq!(transport.request_count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_simulate_empty_result_with_outputs() {
    let transport = MockTransport::new();
    let contract = exchange(&transport);

    let err = contract
        .method("getBalance", vec![Token::Address(Address::zero())])
        .unwrap()
        .simulate(TxRequest::default(), BlockId::Latest)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContractError::EmptyResultOnNonEmptyOutputs { ref function } if function == "getBalance(address)"
    ));
}

#[tokio::test]
async fn test_simulate_empty_result_without_outputs() {
    let transport = MockTransport::new();
    let contract = exchange(&transport);

    let out = contract
        .method("cancel", vec![])
        .unwrap()
        .simulate(TxRequest::default(), BlockId::Latest)
        .await
        .unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_simulate_revert_from_rpc_error() {
    let transport = MockTransport::new();
    transport.push_reply("eth_call", MockReply::revert(error_string("order expired")));
    let contract = exchange(&transport);

    let err = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .simulate(TxRequest::default(), BlockId::Latest)
        .await
        .unwrap_err();
    match err {
        ContractError::Reverted { reason } => {
            assert_eq!(reason, RevertReason::Error("order expired".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_simulate_revert_from_result_payload() {
    let transport = MockTransport::new();
    let panic = encode_function_call(PANIC_SELECTOR, &[ParamType::Uint(256)], &[Token::uint(0x11)])
        .unwrap();
    transport.set_response("eth_call", json!(contract_abi::convert::to_hex(panic)));
    let contract = exchange(&transport);

    let err = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .simulate(TxRequest::default(), BlockId::Latest)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ContractError::Reverted { reason: RevertReason::Panic(code) } if code == U256::from(0x11)
    ));
}

#[tokio::test]
async fn test_simulate_custom_error() {
    let transport = MockTransport::new();
    let expired = selector_of("OrderExpired(uint256)");
    let data = encode_function_call(expired, &[ParamType::Uint(256)], &[Token::uint(99)]).unwrap();
    transport.push_reply("eth_call", MockReply::revert(data));
    let contract = exchange(&transport);

    let err = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .simulate(TxRequest::default(), BlockId::Latest)
        .await
        .unwrap_err();
    match err {
        ContractError::Reverted {
            reason: RevertReason::Custom { name, args },
        } => {
            assert_eq!(name, "OrderExpired");
            assert_eq!(args, vec![Token::uint(99)]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ==================== Estimate & Access List Tests ====================

#[tokio::test]
async fn test_estimate_cost() {
    let transport = MockTransport::new();
    transport.set_response("eth_estimateGas", json!("0x186a0"));
    let contract = exchange(&transport);

    let gas = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .estimate_cost(TxRequest::default().from(Address::repeat_byte(0x22)))
        .await
        .unwrap();
    assert_eq!(gas, 100_000);

    let (method, params) = &transport.requests()[0];
    assert_eq!(method, "eth_estimateGas");
    assert_eq!(params[0]["from"], "0x2222222222222222222222222222222222222222");
    assert_eq!(transport.request_count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_build_access_list() {
    let transport = MockTransport::new();
    transport.set_response(
        "eth_createAccessList",
        json!({
            "accessList": [{
                "address": "0x1111111111111111111111111111111111111111",
                "storageKeys": [
                    "0x0000000000000000000000000000000000000000000000000000000000000003",
                    "0x0000000000000000000000000000000000000000000000000000000000000004"
                ]
            }],
            "gasUsed": "0xb2e8"
        }),
    );
    let contract = exchange(&transport);

    let result = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .build_access_list(TxRequest::default(), BlockId::Number(0x20))
        .await
        .unwrap();
    assert_eq!(result.access_list[0].storage_keys.len(), 2);
    assert_eq!(result.gas_used, U256::from(0xb2e8));
    assert_eq!(transport.requests()[0].1[1], "0x20");
}

// ==================== Submit Tests ====================

#[tokio::test]
async fn test_validation_failure_sends_nothing() {
    let transport = MockTransport::new();
    transport.set_error(
        "eth_call",
        3,
        "execution reverted",
        Some(Value::String(contract_abi::convert::to_hex(error_string("not maker")))),
    );
    let contract = exchange(&transport);

    let err = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .submit(TxRequest::default(), SubmitOptions::default())
        .await
        .unwrap_err();

    match err {
        ContractError::ValidationFailed(inner) => {
            assert!(matches!(*inner, ContractError::Reverted { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.request_count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_submit_without_validation() {
    let transport = MockTransport::new();
    transport.set_error("eth_call", 3, "execution reverted", None);
    let contract = exchange(&transport);

    let pending = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .submit(TxRequest::default(), SubmitOptions::default().validate(false))
        .await
        .unwrap();
    assert_eq!(format!("{:?}", pending.hash), TX_HASH);
    assert_eq!(transport.request_count("eth_call"), 0);
    assert_eq!(transport.request_count("eth_sendTransaction"), 1);
}

#[tokio::test]
async fn test_submit_merges_defaults_and_estimates() {
    let transport = MockTransport::new();
    transport.set_response("eth_call", json!(word(500)));
    let config = RuntimeConfig::from_toml_str(
        r#"
        default_from = "0x2222222222222222222222222222222222222222"
        default_gas_price = 7
        "#,
    )
    .unwrap();
    let contract = exchange(&transport).with_config(config);
    let handle = contract.method("fillOrder", fill_args()).unwrap();

    handle
        .submit(TxRequest::default().value(U256::from(3)), SubmitOptions::default())
        .await
        .unwrap();
    handle
        .submit(TxRequest::default().gas(90_000), SubmitOptions::default())
        .await
        .unwrap();

    let sends: Vec<Value> = transport
        .requests()
        .into_iter()
        .filter(|(m, _)| m == "eth_sendTransaction")
        .map(|(_, p)| p[0].clone())
        .collect();
    // every submit sends a new transaction
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0]["from"], "0x2222222222222222222222222222222222222222");
    assert_eq!(sends[0]["gasPrice"], "0x7");
    assert_eq!(sends[0]["gas"], "0x5208");
    assert_eq!(sends[0]["value"], "0x3");
    assert_eq!(sends[0]["data"], contract_abi::convert::to_hex(handle.calldata()));
    assert_eq!(sends[1]["gas"], "0x15f90");
    assert_eq!(transport.request_count("eth_estimateGas"), 1);
}

#[tokio::test]
async fn test_config_disables_validation() {
    let transport = MockTransport::new();
    let config = RuntimeConfig {
        validate_before_send: false,
        estimate_gas: false,
        ..Default::default()
    };
    let contract = exchange(&transport).with_config(config);

    contract
        .method("cancel", vec![])
        .unwrap()
        .submit(TxRequest::default(), SubmitOptions::default())
        .await
        .unwrap();
    assert_eq!(transport.request_count("eth_call"), 0);
    assert_eq!(transport.request_count("eth_estimateGas"), 0);
    assert_eq!(transport.request_count("eth_sendTransaction"), 1);
}

#[tokio::test]
async fn test_submit_and_await_decodes_dependency_logs() {
    let transport = MockTransport::new();
    transport.set_response("eth_call", json!(word(500)));
    let maker = Address::repeat_byte(0xaa);
    let exchange_table = AbiTable::from_json(EXCHANGE_ABI).unwrap();
    let token_table = AbiTable::from_json(TOKEN_ABI).unwrap();
    let fill_topic = exchange_table.event("Fill").unwrap().topic;
    let transfer_topic = token_table.event("Transfer").unwrap().topic;
    let address_topic = |a: Address| format!("0x{:0>64}", hex::encode(a.as_bytes()));

    transport.push_response("eth_getTransactionReceipt", Value::Null);
    transport.set_response(
        "eth_getTransactionReceipt",
        json!({
            "transactionHash": TX_HASH,
            "blockNumber": "0x101",
            "status": "0x1",
            "gasUsed": "0x5208",
            "logs": [
                {
                    "address": "0x1111111111111111111111111111111111111111",
                    "topics": [format!("{:?}", fill_topic), address_topic(maker)],
                    "data": word(500)
                },
                {
                    "address": "0x5555555555555555555555555555555555555555",
                    "topics": [
                        format!("{:?}", transfer_topic),
                        address_topic(maker),
                        address_topic(Address::repeat_byte(0xbb))
                    ],
                    "data": word(500)
                },
                {
                    "address": "0x6666666666666666666666666666666666666666",
                    "topics": [format!("0x{}", "77".repeat(32))],
                    "data": "0x"
                }
            ]
        }),
    );

    let contract = exchange(&transport).with_log_decode_dependencies([&token_table]);
    let receipt = contract
        .method("fillOrder", fill_args())
        .unwrap()
        .submit_and_await(
            TxRequest::default(),
            SubmitOptions::default(),
            AwaitOptions::default().polling_interval(std::time::Duration::from_millis(1)),
        )
        .await
        .unwrap();

    assert_eq!(receipt.logs.len(), 3);
    let fill = receipt.events("Fill").next().unwrap();
    assert_eq!(fill.arg("maker"), Some(&Token::Address(maker)));
    assert_eq!(fill.arg("amount"), Some(&Token::uint(500)));
    let transfer = receipt.events("Transfer").next().unwrap();
    assert_eq!(transfer.arg("to"), Some(&Token::Address(Address::repeat_byte(0xbb))));
    assert!(receipt.logs[2].as_decoded().is_none());
}

#[tokio::test]
async fn test_argument_errors_surface_early() {
    let transport = MockTransport::new();
    let contract = exchange(&transport);

    let err = contract.method("fillOrder", vec![Token::uint(1)]).unwrap_err();
    assert!(matches!(
        err,
        ContractError::Abi(contract_abi::AbiError::ArgumentCount { expected: 2, got: 1 })
    ));
    let err = contract.method("missing", vec![]).unwrap_err();
    assert!(matches!(err, ContractError::Abi(contract_abi::AbiError::UnknownFunction(_))));
    assert!(transport.requests().is_empty());
}
