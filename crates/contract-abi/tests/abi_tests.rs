//! End-to-end tests over real-shaped ABIs.

use bytes::Bytes;
use contract_abi::convert::address_from_hex;
use contract_abi::{
    decode, keccak256, selector_of, AbiError, AbiTable, ContractArtifact, IndexedFilter, Log,
    LogEntry, ParamType, Token, H256, U256,
};

const ORDERS_ABI: &str = r#"[
    {"type":"function","name":"transfer","stateMutability":"nonpayable",
     "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
     "outputs":[{"name":"","type":"bool"}]},
    {"type":"function","name":"fillOrders","stateMutability":"payable",
     "inputs":[
        {"name":"orders","type":"tuple[]","internalType":"struct Order[]","components":[
            {"name":"maker","type":"address"},
            {"name":"amounts","type":"uint128[2]"},
            {"name":"signature","type":"bytes"}]},
        {"name":"tag","type":"bytes32"}],
     "outputs":[{"name":"filled","type":"uint256[]"}]},
    {"type":"event","name":"Fill","anonymous":false,"inputs":[
        {"name":"maker","type":"address","indexed":true},
        {"name":"amount","type":"uint256","indexed":false}]},
    {"type":"event","name":"Cancel","anonymous":false,"inputs":[
        {"name":"maker","type":"address","indexed":true},
        {"name":"orderHash","type":"bytes32","indexed":true}]}
]"#;

fn table() -> AbiTable {
    AbiTable::from_json(ORDERS_ABI).unwrap()
}

fn word(value: u64) -> Vec<u8> {
    let mut w = vec![0u8; 32];
    w[24..].copy_from_slice(&value.to_be_bytes());
    w
}

fn address_topic(address: contract_abi::Address) -> H256 {
    let mut topic = H256::zero();
    topic.0[12..].copy_from_slice(address.as_bytes());
    topic
}

#[test]
fn test_transfer_calldata_layout() {
    let to = address_from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
    let data = table()
        .function("transfer")
        .unwrap()
        .encode_call(&[Token::Address(to), Token::uint(1000)])
        .unwrap();

    let mut expected = vec![0xa9, 0x05, 0x9c, 0xbb];
    expected.extend(address_topic(to).as_bytes());
    expected.extend(word(1000));
    assert_eq!(data.as_ref(), expected.as_slice());
}

#[test]
fn test_struct_array_signature_and_roundtrip() {
    let table = table();
    let fill = table.function("fillOrders").unwrap();
    assert_eq!(fill.signature, "fillOrders((address,uint128[2],bytes)[],bytes32)");
    assert_eq!(fill.selector, selector_of(&fill.signature));

    let order = |maker: u8, sig: &[u8]| {
        Token::Tuple(vec![
            Token::Address(contract_abi::Address::repeat_byte(maker)),
            Token::FixedArray(vec![Token::uint(1), Token::uint(2)]),
            Token::Bytes(sig.to_vec()),
        ])
    };
    let args = vec![
        Token::Array(vec![order(1, &[0xaa; 65]), order(2, &[])]),
        Token::bytes32(keccak256(b"tag")),
    ];
    let calldata = fill.encode_call(&args).unwrap();
    assert_eq!(table.decode_transaction_data("fillOrders", &calldata).unwrap(), args);
}

#[test]
fn test_two_topic_log_decodes_indexed_and_data_fields() {
    let table = table();
    let event = table.event("Fill").unwrap();
    let maker = contract_abi::Address::repeat_byte(0x42);
    let log = Log {
        topics: vec![event.topic, address_topic(maker)],
        data: Bytes::from(word(500)),
        ..Default::default()
    };

    let decoded = event.decode_log(&log).unwrap();
    assert_eq!(decoded.args.len(), 2);
    assert_eq!(decoded.args[0].value, Token::Address(maker));
    assert!(decoded.args[0].indexed);
    assert_eq!(decoded.args[1].value, Token::Uint(U256::from(500)));
    assert!(!decoded.args[1].indexed);

    match table.log_decoder().decode(&log) {
        LogEntry::Decoded(d) => assert_eq!(d.event, "Fill"),
        LogEntry::Raw(_) => panic!("Fill log should decode"),
    }
}

#[test]
fn test_filter_by_maker() {
    let table = table();
    let event = table.event("Fill").unwrap();
    let x = contract_abi::Address::repeat_byte(0x01);
    let y = contract_abi::Address::repeat_byte(0x02);
    let log_for = |maker| Log {
        topics: vec![event.topic, address_topic(maker)],
        data: Bytes::from(word(1)),
        ..Default::default()
    };

    let filter = IndexedFilter::new().with("maker", Token::Address(x));
    let logs = [log_for(x), log_for(y), log_for(x)];
    let delivered: Vec<_> = logs
        .iter()
        .filter(|log| filter.matches(event, log).unwrap())
        .collect();
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().all(|log| log.topics[1] == address_topic(x)));

    let topics = filter.topics(event).unwrap();
    assert_eq!(topics, vec![Some(event.topic), Some(address_topic(x))]);
}

#[test]
fn test_malformed_return_data() {
    let table = table();
    // non-empty but shorter than the static section
    assert!(matches!(
        table.decode_return_data("transfer", &[0u8; 31]),
        Err(AbiError::MalformedCalldata(_))
    ));

    // dynamic array whose offset points past the end
    let mut data = word(0x1000);
    data.extend(word(0));
    assert!(matches!(
        decode(&[ParamType::Array(Box::new(ParamType::Uint(256)))], &data),
        Err(AbiError::MalformedCalldata(_))
    ));

    // length word larger than the remaining buffer
    let mut data = word(32);
    data.extend(word(u64::MAX));
    assert!(matches!(
        decode(&[ParamType::Bytes], &data),
        Err(AbiError::MalformedCalldata(_))
    ));
}

#[test]
fn test_artifact_abi_builds_table() {
    let json = format!(
        r#"{{"contractName":"Orders","abi":{},"bytecode":"0x6080","deployedBytecode":"0x"}}"#,
        ORDERS_ABI
    );
    let artifact = ContractArtifact::from_json(&json).unwrap();
    let table = AbiTable::from_abi(artifact.abi).unwrap();
    assert_eq!(table.functions().len(), 2);
    assert_eq!(table.events().len(), 2);
}
