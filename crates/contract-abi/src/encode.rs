//! ABI encoding

use primitive_types::U256;

use crate::types::{ParamType, Token};
use crate::AbiError;

/// Encode tokens according to the declared parameter types
///
/// Encoding is strict: the token count, each token's shape and every integer
/// width must agree with `types`.
pub fn encode(types: &[ParamType], tokens: &[Token]) -> Result<Vec<u8>, AbiError> {
    if types.len() != tokens.len() {
        return Err(AbiError::ArgumentCount {
            expected: types.len(),
            got: tokens.len(),
        });
    }
    for (param_type, token) in types.iter().zip(tokens) {
        check_token(param_type, token)?;
    }
    Ok(encode_params(types, tokens))
}

/// Encode function call (selector + params)
pub fn encode_function_call(
    selector: [u8; 4],
    types: &[ParamType],
    tokens: &[Token],
) -> Result<Vec<u8>, AbiError> {
    let mut result = selector.to_vec();
    result.extend(encode(types, tokens)?);
    Ok(result)
}

/// Validate a token tree against its type before any bytes are produced
fn check_token(param_type: &ParamType, token: &Token) -> Result<(), AbiError> {
    let mismatch = || AbiError::TypeMismatch {
        expected: param_type.to_string(),
        value: format!("{:?}", token),
    };

    if !token.matches(param_type) {
        return Err(mismatch());
    }

    match (param_type, token) {
        (ParamType::Uint(bits), Token::Uint(value)) => {
            if *bits < 256 && value.bits() > *bits {
                return Err(mismatch());
            }
        }
        (ParamType::Int(bits), Token::Int(value)) => {
            if !value.fits(*bits) {
                return Err(mismatch());
            }
        }
        (ParamType::Array(inner), Token::Array(tokens))
        | (ParamType::FixedArray(inner, _), Token::FixedArray(tokens)) => {
            for t in tokens {
                check_token(inner, t)?;
            }
        }
        (ParamType::Tuple(types), Token::Tuple(tokens)) => {
            for (ty, t) in types.iter().zip(tokens) {
                check_token(ty, t)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Encode one head/tail frame
fn encode_params(types: &[ParamType], tokens: &[Token]) -> Vec<u8> {
    // Calculate head size (fixed part)
    let head_size = types.iter().map(ParamType::head_size).sum::<usize>();

    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for (param_type, token) in types.iter().zip(tokens.iter()) {
        if param_type.is_dynamic() {
            // Offset is relative to the start of this frame
            let offset = head_size + tail.len();
            head.extend(encode_u256(&U256::from(offset)));
            tail.extend(encode_token(param_type, token));
        } else {
            head.extend(encode_token(param_type, token));
        }
    }

    head.extend(tail);
    head
}

/// Encode a single, already type-checked token
fn encode_token(param_type: &ParamType, token: &Token) -> Vec<u8> {
    match (param_type, token) {
        (ParamType::Address, Token::Address(addr)) => {
            let mut buf = [0u8; 32];
            buf[12..32].copy_from_slice(addr.as_bytes());
            buf.to_vec()
        }
        (ParamType::Uint(_), Token::Uint(value)) => encode_u256(value),
        (ParamType::Int(_), Token::Int(value)) => encode_u256(&value.to_twos_complement()),
        (ParamType::Bool, Token::Bool(b)) => {
            let mut buf = [0u8; 32];
            buf[31] = u8::from(*b);
            buf.to_vec()
        }
        (ParamType::FixedBytes(_), Token::FixedBytes(data)) => {
            // Right-padded
            let mut buf = [0u8; 32];
            buf[..data.len()].copy_from_slice(data);
            buf.to_vec()
        }
        (ParamType::Bytes, Token::Bytes(data)) => encode_bytes(data),
        (ParamType::String, Token::String(s)) => encode_bytes(s.as_bytes()),
        (ParamType::Array(inner), Token::Array(tokens)) => {
            let mut result = encode_u256(&U256::from(tokens.len()));
            let inner_types = vec![(**inner).clone(); tokens.len()];
            result.extend(encode_params(&inner_types, tokens));
            result
        }
        (ParamType::FixedArray(inner, size), Token::FixedArray(tokens)) => {
            let inner_types = vec![(**inner).clone(); *size];
            encode_params(&inner_types, tokens)
        }
        (ParamType::Tuple(types), Token::Tuple(tokens)) => encode_params(types, tokens),
        // check_token rejects every other pairing before we get here
        _ => unreachable!("token shape was validated against {}", param_type),
    }
}

/// Encode a U256 as 32 bytes
pub(crate) fn encode_u256(value: &U256) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes.to_vec()
}

/// Encode dynamic bytes
fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut result = encode_u256(&U256::from(data.len()));

    // Pad to 32 bytes
    let padded_len = data.len().div_ceil(32) * 32;
    let mut padded = vec![0u8; padded_len];
    padded[..data.len()].copy_from_slice(data);
    result.extend(padded);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::address_from_hex;
    use crate::descriptor::selector_of;
    use crate::types::I256;

    #[test]
    fn test_encode_address() {
        let addr = address_from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        let encoded = encode(&[ParamType::Address], &[Token::Address(addr)]).unwrap();

        assert_eq!(encoded.len(), 32);
        // Address is left-padded in 32 bytes
        assert_eq!(&encoded[..12], &[0u8; 12]);
        assert_eq!(&encoded[12..32], addr.as_bytes());
    }

    #[test]
    fn test_encode_uint() {
        let encoded = encode(&[ParamType::Uint(256)], &[Token::uint(100)]).unwrap();
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded[31], 100);
    }

    #[test]
    fn test_encode_uint_width_checked() {
        assert!(encode(&[ParamType::Uint(8)], &[Token::uint(255)]).is_ok());
        assert!(matches!(
            encode(&[ParamType::Uint(8)], &[Token::uint(256)]),
            Err(AbiError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_encode_negative_int() {
        let encoded = encode(&[ParamType::Int(256)], &[Token::Int(I256::from_i128(-1))]).unwrap();
        assert_eq!(encoded, vec![0xff; 32]);

        assert!(encode(&[ParamType::Int(8)], &[Token::Int(I256::from_i128(-129))]).is_err());
    }

    #[test]
    fn test_encode_bool() {
        let encoded = encode(&[ParamType::Bool, ParamType::Bool], &[Token::Bool(true), Token::Bool(false)]).unwrap();
        assert_eq!(encoded[31], 1);
        assert_eq!(encoded[63], 0);
    }

    #[test]
    fn test_encode_fixed_bytes_right_padded() {
        let encoded = encode(&[ParamType::FixedBytes(2)], &[Token::FixedBytes(vec![0xab, 0xcd])]).unwrap();
        assert_eq!(&encoded[..2], &[0xab, 0xcd]);
        assert_eq!(&encoded[2..], &[0u8; 30]);

        // wrong length is rejected rather than truncated
        assert!(encode(&[ParamType::FixedBytes(2)], &[Token::FixedBytes(vec![1, 2, 3])]).is_err());
    }

    #[test]
    fn test_encode_dynamic_bytes() {
        let data = vec![0x01, 0x02, 0x03];
        let encoded = encode(&[ParamType::Bytes], &[Token::Bytes(data.clone())]).unwrap();

        // offset (32) + length (32) + padded data (32)
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 32);
        assert_eq!(encoded[63], 3);
        assert_eq!(&encoded[64..67], &data[..]);
    }

    #[test]
    fn test_encode_mixed_static_and_dynamic() {
        // f(uint256,string,bool)
        let encoded = encode(
            &[ParamType::Uint(256), ParamType::String, ParamType::Bool],
            &[Token::uint(7), Token::string("hi"), Token::Bool(true)],
        )
        .unwrap();

        // head: 3 words; tail: length + one padded word
        assert_eq!(encoded.len(), 5 * 32);
        assert_eq!(encoded[31], 7);
        assert_eq!(encoded[63], 96); // string offset points past the head
        assert_eq!(encoded[95], 1);
        assert_eq!(encoded[127], 2);
        assert_eq!(&encoded[128..130], b"hi");
    }

    #[test]
    fn test_encode_array_of_dynamic_tuples() {
        // ((uint256,string)[])
        let ty = ParamType::Array(Box::new(ParamType::Tuple(vec![ParamType::Uint(256), ParamType::String])));
        let value = Token::Array(vec![
            Token::Tuple(vec![Token::uint(1), Token::string("a")]),
            Token::Tuple(vec![Token::uint(2), Token::string("b")]),
        ]);
        let encoded = encode(&[ty], &[value]).unwrap();

        // outer offset
        assert_eq!(encoded[31], 32);
        // array length
        assert_eq!(encoded[63], 2);
        // element offsets relative to the element frame (after the length word)
        assert_eq!(encoded[95], 64);
        assert_eq!(encoded[127], 64 + 128);
    }

    #[test]
    fn test_encode_argument_count() {
        let result = encode(&[ParamType::Address, ParamType::Uint(256)], &[Token::uint(1)]);
        assert!(matches!(result, Err(AbiError::ArgumentCount { expected: 2, got: 1 })));
    }

    #[test]
    fn test_encode_function_call() {
        let to = address_from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d").unwrap();
        let selector = selector_of("transfer(address,uint256)");
        let encoded = encode_function_call(
            selector,
            &[ParamType::Address, ParamType::Uint(256)],
            &[Token::Address(to), Token::uint(1000)],
        )
        .unwrap();

        // 4 bytes selector + 32 bytes address + 32 bytes uint
        assert_eq!(encoded.len(), 68);
        assert_eq!(&encoded[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&encoded[16..36], to.as_bytes());
        assert_eq!(&encoded[66..68], &[0x03, 0xe8]);
    }
}
