//! ABI decoding

use primitive_types::{H160, U256};

use crate::types::{I256, ParamType, Token};
use crate::AbiError;

/// Decode tokens from ABI-encoded data
///
/// Every offset and length is bounds-checked; structural violations are
/// reported as [`AbiError::MalformedCalldata`] and never silently recovered.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let min_size = types.iter().map(ParamType::head_size).sum::<usize>();
    if data.len() < min_size {
        return Err(AbiError::malformed(format!(
            "buffer of {} bytes is shorter than the {} byte static section",
            data.len(),
            min_size
        )));
    }
    let mut budget = Budget::for_buffer(data);
    decode_params(types.iter(), data, &mut budget)
}

/// Decode function return data
pub fn decode_output(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    decode(types, data)
}

/// Decode a single static value from a 32-byte topic word
pub(crate) fn decode_word(param_type: &ParamType, word: &[u8]) -> Result<Token, AbiError> {
    decode_static(param_type, word, 0, &mut Budget::for_buffer(word))
}

/// Words the decoded output may still account for
///
/// A well-formed encoding spends at least one buffer word per scalar, per
/// array length and per 32 bytes of `bytes`/`string` content. Offsets that
/// alias the same tail content would otherwise multiply the output.
struct Budget {
    words: usize,
}

impl Budget {
    fn for_buffer(data: &[u8]) -> Self {
        Self {
            words: data.len().div_ceil(32),
        }
    }

    fn charge(&mut self, words: usize) -> Result<(), AbiError> {
        self.words = self.words.checked_sub(words).ok_or_else(|| {
            AbiError::malformed("decoded values exceed what the buffer can hold; offsets overlap")
        })?;
        Ok(())
    }
}

/// Decode one head/tail frame; offsets are relative to `data[0]`
fn decode_params<'t>(
    types: impl Iterator<Item = &'t ParamType>,
    data: &[u8],
    budget: &mut Budget,
) -> Result<Vec<Token>, AbiError> {
    let mut tokens = Vec::with_capacity(types.size_hint().0);
    let mut pos = 0;

    for param_type in types {
        if param_type.is_dynamic() {
            let offset = read_usize(data, pos)?;
            tokens.push(decode_dynamic(param_type, data, offset, budget)?);
            pos += 32;
        } else {
            tokens.push(decode_static(param_type, data, pos, budget)?);
            pos += param_type.head_size();
        }
    }

    Ok(tokens)
}

/// Decode a static value encoded in place at `pos`
fn decode_static(
    param_type: &ParamType,
    data: &[u8],
    pos: usize,
    budget: &mut Budget,
) -> Result<Token, AbiError> {
    match param_type {
        ParamType::Address => {
            let word = read_word(data, pos)?;
            budget.charge(1)?;
            Ok(Token::Address(H160::from_slice(&word[12..32])))
        }
        ParamType::Uint(_) => {
            let word = read_word(data, pos)?;
            budget.charge(1)?;
            Ok(Token::Uint(U256::from_big_endian(word)))
        }
        ParamType::Int(_) => {
            let word = read_word(data, pos)?;
            budget.charge(1)?;
            Ok(Token::Int(I256::from_twos_complement(U256::from_big_endian(word))))
        }
        ParamType::Bool => {
            let word = read_word(data, pos)?;
            budget.charge(1)?;
            Ok(Token::Bool(word[31] != 0))
        }
        ParamType::FixedBytes(size) => {
            let word = read_word(data, pos)?;
            budget.charge(1)?;
            Ok(Token::FixedBytes(word[..*size].to_vec()))
        }
        ParamType::FixedArray(inner, size) => {
            let step = inner.head_size();
            let tokens = (0..*size)
                .map(|i| decode_static(inner, data, pos + i * step, budget))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Token::FixedArray(tokens))
        }
        ParamType::Tuple(types) => {
            let mut tokens = Vec::with_capacity(types.len());
            let mut inner_pos = pos;
            for ty in types {
                tokens.push(decode_static(ty, data, inner_pos, budget)?);
                inner_pos += ty.head_size();
            }
            Ok(Token::Tuple(tokens))
        }
        ParamType::Bytes | ParamType::String | ParamType::Array(_) => Err(AbiError::malformed(
            format!("{} cannot be decoded in place", param_type),
        )),
    }
}

/// Decode a dynamic value whose content starts at `offset`
fn decode_dynamic(
    param_type: &ParamType,
    data: &[u8],
    offset: usize,
    budget: &mut Budget,
) -> Result<Token, AbiError> {
    match param_type {
        ParamType::Bytes => Ok(Token::Bytes(decode_bytes(data, offset, budget)?)),
        ParamType::String => {
            let bytes = decode_bytes(data, offset, budget)?;
            let s = String::from_utf8(bytes)
                .map_err(|e| AbiError::malformed(format!("invalid UTF-8: {}", e)))?;
            Ok(Token::String(s))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, offset)?;
            let frame = slice_from(data, offset + 32)?;
            // each element needs at least its head slot
            let needed = len
                .checked_mul(inner.head_size())
                .ok_or_else(|| AbiError::malformed(format!("array length {} overflows", len)))?;
            if needed > frame.len() {
                return Err(AbiError::malformed(format!(
                    "array of {} elements needs {} bytes, only {} available",
                    len,
                    needed,
                    frame.len()
                )));
            }
            // zero-sized elements occupy no words of their own
            let zero_sized = if inner.head_size() == 0 { len } else { 0 };
            budget.charge(1 + zero_sized)?;
            Ok(Token::Array(decode_params(
                std::iter::repeat(&**inner).take(len),
                frame,
                budget,
            )?))
        }
        ParamType::FixedArray(inner, size) => {
            let frame = slice_from(data, offset)?;
            Ok(Token::FixedArray(decode_params(
                std::iter::repeat(&**inner).take(*size),
                frame,
                budget,
            )?))
        }
        ParamType::Tuple(types) => {
            let frame = slice_from(data, offset)?;
            Ok(Token::Tuple(decode_params(types.iter(), frame, budget)?))
        }
        _ => decode_static(param_type, data, offset, budget),
    }
}

/// Decode length-prefixed bytes at offset
fn decode_bytes(data: &[u8], offset: usize, budget: &mut Budget) -> Result<Vec<u8>, AbiError> {
    let len = read_usize(data, offset)?;
    let start = offset + 32;
    let end = start
        .checked_add(len)
        .ok_or_else(|| AbiError::malformed(format!("length {} overflows", len)))?;
    if end > data.len() {
        return Err(AbiError::malformed(format!(
            "bytes of length {} at offset {} exceed buffer of {} bytes",
            len,
            offset,
            data.len()
        )));
    }
    budget.charge(1 + len.div_ceil(32))?;
    Ok(data[start..end].to_vec())
}

fn read_word(data: &[u8], pos: usize) -> Result<&[u8], AbiError> {
    let end = pos
        .checked_add(32)
        .ok_or_else(|| AbiError::malformed(format!("position {} overflows", pos)))?;
    if end > data.len() {
        return Err(AbiError::malformed(format!(
            "need {} bytes, have {}",
            end,
            data.len()
        )));
    }
    Ok(&data[pos..end])
}

/// Read an offset or length word; it must point inside the buffer
fn read_usize(data: &[u8], pos: usize) -> Result<usize, AbiError> {
    let value = U256::from_big_endian(read_word(data, pos)?);
    if value > U256::from(data.len()) {
        return Err(AbiError::malformed(format!(
            "offset or length {} at position {} exceeds buffer of {} bytes",
            value,
            pos,
            data.len()
        )));
    }
    Ok(value.low_u64() as usize)
}

fn slice_from(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    data.get(offset..).ok_or_else(|| {
        AbiError::malformed(format!(
            "offset {} exceeds buffer of {} bytes",
            offset,
            data.len()
        ))
    })
}
