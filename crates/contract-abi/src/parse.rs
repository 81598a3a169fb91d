//! Solidity type-string parsing

use crate::types::ParamType;
use crate::AbiError;

/// Parse a canonical or shorthand type string, e.g. `uint`, `bytes32[]`,
/// `(address,(uint8,bytes))[2]`
pub fn parse_param_type(s: &str) -> Result<ParamType, AbiError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AbiError::InvalidType("empty type".to_string()));
    }

    // The last `[...]` suffix is the outermost array dimension
    if let Some(body) = s.strip_suffix(']') {
        let open = body
            .rfind('[')
            .ok_or_else(|| AbiError::InvalidType(format!("unbalanced brackets: {}", s)))?;
        let inner = parse_param_type(&body[..open])?;
        let size = &body[open + 1..];
        if size.is_empty() {
            return Ok(ParamType::Array(Box::new(inner)));
        }
        let size = parse_size(size, s)?;
        if size == 0 {
            return Err(AbiError::InvalidType(format!("zero-length array: {}", s)));
        }
        return Ok(ParamType::FixedArray(Box::new(inner), size));
    }

    if let Some(rest) = s.strip_prefix('(') {
        let body = rest
            .strip_suffix(')')
            .ok_or_else(|| AbiError::InvalidType(format!("unbalanced parentheses: {}", s)))?;
        let members = split_top_level(body)?
            .into_iter()
            .map(parse_param_type)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ParamType::Tuple(members));
    }

    parse_elementary(s)
}

/// Apply `[]` / `[n]` suffixes (left to right) to a base type
pub(crate) fn apply_array_suffix(base: ParamType, suffix: &str) -> Result<ParamType, AbiError> {
    let mut result = base;
    let mut rest = suffix;
    while !rest.is_empty() {
        let body = rest
            .strip_prefix('[')
            .ok_or_else(|| AbiError::InvalidType(format!("invalid array suffix: {}", suffix)))?;
        let close = body
            .find(']')
            .ok_or_else(|| AbiError::InvalidType(format!("invalid array suffix: {}", suffix)))?;
        let size = &body[..close];
        result = if size.is_empty() {
            ParamType::Array(Box::new(result))
        } else {
            let n = parse_size(size, suffix)?;
            if n == 0 {
                return Err(AbiError::InvalidType(format!("zero-length array: {}", suffix)));
            }
            ParamType::FixedArray(Box::new(result), n)
        };
        rest = &body[close + 1..];
    }
    Ok(result)
}

fn parse_elementary(s: &str) -> Result<ParamType, AbiError> {
    match s {
        "address" => return Ok(ParamType::Address),
        "bool" => return Ok(ParamType::Bool),
        "string" => return Ok(ParamType::String),
        "bytes" => return Ok(ParamType::Bytes),
        _ => {}
    }

    // uint<N>
    if let Some(rest) = s.strip_prefix("uint") {
        return Ok(ParamType::Uint(parse_int_bits(rest, s)?));
    }

    // int<N>
    if let Some(rest) = s.strip_prefix("int") {
        return Ok(ParamType::Int(parse_int_bits(rest, s)?));
    }

    // bytes<N>
    if let Some(rest) = s.strip_prefix("bytes") {
        let size = parse_size(rest, s)?;
        if !(1..=32).contains(&size) {
            return Err(AbiError::InvalidType(format!("invalid bytes size: {}", s)));
        }
        return Ok(ParamType::FixedBytes(size));
    }

    if s.starts_with("fixed") || s.starts_with("ufixed") || s == "function" {
        return Err(AbiError::InvalidType(format!("unsupported type: {}", s)));
    }

    Err(AbiError::InvalidType(format!("unknown type: {}", s)))
}

fn parse_int_bits(rest: &str, full: &str) -> Result<usize, AbiError> {
    if rest.is_empty() {
        return Ok(256);
    }
    let bits = parse_size(rest, full)?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(AbiError::InvalidType(format!("invalid integer size: {}", full)));
    }
    Ok(bits)
}

fn parse_size(digits: &str, full: &str) -> Result<usize, AbiError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AbiError::InvalidType(format!("invalid size in {}", full)));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(AbiError::InvalidType(format!("leading zero in size of {}", full)));
    }
    digits
        .parse()
        .map_err(|_| AbiError::InvalidType(format!("invalid size in {}", full)))
}

/// Split a tuple body at commas that are not nested in parentheses
fn split_top_level(body: &str) -> Result<Vec<&str>, AbiError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| AbiError::InvalidType(format!("unbalanced parentheses: ({})", body)))?;
            }
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(AbiError::InvalidType(format!("unbalanced parentheses: ({})", body)));
    }
    parts.push(&body[start..]);
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(AbiError::InvalidType(format!("empty tuple member: ({})", body)));
    }
    Ok(parts)
}
