//! Conversions between Rust values and tokens

use bytes::Bytes;
use primitive_types::{H256, U256};

use crate::convert::Address;
use crate::types::{I256, Token};
use crate::AbiError;

/// A Rust type with a single-token ABI representation
pub trait Tokenizable: Sized {
    /// Convert from a token
    fn from_token(token: Token) -> Result<Self, AbiError>;
    /// Convert into a token
    fn into_token(self) -> Token;
}

/// Output types of a function, built from its decoded tokens
pub trait Detokenize: Sized {
    /// Build from the decoded output list
    fn from_tokens(tokens: Vec<Token>) -> Result<Self, AbiError>;
}

/// Argument sets of a function
pub trait Tokenize {
    /// Flatten into the argument list
    fn into_tokens(self) -> Vec<Token>;
}

impl<T: Tokenizable> Detokenize for T {
    fn from_tokens(tokens: Vec<Token>) -> Result<Self, AbiError> {
        // a single output stands alone, several form a tuple
        let token = match <[Token; 1]>::try_from(tokens) {
            Ok([token]) => token,
            Err(tokens) => Token::Tuple(tokens),
        };
        T::from_token(token)
    }
}

impl<T: Tokenizable> Tokenize for T {
    fn into_tokens(self) -> Vec<Token> {
        match self.into_token() {
            Token::Tuple(tokens) => tokens,
            token => vec![token],
        }
    }
}

fn invalid(expected: &str, token: &Token) -> AbiError {
    AbiError::InvalidOutputType(format!("expected {}, got {:?}", expected, token))
}

impl Tokenizable for Token {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        Ok(token)
    }

    fn into_token(self) -> Token {
        self
    }
}

impl Tokenizable for Address {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::Address(a) => Ok(a),
            other => Err(invalid("address", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::Address(self)
    }
}

impl Tokenizable for U256 {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::Uint(v) => Ok(v),
            other => Err(invalid("uint", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::Uint(self)
    }
}

impl Tokenizable for I256 {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::Int(v) => Ok(v),
            other => Err(invalid("int", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::Int(self)
    }
}

impl Tokenizable for bool {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::Bool(b) => Ok(b),
            other => Err(invalid("bool", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::Bool(self)
    }
}

impl Tokenizable for String {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::String(s) => Ok(s),
            other => Err(invalid("string", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::String(self)
    }
}

impl Tokenizable for Bytes {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::Bytes(b) => Ok(Bytes::from(b)),
            other => Err(invalid("bytes", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::Bytes(self.to_vec())
    }
}

impl Tokenizable for H256 {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::FixedBytes(b) if b.len() == 32 => Ok(H256::from_slice(&b)),
            other => Err(invalid("bytes32", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::FixedBytes(self.as_bytes().to_vec())
    }
}

macro_rules! impl_uint_tokenizable {
    ($($ty:ty),+) => {
        $(
            impl Tokenizable for $ty {
                fn from_token(token: Token) -> Result<Self, AbiError> {
                    match token {
                        Token::Uint(v) if v <= U256::from(<$ty>::MAX) => Ok(v.as_u128() as $ty),
                        other => Err(invalid(stringify!($ty), &other)),
                    }
                }

                fn into_token(self) -> Token {
                    Token::Uint(U256::from(self))
                }
            }
        )+
    };
}

impl_uint_tokenizable!(u8, u16, u32, u64, u128);

impl<T: Tokenizable> Tokenizable for Vec<T> {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::Array(tokens) | Token::FixedArray(tokens) => {
                tokens.into_iter().map(T::from_token).collect()
            }
            other => Err(invalid("array", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::Array(self.into_iter().map(Tokenizable::into_token).collect())
    }
}

impl Tokenizable for () {
    fn from_token(token: Token) -> Result<Self, AbiError> {
        match token {
            Token::Tuple(tokens) if tokens.is_empty() => Ok(()),
            other => Err(invalid("no values", &other)),
        }
    }

    fn into_token(self) -> Token {
        Token::Tuple(Vec::new())
    }
}

fn next_token(tokens: &mut impl Iterator<Item = Token>) -> Result<Token, AbiError> {
    tokens
        .next()
        .ok_or_else(|| AbiError::InvalidOutputType("tuple is too short".to_string()))
}

macro_rules! impl_tuple_tokenizable {
    ($($len:literal => ($($idx:tt $ty:ident),+);)+) => {
        $(
            impl<$($ty: Tokenizable),+> Tokenizable for ($($ty,)+) {
                fn from_token(token: Token) -> Result<Self, AbiError> {
                    match token {
                        Token::Tuple(tokens) if tokens.len() == $len => {
                            let mut iter = tokens.into_iter();
                            Ok(($($ty::from_token(next_token(&mut iter)?)?,)+))
                        }
                        other => Err(invalid(concat!("tuple of ", $len), &other)),
                    }
                }

                fn into_token(self) -> Token {
                    Token::Tuple(vec![$(self.$idx.into_token()),+])
                }
            }
        )+
    };
}

impl_tuple_tokenizable! {
    1 => (0 A);
    2 => (0 A, 1 B);
    3 => (0 A, 1 B, 2 C);
    4 => (0 A, 1 B, 2 C, 3 D);
    5 => (0 A, 1 B, 2 C, 3 D, 4 E);
    6 => (0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
    7 => (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
    8 => (0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
}
