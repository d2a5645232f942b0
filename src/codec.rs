//! Reversible mapping between entry ids and short codes.
//!
//! Codes are Hashids produced by [`harsh`] from the store-assigned id, so two
//! entries can only share a code if they share an id. There is no
//! content-addressed hashing and therefore nothing to retry on collision.
//!
//! The salt must stay fixed for the lifetime of a store: codes already handed
//! out stop decoding once it changes.

use harsh::Harsh;
use thiserror::Error;

/// Characters a code may contain. All of them are safe in a URL path segment.
pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

/// Digits `harsh` hashes with: [`ALPHABET`] minus its 14 separators and 4 guards.
const HASH_BASE: i64 = 44;

/// Hash digits of the largest encodable id. `HASH_BASE^11 - 1` fits in a
/// `u64`, so no segment of a code within [`MAX_CODE_LENGTH`] can overflow
/// while `harsh` decodes it.
const MAX_HASH_DIGITS: u32 = 11;

/// Largest id that can be encoded.
pub const MAX_ID: i64 = HASH_BASE.pow(MAX_HASH_DIGITS) - 1;

/// Lottery character plus [`MAX_HASH_DIGITS`]. Longer input is rejected
/// before decoding.
pub const MAX_CODE_LENGTH: usize = MAX_HASH_DIGITS as usize + 1;

/// Upper bound accepted for the configured minimum length.
pub const MAX_MIN_LENGTH: usize = MAX_CODE_LENGTH;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid codec configuration: {0}")]
    InvalidConfig(String),
    #[error("id {0} cannot be encoded, ids must be between 1 and {max}", max = MAX_ID)]
    InvalidId(i64),
    #[error("invalid short code")]
    InvalidCode,
}

pub struct CodeCodec {
    harsh: Harsh,
    min_length: usize,
}

impl CodeCodec {
    pub fn new(salt: &str, min_length: usize) -> Result<Self, CodecError> {
        if salt.is_empty() {
            return Err(CodecError::InvalidConfig("salt must not be empty".to_string()));
        }
        if min_length == 0 || min_length > MAX_MIN_LENGTH {
            return Err(CodecError::InvalidConfig(format!(
                "minimum length must be between 1 and {MAX_MIN_LENGTH}, got {min_length}"
            )));
        }

        let harsh = Harsh::builder()
            .salt(salt.as_bytes())
            .alphabet(ALPHABET.as_bytes())
            .length(min_length)
            .build()
            .map_err(|err| CodecError::InvalidConfig(format!("{err}")))?;

        Ok(Self { harsh, min_length })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Encode an id in `1..=MAX_ID` into its short code.
    pub fn encode(&self, id: i64) -> Result<String, CodecError> {
        if id <= 0 || id > MAX_ID {
            return Err(CodecError::InvalidId(id));
        }
        Ok(self.harsh.encode(&[id as u64]))
    }

    /// Decode a short code back into the id it was produced from.
    ///
    /// Any input that `encode` could not have produced under this salt and
    /// minimum length is reported as [`CodecError::InvalidCode`]; this never
    /// panics on arbitrary input.
    pub fn decode(&self, code: &str) -> Result<i64, CodecError> {
        if code.len() < self.min_length
            || code.len() > MAX_CODE_LENGTH
            || !code.chars().all(|c| ALPHABET.contains(c))
        {
            return Err(CodecError::InvalidCode);
        }

        let values = self
            .harsh
            .decode(code)
            .map_err(|_| CodecError::InvalidCode)?;

        let id = match values.as_slice() {
            [value] if *value > 0 && *value <= MAX_ID as u64 => *value as i64,
            _ => return Err(CodecError::InvalidCode),
        };

        // Only the canonical spelling of an id is accepted.
        if self.encode(id)? != code {
            return Err(CodecError::InvalidCode);
        }

        Ok(id)
    }
}

impl std::fmt::Debug for CodeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeCodec")
            .field("min_length", &self.min_length)
            .finish_non_exhaustive()
    }
}
