//! Algorithm-tagged binary strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{base85, CryptoError};

/// An algorithm-tagged value of the form `PREFIX:DATA`.
///
/// The prefix names the algorithm in capital letters, digits, and dashes
/// (at most 16 characters); the data is base85 text. Every key, hash, and
/// signature the server stores or transmits is carried in this form, e.g.
/// `ED25519:p;XXU0XF#UO^}vKbC-wS(#5W6=OEIFmR2z`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CryptoString {
    prefix: String,
    data: String,
}

impl CryptoString {
    /// Build a tagged string from an algorithm prefix and raw bytes.
    pub fn new(prefix: &str, raw: &[u8]) -> Result<Self, CryptoError> {
        if !valid_prefix(prefix) || raw.is_empty() {
            return Err(CryptoError::BadFormat);
        }
        Ok(Self {
            prefix: prefix.to_string(),
            data: base85::encode(raw),
        })
    }

    /// The algorithm tag.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The encoded payload, without the prefix.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Decode the payload back into raw bytes.
    pub fn raw_data(&self) -> Result<Vec<u8>, CryptoError> {
        base85::decode(&self.data).ok_or(CryptoError::DecodeError)
    }

    /// Both parts non-empty and the payload decodable.
    pub fn is_valid(&self) -> bool {
        valid_prefix(&self.prefix)
            && !self.data.is_empty()
            && base85::decode(&self.data).is_some()
    }
}

fn valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.len() <= 16
        && prefix
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'-')
}

impl FromStr for CryptoString {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split into exactly two parts at the first colon.
        let (prefix, data) = s.split_once(':').ok_or(CryptoError::BadFormat)?;
        if !valid_prefix(prefix) || data.is_empty() {
            return Err(CryptoError::BadFormat);
        }
        if base85::decode(data).is_none() {
            return Err(CryptoError::DecodeError);
        }
        Ok(Self {
            prefix: prefix.to_string(),
            data: data.to_string(),
        })
    }
}

impl fmt::Display for CryptoString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.data)
    }
}

impl TryFrom<String> for CryptoString {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CryptoString> for String {
    fn from(value: CryptoString) -> Self {
        value.to_string()
    }
}
