use crate::{IdError, IdResult};
use rand::rngs::OsRng;
use rand::RngCore;
use std::{fmt, str::FromStr};

const TOKEN_BYTES: usize = 32;

/// Opaque session token identifier.
///
/// 256 random bits, rendered as 64 lowercase hex characters. The `Debug` implementation only
/// shows a short prefix so that tokens do not leak into logs through `{:?}`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId([u8; TOKEN_BYTES]);

impl TokenId {
    /// Draws a fresh token id from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parses the 64-character hex form.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] for anything other than 64 lowercase hex characters.
    pub fn parse(input: &str) -> IdResult<Self> {
        let well_formed = input.len() == TOKEN_BYTES * 2
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(IdError::InvalidInput(
                "token must be 64 lowercase hex characters".into(),
            ));
        }

        let mut bytes = [0u8; TOKEN_BYTES];
        hex::decode_to_slice(input, &mut bytes)
            .map_err(|e| IdError::InvalidInput(format!("token is not hex: {e}")))?;
        Ok(Self(bytes))
    }

    /// First eight hex characters, for log lines.
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({}…)", self.prefix())
    }
}

impl FromStr for TokenId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TokenId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TokenId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TokenId::parse(&s).map_err(serde::de::Error::custom)
    }
}
