use std::fmt;
use std::str::FromStr;

/// The 32-byte keyed-hash content identifier for a stored payload.
///
/// Wraps a fixed-size byte array the way `models::Id` wraps its own
/// fixed-size identifier: `Display`/`FromStr` round-trip through lowercase
/// hex, and `serde` goes through the same hex string rather than the raw
/// bytes, so a `Digest` embedded in a JSON snapshot reads as a familiar hex
/// string instead of an array of integers.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("digest must be exactly 32 bytes, got {0}")]
    WrongLength(usize),
    #[error("invalid hex digest: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Digest {
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DigestError> {
        let exact: [u8; 32] = bytes
            .try_into()
            .map_err(|_| DigestError::WrongLength(bytes.len()))?;
        Ok(Self(exact))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl serde::Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let s = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        Digest::from_str(s.as_ref()).map_err(|err| D::Error::custom(format!("invalid digest: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let d = Digest::new([7u8; 32]);
        let hex = d.to_string();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<Digest>().unwrap(), d);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Digest::from_slice(&[0u8; 31]),
            Err(DigestError::WrongLength(31))
        ));
    }
}
