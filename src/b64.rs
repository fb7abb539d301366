use std::{fmt, ops::Deref, str::FromStr};

use base64::{
    alphabet,
    engine::{
        general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD as B64UT},
        DecodePaddingMode,
    },
    Engine,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Lenient decoder: tolerates padding and stray trailing bits so that
/// non-canonical input is caught by the re-encode comparison instead of a
/// generic decode error.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes bytes as unpadded URL-safe base64 ("b64ut").
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    B64UT.encode(bytes)
}

/// Decodes b64ut and rejects any input that is not the canonical encoding of
/// the decoded bytes.
///
/// # Arguments
///
/// * `s` - Unpadded URL-safe base64 text.
///
/// # Returns
///
/// The decoded bytes, `Error::NonCanonicalEncoding` when `s` is a valid but
/// non-minimal encoding, or `Error::InvalidEncoding` when `s` is not base64.
pub fn decode(s: &str) -> Result<Vec<u8>> {
    let bytes = LENIENT.decode(s)?;
    if B64UT.encode(&bytes) != s {
        return Err(Error::NonCanonicalEncoding(s.to_owned()));
    }
    Ok(bytes)
}

/// Byte string that serializes as canonical b64ut.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct B64(Vec<u8>);

impl B64 {
    /// Wraps raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        B64(bytes)
    }

    /// The decoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Unwraps the decoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for B64 {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for B64 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for B64 {
    fn from(bytes: Vec<u8>) -> Self {
        B64(bytes)
    }
}

impl From<&[u8]> for B64 {
    fn from(bytes: &[u8]) -> Self {
        B64(bytes.to_vec())
    }
}

impl FromStr for B64 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode(s).map(B64)
    }
}

impl fmt::Display for B64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.0))
    }
}

impl fmt::Debug for B64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B64({self})")
    }
}

impl Serialize for B64 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for B64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_canonical_text() {
        let tmb = "cLj8vsYtMBwYkzoFVZHBZo6SNL8wSdCIjCKAwXNuhOk";
        let b: B64 = tmb.parse().unwrap();
        assert_eq!(b.len(), 32);
        assert_eq!(b.to_string(), tmb);
    }

    #[test]
    fn rejects_non_zero_trailing_bits() {
        // "hOk" and "hOl" decode to the same bytes, only "hOk" is canonical.
        let err = decode("cLj8vsYtMBwYkzoFVZHBZo6SNL8wSdCIjCKAwXNuhOl").unwrap_err();
        assert!(matches!(err, Error::NonCanonicalEncoding(_)), "{err:?}");

        // one byte: "AA" is canonical, "AB" carries junk in the low bits
        assert_eq!(decode("AA").unwrap(), vec![0]);
        assert!(matches!(
            decode("AB").unwrap_err(),
            Error::NonCanonicalEncoding(_)
        ));
    }

    #[test]
    fn rejects_padding() {
        assert!(matches!(
            decode("AA==").unwrap_err(),
            Error::NonCanonicalEncoding(_)
        ));
    }

    #[test]
    fn rejects_other_alphabets() {
        // '+' and '/' belong to the standard alphabet
        assert!(matches!(
            decode("ab+/").unwrap_err(),
            Error::InvalidEncoding(_)
        ));
    }

    #[test]
    fn serde_uses_b64ut() {
        let b = B64::new(vec![0xfb, 0xff]);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "\"-_8\"");
        let back: B64 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);

        assert!(serde_json::from_str::<B64>("\"-_9\"").is_err());
    }
}
