//! Ed25519 (RFC 8032, pure mode). The message is signed as-is, the alg's
//! hash only applies to coze digests.

use ed25519_dalek::{Signer as _, Verifier as _};
use rand::rngs::OsRng;

pub use ed25519_dalek::{Signature, SigningKey, VerifyingKey};

use crate::error::{Error, Result};

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        Error::MalformedKey(format!(
            "Ed25519 {what} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Random key from the OS RNG.
pub fn generate() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Imports a signing key from its 32-byte seed.
pub fn signing_key(d: &[u8]) -> Result<SigningKey> {
    Ok(SigningKey::from_bytes(&fixed::<32>(d, "private key")?))
}

/// Imports a 32-byte compressed public key.
pub fn verifying_key(x: &[u8]) -> Result<VerifyingKey> {
    VerifyingKey::from_bytes(&fixed::<32>(x, "public key")?)
        .map_err(|e| Error::PrimitiveFailure(e.to_string()))
}

pub fn public(key: &SigningKey) -> VerifyingKey {
    key.verifying_key()
}

pub fn x(key: &VerifyingKey) -> Vec<u8> {
    key.to_bytes().to_vec()
}

pub fn d(key: &SigningKey) -> Vec<u8> {
    key.to_bytes().to_vec()
}

/// Signs `msg` itself, without prehashing.
pub fn sign(key: &SigningKey, msg: &[u8]) -> Result<Vec<u8>> {
    let sig: Signature = key
        .try_sign(msg)
        .map_err(|e| Error::PrimitiveFailure(e.to_string()))?;
    Ok(sig.to_bytes().to_vec())
}

pub fn verify(key: &VerifyingKey, msg: &[u8], sig: &[u8]) -> bool {
    match Signature::from_slice(sig) {
        Ok(sig) => key.verify(msg, &sig).is_ok(),
        Err(_) => false,
    }
}
