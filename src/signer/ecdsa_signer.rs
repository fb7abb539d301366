//! ECDSA over the NIST prime curves.
//!
//! Each curve gets the same set of functions, generated by `ecdsa_curve!`.
//! Signatures are fixed width `R || S` and messages are hashed with the
//! curve's paired hash (RFC 6979 deterministic nonces). Low-S handling lives
//! in [`super::low_s`].

use crate::error::Error;

fn primitive(e: impl std::fmt::Display) -> Error {
    Error::PrimitiveFailure(e.to_string())
}

macro_rules! ecdsa_curve {
    ($module:ident, $krate:ident) => {
        pub mod $module {
            use p256::ecdsa::signature::{Signer as _, Verifier as _};
            use rand::rngs::OsRng;

            pub use $krate::ecdsa::{Signature, SigningKey, VerifyingKey};

            use super::primitive;
            use crate::error::Result;

            /// Random key from the OS RNG.
            pub fn generate() -> SigningKey {
                SigningKey::random(&mut OsRng)
            }

            /// Imports a signing key from its big-endian private scalar.
            pub fn signing_key(d: &[u8]) -> Result<SigningKey> {
                SigningKey::from_slice(d).map_err(primitive)
            }

            /// Imports a verifying key from the concatenated coordinates `X || Y`.
            pub fn verifying_key(x: &[u8]) -> Result<VerifyingKey> {
                let mut sec1 = Vec::with_capacity(x.len() + 1);
                sec1.push(0x04);
                sec1.extend_from_slice(x);
                VerifyingKey::from_sec1_bytes(&sec1).map_err(primitive)
            }

            /// Public half of `key`.
            pub fn public(key: &SigningKey) -> VerifyingKey {
                VerifyingKey::from(key)
            }

            /// `X || Y`, without the SEC1 tag byte.
            pub fn x(key: &VerifyingKey) -> Vec<u8> {
                key.to_encoded_point(false).as_bytes()[1..].to_vec()
            }

            /// Big-endian private scalar, fixed width.
            pub fn d(key: &SigningKey) -> Vec<u8> {
                key.to_bytes().to_vec()
            }

            /// Signs `msg` as `R || S`. The output is not yet low-S normalized.
            pub fn sign(key: &SigningKey, msg: &[u8]) -> Result<Vec<u8>> {
                let sig: Signature = key.try_sign(msg).map_err(primitive)?;
                Ok(sig.to_bytes().to_vec())
            }

            /// False for malformed signatures as well as wrong ones.
            pub fn verify(key: &VerifyingKey, msg: &[u8], sig: &[u8]) -> bool {
                match Signature::from_slice(sig) {
                    Ok(sig) => key.verify(msg, &sig).is_ok(),
                    Err(_) => false,
                }
            }
        }
    };
}

#[cfg(feature = "signer-es224")]
ecdsa_curve!(es224, p224);
ecdsa_curve!(es256, p256);
#[cfg(feature = "signer-es384")]
ecdsa_curve!(es384, p384);
#[cfg(feature = "signer-es512")]
ecdsa_curve!(es512, p521);
