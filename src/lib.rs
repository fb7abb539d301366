//! Coze: a compact JSON signing envelope.
//!
//! A message ("pay") is serialized in canonical JSON form, hashed and signed.
//! Together with the signature it forms a coze, `{"pay":{…},"sig":"…"}`, that
//! any implementation can verify byte for byte. Keys are identified by their
//! thumbprint (`tmb`), ECDSA signatures are always low-S, and all binary values
//! use canonical unpadded URL-safe base64.

/// Algorithm registry and digests
pub mod alg;

/// Canonical base64 (b64ut)
pub mod b64;

/// Canons and canonical JSON
pub mod canon;

/// Signing, verification and metadata of cozes
pub mod coze;

/// Error type
pub mod error;

/// Coze keys, thumbprints and revocation
pub mod key;

/// Payloads
pub mod pay;

/// Native keys and the `Signer` trait (ECDSA P-224/256/384/521, Ed25519)
pub mod signer;

pub use alg::{digest, Alg, Curve, Family, Genus, Params, Use};
pub use b64::B64;
pub use canon::{canon, canonical, canonical_bytes, canonical_hash, canonical_hash_b64, Canon};
pub use coze::{
    meta, sign_coze, sign_pay, sign_pay_raw, verify_array, verify_batch, verify_coze,
    verify_pay, Coze, FillMode, SignOptions, VerifiedArray,
};
pub use error::{Error, Result};
pub use key::{Key, Rvk};
pub use pay::Pay;
pub use signer::{NativeKey, Signer, SigningKey, VerifyingKey};
