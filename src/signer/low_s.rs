//! ECDSA low-S normalization.
//!
//! An ECDSA signature `(R, S)` and `(R, n - S)` both verify. Coze accepts only
//! the form with `S <= n/2` (floor): signing always emits it and verification
//! rejects the other one. The check works on exact big integers against the
//! group order of each curve.

use num_bigint::BigUint;
use once_cell::sync::Lazy;

use crate::{
    alg::{Alg, Curve},
    error::{Error, Result},
};

const P224_N: [u8; 28] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0x16, 0xa2, 0xe0, 0xb8, 0xf0, 0x3e, 0x13, 0xdd, 0x29, 0x45,
    0x5c, 0x5c, 0x2a, 0x3d,
];
const P256_N: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84,
    0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x51,
];
const P384_N: [u8; 48] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xc7, 0x63, 0x4d, 0x81, 0xf4, 0x37, 0x2d, 0xdf, 0x58, 0x1a, 0x0d, 0xb2,
    0x48, 0xb0, 0xa7, 0x7a, 0xec, 0xec, 0x19, 0x6a, 0xcc, 0xc5, 0x29, 0x73,
];
const P521_N: [u8; 66] = [
    0x01, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfa, 0x51, 0x86,
    0x87, 0x83, 0xbf, 0x2f, 0x96, 0x6b, 0x7f, 0xcc, 0x01, 0x48, 0xf7, 0x09,
    0xa5, 0xd0, 0x3b, 0xb5, 0xc9, 0xb8, 0x89, 0x9c, 0x47, 0xae, 0xbb, 0x6f,
    0xb7, 0x1e, 0x91, 0x38, 0x64, 0x09,
];

/// Group order `n` and `n / 2` of a curve.
pub struct Order {
    pub n: BigUint,
    pub half: BigUint,
}

impl Order {
    fn from_be_bytes(bytes: &[u8]) -> Self {
        let n = BigUint::from_bytes_be(bytes);
        let half = &n >> 1u32;
        Order { n, half }
    }
}

static P224: Lazy<Order> = Lazy::new(|| Order::from_be_bytes(&P224_N));
static P256: Lazy<Order> = Lazy::new(|| Order::from_be_bytes(&P256_N));
static P384: Lazy<Order> = Lazy::new(|| Order::from_be_bytes(&P384_N));
static P521: Lazy<Order> = Lazy::new(|| Order::from_be_bytes(&P521_N));

/// Group order of an ECDSA algorithm's curve.
pub fn order(alg: Alg) -> Result<&'static Order> {
    match alg.curve()? {
        Curve::P224 => Ok(&P224),
        Curve::P256 => Ok(&P256),
        Curve::P384 => Ok(&P384),
        Curve::P521 => Ok(&P521),
        Curve::Curve25519 => Err(Error::unsupported(alg, "low-S form")),
    }
}

/// Splits a fixed width `R || S` signature, checking its length.
fn split(alg: Alg, sig: &[u8]) -> Result<(&[u8], &[u8])> {
    let size = alg.sig_size()?;
    if sig.len() != size {
        return Err(Error::MalformedEnvelope(format!(
            "{alg} signature must be {size} bytes, got {}",
            sig.len()
        )));
    }
    Ok(sig.split_at(size / 2))
}

/// Reports whether `S <= n/2`.
pub fn is_low_s(alg: Alg, sig: &[u8]) -> Result<bool> {
    let order = order(alg)?;
    let (_, s) = split(alg, sig)?;
    Ok(BigUint::from_bytes_be(s) <= order.half)
}

/// Returns the low-S form of `sig`, replacing a high `S` with `n - S`.
///
/// `R` is kept as-is and `S` is re-encoded at the same fixed width. Low-S
/// signatures are returned unchanged.
pub fn to_low_s(alg: Alg, sig: &[u8]) -> Result<Vec<u8>> {
    let order = order(alg)?;
    let (r, s) = split(alg, sig)?;

    let s = BigUint::from_bytes_be(s);
    if s <= order.half {
        return Ok(sig.to_vec());
    }
    if s >= order.n {
        return Err(Error::PrimitiveFailure(format!(
            "{alg} signature S is not below the group order"
        )));
    }

    let low = (&order.n - s).to_bytes_be();
    let mut out = Vec::with_capacity(sig.len());
    out.extend_from_slice(r);
    out.resize(sig.len() - low.len(), 0);
    out.extend_from_slice(&low);
    Ok(out)
}
