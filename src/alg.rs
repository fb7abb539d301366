use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest;
use strum::IntoEnumIterator;

use crate::{
    b64::B64,
    error::{Error, Result},
};

/// Signature and hash algorithms understood by Coze.
///
/// Serialized as its identifier, e.g. `"ES256"` or `"SHA-256"`.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Alg {
    /// ECDSA over P-224 with SHA-224
    #[strum(serialize = "ES224")]
    Es224,
    /// ECDSA over P-256 with SHA-256
    #[strum(serialize = "ES256")]
    Es256,
    /// ECDSA over P-384 with SHA-384
    #[strum(serialize = "ES384")]
    Es384,
    /// ECDSA over P-521 with SHA-512
    #[strum(serialize = "ES512")]
    Es512,
    /// Pure EdDSA over Curve25519
    #[strum(serialize = "Ed25519")]
    Ed25519,
    /// SHA-224 digest
    #[strum(serialize = "SHA-224")]
    Sha224,
    /// SHA-256 digest
    #[strum(serialize = "SHA-256")]
    Sha256,
    /// SHA-384 digest
    #[strum(serialize = "SHA-384")]
    Sha384,
    /// SHA-512 digest
    #[strum(serialize = "SHA-512")]
    Sha512,
    /// SHA3-224 digest
    #[strum(serialize = "SHA3-224")]
    Sha3_224,
    /// SHA3-256 digest
    #[strum(serialize = "SHA3-256")]
    Sha3_256,
    /// SHA3-384 digest
    #[strum(serialize = "SHA3-384")]
    Sha3_384,
    /// SHA3-512 digest
    #[strum(serialize = "SHA3-512")]
    Sha3_512,
    /// SHAKE128 with a 32-byte output
    #[strum(serialize = "SHAKE128")]
    Shake128,
    /// SHAKE256 with a 64-byte output
    #[strum(serialize = "SHAKE256")]
    Shake256,
}

/// Algorithm genus, the concrete scheme an [`Alg`] belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, strum::Display)]
pub enum Genus {
    /// ES224 through ES512
    #[serde(rename = "ECDSA")]
    #[strum(serialize = "ECDSA")]
    Ecdsa,
    /// Ed25519
    #[serde(rename = "EdDSA")]
    #[strum(serialize = "EdDSA")]
    Eddsa,
    /// SHA-224 through SHA-512
    #[serde(rename = "SHA-2")]
    #[strum(serialize = "SHA-2")]
    Sha2,
    /// SHA3 digests and SHAKE
    #[serde(rename = "SHA-3")]
    #[strum(serialize = "SHA-3")]
    Sha3,
}

/// Broad family of a genus.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, strum::Display)]
pub enum Family {
    /// Elliptic curve signatures
    #[serde(rename = "EC")]
    #[strum(serialize = "EC")]
    Ec,
    /// Secure hash algorithms
    #[serde(rename = "SHA")]
    #[strum(serialize = "SHA")]
    Sha,
}

/// Intended use of an algorithm.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, strum::Display)]
pub enum Use {
    /// Signing and verification
    #[serde(rename = "sig")]
    #[strum(serialize = "sig")]
    Sig,
    /// Digests only
    #[serde(rename = "dig")]
    #[strum(serialize = "dig")]
    Dig,
}

/// Curve of a signature algorithm.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, strum::Display)]
pub enum Curve {
    #[serde(rename = "P-224")]
    #[strum(serialize = "P-224")]
    P224,
    #[serde(rename = "P-256")]
    #[strum(serialize = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    #[strum(serialize = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    #[strum(serialize = "P-521")]
    P521,
    #[serde(rename = "Curve25519")]
    #[strum(serialize = "Curve25519")]
    Curve25519,
}

/// Every parameter of an [`Alg`] in one record.
///
/// Signature-only fields are `None` (and omitted from JSON) for hash algorithms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Params {
    pub name: Alg,
    pub genus: Genus,
    pub family: Family,
    #[serde(rename = "use")]
    pub usage: Use,
    pub hash: Alg,
    pub hash_size: usize,
    pub hash_size_b64: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve: Option<Curve>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig_size_b64: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_size_b64: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_size_b64: Option<usize>,
}

/// Length of the unpadded base64 encoding of `n` bytes, `ceil(4n/3)`.
pub const fn b64_size(n: usize) -> usize {
    (4 * n + 2) / 3
}

impl Alg {
    /// The identifier string, e.g. `"ES256"`.
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Signature algorithms, in registry order.
    pub fn signature_algs() -> impl Iterator<Item = Alg> {
        Alg::iter().filter(|a| a.is_sig())
    }

    /// Scheme the algorithm belongs to.
    pub fn genus(self) -> Genus {
        match self {
            Alg::Es224 | Alg::Es256 | Alg::Es384 | Alg::Es512 => Genus::Ecdsa,
            Alg::Ed25519 => Genus::Eddsa,
            Alg::Sha224 | Alg::Sha256 | Alg::Sha384 | Alg::Sha512 => Genus::Sha2,
            Alg::Sha3_224
            | Alg::Sha3_256
            | Alg::Sha3_384
            | Alg::Sha3_512
            | Alg::Shake128
            | Alg::Shake256 => Genus::Sha3,
        }
    }

    /// `EC` for signature algorithms, `SHA` for hashes.
    pub fn family(self) -> Family {
        match self.genus() {
            Genus::Ecdsa | Genus::Eddsa => Family::Ec,
            Genus::Sha2 | Genus::Sha3 => Family::Sha,
        }
    }

    /// `sig` or `dig`.
    pub fn usage(self) -> Use {
        match self.family() {
            Family::Ec => Use::Sig,
            Family::Sha => Use::Dig,
        }
    }

    /// True for signature algorithms.
    pub fn is_sig(self) -> bool {
        self.usage() == Use::Sig
    }

    /// Hash algorithm used for digests (and ECDSA message hashing). Hash
    /// algorithms return themselves.
    pub fn hash(self) -> Alg {
        match self {
            Alg::Es224 => Alg::Sha224,
            Alg::Es256 => Alg::Sha256,
            Alg::Es384 => Alg::Sha384,
            Alg::Es512 | Alg::Ed25519 => Alg::Sha512,
            hash => hash,
        }
    }

    /// Digest size in bytes of [`Alg::hash`].
    pub fn hash_size(self) -> usize {
        match self {
            Alg::Es224 | Alg::Sha224 | Alg::Sha3_224 => 28,
            Alg::Es256 | Alg::Sha256 | Alg::Sha3_256 | Alg::Shake128 => 32,
            Alg::Es384 | Alg::Sha384 | Alg::Sha3_384 => 48,
            Alg::Es512 | Alg::Ed25519 | Alg::Sha512 | Alg::Sha3_512 | Alg::Shake256 => 64,
        }
    }

    /// Length of a b64ut encoded digest.
    pub fn hash_size_b64(self) -> usize {
        b64_size(self.hash_size())
    }

    /// Curve of a signature algorithm. Hash algorithms have none.
    pub fn curve(self) -> Result<Curve> {
        match self {
            Alg::Es224 => Ok(Curve::P224),
            Alg::Es256 => Ok(Curve::P256),
            Alg::Es384 => Ok(Curve::P384),
            Alg::Es512 => Ok(Curve::P521),
            Alg::Ed25519 => Ok(Curve::Curve25519),
            hash => Err(Error::unsupported(hash, "curve")),
        }
    }

    /// Signature size in bytes. ECDSA signatures are `R || S`, each half the size.
    pub fn sig_size(self) -> Result<usize> {
        match self {
            Alg::Es224 => Ok(56),
            Alg::Es256 | Alg::Ed25519 => Ok(64),
            Alg::Es384 => Ok(96),
            Alg::Es512 => Ok(132),
            hash => Err(Error::unsupported(hash, "signature size")),
        }
    }

    /// Length of a b64ut encoded signature.
    pub fn sig_size_b64(self) -> Result<usize> {
        self.sig_size().map(b64_size)
    }

    /// Public component size. For ECDSA this is both coordinates, `X || Y`.
    pub fn x_size(self) -> Result<usize> {
        match self {
            Alg::Ed25519 => Ok(32),
            Alg::Es224 | Alg::Es256 | Alg::Es384 | Alg::Es512 => self.sig_size(),
            hash => Err(Error::unsupported(hash, "public component")),
        }
    }

    /// Length of a b64ut encoded `x`.
    pub fn x_size_b64(self) -> Result<usize> {
        self.x_size().map(b64_size)
    }

    /// Private component size.
    pub fn d_size(self) -> Result<usize> {
        match self {
            Alg::Es224 | Alg::Es256 | Alg::Es384 | Alg::Es512 => Ok(self.sig_size()? / 2),
            Alg::Ed25519 => Ok(32),
            hash => Err(Error::unsupported(hash, "private component")),
        }
    }

    /// Length of a b64ut encoded `d`.
    pub fn d_size_b64(self) -> Result<usize> {
        self.d_size().map(b64_size)
    }

    /// Collects every parameter of the algorithm.
    pub fn params(self) -> Params {
        Params {
            name: self,
            genus: self.genus(),
            family: self.family(),
            usage: self.usage(),
            hash: self.hash(),
            hash_size: self.hash_size(),
            hash_size_b64: self.hash_size_b64(),
            curve: self.curve().ok(),
            sig_size: self.sig_size().ok(),
            sig_size_b64: self.sig_size_b64().ok(),
            x_size: self.x_size().ok(),
            x_size_b64: self.x_size_b64().ok(),
            d_size: self.d_size().ok(),
            d_size_b64: self.d_size_b64().ok(),
        }
    }
}

impl FromStr for Alg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Alg::iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_owned()))
    }
}

impl TryFrom<String> for Alg {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Digests `data` with the hash of `alg`.
///
/// Signature algorithms digest with their paired hash, so `ES256` yields a
/// SHA-256 digest.
pub fn digest(alg: Alg, data: &[u8]) -> B64 {
    let out = match alg {
        Alg::Es224 | Alg::Sha224 => sha2::Sha224::digest(data).to_vec(),
        Alg::Es256 | Alg::Sha256 => sha2::Sha256::digest(data).to_vec(),
        Alg::Es384 | Alg::Sha384 => sha2::Sha384::digest(data).to_vec(),
        Alg::Es512 | Alg::Ed25519 | Alg::Sha512 => sha2::Sha512::digest(data).to_vec(),
        Alg::Sha3_224 => sha3::Sha3_224::digest(data).to_vec(),
        Alg::Sha3_256 => sha3::Sha3_256::digest(data).to_vec(),
        Alg::Sha3_384 => sha3::Sha3_384::digest(data).to_vec(),
        Alg::Sha3_512 => sha3::Sha3_512::digest(data).to_vec(),
        Alg::Shake128 => shake::<sha3::Shake128>(data, alg.hash_size()),
        Alg::Shake256 => shake::<sha3::Shake256>(data, alg.hash_size()),
    };
    B64::new(out)
}

fn shake<X>(data: &[u8], size: usize) -> Vec<u8>
where
    X: Default + sha3::digest::Update + sha3::digest::ExtendableOutput,
{
    use sha3::digest::XofReader;

    let mut xof = X::default();
    xof.update(data);
    let mut out = vec![0u8; size];
    xof.finalize_xof().read(&mut out);
    out
}
