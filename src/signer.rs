/// ECDSA over the NIST curves
pub mod ecdsa_signer;
/// Ed25519 signer
#[cfg(feature = "signer-ed25519")]
pub mod ed25519_signer;
/// ECDSA low-S normalization
pub mod low_s;

use std::fmt;

use async_trait::async_trait;

use crate::{
    alg::{Alg, Genus},
    b64::B64,
    error::{Error, Result},
    key::Key,
};

/// Trait for cryptographic signing operations.
///
/// Implementations sign the exact bytes handed to them. For ECDSA the
/// signature is produced over the digest of `data` with the alg's hash and
/// is returned in low-S form.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Algorithm of the signatures this signer produces.
    fn alg(&self) -> Alg;

    /// Signs the provided data.
    ///
    /// # Arguments
    ///
    /// * `data` - The data to sign.
    ///
    /// # Returns
    ///
    /// The fixed width signature for [`Signer::alg`].
    async fn sign(&self, data: &[u8]) -> Result<B64>;
}

fn not_compiled(alg: Alg) -> Error {
    if alg.is_sig() {
        Error::UnsupportedAlgorithm(format!("{alg} support is not enabled"))
    } else {
        Error::unsupported(alg, "signing keys")
    }
}

fn check_size(alg: Alg, what: &str, got: usize, want: usize) -> Result<()> {
    if got != want {
        return Err(Error::MalformedKey(format!(
            "{alg} {what} must be {want} bytes, got {got}"
        )));
    }
    Ok(())
}

/// Native private key for every compiled-in signature algorithm.
pub enum SigningKey {
    #[cfg(feature = "signer-es224")]
    Es224(ecdsa_signer::es224::SigningKey),
    Es256(ecdsa_signer::es256::SigningKey),
    #[cfg(feature = "signer-es384")]
    Es384(ecdsa_signer::es384::SigningKey),
    #[cfg(feature = "signer-es512")]
    Es512(ecdsa_signer::es512::SigningKey),
    #[cfg(feature = "signer-ed25519")]
    Ed25519(ed25519_signer::SigningKey),
}

/// Native public key for every compiled-in signature algorithm.
pub enum VerifyingKey {
    #[cfg(feature = "signer-es224")]
    Es224(ecdsa_signer::es224::VerifyingKey),
    Es256(ecdsa_signer::es256::VerifyingKey),
    #[cfg(feature = "signer-es384")]
    Es384(ecdsa_signer::es384::VerifyingKey),
    #[cfg(feature = "signer-es512")]
    Es512(ecdsa_signer::es512::VerifyingKey),
    #[cfg(feature = "signer-ed25519")]
    Ed25519(ed25519_signer::VerifyingKey),
}

impl SigningKey {
    /// Generates a fresh random key.
    pub fn generate(alg: Alg) -> Result<Self> {
        log::debug!("Generating {alg} signing key");
        match alg {
            #[cfg(feature = "signer-es224")]
            Alg::Es224 => Ok(SigningKey::Es224(ecdsa_signer::es224::generate())),
            Alg::Es256 => Ok(SigningKey::Es256(ecdsa_signer::es256::generate())),
            #[cfg(feature = "signer-es384")]
            Alg::Es384 => Ok(SigningKey::Es384(ecdsa_signer::es384::generate())),
            #[cfg(feature = "signer-es512")]
            Alg::Es512 => Ok(SigningKey::Es512(ecdsa_signer::es512::generate())),
            #[cfg(feature = "signer-ed25519")]
            Alg::Ed25519 => Ok(SigningKey::Ed25519(ed25519_signer::generate())),
            other => Err(not_compiled(other)),
        }
    }

    /// Imports a private key from its raw `d` bytes.
    ///
    /// # Arguments
    ///
    /// * `alg` - Signature algorithm of the key.
    /// * `d` - Big-endian private scalar (ECDSA) or seed (Ed25519), exactly
    ///   `alg.d_size()` bytes.
    pub fn from_bytes(alg: Alg, d: &[u8]) -> Result<Self> {
        if alg.is_sig() {
            check_size(alg, "private key", d.len(), alg.d_size()?)?;
        }
        match alg {
            #[cfg(feature = "signer-es224")]
            Alg::Es224 => ecdsa_signer::es224::signing_key(d).map(SigningKey::Es224),
            Alg::Es256 => ecdsa_signer::es256::signing_key(d).map(SigningKey::Es256),
            #[cfg(feature = "signer-es384")]
            Alg::Es384 => ecdsa_signer::es384::signing_key(d).map(SigningKey::Es384),
            #[cfg(feature = "signer-es512")]
            Alg::Es512 => ecdsa_signer::es512::signing_key(d).map(SigningKey::Es512),
            #[cfg(feature = "signer-ed25519")]
            Alg::Ed25519 => ed25519_signer::signing_key(d).map(SigningKey::Ed25519),
            other => Err(not_compiled(other)),
        }
    }

    /// Converts a coze key holding `d` into a native signing key.
    pub fn from_key(key: &Key) -> Result<Self> {
        let alg = key.require_alg()?;
        let d = key
            .d
            .as_ref()
            .ok_or_else(|| Error::MalformedKey("key has no private component 'd'".into()))?;
        Self::from_bytes(alg, d)
    }

    /// Algorithm of the key.
    pub fn alg(&self) -> Alg {
        match self {
            #[cfg(feature = "signer-es224")]
            SigningKey::Es224(_) => Alg::Es224,
            SigningKey::Es256(_) => Alg::Es256,
            #[cfg(feature = "signer-es384")]
            SigningKey::Es384(_) => Alg::Es384,
            #[cfg(feature = "signer-es512")]
            SigningKey::Es512(_) => Alg::Es512,
            #[cfg(feature = "signer-ed25519")]
            SigningKey::Ed25519(_) => Alg::Ed25519,
        }
    }

    /// Raw private component, `d`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            #[cfg(feature = "signer-es224")]
            SigningKey::Es224(k) => ecdsa_signer::es224::d(k),
            SigningKey::Es256(k) => ecdsa_signer::es256::d(k),
            #[cfg(feature = "signer-es384")]
            SigningKey::Es384(k) => ecdsa_signer::es384::d(k),
            #[cfg(feature = "signer-es512")]
            SigningKey::Es512(k) => ecdsa_signer::es512::d(k),
            #[cfg(feature = "signer-ed25519")]
            SigningKey::Ed25519(k) => ed25519_signer::d(k),
        }
    }

    /// Public half of the key pair.
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            #[cfg(feature = "signer-es224")]
            SigningKey::Es224(k) => VerifyingKey::Es224(ecdsa_signer::es224::public(k)),
            SigningKey::Es256(k) => VerifyingKey::Es256(ecdsa_signer::es256::public(k)),
            #[cfg(feature = "signer-es384")]
            SigningKey::Es384(k) => VerifyingKey::Es384(ecdsa_signer::es384::public(k)),
            #[cfg(feature = "signer-es512")]
            SigningKey::Es512(k) => VerifyingKey::Es512(ecdsa_signer::es512::public(k)),
            #[cfg(feature = "signer-ed25519")]
            SigningKey::Ed25519(k) => VerifyingKey::Ed25519(ed25519_signer::public(k)),
        }
    }

    /// Signs `msg` synchronously. ECDSA output is normalized to low-S.
    pub fn sign_bytes(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let sig = match self {
            #[cfg(feature = "signer-es224")]
            SigningKey::Es224(k) => ecdsa_signer::es224::sign(k, msg)?,
            SigningKey::Es256(k) => ecdsa_signer::es256::sign(k, msg)?,
            #[cfg(feature = "signer-es384")]
            SigningKey::Es384(k) => ecdsa_signer::es384::sign(k, msg)?,
            #[cfg(feature = "signer-es512")]
            SigningKey::Es512(k) => ecdsa_signer::es512::sign(k, msg)?,
            #[cfg(feature = "signer-ed25519")]
            SigningKey::Ed25519(k) => ed25519_signer::sign(k, msg)?,
        };
        let alg = self.alg();
        match alg.genus() {
            Genus::Ecdsa => low_s::to_low_s(alg, &sig),
            _ => Ok(sig),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("alg", &format_args!("{}", self.alg()))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for SigningKey {
    fn alg(&self) -> Alg {
        SigningKey::alg(self)
    }

    async fn sign(&self, data: &[u8]) -> Result<B64> {
        log::trace!("Signing {} bytes with {} key", data.len(), self.alg());
        self.sign_bytes(data).map(B64::new)
    }
}

impl VerifyingKey {
    /// Imports a public key from its raw `x` bytes.
    ///
    /// # Arguments
    ///
    /// * `alg` - Signature algorithm of the key.
    /// * `x` - `X || Y` for ECDSA or the 32-byte Ed25519 public key.
    pub fn from_bytes(alg: Alg, x: &[u8]) -> Result<Self> {
        if alg.is_sig() {
            check_size(alg, "public key", x.len(), alg.x_size()?)?;
        }
        match alg {
            #[cfg(feature = "signer-es224")]
            Alg::Es224 => ecdsa_signer::es224::verifying_key(x).map(VerifyingKey::Es224),
            Alg::Es256 => ecdsa_signer::es256::verifying_key(x).map(VerifyingKey::Es256),
            #[cfg(feature = "signer-es384")]
            Alg::Es384 => ecdsa_signer::es384::verifying_key(x).map(VerifyingKey::Es384),
            #[cfg(feature = "signer-es512")]
            Alg::Es512 => ecdsa_signer::es512::verifying_key(x).map(VerifyingKey::Es512),
            #[cfg(feature = "signer-ed25519")]
            Alg::Ed25519 => ed25519_signer::verifying_key(x).map(VerifyingKey::Ed25519),
            other => Err(not_compiled(other)),
        }
    }

    /// Converts the public part of a coze key into a native verifying key.
    pub fn from_key(key: &Key) -> Result<Self> {
        let alg = key.require_alg()?;
        let x = key
            .x
            .as_ref()
            .ok_or_else(|| Error::MalformedKey("key has no public component 'x'".into()))?;
        Self::from_bytes(alg, x)
    }

    /// Algorithm of the key.
    pub fn alg(&self) -> Alg {
        match self {
            #[cfg(feature = "signer-es224")]
            VerifyingKey::Es224(_) => Alg::Es224,
            VerifyingKey::Es256(_) => Alg::Es256,
            #[cfg(feature = "signer-es384")]
            VerifyingKey::Es384(_) => Alg::Es384,
            #[cfg(feature = "signer-es512")]
            VerifyingKey::Es512(_) => Alg::Es512,
            #[cfg(feature = "signer-ed25519")]
            VerifyingKey::Ed25519(_) => Alg::Ed25519,
        }
    }

    /// Raw public component, `x`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            #[cfg(feature = "signer-es224")]
            VerifyingKey::Es224(k) => ecdsa_signer::es224::x(k),
            VerifyingKey::Es256(k) => ecdsa_signer::es256::x(k),
            #[cfg(feature = "signer-es384")]
            VerifyingKey::Es384(k) => ecdsa_signer::es384::x(k),
            #[cfg(feature = "signer-es512")]
            VerifyingKey::Es512(k) => ecdsa_signer::es512::x(k),
            #[cfg(feature = "signer-ed25519")]
            VerifyingKey::Ed25519(k) => ed25519_signer::x(k),
        }
    }

    /// Verifies `sig` over `msg`.
    ///
    /// Signatures of the wrong length and high-S ECDSA signatures are
    /// rejected before the primitive is consulted.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        let alg = self.alg();
        if alg.sig_size().map_or(true, |size| size != sig.len()) {
            log::debug!("Rejecting {alg} signature of {} bytes", sig.len());
            return false;
        }
        if alg.genus() == Genus::Ecdsa && !matches!(low_s::is_low_s(alg, sig), Ok(true)) {
            log::debug!("Rejecting high-S {alg} signature");
            return false;
        }
        match self {
            #[cfg(feature = "signer-es224")]
            VerifyingKey::Es224(k) => ecdsa_signer::es224::verify(k, msg, sig),
            VerifyingKey::Es256(k) => ecdsa_signer::es256::verify(k, msg, sig),
            #[cfg(feature = "signer-es384")]
            VerifyingKey::Es384(k) => ecdsa_signer::es384::verify(k, msg, sig),
            #[cfg(feature = "signer-es512")]
            VerifyingKey::Es512(k) => ecdsa_signer::es512::verify(k, msg, sig),
            #[cfg(feature = "signer-ed25519")]
            VerifyingKey::Ed25519(k) => ed25519_signer::verify(k, msg, sig),
        }
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("alg", &format_args!("{}", self.alg()))
            .field("x", &B64::new(self.to_bytes()))
            .finish()
    }
}

/// Either half of a native key pair, as selected from a coze key.
#[derive(Debug)]
pub enum NativeKey {
    Signing(SigningKey),
    Verifying(VerifyingKey),
}

impl NativeKey {
    /// Converts a coze key. Keys holding `d` become signing keys unless
    /// `public_only` is set.
    pub fn from_key(key: &Key, public_only: bool) -> Result<Self> {
        if key.d.is_some() && !public_only {
            SigningKey::from_key(key).map(NativeKey::Signing)
        } else {
            VerifyingKey::from_key(key).map(NativeKey::Verifying)
        }
    }

    /// Algorithm of the key.
    pub fn alg(&self) -> Alg {
        match self {
            NativeKey::Signing(k) => k.alg(),
            NativeKey::Verifying(k) => k.alg(),
        }
    }

    /// The verifying key, derived when this is a signing key.
    pub fn verifying_key(self) -> VerifyingKey {
        match self {
            NativeKey::Signing(k) => k.verifying_key(),
            NativeKey::Verifying(k) => k,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::b64;

    const X: &str =
        "2nTOaFVm2QLxmUO_SjgyscVHBtvHEfo2rq65MvgNRjORojq39Haq9rXNxvXxwba_Xj0F5vZibJR3isBdOWbo5g";
    const D: &str = "bNstg4_H3m3SlROufwRSEgibLrBuRq9114OvdapcpVA";
    const PAY: &str = r#"{"alg":"ES256","iat":1623132000,"msg":"Coze Rocks","tmb":"cLj8vsYtMBwYkzoFVZHBZo6SNL8wSdCIjCKAwXNuhOk","typ":"cyphr.me/msg"}"#;
    const LOW: &str =
        "4c1q07TQ8A0nrWVd7bLfE8V5_Fcvo1kGP6NCl_8J7vpPS_ejHqrc9VthoZsB3hAnFAXZgIgWdQwJfKdI4V3Gdg";
    const HIGH: &str =
        "4c1q07TQ8A0nrWVd7bLfE8V5_Fcvo1kGP6NCl_8J7vqwtAhb4VUjC6SeXmT-Ie_YqOEhLR8BKXjqPSN6GwVe2w";

    fn golden() -> SigningKey {
        SigningKey::from_bytes(Alg::Es256, &b64::decode(D).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn golden_signature_is_low_s() {
        let _ = env_logger::builder().is_test(true).try_init();
        let sig = Signer::sign(&golden(), PAY.as_bytes()).await.unwrap();
        assert_eq!(sig.to_string(), LOW);
    }

    #[test]
    fn verify_rejects_high_s() {
        let vk = VerifyingKey::from_bytes(Alg::Es256, &b64::decode(X).unwrap()).unwrap();
        assert!(vk.verify(PAY.as_bytes(), &b64::decode(LOW).unwrap()));
        assert!(!vk.verify(PAY.as_bytes(), &b64::decode(HIGH).unwrap()));
    }

    #[test]
    fn verify_rejects_tampering() {
        let vk = golden().verifying_key();
        let mut sig = b64::decode(LOW).unwrap();
        assert!(!vk.verify(b"Coze Rocks", &sig));
        sig[0] ^= 1;
        assert!(!vk.verify(PAY.as_bytes(), &sig));
        assert!(!vk.verify(PAY.as_bytes(), &sig[..32]));
    }

    #[tokio::test]
    async fn round_trip_every_alg() {
        let _ = env_logger::builder().is_test(true).try_init();
        for alg in Alg::signature_algs() {
            let sk = match SigningKey::generate(alg) {
                Ok(sk) => sk,
                Err(Error::UnsupportedAlgorithm(_)) => continue,
                Err(e) => panic!("{alg}: {e}"),
            };
            assert_eq!(sk.to_bytes().len(), alg.d_size().unwrap());

            let vk = sk.verifying_key();
            assert_eq!(vk.to_bytes().len(), alg.x_size().unwrap());

            let sig = Signer::sign(&sk, b"Coze Rocks").await.unwrap();
            assert_eq!(sig.len(), alg.sig_size().unwrap(), "{alg}");
            assert!(vk.verify(b"Coze Rocks", &sig), "{alg}");
            assert!(!vk.verify(b"Coze Rockz", &sig), "{alg}");

            // re-import from raw parts
            let again = SigningKey::from_bytes(alg, &sk.to_bytes()).unwrap();
            assert_eq!(again.verifying_key().to_bytes(), vk.to_bytes());
            if alg.genus() == Genus::Ecdsa {
                assert!(low_s::is_low_s(alg, &sig).unwrap());
            }
        }
    }

    #[test]
    fn hash_algs_have_no_keys() {
        assert!(matches!(
            SigningKey::generate(Alg::Sha256),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            VerifyingKey::from_bytes(Alg::Sha512, &[0u8; 64]),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn wrong_sized_parts_are_malformed() {
        assert!(matches!(
            SigningKey::from_bytes(Alg::Es256, &[1u8; 31]),
            Err(Error::MalformedKey(_))
        ));
        assert!(matches!(
            VerifyingKey::from_bytes(Alg::Es256, &[1u8; 65]),
            Err(Error::MalformedKey(_))
        ));
    }

    #[test]
    fn debug_hides_private_key() {
        let out = format!("{:?}", golden());
        assert_eq!(out, "SigningKey { alg: ES256, .. }");
        assert!(!out.contains(D));
        let out = format!("{:?}", golden().verifying_key());
        assert!(out.starts_with("VerifyingKey { alg: ES256, x: "), "{out}");
    }

    #[cfg(feature = "signer-es512")]
    #[tokio::test]
    async fn es512_key_pair() {
        let sk = SigningKey::generate(Alg::Es512).unwrap();
        let vk = sk.verifying_key();
        assert_eq!(vk.alg(), Alg::Es512);
        assert_eq!(vk.to_bytes().len(), 132);

        let sig = Signer::sign(&sk, b"Coze Rocks").await.unwrap();
        assert_eq!(sig.len(), 132);
        assert!(low_s::is_low_s(Alg::Es512, &sig).unwrap());
        assert!(vk.verify(b"Coze Rocks", &sig));

        let imported = VerifyingKey::from_bytes(Alg::Es512, &vk.to_bytes()).unwrap();
        assert!(imported.verify(b"Coze Rocks", &sig));
    }
}
