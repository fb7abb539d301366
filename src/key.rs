use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    alg::Alg,
    b64::B64,
    canon::{canonical_hash, Canon},
    coze::{sign_pay, Coze, SignOptions},
    error::{Error, Result},
    pay::{Pay, TYP_REVOKE},
    signer::{Signer, SigningKey, VerifyingKey},
};

/// Canon of a key thumbprint.
pub const TMB_CANON: [&str; 2] = ["alg", "x"];

/// Field order of a self-revoke pay.
const REVOKE_CANON: [&str; 6] = ["alg", "iat", "tmb", "typ", "rvk", "msg"];

const CORRECT_MSG: &[u8] = b"7AtyaCHO2BAG06z0W1tOQlZFWbhxGgqej4k9-HWP3DE";

/// Revocation marker, `rvk`.
///
/// Normally a Unix timestamp. Booleans and any other JSON value are kept
/// as-is so that foreign keys and messages round trip unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rvk {
    Time(i64),
    Flag(bool),
    Other(Value),
}

impl Rvk {
    /// True for a positive integer, `true`, or the string `"true"`.
    pub fn is_revoked(&self) -> bool {
        match self {
            Rvk::Time(t) => *t > 0,
            Rvk::Flag(flag) => *flag,
            Rvk::Other(Value::String(s)) => s == "true",
            Rvk::Other(Value::Number(n)) => n.as_u64().is_some_and(|n| n > 0),
            Rvk::Other(_) => false,
        }
    }
}

/// A coze key.
///
/// Keys are plain values. A key is a signing key when `d` is present, a
/// public key when only `x` is, and a bare reference when it only has a
/// `tmb`.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<Alg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmb: Option<B64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<B64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<B64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rvk: Option<Rvk>,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("alg", &self.alg)
            .field("iat", &self.iat)
            .field("kid", &self.kid)
            .field("tmb", &self.tmb)
            .field("x", &self.x)
            .field("d", &self.d.as_ref().map(|_| "<redacted>"))
            .field("rvk", &self.rvk)
            .finish()
    }
}

impl Key {
    /// Generates a new key for `alg` with `iat` set to now and `tmb` computed.
    ///
    /// # Arguments
    ///
    /// * `alg` - A signature algorithm.
    ///
    /// # Returns
    ///
    /// The new private key, or `Error::UnsupportedAlgorithm` for hash
    /// algorithms and algorithms that are not compiled in.
    pub fn new(alg: Alg) -> Result<Key> {
        let signing_key = SigningKey::generate(alg)?;
        let mut key = Key::from_signing_key(&signing_key)?;
        key.iat = Some(chrono::Utc::now().timestamp());
        log::debug!(
            "Created {alg} key {}",
            key.tmb.as_ref().map(B64::to_string).unwrap_or_default()
        );
        Ok(key)
    }

    /// Builds a private coze key from a native key. `tmb` is computed, `iat`
    /// is left unset.
    pub fn from_signing_key(signing_key: &SigningKey) -> Result<Key> {
        let key = Key {
            alg: Some(signing_key.alg()),
            x: Some(B64::new(signing_key.verifying_key().to_bytes())),
            d: Some(B64::new(signing_key.to_bytes())),
            ..Default::default()
        };
        key.with_thumbprint()
    }

    /// Builds a public coze key from a native key.
    pub fn from_verifying_key(verifying_key: &VerifyingKey) -> Result<Key> {
        let key = Key {
            alg: Some(verifying_key.alg()),
            x: Some(B64::new(verifying_key.to_bytes())),
            ..Default::default()
        };
        key.with_thumbprint()
    }

    pub(crate) fn require_alg(&self) -> Result<Alg> {
        self.alg
            .ok_or_else(|| Error::MalformedKey("key has no 'alg'".into()))
    }

    /// Computes the thumbprint: the digest of the canonical `{"alg","x"}`
    /// form using the alg's hash.
    pub fn thumbprint(&self) -> Result<B64> {
        let alg = self.require_alg()?;
        if !alg.is_sig() {
            return Err(Error::unsupported(alg, "keys"));
        }
        if self.x.is_none() {
            return Err(Error::MalformedKey("key has no public component 'x'".into()));
        }
        canonical_hash(self, alg, Some(&Canon::from(TMB_CANON)))
    }

    /// Returns the key with `tmb` set to its computed thumbprint.
    pub fn with_thumbprint(mut self) -> Result<Key> {
        self.tmb = Some(self.thumbprint()?);
        Ok(self)
    }

    /// The thumbprint carried by the key, or the computed one.
    pub(crate) fn tmb_or_thumbprint(&self) -> Result<B64> {
        match &self.tmb {
            Some(tmb) => Ok(tmb.clone()),
            None => self.thumbprint(),
        }
    }

    /// Thumbprint recomputed from `x`, or from the public key derived from
    /// `d`. A stored `tmb` must agree with it.
    pub(crate) fn current_thumbprint(&self) -> Result<B64> {
        let computed = match &self.x {
            Some(_) => self.thumbprint()?,
            None => Key::from_verifying_key(&self.verifying_key()?)?.thumbprint()?,
        };
        match &self.tmb {
            Some(tmb) if *tmb != computed => Err(Error::KeyMismatch {
                field: "tmb",
                key: tmb.to_string(),
                pay: computed.to_string(),
            }),
            _ => Ok(computed),
        }
    }

    /// Copy of the key without its private component.
    pub fn to_public(&self) -> Key {
        Key {
            d: None,
            ..self.clone()
        }
    }

    /// Native signing key from `d`.
    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_key(self)
    }

    /// Native verifying key from `x`, or derived from `d` when `x` is absent.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        match (&self.x, &self.d) {
            (None, Some(_)) => Ok(self.signing_key()?.verifying_key()),
            _ => VerifyingKey::from_key(self),
        }
    }

    /// Escalating plausibility checks.
    ///
    /// Requires `alg` and at least one of `tmb`, `x` or `d`. Each present
    /// component is then checked: `x` by size, `tmb` against the recomputed
    /// thumbprint when `x` is known, and `d` by a sign and verify round trip
    /// against `x` (or the derived public key). A key that only carries a
    /// `tmb` cannot be checked further and is accepted.
    pub async fn correct(&self) -> bool {
        let Some(alg) = self.alg else {
            log::debug!("Key is not correct: no alg");
            return false;
        };
        if !alg.is_sig() {
            return false;
        }
        if self.tmb.is_none() && self.x.is_none() && self.d.is_none() {
            log::debug!("Key is not correct: no tmb, x or d");
            return false;
        }

        if let Some(x) = &self.x {
            if alg.x_size().map_or(true, |size| size != x.len()) {
                log::debug!("Key is not correct: {alg} x is {} bytes", x.len());
                return false;
            }
            if let Some(tmb) = &self.tmb {
                match self.thumbprint() {
                    Ok(computed) if &computed == tmb => {}
                    _ => {
                        log::debug!("Key is not correct: tmb does not match x");
                        return false;
                    }
                }
            }
        }

        if self.d.is_none() {
            return true;
        }
        if let (Some(tmb), None) = (&self.tmb, &self.x) {
            let derived = self
                .verifying_key()
                .and_then(|vk| Key::from_verifying_key(&vk));
            if !matches!(derived, Ok(k) if k.tmb.as_ref() == Some(tmb)) {
                log::debug!("Key is not correct: tmb does not match d");
                return false;
            }
        }
        self.round_trip().await
    }

    /// Strict check for private keys: `d` must be present and a sign and
    /// verify round trip must succeed.
    pub async fn valid(&self) -> bool {
        if self.d.is_none() {
            return false;
        }
        self.round_trip().await
    }

    async fn round_trip(&self) -> bool {
        let (signing_key, verifying_key) = match (self.signing_key(), self.verifying_key()) {
            (Ok(sk), Ok(vk)) => (sk, vk),
            (Err(e), _) | (_, Err(e)) => {
                log::debug!("Key round trip failed: {e}");
                return false;
            }
        };
        match signing_key.sign(CORRECT_MSG).await {
            Ok(sig) => verifying_key.verify(CORRECT_MSG, &sig),
            Err(e) => {
                log::debug!("Key round trip failed: {e}");
                false
            }
        }
    }

    /// Signs a self-revoke message and returns it with the revoked key.
    ///
    /// Any existing `rvk` on the key is ignored for signing. The pay is
    /// `{"alg","iat","tmb","typ":"cyphr.me/key/revoke","rvk","msg"}` where
    /// `rvk` equals `iat` and `msg` is only present when given.
    ///
    /// # Arguments
    ///
    /// * `msg` - Optional human readable reason.
    ///
    /// # Returns
    ///
    /// The signed revoke coze and a copy of the key with `rvk` set.
    pub async fn revoke(&self, msg: Option<&str>) -> Result<(Coze, Key)> {
        let mut key = Key {
            rvk: None,
            ..self.clone()
        };
        let now = chrono::Utc::now().timestamp();

        let mut pay = Pay::new();
        pay.typ = Some(TYP_REVOKE.to_owned());
        pay.rvk = Some(Rvk::Time(now));
        if let Some(msg) = msg {
            pay.set("msg", Value::from(msg))?;
        }

        let opts = SignOptions {
            iat: Some(now),
            canon: Some(Canon::from(REVOKE_CANON)),
            ..Default::default()
        };
        let coze = sign_pay(&pay, &key, &opts).await?;
        key.rvk = Some(Rvk::Time(now));
        log::debug!("Revoked {} key at {now}", key.require_alg()?);
        Ok((coze, key))
    }

    /// Whether the key carries a revocation marker that counts as revoked.
    pub fn is_revoked(&self) -> bool {
        self.rvk.as_ref().is_some_and(Rvk::is_revoked)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::coze::verify_coze;

    const GOLDEN: &str = r#"{
        "alg":"ES256",
        "iat":1623132000,
        "kid":"Zami's Majuscule Key.",
        "tmb":"cLj8vsYtMBwYkzoFVZHBZo6SNL8wSdCIjCKAwXNuhOk",
        "x":"2nTOaFVm2QLxmUO_SjgyscVHBtvHEfo2rq65MvgNRjORojq39Haq9rXNxvXxwba_Xj0F5vZibJR3isBdOWbo5g",
        "d":"bNstg4_H3m3SlROufwRSEgibLrBuRq9114OvdapcpVA"
    }"#;

    fn golden() -> Key {
        serde_json::from_str(GOLDEN).unwrap()
    }

    #[test]
    fn golden_thumbprint() {
        let key = golden();
        assert_eq!(key.thumbprint().unwrap(), *key.tmb.as_ref().unwrap());
        // kid, iat and d do not take part
        let bare = Key {
            alg: key.alg,
            x: key.x.clone(),
            ..Default::default()
        };
        assert_eq!(bare.thumbprint().unwrap(), key.thumbprint().unwrap());
    }

    #[test]
    fn thumbprint_needs_alg_and_x() {
        let key = golden();
        let no_x = Key { x: None, ..key.clone() };
        assert!(matches!(no_x.thumbprint(), Err(Error::MalformedKey(_))));
        let no_alg = Key { alg: None, ..key };
        assert!(matches!(no_alg.thumbprint(), Err(Error::MalformedKey(_))));
    }

    #[test]
    fn serializes_in_key_order() {
        let key = golden().to_public();
        assert_eq!(
            serde_json::to_value(&key).unwrap(),
            json!({
                "alg": "ES256",
                "iat": 1623132000,
                "kid": "Zami's Majuscule Key.",
                "tmb": "cLj8vsYtMBwYkzoFVZHBZo6SNL8wSdCIjCKAwXNuhOk",
                "x": "2nTOaFVm2QLxmUO_SjgyscVHBtvHEfo2rq65MvgNRjORojq39Haq9rXNxvXxwba_Xj0F5vZibJR3isBdOWbo5g",
            })
        );
        assert!(!format!("{:?}", golden()).contains("bNstg4"));
    }

    #[tokio::test]
    async fn new_keys_are_correct_and_valid() {
        let _ = env_logger::builder().is_test(true).try_init();
        for alg in Alg::signature_algs() {
            let key = match Key::new(alg) {
                Ok(key) => key,
                Err(Error::UnsupportedAlgorithm(_)) => continue,
                Err(e) => panic!("{alg}: {e}"),
            };
            assert_eq!(key.alg, Some(alg));
            assert!(key.iat.is_some());
            assert_eq!(key.tmb.as_ref().unwrap().len(), alg.hash_size());
            assert_eq!(key.x.as_ref().unwrap().len(), alg.x_size().unwrap());
            assert_eq!(key.d.as_ref().unwrap().len(), alg.d_size().unwrap());
            assert!(key.correct().await, "{alg}");
            assert!(key.valid().await, "{alg}");
            assert!(key.to_public().correct().await, "{alg}");
            assert!(!key.to_public().valid().await, "{alg}");
        }
    }

    #[test]
    fn hash_algs_cannot_make_keys() {
        assert!(matches!(
            Key::new(Alg::Sha256),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[tokio::test]
    async fn correct_checks() {
        let key = golden();
        assert!(key.correct().await);
        assert!(key.valid().await);

        // tmb only is plausible
        let tmb_only = Key {
            alg: key.alg,
            tmb: key.tmb.clone(),
            ..Default::default()
        };
        assert!(tmb_only.correct().await);

        // d only
        let d_only = Key {
            alg: key.alg,
            d: key.d.clone(),
            ..Default::default()
        };
        assert!(d_only.correct().await);
        assert!(d_only.valid().await);

        // nothing to check
        let empty = Key {
            alg: key.alg,
            ..Default::default()
        };
        assert!(!empty.correct().await);
        assert!(!Key::default().correct().await);

        // wrong tmb
        let mut tmb = key.tmb.clone().unwrap().into_bytes();
        tmb[0] ^= 1;
        let bad_tmb = Key {
            tmb: Some(B64::new(tmb.clone())),
            ..key.clone()
        };
        assert!(!bad_tmb.correct().await);
        let bad_tmb_d_only = Key {
            x: None,
            ..bad_tmb
        };
        assert!(!bad_tmb_d_only.correct().await);

        // x that does not belong to d
        let other = Key::new(Alg::Es256).unwrap();
        let mismatched = Key {
            x: other.x.clone(),
            tmb: other.tmb.clone(),
            ..key.clone()
        };
        assert!(!mismatched.correct().await);
        assert!(!mismatched.valid().await);

        // truncated x
        let short = Key {
            x: Some(B64::new(key.x.as_ref().unwrap()[..63].to_vec())),
            tmb: None,
            d: None,
            ..key.clone()
        };
        assert!(!short.correct().await);
    }

    #[tokio::test]
    async fn revoke_signs_and_marks_key() {
        let _ = env_logger::builder().is_test(true).try_init();
        let key = golden();
        let (coze, revoked) = key.revoke(Some("compromised")).await.unwrap();

        assert!(revoked.is_revoked());
        assert!(!key.is_revoked());
        assert!(coze.pay.is_revoked());
        assert_eq!(coze.pay.typ.as_deref(), Some(TYP_REVOKE));
        assert_eq!(coze.pay.rvk, coze.pay.iat.map(Rvk::Time));
        assert_eq!(
            coze.pay.fields(),
            ["alg", "iat", "tmb", "typ", "rvk", "msg"]
        );
        assert!(verify_coze(&coze, &key).unwrap());

        // revoking an already revoked key still works
        let (again, _) = revoked.revoke(None).await.unwrap();
        assert!(!again.pay.has("msg"));
        assert!(verify_coze(&again, &key).unwrap());
    }

    #[test]
    fn rvk_values() {
        for (value, revoked) in [
            (json!(1), true),
            (json!("true"), true),
            (json!(true), true),
            (json!(18446744073709551615u64), true),
            (json!(0), false),
            (json!("false"), false),
            (json!(false), false),
            (json!(null), false),
            (json!(1.5), false),
        ] {
            let rvk: Rvk = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(rvk.is_revoked(), revoked, "rvk = {value}");
            assert_eq!(serde_json::to_value(&rvk).unwrap(), value);
        }
        assert!(!Key::default().is_revoked());
    }
}
