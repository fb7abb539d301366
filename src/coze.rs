use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    alg::Alg,
    b64::B64,
    canon::{canonical_bytes, canonical_hash, Canon},
    error::{Error, Result},
    key::Key,
    pay::Pay,
    signer::{Signer, SigningKey},
};

/// A signed envelope.
///
/// `sig` is computed over the canonical bytes of `pay` at signing time. `can`,
/// `cad` and `czd` are derived metadata (see [`meta`]) and are never signed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coze {
    pub pay: Pay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<B64>,
    /// Canon the pay was signed under. Verification canonicalizes the pay
    /// with it when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can: Option<Canon>,
    /// Digest of the canonical pay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cad: Option<B64>,
    /// Digest of `{"cad":…,"sig":…}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub czd: Option<B64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
}

impl Coze {
    /// Converts the coze into its JSON string representation.
    pub fn into_json_string(self) -> Result<String> {
        Ok(serde_json::to_string(&self)?)
    }

    /// Parses a coze from JSON.
    ///
    /// # Arguments
    /// * `s` - JSON text of a coze, `{"pay":{…},"sig":"…"}`
    pub fn try_from_json_string(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// How [`sign_pay`] treats header fields already present in the pay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// `alg`, `tmb` and `iat` are always set from the key and clock.
    #[default]
    Overwrite,
    /// Only absent fields are set. An existing `iat` is kept.
    FillMissing,
}

/// Options for [`sign_pay`] and [`sign_coze`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignOptions {
    /// Treatment of header fields already in the pay.
    pub mode: FillMode,
    /// Fixed `iat` instead of the current time.
    pub iat: Option<i64>,
    /// Canon applied to the pay before signing.
    pub canon: Option<Canon>,
}

/// Result of verifying many cozes against one key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifiedArray {
    /// True only for a non-empty batch without failures.
    pub verified_all: bool,
    /// Items whose signature verified.
    pub verified_count: usize,
    /// Items that did not verify or could not be checked.
    pub failed_count: usize,
    /// Failed items, as given.
    pub failed_cozes: Vec<Value>,
}

impl VerifiedArray {
    fn record(&mut self, verified: bool, item: impl FnOnce() -> Value) {
        if verified {
            self.verified_count += 1;
        } else {
            self.failed_count += 1;
            self.failed_cozes.push(item());
        }
        self.verified_all = self.failed_count == 0 && self.verified_count > 0;
    }

    /// Combines two partial results. The outcome does not depend on which
    /// part was verified first.
    pub fn merge(mut self, other: VerifiedArray) -> VerifiedArray {
        self.verified_count += other.verified_count;
        self.failed_count += other.failed_count;
        self.failed_cozes.extend(other.failed_cozes);
        self.verified_all = self.failed_count == 0 && self.verified_count > 0;
        self
    }
}

fn mismatch(field: &'static str, key: impl ToString, pay: impl ToString) -> Error {
    Error::KeyMismatch {
        field,
        key: key.to_string(),
        pay: pay.to_string(),
    }
}

/// Checks that the pay's `alg` and `tmb`, when present, belong to `key`.
fn check_key(pay: &Pay, key: &Key) -> Result<Alg> {
    let alg = key.require_alg()?;
    if let Some(pay_alg) = pay.alg {
        if pay_alg != alg {
            return Err(mismatch("alg", alg, pay_alg));
        }
    }
    if let Some(pay_tmb) = &pay.tmb {
        let tmb = key.tmb_or_thumbprint()?;
        if *pay_tmb != tmb {
            return Err(mismatch("tmb", tmb, pay_tmb));
        }
    }
    Ok(alg)
}

/// Signs a pay with a key, setting its header fields.
///
/// The pay's `alg` and `tmb` are taken from the key and `iat` from the clock
/// (or `opts.iat`). A pre-existing `alg` or `tmb` that disagrees with the key
/// fails with `KeyMismatch` in either [`FillMode`], as does a key whose stored
/// `tmb` is not the thumbprint of its public key. When `opts.canon` is set
/// the returned pay holds only the canon's fields, in canon order.
///
/// # Arguments
/// * `pay` - The pay to sign.
/// * `key` - A private key, not revoked.
/// * `opts` - Header and canon options.
///
/// # Returns
/// The signed coze, or `Error::RevokedKey` for a revoked key.
pub async fn sign_pay(pay: &Pay, key: &Key, opts: &SignOptions) -> Result<Coze> {
    if key.is_revoked() {
        return Err(Error::RevokedKey);
    }
    let alg = check_key(pay, key)?;
    let tmb = key.current_thumbprint()?;

    let mut pay = pay.clone();
    pay.alg = Some(alg);
    pay.tmb = Some(tmb);
    if opts.mode == FillMode::Overwrite || pay.iat.is_none() {
        pay.iat = Some(opts.iat.unwrap_or_else(|| chrono::Utc::now().timestamp()));
    }

    let signing_key = SigningKey::from_key(key)?;
    sign_pay_raw(&pay, &signing_key, opts.canon.as_ref()).await
}

/// Canonicalizes and signs a pay without touching its fields.
///
/// # Arguments
/// * `pay` - The pay, signed as-is.
/// * `signer` - Any signer; no key checks are made.
/// * `canon` - Optional canon selecting and ordering fields.
pub async fn sign_pay_raw<S>(pay: &Pay, signer: &S, canon: Option<&Canon>) -> Result<Coze>
where
    S: Signer + ?Sized,
{
    let bytes = canonical_bytes(pay, canon)?;
    log::debug!("Signing {} byte pay with {}", bytes.len(), signer.alg());
    let sig = signer.sign(&bytes).await?;

    let pay = match canon {
        Some(canon) if !canon.is_empty() => serde_json::from_slice(&bytes)?,
        _ => pay.clone(),
    };
    Ok(Coze {
        pay,
        sig: Some(sig),
        ..Default::default()
    })
}

/// Re-signs the pay of an existing coze.
///
/// `opts.canon` wins over the coze's own `can`. Derived metadata of the input
/// is dropped.
pub async fn sign_coze(coze: &Coze, key: &Key, opts: &SignOptions) -> Result<Coze> {
    let opts = SignOptions {
        canon: opts.canon.clone().or_else(|| coze.can.clone()),
        ..opts.clone()
    };
    sign_pay(&coze.pay, key, &opts).await
}

fn verify_with_canon(pay: &Pay, sig: &[u8], key: &Key, canon: Option<&Canon>) -> Result<bool> {
    let alg = check_key(pay, key)?;
    let verifying_key = key.verifying_key()?;
    let bytes = canonical_bytes(pay, canon)?;
    let verified = verifying_key.verify(&bytes, sig);
    log::trace!("Verified {} byte pay with {alg}: {verified}", bytes.len());
    Ok(verified)
}

/// Verifies a signature over a pay.
///
/// # Returns
/// The cryptographic result. `Error::KeyMismatch` when the pay names a
/// different `alg` or `tmb` than `key`.
pub fn verify_pay(pay: &Pay, sig: &B64, key: &Key) -> Result<bool> {
    verify_with_canon(pay, sig, key, None)
}

/// Verifies a coze, honouring its `can`.
pub fn verify_coze(coze: &Coze, key: &Key) -> Result<bool> {
    let sig = coze
        .sig
        .as_ref()
        .ok_or_else(|| Error::MalformedEnvelope("coze has no 'sig'".into()))?;
    verify_with_canon(&coze.pay, sig, key, coze.can.as_ref())
}

/// Verifies every coze against `key`. Errors count as failures.
pub fn verify_batch(cozes: &[Coze], key: &Key) -> VerifiedArray {
    let mut out = VerifiedArray::default();
    for coze in cozes {
        let verified = match verify_coze(coze, key) {
            Ok(verified) => verified,
            Err(e) => {
                log::debug!("Coze failed verification: {e}");
                false
            }
        };
        out.record(verified, || serde_json::to_value(coze).unwrap_or_default());
    }
    out
}

/// Verifies JSON items that are either cozes or `{"coze": <coze>}` wrappers.
///
/// Items that do not parse as a coze count as failures and are reported as
/// given.
pub fn verify_array(items: &[Value], key: &Key) -> VerifiedArray {
    let mut out = VerifiedArray::default();
    for item in items {
        let inner = match item.get("coze") {
            Some(inner) if item.get("pay").is_none() => inner,
            _ => item,
        };
        let verified = match serde_json::from_value::<Coze>(inner.clone()) {
            Ok(coze) => verify_coze(&coze, key).unwrap_or_else(|e| {
                log::debug!("Coze failed verification: {e}");
                false
            }),
            Err(e) => {
                log::debug!("Item is not a coze: {e}");
                false
            }
        };
        out.record(verified, || item.clone());
    }
    out
}

/// Computes `can`, `cad` and `czd` for a coze. No verification is done.
///
/// `can` is the coze's own canon, or the pay's fields when it has none. The
/// digest alg is `alg` if given, else the pay's, else the embedded key's.
/// `czd` is only set when the coze has a `sig`.
///
/// # Arguments
/// * `coze` - The coze to describe.
/// * `alg` - Optional override of the digest algorithm.
pub fn meta(coze: &Coze, alg: Option<Alg>) -> Result<Coze> {
    if coze.pay.is_empty() {
        return Err(Error::MalformedEnvelope("coze has no pay".into()));
    }
    let alg = alg
        .or(coze.pay.alg)
        .or_else(|| coze.key.as_ref().and_then(|k| k.alg))
        .ok_or_else(|| Error::MalformedEnvelope("cannot determine alg of coze".into()))?;

    let can = match &coze.can {
        Some(can) if !can.is_empty() => can.clone(),
        _ => coze.pay.fields().into_iter().collect(),
    };
    let cad = canonical_hash(&coze.pay, alg, Some(&can))?;
    let czd = match &coze.sig {
        Some(sig) => Some(canonical_hash(&json!({"cad": cad, "sig": sig}), alg, None)?),
        None => None,
    };

    Ok(Coze {
        can: Some(can),
        cad: Some(cad),
        czd,
        ..coze.clone()
    })
}
