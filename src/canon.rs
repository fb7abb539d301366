//! Canonical JSON forms.
//!
//! A canon is the ordered list of top-level field names that take part in a
//! signature or digest. The canonical form keeps exactly those fields, in canon
//! order, and is serialized as compact JSON. Fields are never sorted; parties
//! that want the same bytes have to agree on the canon.

use std::{collections::HashSet, ops::Deref};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    alg::{digest, Alg},
    b64::B64,
    error::{Error, Result},
};

/// Ordered list of field names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Canon(Vec<String>);

impl Canon {
    /// Canon over `fields`, in the given order. Duplicates are reported by
    /// [`Canon::check`], not here.
    pub fn new(fields: Vec<String>) -> Self {
        Canon(fields)
    }

    /// Fails with `DuplicateCanonField` when a name appears twice.
    pub fn check(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.0.len());
        for field in &self.0 {
            if !seen.insert(field.as_str()) {
                return Err(Error::DuplicateCanonField(field.clone()));
            }
        }
        Ok(())
    }

    /// The field names, in canon order.
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl Deref for Canon {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for Canon {
    fn from(fields: Vec<String>) -> Self {
        Canon(fields)
    }
}

impl From<&[&str]> for Canon {
    fn from(fields: &[&str]) -> Self {
        fields.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Canon {
    fn from(fields: [&str; N]) -> Self {
        fields.into_iter().collect()
    }
}

impl<'a> FromIterator<&'a str> for Canon {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Canon(iter.into_iter().map(str::to_owned).collect())
    }
}

impl FromIterator<String> for Canon {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Canon(iter.into_iter().collect())
    }
}

/// Returns the object's own top-level field names in iteration order.
pub fn canon(object: &Map<String, Value>) -> Canon {
    object.keys().cloned().collect()
}

/// Builds a new object holding only the canon's fields, in canon order.
///
/// Values are copied as-is. Canon fields the object does not have are skipped.
/// With no canon, or an empty one, the object is returned unchanged.
pub fn canonical(object: &Map<String, Value>, canon: Option<&Canon>) -> Result<Map<String, Value>> {
    let canon = match canon {
        Some(canon) if !canon.is_empty() => canon,
        _ => return Ok(object.clone()),
    };
    canon.check()?;

    let mut out = Map::with_capacity(canon.len());
    for field in canon.iter() {
        if let Some(value) = object.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    Ok(out)
}

/// Serializes `value` to its canonical bytes: the canonical object as compact
/// JSON. This is the exact input for signing and hashing.
///
/// # Arguments
///
/// * `value` - Anything that serializes to a JSON object.
/// * `canon` - Optional canon selecting and ordering fields.
///
/// # Returns
///
/// The canonical bytes, or `Error::MalformedEnvelope` when `value` is not an
/// object.
pub fn canonical_bytes<T>(value: &T, canon: Option<&Canon>) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let object = match serde_json::to_value(value)? {
        Value::Object(object) => object,
        other => {
            return Err(Error::MalformedEnvelope(format!(
                "canonical form requires a JSON object, got {other}"
            )))
        }
    };
    let canonical = canonical(&object, canon)?;
    Ok(serde_json::to_vec(&canonical)?)
}

/// Digest of the canonical bytes of `value` using the hash of `alg`.
pub fn canonical_hash<T>(value: &T, alg: Alg, canon: Option<&Canon>) -> Result<B64>
where
    T: Serialize + ?Sized,
{
    let bytes = canonical_bytes(value, canon)?;
    Ok(digest(alg, &bytes))
}

/// Like [`canonical_hash`], returning b64ut text.
pub fn canonical_hash_b64<T>(value: &T, alg: Alg, canon: Option<&Canon>) -> Result<String>
where
    T: Serialize + ?Sized,
{
    canonical_hash(value, alg, canon).map(|h| h.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn canon_keeps_insertion_order() {
        let m = object(json!({"z": 1, "a": 2, "m": 3}));
        assert_eq!(canon(&m), Canon::from(["z", "a", "m"]));
    }

    #[test]
    fn canonical_orders_by_canon() {
        let m = object(json!({"msg": "Coze Rocks", "typ": "t", "alg": "ES256", "extra": true}));
        let c = canonical(&m, Some(&Canon::from(["alg", "msg", "typ"]))).unwrap();
        assert_eq!(
            serde_json::to_string(&c).unwrap(),
            r#"{"alg":"ES256","msg":"Coze Rocks","typ":"t"}"#
        );
    }

    #[test]
    fn canonical_without_canon_is_identity() {
        let m = object(json!({"b": 1, "a": 2}));
        assert_eq!(canonical(&m, None).unwrap(), m);
        assert_eq!(canonical(&m, Some(&Canon::default())).unwrap(), m);
    }

    #[test]
    fn canonical_skips_missing_fields() {
        let m = object(json!({"a": 1}));
        let c = canonical(&m, Some(&Canon::from(["a", "b"]))).unwrap();
        assert_eq!(Value::Object(c), json!({"a": 1}));
    }

    #[test]
    fn duplicate_canon_fields_fail() {
        let m = object(json!({"a": 1}));
        let err = canonical(&m, Some(&Canon::from(["a", "b", "a"]))).unwrap_err();
        assert!(matches!(err, Error::DuplicateCanonField(ref f) if f == "a"), "{err:?}");
    }

    #[test]
    fn canonical_bytes_are_compact_and_escaped() {
        let v = json!({"msg": "line\nbreak \"quoted\" </>", "n": [1, 2], "o": {"k": null}});
        let bytes = canonical_bytes(&v, None).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"msg":"line\nbreak \"quoted\" </>","n":[1,2],"o":{"k":null}}"#
        );
    }

    #[test]
    fn canonical_bytes_ignore_input_order_with_canon() {
        let a = json!({"alg": "ES256", "iat": 1, "msg": "hi"});
        let b = json!({"msg": "hi", "iat": 1, "alg": "ES256"});
        let canon = Canon::from(["alg", "iat", "msg"]);
        let first = canonical_bytes(&a, Some(&canon)).unwrap();
        assert_eq!(first, canonical_bytes(&a, Some(&canon)).unwrap());
        assert_eq!(first, canonical_bytes(&b, Some(&canon)).unwrap());
    }

    #[test]
    fn canonical_bytes_require_objects() {
        let err = canonical_bytes(&json!([1, 2]), None).unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope(_)));
    }

    #[test]
    fn canonical_hash_of_key_canon() {
        let key = json!({
            "alg": "ES256",
            "iat": 1623132000,
            "kid": "Zami's Majuscule Key.",
            "x": "2nTOaFVm2QLxmUO_SjgyscVHBtvHEfo2rq65MvgNRjORojq39Haq9rXNxvXxwba_Xj0F5vZibJR3isBdOWbo5g",
        });
        let tmb = canonical_hash_b64(&key, Alg::Sha256, Some(&Canon::from(["alg", "x"]))).unwrap();
        assert_eq!(tmb, "cLj8vsYtMBwYkzoFVZHBZo6SNL8wSdCIjCKAwXNuhOk");
    }
}
