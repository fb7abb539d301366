use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
    alg::Alg,
    b64::B64,
    error::{Error, Result},
    key::Rvk,
};

/// `typ` of a self-revoke message.
pub const TYP_REVOKE: &str = "cyphr.me/key/revoke";

const STANDARD: [&str; 5] = ["alg", "iat", "tmb", "typ", "rvk"];

/// A coze payload.
///
/// The standard fields are typed, everything else lives in `ext`. Field order
/// matters for the signed bytes, so the order seen when a pay is deserialized
/// is kept and reproduced on serialization. Fields that were not part of that
/// order follow it: first the standard ones (in the order above), then `ext`
/// in insertion order.
///
/// Standard field names in `ext` are never serialized; use [`Pay::set`] to
/// route values to their typed slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pay {
    pub alg: Option<Alg>,
    pub iat: Option<i64>,
    pub tmb: Option<B64>,
    pub typ: Option<String>,
    pub rvk: Option<Rvk>,
    pub ext: Map<String, Value>,
    order: Vec<String>,
}

impl Pay {
    /// An empty pay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field by name, parsing standard fields into their typed slot.
    ///
    /// # Arguments
    ///
    /// * `name` - JSON field name.
    /// * `value` - JSON value of the field.
    ///
    /// # Returns
    ///
    /// `Error::Json` when a standard field has a value of the wrong type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        match name {
            "alg" => self.alg = Some(serde_json::from_value(value)?),
            "iat" => self.iat = Some(serde_json::from_value(value)?),
            "tmb" => self.tmb = Some(serde_json::from_value(value)?),
            "typ" => self.typ = Some(serde_json::from_value(value)?),
            "rvk" => self.rvk = Some(serde_json::from_value(value)?),
            _ => {
                self.ext.insert(name.to_owned(), value);
            }
        }
        if !self.order.iter().any(|n| n == name) {
            self.order.push(name.to_owned());
        }
        Ok(())
    }

    /// Builder form of [`Pay::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value.into())?;
        Ok(self)
    }

    /// Whether the field `name` is present.
    pub fn has(&self, name: &str) -> bool {
        match name {
            "alg" => self.alg.is_some(),
            "iat" => self.iat.is_some(),
            "tmb" => self.tmb.is_some(),
            "typ" => self.typ.is_some(),
            "rvk" => self.rvk.is_some(),
            _ => self.ext.contains_key(name),
        }
    }

    /// Names of the present fields, in serialization order.
    pub fn fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|name| self.has(name))
            .collect();
        for name in STANDARD {
            if self.has(name) && !names.contains(&name) {
                names.push(name);
            }
        }
        for name in self.ext_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Extension field names. Standard names inserted into `ext` directly are
    /// ignored, their typed slot is authoritative.
    fn ext_names(&self) -> impl Iterator<Item = &str> {
        self.ext
            .keys()
            .map(String::as_str)
            .filter(|name| !STANDARD.contains(name))
    }

    /// True when the pay has no fields at all.
    pub fn is_empty(&self) -> bool {
        STANDARD.iter().all(|name| !self.has(name)) && self.ext_names().next().is_none()
    }

    /// Whether this pay carries a revocation marker that counts as revoked.
    pub fn is_revoked(&self) -> bool {
        self.rvk.as_ref().is_some_and(Rvk::is_revoked)
    }
}

impl TryFrom<Map<String, Value>> for Pay {
    type Error = Error;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut pay = Pay::new();
        for (name, value) in map {
            pay.set(&name, value)?;
        }
        Ok(pay)
    }
}

impl Serialize for Pay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let names = self.fields();
        let mut map = serializer.serialize_map(Some(names.len()))?;
        for name in names {
            match name {
                "alg" => map.serialize_entry(name, &self.alg)?,
                "iat" => map.serialize_entry(name, &self.iat)?,
                "tmb" => map.serialize_entry(name, &self.tmb)?,
                "typ" => map.serialize_entry(name, &self.typ)?,
                "rvk" => map.serialize_entry(name, &self.rvk)?,
                _ => map.serialize_entry(name, &self.ext[name])?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Pay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Pay::try_from(map).map_err(serde::de::Error::custom)
    }
}
