//! Trigger model: the upstream event or manual action behind an invocation.
//!
//! The wire shape ([`WireTrigger`]) is what the upstream caller sends. It is
//! normalised into a [`RawTrigger`] once per request, and handler code can
//! decode the trigger payload into a concrete type on demand with
//! [`RawTrigger::decode`].

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::{self, DeserializeOwned, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A record key affected by a trigger.
///
/// Keys arrive either as JSON strings (UUIDs, slugs...) or as JSON integers.
/// Strings are kept verbatim and never parsed as numbers. Integers are kept
/// as such and mirrored into their decimal text so every key can be treated
/// as a string. Equality and hashing only look at the string form.
///
/// # Example
///
/// ```
/// use callgate_core::TriggerKey;
///
/// let key: TriggerKey = serde_json::from_str("42").unwrap();
/// assert_eq!(key.as_str(), "42");
/// assert_eq!(key.as_i64(), Some(42));
///
/// let key: TriggerKey = serde_json::from_str(r#""42""#).unwrap();
/// assert_eq!(key.as_str(), "42");
/// assert_eq!(key.as_i64(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TriggerKey {
    value: String,
    numeric: Option<i64>,
}

impl TriggerKey {
    /// Creates a string key.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            numeric: None,
        }
    }

    /// Creates a numeric key, mirrored to its decimal text.
    #[must_use]
    pub fn numeric(value: i64) -> Self {
        Self {
            value: value.to_string(),
            numeric: Some(value),
        }
    }

    /// Returns the string form of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the numeric form, if the key arrived as a JSON integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        self.numeric
    }

    /// Returns `true` if the string form is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl PartialEq for TriggerKey {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for TriggerKey {}

impl Hash for TriggerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for TriggerKey {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for TriggerKey {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<i64> for TriggerKey {
    fn from(value: i64) -> Self {
        Self::numeric(value)
    }
}

impl Serialize for TriggerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.numeric {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_str(&self.value),
        }
    }
}

impl<'de> Deserialize<'de> for TriggerKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = TriggerKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or an integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TriggerKey, E> {
                Ok(TriggerKey::string(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<TriggerKey, E> {
                Ok(TriggerKey::string(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<TriggerKey, E> {
                Ok(TriggerKey::numeric(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TriggerKey, E> {
                i64::try_from(v)
                    .map(TriggerKey::numeric)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

/// Trigger as sent on the wire by the upstream caller.
///
/// Callers may use either the singular `key` or the plural `keys` field, and
/// manual invocations carry the location of the affected records inside
/// `body`. [`RawTrigger::from_wire`] normalises all of that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireTrigger {
    /// Event name (e.g. `items.create`).
    #[serde(deserialize_with = "null_as_default")]
    pub event: String,

    /// Single affected key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<TriggerKey>,

    /// Affected keys.
    #[serde(deserialize_with = "null_as_default")]
    pub keys: Vec<TriggerKey>,

    /// Affected collection.
    #[serde(deserialize_with = "null_as_default")]
    pub collection: String,

    /// Event payload.
    pub payload: Value,

    /// URL path of a manual invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Body of a manual invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// The location fields of a manual-invocation body.
///
/// Any other field of the body is ignored here and stays reachable through
/// [`RawTrigger::fields`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManualBody {
    /// Collection selected by the manual action.
    #[serde(deserialize_with = "null_as_default")]
    pub collection: String,

    /// Keys selected by the manual action.
    #[serde(deserialize_with = "null_as_default")]
    pub keys: Vec<TriggerKey>,
}

/// Normalised trigger exposed to handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTrigger {
    /// Event name.
    pub event: String,

    /// Affected keys, in wire order.
    pub keys: Vec<TriggerKey>,

    /// Affected collection.
    pub collection: String,

    /// Event payload, undecoded.
    pub payload: Value,

    /// URL path of a manual invocation.
    pub path: Option<String>,

    pub(crate) body: Option<Value>,
}

impl RawTrigger {
    /// Normalises a wire trigger.
    ///
    /// - a non-empty `key` is appended after any `keys`;
    /// - a manual-invocation `body` with a non-empty `collection` replaces
    ///   both the collection and the keys of the trigger.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` is present but its `collection` or `keys`
    /// fields have the wrong shape.
    ///
    /// # Example
    ///
    /// ```
    /// use callgate_core::{RawTrigger, TriggerKey, WireTrigger};
    ///
    /// let wire: WireTrigger = serde_json::from_str(
    ///     r#"{"event":"items.update","keys":[1,2],"key":"3","collection":"posts"}"#,
    /// ).unwrap();
    ///
    /// let trigger = RawTrigger::from_wire(wire).unwrap();
    /// assert_eq!(trigger.key_strings(), vec!["1", "2", "3"]);
    /// ```
    pub fn from_wire(wire: WireTrigger) -> Result<Self, serde_json::Error> {
        let mut keys = wire.keys;
        if let Some(key) = wire.key.filter(|k| !k.is_empty()) {
            keys.push(key);
        }

        let mut collection = wire.collection;
        if let Some(body) = &wire.body {
            let manual = ManualBody::deserialize(body)?;
            if !manual.collection.is_empty() {
                collection = manual.collection;
                keys = manual.keys;
            }
        }

        Ok(Self {
            event: wire.event,
            keys,
            collection,
            payload: wire.payload,
            path: wire.path,
            body: wire.body,
        })
    }

    /// Returns the raw manual-invocation body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Returns a new trigger with the given manual-invocation body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the string form of every key.
    #[must_use]
    pub fn key_strings(&self) -> Vec<&str> {
        self.keys.iter().map(TriggerKey::as_str).collect()
    }

    /// Decodes the trigger payload into `P`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `P`.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<Trigger<P>, serde_json::Error> {
        Ok(Trigger {
            event: self.event.clone(),
            keys: self.keys.clone(),
            collection: self.collection.clone(),
            payload: P::deserialize(&self.payload)?,
            path: self.path.clone(),
        })
    }

    /// Decodes the manual-invocation body into `T`.
    ///
    /// A trigger without a body decodes from JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`.
    pub fn fields<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.body {
            Some(body) => T::deserialize(body),
            None => T::deserialize(&Value::Null),
        }
    }
}

/// A trigger whose payload has been decoded into `P`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger<P> {
    /// Event name.
    pub event: String,

    /// Affected keys.
    pub keys: Vec<TriggerKey>,

    /// Affected collection.
    pub collection: String,

    /// Decoded event payload.
    pub payload: P,

    /// URL path of a manual invocation.
    pub path: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
