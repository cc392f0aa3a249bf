//! Typed JSON documents that keep their unknown fields.
//!
//! A [`Partial<T>`] decodes a JSON object into `T` while retaining every field
//! of the original object. Encoding it again overlays the current value of `T`
//! on top of the retained fields, so fields unknown to `T` survive a
//! decode, mutate, encode cycle untouched.
//!
//! # Example
//!
//! ```
//! use callgate_core::Partial;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Post {
//!     title: String,
//! }
//!
//! let mut post: Partial<Post> =
//!     Partial::from_slice(br#"{"title":"old","status":"draft"}"#).unwrap();
//! post.title = "new".to_string();
//!
//! let json: serde_json::Value = serde_json::from_slice(&post.to_vec().unwrap()).unwrap();
//! assert_eq!(json, serde_json::json!({"title": "new", "status": "draft"}));
//! ```

use std::ops::{Deref, DerefMut};

use serde::de::{self, DeserializeOwned};
use serde::ser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while decoding or encoding a [`Partial`].
#[derive(Error, Debug)]
pub enum PartialError {
    /// The input is not a JSON object.
    #[error("cannot decode partial fields: {0}")]
    Fields(#[source] serde_json::Error),

    /// The input object does not match the typed value.
    #[error("cannot decode partial value: {0}")]
    Value(#[source] serde_json::Error),

    /// The typed value could not be encoded.
    #[error("cannot encode partial value: {0}")]
    Encode(#[source] serde_json::Error),

    /// The typed value does not encode to a JSON object.
    #[error("partial value must encode to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A typed value paired with every field of the JSON object it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partial<T> {
    value: T,
    fields: Map<String, Value>,
}

impl<T> Partial<T> {
    /// Wraps a value with no retained fields.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value,
            fields: Map::new(),
        }
    }

    /// Returns the typed value.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Returns the retained fields.
    ///
    /// This is the full set of keys seen on decode, including the ones that
    /// were also mapped onto the typed value.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the retained fields for modification.
    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Consumes the partial, returning the typed value.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Consumes the partial, returning the typed value and retained fields.
    pub fn into_parts(self) -> (T, Map<String, Value>) {
        (self.value, self.fields)
    }
}

impl<T: DeserializeOwned> Partial<T> {
    /// Decodes a JSON object.
    pub fn from_slice(data: &[u8]) -> Result<Self, PartialError> {
        let object: Map<String, Value> = serde_json::from_slice(data).map_err(PartialError::Fields)?;
        Self::from_object(object)
    }

    /// Decodes an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, PartialError> {
        match value {
            Value::Object(object) => Self::from_object(object),
            other => Err(PartialError::Fields(de::Error::invalid_type(
                unexpected(&other),
                &"a JSON object",
            ))),
        }
    }

    fn from_object(object: Map<String, Value>) -> Result<Self, PartialError> {
        let value = T::deserialize(&Value::Object(object.clone())).map_err(PartialError::Value)?;
        Ok(Self {
            value,
            fields: object,
        })
    }
}

impl<T: Serialize> Partial<T> {
    /// Returns the merged JSON object: retained fields overwritten by every
    /// field of the typed value.
    pub fn to_object(&self) -> Result<Map<String, Value>, PartialError> {
        let known = match serde_json::to_value(&self.value).map_err(PartialError::Encode)? {
            Value::Object(known) => known,
            other => return Err(PartialError::NotAnObject(kind(&other))),
        };

        let mut merged = self.fields.clone();
        merged.extend(known);
        Ok(merged)
    }

    /// Encodes the merged JSON object.
    pub fn to_vec(&self) -> Result<Vec<u8>, PartialError> {
        serde_json::to_vec(&self.to_object()?).map_err(PartialError::Encode)
    }
}

impl<T> Deref for Partial<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Partial<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> From<T> for Partial<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Serialize> Serialize for Partial<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_object()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Partial<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_object(object).map_err(de::Error::custom)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn unexpected(value: &Value) -> de::Unexpected<'_> {
    match value {
        Value::Null => de::Unexpected::Unit,
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
    }
}
