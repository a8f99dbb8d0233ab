//! JSON forms: `{"type": ..., "object": ...}` envelopes for type-erased values
//! and field maps for records.

use serde::{Deserialize, Serialize};
pub use serde_json::{Map, Value};

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::objectify::Objectify;

/// The JSON envelope of a type-erased object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEnvelope {
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub object: Value,
}

impl JsonEnvelope {
    pub fn seal(obj: &dyn Object) -> Result<Self> {
        let type_name = obj.object_type();
        if type_name.is_empty() {
            return Err(Error::Unsupported(format!(
                "cannot wrap untyped {obj:?} in a json envelope"
            )));
        }
        Ok(Self {
            type_name: type_name.to_owned(),
            object: obj.to_json()?,
        })
    }

    /// Instantiates the named type and fills it from the `object` payload.
    pub fn open(&self, blueprints: &Blueprints) -> Result<Box<dyn Object>> {
        if self.type_name.is_empty() {
            return Err(Error::EmptyType);
        }
        let mut obj = blueprints
            .instantiate(&self.type_name)
            .ok_or_else(|| Error::BlueprintNotFound(self.type_name.clone()))?;
        if !self.object.is_null() {
            obj.from_json(&self.object, blueprints)?;
        }
        Ok(obj)
    }
}

pub fn envelope(obj: &dyn Object) -> Result<Value> {
    Ok(serde_json::to_value(JsonEnvelope::seal(obj)?)?)
}

pub fn open_envelope(value: &Value, blueprints: &Blueprints) -> Result<Box<dyn Object>> {
    JsonEnvelope::deserialize(value)
        .map_err(|e| Error::InvalidJson(format!("malformed envelope: {e}")))?
        .open(blueprints)
}

/// The JSON form of a value, as its [`Objectified`](crate::Objectified) view renders it.
pub fn to_json<T: Objectify>(value: &T) -> Result<Value> {
    value.json_root()
}

pub fn from_json<T: Objectify + Default>(value: &Value, blueprints: &Blueprints) -> Result<T> {
    let mut out = T::default();
    out.set_json_root(value, blueprints)?;
    Ok(out)
}

/// Fields of a record in JSON. `null` yields `None`, leaving the record untouched.
#[doc(hidden)]
pub fn record_fields<'v>(value: &'v Value, record: &str) -> Result<Option<&'v Map<String, Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(fields) => Ok(Some(fields)),
        other => Err(Error::InvalidJson(format!("{record} expects an object, got {other}"))),
    }
}

/// Elements of a tuple record in JSON. `null` yields `None`.
#[doc(hidden)]
pub fn tuple_fields<'v>(value: &'v Value, record: &str, len: usize) -> Result<Option<&'v [Value]>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) if items.len() == len => Ok(Some(items)),
        other => Err(Error::InvalidJson(format!(
            "{record} expects an array of {len} elements, got {other}"
        ))),
    }
}
