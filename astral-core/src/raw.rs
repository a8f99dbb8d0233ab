use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::bytes::decode_base64;
use crate::error::{Error, Result};
use crate::object::{Object, Source};

/// An object of a type the reader does not know, kept as its type name and raw payload.
///
/// Writing it back reproduces the original bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawObject {
    pub type_name: String,
    pub payload: Vec<u8>,
}

impl RawObject {
    pub fn new(type_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            payload,
        }
    }
}

impl Object for RawObject {
    fn object_type(&self) -> &str {
        &self.type_name
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        w.write_all(&self.payload)?;
        Ok(self.payload.len() as u64)
    }

    /// Consumes the rest of the source.
    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        self.payload.clear();
        let n = src.read_to_end(&mut self.payload)?;
        Ok(n as u64)
    }

    fn to_json(&self) -> Result<JsonValue> {
        Ok(JsonValue::String(STANDARD.encode(&self.payload)))
    }

    fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        let text = value
            .as_str()
            .ok_or_else(|| Error::InvalidJson(format!("raw payload expects base64, got {value}")))?;
        self.payload = decode_base64(&self.type_name, text)?;
        Ok(())
    }
}
