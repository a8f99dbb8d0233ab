use std::io::{Read, Write};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::objectify::objectify_via_object;
use crate::wire::{self, Wire, Width};

/// Magic marker prefixed to canonical encodings (`"ADC0"`).
pub const STAMP: u32 = 0x4144_4330;

/// Writes a type name as `string8`.
pub fn write_type_name(w: &mut dyn Write, type_name: &str) -> Result<u64> {
    wire::write_prefixed(w, Width::W8, type_name.as_bytes())
}

/// Reads a `string8` type name. An empty name is returned as is.
pub fn read_type_name(r: &mut dyn Read) -> Result<(String, u64)> {
    let bytes = wire::read_prefixed(r, Width::W8)?;
    let n = 1 + bytes.len() as u64;
    Ok((String::from_utf8(bytes)?, n))
}

/// The canonical type frame: stamp followed by the type name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHeader(pub String);

impl ObjectHeader {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self(type_name.into())
    }

    pub fn type_name(&self) -> &str {
        &self.0
    }
}

impl Object for ObjectHeader {
    fn object_type(&self) -> &str {
        "astral.object_header"
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        let n = STAMP.write_wire(w)?;
        Ok(n + write_type_name(w, &self.0)?)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let stamp = u32::read_wire(src)?;
        if stamp != STAMP {
            return Err(Error::InvalidStamp(stamp));
        }
        let (type_name, n) = read_type_name(src)?;
        self.0 = type_name;
        Ok(4 + n)
    }

    fn to_json(&self) -> Result<JsonValue> {
        Ok(JsonValue::String(self.0.clone()))
    }

    fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        let type_name = value
            .as_str()
            .ok_or_else(|| Error::InvalidJson(format!("expected a type name, got {value}")))?;
        self.0 = type_name.to_owned();
        Ok(())
    }

    fn to_text(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn from_text(&mut self, text: &str) -> Result<()> {
        self.0 = text.to_owned();
        Ok(())
    }
}

objectify_via_object!(ObjectHeader, "astral.object_header");

/// How a registry level encodes type names in front of payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeCodec {
    /// `string8(type)`
    #[default]
    Short,
    /// `stamp || string8(type)`
    Canonical,
    /// `u8(code)`, the position of the type in an ordered list.
    Indexed(Arc<[String]>),
}

impl TypeCodec {
    /// Builds an indexed codec.
    ///
    /// # Panics
    ///
    /// Panics if more than 256 types are listed, since codes are a single byte.
    pub fn indexed<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: Vec<String> = types.into_iter().map(Into::into).collect();
        assert!(types.len() <= 256, "indexed codec supports at most 256 types");
        TypeCodec::Indexed(types.into())
    }

    pub fn write_type(&self, w: &mut dyn Write, type_name: &str) -> Result<u64> {
        if type_name.is_empty() {
            return Err(Error::EmptyType);
        }
        match self {
            TypeCodec::Short => write_type_name(w, type_name),
            TypeCodec::Canonical => ObjectHeader::new(type_name).write_to(w),
            TypeCodec::Indexed(types) => {
                let code = types
                    .iter()
                    .position(|t| t == type_name)
                    .ok_or_else(|| Error::UnindexedType(type_name.to_owned()))?;
                (code as u8).write_wire(w)
            }
        }
    }

    pub fn read_type(&self, r: &mut dyn Read) -> Result<(String, u64)> {
        let (type_name, n) = match self {
            TypeCodec::Short => read_type_name(r)?,
            TypeCodec::Canonical => {
                let stamp = u32::read_wire(r)?;
                if stamp != STAMP {
                    return Err(Error::InvalidStamp(stamp));
                }
                let (type_name, n) = read_type_name(r)?;
                (type_name, 4 + n)
            }
            TypeCodec::Indexed(types) => {
                let code = u8::read_wire(r)?;
                let type_name = types
                    .get(usize::from(code))
                    .ok_or(Error::InvalidTypeCode(code))?;
                (type_name.clone(), 1)
            }
        };
        if type_name.is_empty() {
            return Err(Error::EmptyType);
        }
        Ok((type_name, n))
    }
}
