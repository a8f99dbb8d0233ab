use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Error, Result};
use crate::object::{Source, read_short};
use crate::objectify::json_key;
use crate::stamp;
use crate::wire::{self, Wire, Width};

/// Integer widths and signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl IntType {
    pub fn name(self) -> &'static str {
        match self {
            IntType::U8 => "u8",
            IntType::U16 => "u16",
            IntType::U32 => "u32",
            IntType::U64 => "u64",
            IntType::I8 => "i8",
            IntType::I16 => "i16",
            IntType::I32 => "i32",
            IntType::I64 => "i64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatType {
    F32,
    F64,
}

/// The encoded layout of a value, as seen by the adapter.
///
/// Every [`Objectify`](crate::Objectify) implementation reports its shape, so
/// encoded data can be described and decoded without the concrete Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Bool,
    Int(IntType),
    Float(FloatType),
    /// UTF-8 text behind a 32-bit length.
    Unicode,
    /// `(u32 length, payload)`; length 0 is absent.
    Optional(Box<Shape>),
    /// Fixed count of elements, no prefix.
    Array { len: usize, elem: Box<Shape> },
    /// u32 count followed by the elements.
    Sequence(Box<Shape>),
    /// Count of the given width; with `framed` each element sits behind a u32 length.
    List {
        width: Width,
        framed: bool,
        elem: Box<Shape>,
    },
    /// u32 count followed by u32-wrapped keys and values.
    Map { key: Box<Shape>, value: Box<Shape> },
    /// Named fields in declaration order.
    Record(IndexMap<String, Shape>),
    Tuple(Vec<Shape>),
    /// `string8(type) || payload`, empty type for nothing.
    Any,
    /// The payload of a registered object type.
    Object(String),
    /// The n-th enclosing record or tuple, 0 being the innermost.
    SelfRef(u32),
}

impl Shape {
    pub fn option(inner: Shape) -> Self {
        Shape::Optional(Box::new(inner))
    }

    pub fn array(len: usize, elem: Shape) -> Self {
        Shape::Array {
            len,
            elem: Box::new(elem),
        }
    }

    pub fn sequence(elem: Shape) -> Self {
        Shape::Sequence(Box::new(elem))
    }

    pub fn list(width: Width, framed: bool, elem: Shape) -> Self {
        Shape::List {
            width,
            framed,
            elem: Box::new(elem),
        }
    }

    pub fn map(key: Shape, value: Shape) -> Self {
        Shape::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn record(fields: impl IntoIterator<Item = (&'static str, Shape)>) -> Self {
        Shape::Record(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn tuple(elements: impl IntoIterator<Item = Shape>) -> Self {
        Shape::Tuple(elements.into_iter().collect())
    }

    pub fn object(type_name: impl Into<String>) -> Self {
        Shape::Object(type_name.into())
    }

    /// Decodes one value of this shape into JSON.
    ///
    /// Registered objects and type-erased values are resolved through the
    /// source's registry and rendered with their own JSON form.
    pub fn inspect(&self, src: &mut Source<'_>) -> Result<JsonValue> {
        let mut ancestors = Vec::new();
        self.inspect_in(src, &mut ancestors)
    }

    fn inspect_in<'s>(&'s self, src: &mut Source<'_>, ancestors: &mut Vec<&'s Shape>) -> Result<JsonValue> {
        Ok(match self {
            Shape::Bool => JsonValue::Bool(bool::read_wire(src)?),
            Shape::Int(t) => match t {
                IntType::U8 => u8::read_wire(src)?.into(),
                IntType::U16 => u16::read_wire(src)?.into(),
                IntType::U32 => u32::read_wire(src)?.into(),
                IntType::U64 => u64::read_wire(src)?.into(),
                IntType::I8 => i8::read_wire(src)?.into(),
                IntType::I16 => i16::read_wire(src)?.into(),
                IntType::I32 => i32::read_wire(src)?.into(),
                IntType::I64 => i64::read_wire(src)?.into(),
            },
            Shape::Float(t) => {
                let v = match t {
                    FloatType::F32 => f64::from(f32::read_wire(src)?),
                    FloatType::F64 => f64::read_wire(src)?,
                };
                finite_number(v)?
            }
            Shape::Unicode => JsonValue::String(String::from_utf8(wire::read_prefixed(src, Width::W32)?)?),
            Shape::Optional(inner) => {
                let payload = wire::read_prefixed(src, Width::W32)?;
                if payload.is_empty() {
                    JsonValue::Null
                } else {
                    src.nested(&payload, |sub| inner.inspect_in(sub, ancestors))?
                }
            }
            Shape::Array { len, elem } => {
                let items = (0..*len)
                    .map(|_| elem.inspect_in(src, ancestors))
                    .collect::<Result<Vec<_>>>()?;
                JsonValue::Array(items)
            }
            Shape::Sequence(elem) => {
                let count = u32::read_wire(src)?;
                let items = (0..count)
                    .map(|_| elem.inspect_in(src, ancestors))
                    .collect::<Result<Vec<_>>>()?;
                JsonValue::Array(items)
            }
            Shape::List { width, framed, elem } => {
                let count = width.read_len(src)?;
                let mut items = Vec::new();
                for _ in 0..count {
                    let item = if *framed {
                        let payload = wire::read_prefixed(src, Width::W32)?;
                        src.nested(&payload, |sub| elem.inspect_in(sub, ancestors))?
                    } else {
                        elem.inspect_in(src, ancestors)?
                    };
                    items.push(item);
                }
                JsonValue::Array(items)
            }
            Shape::Map { key, value } => {
                let count = u32::read_wire(src)?;
                let mut map = Map::new();
                for _ in 0..count {
                    let key_bytes = wire::read_prefixed(src, Width::W32)?;
                    let value_bytes = wire::read_prefixed(src, Width::W32)?;
                    let k = src.nested(&key_bytes, |sub| key.inspect_in(sub, ancestors))?;
                    let v = src.nested(&value_bytes, |sub| value.inspect_in(sub, ancestors))?;
                    map.insert(json_key(&k)?, v);
                }
                JsonValue::Object(map)
            }
            Shape::Record(fields) => {
                ancestors.push(self);
                let result = fields
                    .iter()
                    .map(|(name, shape)| Ok((name.clone(), shape.inspect_in(src, ancestors)?)))
                    .collect::<Result<Map<_, _>>>();
                ancestors.pop();
                JsonValue::Object(result?)
            }
            Shape::Tuple(elements) => {
                ancestors.push(self);
                let result = elements
                    .iter()
                    .map(|shape| shape.inspect_in(src, ancestors))
                    .collect::<Result<Vec<_>>>();
                ancestors.pop();
                JsonValue::Array(result?)
            }
            Shape::Any => {
                let (type_name, _) = stamp::read_type_name(src)?;
                if type_name.is_empty() {
                    JsonValue::Null
                } else {
                    let mut obj = src
                        .blueprints()
                        .instantiate(&type_name)
                        .ok_or_else(|| Error::BlueprintNotFound(type_name.clone()))?;
                    obj.read_from(src)?;
                    serde_json::json!({ "type": type_name, "object": obj.to_json()? })
                }
            }
            Shape::Object(type_name) if type_name.is_empty() => {
                return Err(Error::Unsupported("cannot inspect an untyped object".into()));
            }
            Shape::Object(type_name) => {
                let mut obj = src
                    .blueprints()
                    .instantiate(type_name)
                    .ok_or_else(|| Error::BlueprintNotFound(type_name.clone()))?;
                obj.read_from(src)?;
                obj.to_json()?
            }
            Shape::SelfRef(n) => {
                let target = ancestors
                    .len()
                    .checked_sub(*n as usize + 1)
                    .map(|i| ancestors[i])
                    .ok_or_else(|| Error::Unsupported(format!("self reference {n} has no target")))?;
                target.inspect_in(src, ancestors)?
            }
        })
    }
}

fn finite_number(v: f64) -> Result<JsonValue> {
    Number::from_f64(v)
        .map(JsonValue::Number)
        .ok_or_else(|| Error::Unsupported(format!("non-finite float {v} has no json form")))
}

/// Decodes a short-form object (`string8(type) || payload`) into its JSON envelope.
pub fn inspect_short(src: &mut Source<'_>) -> Result<JsonValue> {
    let (obj, _) = read_short(src)?;
    crate::json::envelope(obj.as_ref())
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Bool => f.write_str("bool"),
            Shape::Int(t) => f.write_str(t.name()),
            Shape::Float(FloatType::F32) => f.write_str("f32"),
            Shape::Float(FloatType::F64) => f.write_str("f64"),
            Shape::Unicode => f.write_str("string"),
            Shape::Optional(inner) => write!(f, "option<{inner}>"),
            Shape::Array { len, elem } => write!(f, "[{elem}; {len}]"),
            Shape::Sequence(elem) => write!(f, "sequence<{elem}>"),
            Shape::List { width, framed, elem } => {
                let kind = if *framed { "slice" } else { "array" };
                write!(f, "{kind}{}<{elem}>", width.bits())
            }
            Shape::Map { key, value } => write!(f, "map<{key}, {value}>"),
            Shape::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {name}: {shape}")?;
                }
                f.write_str(if fields.is_empty() { "}" } else { " }" })
            }
            Shape::Tuple(elements) => {
                f.write_str("(")?;
                for (i, shape) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{shape}")?;
                }
                f.write_str(")")
            }
            Shape::Any => f.write_str("any"),
            Shape::Object(name) if name.is_empty() => f.write_str("object"),
            Shape::Object(name) => write!(f, "object({name})"),
            Shape::SelfRef(n) => write!(f, "self({n})"),
        }
    }
}
