//! The generic adapter: binary and JSON codecs for ordinary Rust values.
//!
//! [`Objectify`] is implemented for primitives, strings, optionals, boxes,
//! fixed arrays, vectors and maps, and is derived for records with
//! `#[derive(Objectify)]`. [`Objectified`] turns any such value into an
//! [`Object`]; [`AnyObject`] and [`AnyOf`] hold type-erased values that are
//! recovered through the registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::io::Write;
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Number, Value as JsonValue};

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source, pack};
use crate::shape::{FloatType, IntType, Shape};
use crate::stamp;
use crate::wire::{self, Wire, Width};

/// Upper bound on speculative allocation for decoded element counts.
const PREALLOC_ITEMS: usize = 1024;

/// Binary and JSON codec for a value of a known shape.
///
/// The `*_value` methods encode the value as a field of an enclosing value.
/// The `*_root` methods encode it as the top-level payload of an object and
/// default to the `*_value` methods. They differ only for records marked
/// `#[astral(opaque)]`, which defer to their own [`Object`] implementation
/// when nested but still walk their fields at the root.
pub trait Objectify {
    fn shape() -> Shape
    where
        Self: Sized;

    /// The registered type name, or empty for anonymous values.
    fn type_name(&self) -> &str {
        ""
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64>;

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64>;

    fn json_value(&self) -> Result<JsonValue>;

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()>;

    fn write_root(&self, w: &mut dyn Write) -> Result<u64> {
        self.write_value(w)
    }

    fn read_root(&mut self, src: &mut Source<'_>) -> Result<u64> {
        self.read_value(src)
    }

    fn json_root(&self) -> Result<JsonValue> {
        self.json_value()
    }

    fn set_json_root(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        self.set_json_value(value, blueprints)
    }
}

/// Implements [`Objectify`] for a leaf type by deferring to its [`Object`] impl.
macro_rules! objectify_via_object {
    ($ty:ty, $type_name:expr) => {
        impl $crate::objectify::Objectify for $ty {
            fn shape() -> $crate::shape::Shape {
                $crate::shape::Shape::object($type_name)
            }

            fn type_name(&self) -> &str {
                $crate::object::Object::object_type(self)
            }

            fn write_value(&self, w: &mut dyn ::std::io::Write) -> $crate::error::Result<u64> {
                $crate::object::Object::write_to(self, w)
            }

            fn read_value(
                &mut self,
                src: &mut $crate::object::Source<'_>,
            ) -> $crate::error::Result<u64> {
                $crate::object::Object::read_from(self, src)
            }

            fn json_value(&self) -> $crate::error::Result<::serde_json::Value> {
                $crate::object::Object::to_json(self)
            }

            fn set_json_value(
                &mut self,
                value: &::serde_json::Value,
                blueprints: &$crate::blueprints::Blueprints,
            ) -> $crate::error::Result<()> {
                $crate::object::Object::from_json(self, value, blueprints)
            }
        }
    };
}

pub(crate) use objectify_via_object;

fn deserialize_json<T: for<'de> Deserialize<'de>>(value: &JsonValue, what: &str) -> Result<T> {
    T::deserialize(value).map_err(|e| Error::InvalidJson(format!("{what}: {e}")))
}

macro_rules! objectify_int {
    ($($t:ty => $it:ident),* $(,)?) => {$(
        impl Objectify for $t {
            fn shape() -> Shape {
                Shape::Int(IntType::$it)
            }

            fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
                self.write_wire(w)
            }

            fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
                *self = <$t>::read_wire(src)?;
                Ok(<$t as Wire>::SIZE)
            }

            fn json_value(&self) -> Result<JsonValue> {
                Ok(JsonValue::from(*self))
            }

            fn set_json_value(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
                *self = deserialize_json(value, stringify!($t))?;
                Ok(())
            }
        }
    )*};
}

objectify_int!(
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
);

macro_rules! objectify_float {
    ($($t:ty => $ft:ident),* $(,)?) => {$(
        impl Objectify for $t {
            fn shape() -> Shape {
                Shape::Float(FloatType::$ft)
            }

            fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
                self.write_wire(w)
            }

            fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
                *self = <$t>::read_wire(src)?;
                Ok(<$t as Wire>::SIZE)
            }

            fn json_value(&self) -> Result<JsonValue> {
                Number::from_f64(f64::from(*self))
                    .map(JsonValue::Number)
                    .ok_or_else(|| Error::Unsupported(format!("non-finite float {self} has no json form")))
            }

            fn set_json_value(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
                *self = deserialize_json(value, stringify!($t))?;
                Ok(())
            }
        }
    )*};
}

objectify_float!(f32 => F32, f64 => F64);

impl Objectify for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        self.write_wire(w)
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        *self = bool::read_wire(src)?;
        Ok(1)
    }

    fn json_value(&self) -> Result<JsonValue> {
        Ok(JsonValue::Bool(*self))
    }

    fn set_json_value(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        *self = deserialize_json(value, "bool")?;
        Ok(())
    }
}

// Platform-sized integers always travel as 64 bits.
macro_rules! objectify_size {
    ($($t:ty as $wide:ty => $it:ident),* $(,)?) => {$(
        impl Objectify for $t {
            fn shape() -> Shape {
                Shape::Int(IntType::$it)
            }

            fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
                (*self as $wide).write_wire(w)
            }

            fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
                let wide = <$wide>::read_wire(src)?;
                *self = <$t>::try_from(wide).map_err(|_| {
                    Error::Unsupported(format!("{wide} does not fit {}", stringify!($t)))
                })?;
                Ok(8)
            }

            fn json_value(&self) -> Result<JsonValue> {
                Ok(JsonValue::from(*self))
            }

            fn set_json_value(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
                *self = deserialize_json(value, stringify!($t))?;
                Ok(())
            }
        }
    )*};
}

objectify_size!(usize as u64 => U64, isize as i64 => I64);

impl Objectify for String {
    fn shape() -> Shape {
        Shape::Unicode
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        wire::write_prefixed(w, Width::W32, self.as_bytes())
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let bytes = wire::read_prefixed(src, Width::W32)?;
        let n = 4 + bytes.len() as u64;
        *self = String::from_utf8(bytes)?;
        Ok(n)
    }

    fn json_value(&self) -> Result<JsonValue> {
        Ok(JsonValue::String(self.clone()))
    }

    fn set_json_value(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        *self = deserialize_json(value, "string")?;
        Ok(())
    }
}

/// Encodes `value` into a buffer and writes it behind a u32 length.
fn write_wrapped(w: &mut dyn Write, encode: impl FnOnce(&mut Vec<u8>) -> Result<u64>) -> Result<u64> {
    let mut buf = Vec::new();
    encode(&mut buf)?;
    wire::write_prefixed(w, Width::W32, &buf)
}

impl<T: Objectify + Default> Objectify for Option<T> {
    fn shape() -> Shape {
        Shape::option(T::shape())
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        match self {
            None => 0u32.write_wire(w),
            Some(v) => write_wrapped(w, |buf| v.write_value(buf)),
        }
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let payload = wire::read_prefixed(src, Width::W32)?;
        if payload.is_empty() {
            *self = None;
        } else {
            let mut v = T::default();
            src.nested(&payload, |sub| v.read_value(sub))?;
            *self = Some(v);
        }
        Ok(4 + payload.len() as u64)
    }

    fn json_value(&self) -> Result<JsonValue> {
        match self {
            None => Ok(JsonValue::Null),
            Some(v) => v.json_value(),
        }
    }

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        if value.is_null() {
            *self = None;
        } else {
            let mut v = T::default();
            v.set_json_value(value, blueprints)?;
            *self = Some(v);
        }
        Ok(())
    }
}

impl<T: Objectify> Objectify for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }

    fn type_name(&self) -> &str {
        (**self).type_name()
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        (**self).write_value(w)
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        (**self).read_value(src)
    }

    fn json_value(&self) -> Result<JsonValue> {
        (**self).json_value()
    }

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        (**self).set_json_value(value, blueprints)
    }
}

fn json_array<'v>(value: &'v JsonValue, what: &str) -> Result<Option<&'v Vec<JsonValue>>> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Array(items) => Ok(Some(items)),
        other => Err(Error::InvalidJson(format!("{what} expects an array, got {other}"))),
    }
}

impl<T: Objectify + Default> Objectify for Vec<T> {
    fn shape() -> Shape {
        Shape::sequence(T::shape())
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        let mut n = Width::W32.write_len(w, self.len() as u64)?;
        for item in self {
            n += item.write_value(w)?;
        }
        Ok(n)
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let count = u32::read_wire(src)?;
        let mut n = 4;
        let mut items = Vec::with_capacity((count as usize).min(PREALLOC_ITEMS));
        for _ in 0..count {
            let mut item = T::default();
            n += item.read_value(src)?;
            items.push(item);
        }
        *self = items;
        Ok(n)
    }

    fn json_value(&self) -> Result<JsonValue> {
        self.iter().map(|item| item.json_value()).collect::<Result<Vec<_>>>().map(JsonValue::Array)
    }

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        let Some(values) = json_array(value, "sequence")? else {
            self.clear();
            return Ok(());
        };
        let mut items = Vec::with_capacity(values.len());
        for v in values {
            let mut item = T::default();
            item.set_json_value(v, blueprints)?;
            items.push(item);
        }
        *self = items;
        Ok(())
    }
}

impl<T: Objectify, const N: usize> Objectify for [T; N] {
    fn shape() -> Shape {
        Shape::array(N, T::shape())
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        let mut n = 0;
        for item in self {
            n += item.write_value(w)?;
        }
        Ok(n)
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let mut n = 0;
        for item in self.iter_mut() {
            n += item.read_value(src)?;
        }
        Ok(n)
    }

    fn json_value(&self) -> Result<JsonValue> {
        self.iter().map(|item| item.json_value()).collect::<Result<Vec<_>>>().map(JsonValue::Array)
    }

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        let Some(values) = json_array(value, "array")? else {
            return Ok(());
        };
        if values.len() != N {
            return Err(Error::InvalidJson(format!(
                "expected {N} array elements, got {}",
                values.len()
            )));
        }
        for (item, v) in self.iter_mut().zip(values) {
            item.set_json_value(v, blueprints)?;
        }
        Ok(())
    }
}

/// Renders a JSON scalar as an object key.
pub(crate) fn json_key(value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        other => Err(Error::Unsupported(format!("map key {other} has no text form"))),
    }
}

fn key_from_json<K: Objectify + Default>(text: &str, blueprints: &Blueprints) -> Result<K> {
    let mut key = K::default();
    if key
        .set_json_value(&JsonValue::String(text.to_owned()), blueprints)
        .is_ok()
    {
        return Ok(key);
    }
    let parsed: JsonValue = serde_json::from_str(text)
        .map_err(|_| Error::InvalidJson(format!("map key {text:?} does not match the key type")))?;
    key.set_json_value(&parsed, blueprints)?;
    Ok(key)
}

fn write_map<'a, K, V>(
    w: &mut dyn Write,
    entries: impl ExactSizeIterator<Item = (&'a K, &'a V)>,
    sorted: bool,
) -> Result<u64>
where
    K: Objectify + 'a,
    V: Objectify + 'a,
{
    let mut encoded = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key = Vec::new();
        k.write_value(&mut key)?;
        let mut value = Vec::new();
        v.write_value(&mut value)?;
        encoded.push((key, value));
    }
    if sorted {
        encoded.sort();
    }
    let mut n = Width::W32.write_len(w, encoded.len() as u64)?;
    for (key, value) in &encoded {
        n += wire::write_prefixed(w, Width::W32, key)?;
        n += wire::write_prefixed(w, Width::W32, value)?;
    }
    Ok(n)
}

fn read_map<K, V>(src: &mut Source<'_>, mut insert: impl FnMut(K, V)) -> Result<u64>
where
    K: Objectify + Default,
    V: Objectify + Default,
{
    let count = u32::read_wire(src)?;
    let mut n = 4;
    for _ in 0..count {
        let key_bytes = wire::read_prefixed(src, Width::W32)?;
        let value_bytes = wire::read_prefixed(src, Width::W32)?;
        n += 8 + (key_bytes.len() + value_bytes.len()) as u64;

        let mut key = K::default();
        src.nested(&key_bytes, |sub| key.read_value(sub))?;
        let mut value = V::default();
        match src.nested(&value_bytes, |sub| value.read_value(sub)) {
            Ok(_) => insert(key, value),
            Err(Error::BlueprintNotFound(type_name)) => {
                log::debug!("skipping map entry holding unregistered type {type_name}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

fn map_json<'a, K, V>(entries: impl Iterator<Item = (&'a K, &'a V)>) -> Result<JsonValue>
where
    K: Objectify + 'a,
    V: Objectify + 'a,
{
    let mut map = Map::new();
    for (k, v) in entries {
        map.insert(json_key(&k.json_value()?)?, v.json_value()?);
    }
    Ok(JsonValue::Object(map))
}

fn set_map_json<K, V>(
    value: &JsonValue,
    blueprints: &Blueprints,
    mut insert: impl FnMut(K, V),
) -> Result<()>
where
    K: Objectify + Default,
    V: Objectify + Default,
{
    let entries = match value {
        JsonValue::Null => return Ok(()),
        JsonValue::Object(entries) => entries,
        other => return Err(Error::InvalidJson(format!("map expects an object, got {other}"))),
    };
    for (k, v) in entries {
        let key = key_from_json(k, blueprints)?;
        let mut value = V::default();
        value.set_json_value(v, blueprints)?;
        insert(key, value);
    }
    Ok(())
}

macro_rules! objectify_map {
    ($map:ident, [$($bound:tt)*], $sorted:expr, $with_capacity:expr) => {
        impl<K, V> Objectify for $map<K, V>
        where
            K: Objectify + Default + $($bound)*,
            V: Objectify + Default,
        {
            fn shape() -> Shape {
                Shape::map(K::shape(), V::shape())
            }

            fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
                write_map(w, self.iter(), $sorted)
            }

            fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
                let mut map = $with_capacity;
                let n = read_map(src, |k, v| {
                    map.insert(k, v);
                })?;
                *self = map;
                Ok(n)
            }

            fn json_value(&self) -> Result<JsonValue> {
                map_json(self.iter())
            }

            fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
                let mut map = $with_capacity;
                set_map_json(value, blueprints, |k, v| {
                    map.insert(k, v);
                })?;
                *self = map;
                Ok(())
            }
        }
    };
}

objectify_map!(HashMap, [Eq + Hash], true, HashMap::new());
objectify_map!(BTreeMap, [Ord], false, BTreeMap::new());
objectify_map!(IndexMap, [Eq + Hash], false, IndexMap::new());

/// The [`Object`] view of any [`Objectify`] value.
///
/// Writing and reading always walk the value itself, so a record marked
/// `#[astral(opaque)]` still encodes its fields here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objectified<T>(pub T);

impl<T> Objectified<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Objectify> Objectified<T> {
    pub fn shape() -> Shape {
        T::shape()
    }
}

impl<T> Deref for Objectified<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Objectified<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> Object for Objectified<T>
where
    T: Objectify + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn object_type(&self) -> &str {
        self.0.type_name()
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        self.0.write_root(w)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        self.0.read_root(src)
    }

    fn to_json(&self) -> Result<JsonValue> {
        self.0.json_root()
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        self.0.set_json_root(value, blueprints)
    }
}

fn write_erased(w: &mut dyn Write, obj: Option<&dyn Object>) -> Result<u64> {
    let Some(obj) = obj.filter(|o| !o.is_nil()) else {
        return stamp::write_type_name(w, "");
    };
    let type_name = obj.object_type();
    if type_name.is_empty() {
        return Err(Error::Unsupported(format!(
            "type-erased field cannot hold untyped {obj:?}"
        )));
    }
    let n = stamp::write_type_name(w, type_name)?;
    Ok(n + obj.write_to(w)?)
}

fn read_erased(src: &mut Source<'_>) -> Result<(Option<Box<dyn Object>>, u64)> {
    let (type_name, n) = stamp::read_type_name(src)?;
    if type_name.is_empty() {
        return Ok((None, n));
    }
    let mut obj = src
        .blueprints()
        .instantiate(&type_name)
        .ok_or(Error::BlueprintNotFound(type_name))?;
    let m = obj.read_from(src)?;
    Ok((Some(obj), n + m))
}

fn erased_json(obj: Option<&dyn Object>) -> Result<JsonValue> {
    match obj.filter(|o| !o.is_nil()) {
        None => Ok(JsonValue::Null),
        Some(obj) => crate::json::envelope(obj),
    }
}

fn set_erased_json(value: &JsonValue, blueprints: &Blueprints) -> Result<Option<Box<dyn Object>>> {
    if value.is_null() {
        return Ok(None);
    }
    crate::json::open_envelope(value, blueprints).map(Some)
}

/// A type-erased field: `string8(type) || payload`, or an empty type for nothing.
///
/// A present-but-nil value (such as `None::<T>` boxed as an object) encodes
/// exactly like an absent one.
#[derive(Debug, Clone, Default)]
pub struct AnyObject(pub Option<Box<dyn Object>>);

impl AnyObject {
    pub fn new(obj: impl Object) -> Self {
        Self(Some(Box::new(obj)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&dyn Object> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.get()?.downcast_ref()
    }

    pub fn take(&mut self) -> Option<Box<dyn Object>> {
        self.0.take()
    }

    pub fn into_inner(self) -> Option<Box<dyn Object>> {
        self.0
    }
}

impl From<Box<dyn Object>> for AnyObject {
    fn from(obj: Box<dyn Object>) -> Self {
        Self(Some(obj))
    }
}

impl PartialEq for AnyObject {
    fn eq(&self, other: &Self) -> bool {
        fn present(a: &AnyObject) -> Option<&dyn Object> {
            a.get().filter(|o| !o.is_nil())
        }
        match (present(self), present(other)) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.object_type() == b.object_type()
                    && matches!((pack(a), pack(b)), (Ok(x), Ok(y)) if x == y)
            }
            _ => false,
        }
    }
}

impl Objectify for AnyObject {
    fn shape() -> Shape {
        Shape::Any
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        write_erased(w, self.get())
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let (obj, n) = read_erased(src)?;
        self.0 = obj;
        Ok(n)
    }

    fn json_value(&self) -> Result<JsonValue> {
        erased_json(self.get())
    }

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        self.0 = set_erased_json(value, blueprints)?;
        Ok(())
    }
}

/// A type-erased field constrained to one concrete object type.
///
/// The wire form matches [`AnyObject`]; decoding a registered type other than
/// `T` is a [`Error::TypeMismatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnyOf<T>(pub Option<T>);

impl<T> AnyOf<T> {
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl<T> Default for AnyOf<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: Object> AnyOf<T> {
    fn accept(obj: Box<dyn Object>) -> Result<T> {
        let found = obj.object_type().to_owned();
        obj.downcast::<T>()
            .map(|v| *v)
            .ok_or_else(|| Error::TypeMismatch {
                expected: std::any::type_name::<T>().to_owned(),
                found,
            })
    }
}

impl<T: Object> Objectify for AnyOf<T> {
    fn shape() -> Shape {
        Shape::Any
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        write_erased(w, self.0.as_ref().map(|v| v as &dyn Object))
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let (obj, n) = read_erased(src)?;
        self.0 = obj.map(Self::accept).transpose()?;
        Ok(n)
    }

    fn json_value(&self) -> Result<JsonValue> {
        erased_json(self.0.as_ref().map(|v| v as &dyn Object))
    }

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        self.0 = set_erased_json(value, blueprints)?
            .map(Self::accept)
            .transpose()?;
        Ok(())
    }
}

/// Encodes a value the way its [`Objectified`] view would.
pub fn encode<T: Objectify>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    value.write_root(&mut buf)?;
    Ok(buf)
}

/// Decodes a value from a complete payload.
pub fn decode<T: Objectify + Default>(data: &[u8], blueprints: &Blueprints) -> Result<T> {
    let mut value = T::default();
    let mut cursor = data;
    value.read_root(&mut Source::new(&mut cursor, blueprints))?;
    if !cursor.is_empty() {
        return Err(Error::TrailingData(cursor.len() as u64));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ints::{Bool, Int32};
    use crate::strings::String8;

    fn round_trip<T: Objectify + Default>(value: &T) -> T {
        let bytes = encode(value).unwrap();
        decode(&bytes, &Blueprints::with_builtins()).unwrap()
    }

    #[test]
    fn option_layout() {
        assert_eq!(encode(&None::<u16>).unwrap(), [0, 0, 0, 0]);
        assert_eq!(encode(&Some(7u16)).unwrap(), [0, 0, 0, 2, 0, 7]);
        assert_eq!(round_trip(&Some(7u16)), Some(7));
        assert_eq!(round_trip(&None::<u16>), None);
    }

    #[test]
    fn vec_and_array_layout() {
        assert_eq!(encode(&vec![1u8, 2]).unwrap(), [0, 0, 0, 2, 1, 2]);
        assert_eq!(encode(&[1u8, 2, 3]).unwrap(), [1, 2, 3]);
        assert_eq!(round_trip(&[4i16, -4]), [4, -4]);
        assert_eq!(round_trip(&Vec::<u32>::new()), Vec::<u32>::new());
    }

    #[test]
    fn string_uses_32_bit_prefix() {
        assert_eq!(encode(&"ab".to_string()).unwrap(), [0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn usize_travels_as_u64() {
        assert_eq!(encode(&5usize).unwrap(), 5u64.to_be_bytes());
        assert_eq!(round_trip(&-5isize), -5);
    }

    #[test]
    fn hash_map_bytes_are_order_independent() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..32u32 {
            a.insert(i, i.to_string());
        }
        for i in (0..32u32).rev() {
            b.insert(i, i.to_string());
        }
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
        assert_eq!(round_trip(&a), a);
    }

    #[test]
    fn map_entries_are_length_wrapped() {
        let map = BTreeMap::from([(1u8, true)]);
        assert_eq!(encode(&map).unwrap(), [0, 0, 0, 1, 0, 0, 0, 1, 1, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn map_skips_unregistered_values() {
        let mut map = IndexMap::new();
        map.insert("known".to_string(), AnyObject::new(Bool(true)));
        map.insert("unknown".to_string(), AnyObject::new(Int32(1)));
        let bytes = encode(&map).unwrap();

        let bp = Blueprints::new();
        bp.add_type::<Bool>().unwrap();
        let back: IndexMap<String, AnyObject> = decode(&bytes, &bp).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back["known"].downcast_ref::<Bool>(), Some(&Bool(true)));
    }

    #[test]
    fn map_json_keys_are_text() {
        let map = BTreeMap::from([(3u8, "x".to_string())]);
        let json = map.json_value().unwrap();
        assert_eq!(json, serde_json::json!({ "3": "x" }));

        let mut back = BTreeMap::<u8, String>::new();
        back.set_json_value(&json, &Blueprints::new()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn non_text_map_key_is_unsupported() {
        let map = BTreeMap::from([(vec![1u8], 1u8)]);
        assert!(matches!(map.json_value(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn non_finite_float_json_is_unsupported() {
        assert!(matches!(f32::INFINITY.json_value(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn any_object_layouts() {
        assert_eq!(encode(&AnyObject::none()).unwrap(), [0]);
        assert_eq!(
            encode(&AnyObject::new(Bool(true))).unwrap(),
            b"\x04bool\x01"
        );
        assert_eq!(encode(&AnyObject::new(None::<Bool>)).unwrap(), [0]);
    }

    #[test]
    fn any_object_round_trip() {
        let value = AnyObject::new(String8::from("hi"));
        assert_eq!(round_trip(&value), value);
        assert!(round_trip(&AnyObject::none()).is_none());
    }

    #[test]
    fn any_object_equality() {
        assert_eq!(AnyObject::none(), AnyObject::new(None::<Bool>));
        assert_eq!(AnyObject::new(Bool(true)), AnyObject::new(Bool(true)));
        assert_ne!(AnyObject::new(Bool(true)), AnyObject::new(Bool(false)));
        assert_ne!(AnyObject::new(Bool(true)), AnyObject::none());
        assert_ne!(
            AnyObject::new(crate::ints::Uint8(1)),
            AnyObject::new(crate::ints::Int8(1))
        );
    }

    #[test]
    fn any_object_unregistered_type() {
        let bytes = encode(&AnyObject::new(Bool(true))).unwrap();
        let err = decode::<AnyObject>(&bytes, &Blueprints::new()).unwrap_err();
        assert!(matches!(err, Error::BlueprintNotFound(t) if t == "bool"));
    }

    #[test]
    fn any_object_rejects_untyped() {
        let value = AnyObject::new(Objectified(1u8));
        assert!(matches!(encode(&value), Err(Error::Unsupported(_))));
    }

    #[test]
    fn any_of_checks_type() {
        let bytes = encode(&AnyObject::new(Bool(true))).unwrap();
        let bp = Blueprints::with_builtins();
        let ok: AnyOf<Bool> = decode(&bytes, &bp).unwrap();
        assert_eq!(ok.get(), Some(&Bool(true)));

        let err = decode::<AnyOf<Int32>>(&bytes, &bp).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { found, .. } if found == "bool"));
    }

    #[test]
    fn any_object_json_envelope() {
        let value = AnyObject::new(Int32(-1));
        let json = value.json_value().unwrap();
        assert_eq!(json, serde_json::json!({ "type": "int32", "object": -1 }));

        let mut back = AnyObject::none();
        back.set_json_value(&json, &Blueprints::with_builtins()).unwrap();
        assert_eq!(back, value);

        back.set_json_value(&JsonValue::Null, &Blueprints::new()).unwrap();
        assert!(back.is_none());
    }

    #[test]
    fn objectified_is_untyped_object() {
        let obj = Objectified(vec![true, false]);
        assert_eq!(obj.object_type(), "");
        let mut buf = Vec::new();
        obj.write_to(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 2, 1, 0]);
        assert_eq!(Objectified::<Vec<bool>>::shape(), Shape::sequence(Shape::Bool));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let err = decode::<u8>(&[1, 2], &Blueprints::new()).unwrap_err();
        assert!(matches!(err, Error::TrailingData(1)));
    }
}
