use std::any::Any;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::stamp::{self, ObjectHeader, STAMP};

/// A value that can be written to and read from the astral binary encoding.
///
/// Implementors report a type name, which is empty for anonymous wrappers and
/// non-empty for types that can be registered in [`Blueprints`]. The JSON and
/// text renderings are optional capabilities; the defaults report
/// [`Error::Unsupported`].
///
/// Objects must also be `Clone` so that registries can hand out fresh copies
/// of a prototype.
pub trait Object: AsAny + CloneObject + fmt::Debug {
    fn object_type(&self) -> &str;

    /// Writes the payload and returns the number of bytes written.
    fn write_to(&self, w: &mut dyn Write) -> Result<u64>;

    /// Reads the payload in place and returns the number of bytes read.
    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64>;

    /// True for an absent value hiding behind a typed handle, such as `None::<T>`.
    fn is_nil(&self) -> bool {
        false
    }

    fn to_json(&self) -> Result<JsonValue> {
        Err(unsupported(self.object_type(), "json"))
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        let _ = (value, blueprints);
        Err(unsupported(self.object_type(), "json"))
    }

    fn to_text(&self) -> Result<String> {
        Err(unsupported(self.object_type(), "text"))
    }

    fn from_text(&mut self, text: &str) -> Result<()> {
        let _ = text;
        Err(unsupported(self.object_type(), "text"))
    }
}

fn unsupported(type_name: &str, form: &str) -> Error {
    let type_name = if type_name.is_empty() { "untyped object" } else { type_name };
    Error::Unsupported(format!("{type_name} has no {form} form"))
}

/// Upcasts to [`Any`] for downcasting trait objects back to concrete types.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub trait CloneObject {
    fn clone_object(&self) -> Box<dyn Object>;
}

impl<T: Object + Clone> CloneObject for T {
    fn clone_object(&self) -> Box<dyn Object> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Object> {
    fn clone(&self) -> Self {
        CloneObject::clone_object(&**self)
    }
}

impl dyn Object {
    pub fn is<T: Object>(&self) -> bool {
        AsAny::as_any(self).is::<T>()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref()
    }

    pub fn downcast_mut<T: Object>(&mut self) -> Option<&mut T> {
        AsAny::as_any_mut(self).downcast_mut()
    }

    pub fn downcast<T: Object>(self: Box<Self>) -> Option<Box<T>> {
        AsAny::into_any(self).downcast().ok()
    }

    pub fn downcast_arc<T: Object>(self: Arc<Self>) -> Option<Arc<T>> {
        AsAny::into_any_arc(self).downcast().ok()
    }
}

/// A typed handle that may be empty. `None` reports an empty type and is nil.
impl<T: Object + Clone + Default> Object for Option<T> {
    fn object_type(&self) -> &str {
        self.as_ref().map_or("", |v| v.object_type())
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        match self {
            Some(v) => v.write_to(w),
            None => Ok(0),
        }
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let mut v = T::default();
        let n = v.read_from(src)?;
        *self = Some(v);
        Ok(n)
    }

    fn is_nil(&self) -> bool {
        self.as_ref().is_none_or(|v| v.is_nil())
    }

    fn to_json(&self) -> Result<JsonValue> {
        match self {
            Some(v) => v.to_json(),
            None => Ok(JsonValue::Null),
        }
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut v = T::default();
        v.from_json(value, blueprints)?;
        *self = Some(v);
        Ok(())
    }

    fn to_text(&self) -> Result<String> {
        self.as_ref().map_or(Ok(String::new()), |v| v.to_text())
    }

    fn from_text(&mut self, text: &str) -> Result<()> {
        let mut v = T::default();
        v.from_text(text)?;
        *self = Some(v);
        Ok(())
    }
}

/// A byte source paired with the registry used to resolve type-erased values.
pub struct Source<'a> {
    reader: &'a mut dyn Read,
    blueprints: &'a Blueprints,
}

impl<'a> Source<'a> {
    pub fn new(reader: &'a mut dyn Read, blueprints: &'a Blueprints) -> Self {
        Self { reader, blueprints }
    }

    pub fn blueprints(&self) -> &'a Blueprints {
        self.blueprints
    }

    /// Runs `f` over an in-memory payload and requires it to consume every byte.
    pub fn nested<T>(
        &self,
        payload: &[u8],
        f: impl FnOnce(&mut Source<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut cursor = payload;
        let out = f(&mut Source::new(&mut cursor, self.blueprints))?;
        if !cursor.is_empty() {
            return Err(Error::TrailingData(cursor.len() as u64));
        }
        Ok(out)
    }
}

impl Read for Source<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").finish_non_exhaustive()
    }
}

/// Writes the short form: `string8(type) || payload`.
pub fn write_short(w: &mut dyn Write, obj: &dyn Object) -> Result<u64> {
    let type_name = obj.object_type();
    if type_name.is_empty() {
        return Err(Error::EmptyType);
    }
    let n = stamp::write_type_name(w, type_name)?;
    Ok(n + obj.write_to(w)?)
}

/// Reads a short-form object, resolving its type through the source's registry.
pub fn read_short(src: &mut Source<'_>) -> Result<(Box<dyn Object>, u64)> {
    let (type_name, n) = stamp::read_type_name(src)?;
    if type_name.is_empty() {
        return Err(Error::EmptyType);
    }
    let mut obj = src
        .blueprints()
        .instantiate(&type_name)
        .ok_or(Error::BlueprintNotFound(type_name))?;
    let m = obj.read_from(src)?;
    Ok((obj, n + m))
}

/// Packs an object in short form into a fresh buffer.
pub fn pack(obj: &dyn Object) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_short(&mut buf, obj)?;
    Ok(buf)
}

/// Writes the canonical form: the object header (when typed) followed by the payload.
pub fn write_canonical(w: &mut dyn Write, obj: &dyn Object) -> Result<u64> {
    let mut n = 0;
    if !obj.object_type().is_empty() {
        n += ObjectHeader::new(obj.object_type()).write_to(w)?;
    }
    Ok(n + obj.write_to(w)?)
}

/// Splits canonical bytes into the type name and the payload.
///
/// Data that does not start with the stamp is returned untouched with an empty type.
pub fn open_canonical(data: &[u8]) -> Result<(String, &[u8])> {
    if data.len() < 4 || data[..4] != STAMP.to_be_bytes() {
        return Ok((String::new(), data));
    }
    let mut cursor = &data[4..];
    let (type_name, _) = stamp::read_type_name(&mut cursor)?;
    Ok((type_name, cursor))
}
