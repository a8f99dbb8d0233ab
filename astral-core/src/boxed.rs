use std::io::Write;

use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::Result;
use crate::object::{Object, Source};
use crate::objectify::Objectify;
use crate::shape::Shape;
use crate::wire::{self, Width};

/// Exactly one object behind a 32-bit length, so its payload need not be self-delimiting.
///
/// An empty payload decodes to `T::default()`; for `Boxed<Option<T>>` that is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Boxed<T>(pub T);

impl<T> Boxed<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Object + Clone + Default> Object for Boxed<T> {
    fn object_type(&self) -> &str {
        ""
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        let mut payload = Vec::new();
        self.0.write_to(&mut payload)?;
        wire::write_prefixed(w, Width::W32, &payload)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let payload = wire::read_prefixed(src, Width::W32)?;
        let mut value = T::default();
        if !payload.is_empty() {
            src.nested(&payload, |sub| value.read_from(sub))?;
        }
        self.0 = value;
        Ok(4 + payload.len() as u64)
    }

    fn to_json(&self) -> Result<JsonValue> {
        self.0.to_json()
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        let mut fresh = T::default();
        fresh.from_json(value, blueprints)?;
        self.0 = fresh;
        Ok(())
    }
}

impl<T: Object + Clone + Default> Objectify for Boxed<T> {
    fn shape() -> Shape {
        Shape::option(Shape::object(T::default().object_type()))
    }

    fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
        self.write_to(w)
    }

    fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
        self.read_from(src)
    }

    fn json_value(&self) -> Result<JsonValue> {
        self.to_json()
    }

    fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        self.from_json(value, blueprints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ints::Uint16;
    use crate::strings::String8;

    fn read_back<T: Object + Clone + Default>(data: &[u8]) -> Boxed<T> {
        let bp = Blueprints::new();
        let mut out = Boxed::<T>::default();
        bp.read_payload(&mut out, data).unwrap();
        out
    }

    #[test]
    fn layout_is_length_then_payload() {
        let mut buf = Vec::new();
        assert_eq!(Boxed(Uint16(9)).write_to(&mut buf).unwrap(), 6);
        assert_eq!(buf, [0, 0, 0, 2, 0, 9]);
        assert_eq!(read_back::<Uint16>(&buf), Boxed(Uint16(9)));
    }

    #[test]
    fn empty_box_decodes_to_none() {
        let mut buf = Vec::new();
        Boxed(None::<String8>).write_to(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0]);
        assert_eq!(read_back::<Option<String8>>(&buf), Boxed(None));
    }

    #[test]
    fn present_optional_is_reinstantiated() {
        let mut buf = Vec::new();
        Boxed(Some(String8::from("x"))).write_to(&mut buf).unwrap();
        assert_eq!(read_back::<Option<String8>>(&buf).0, Some(String8::from("x")));
    }

    #[test]
    fn shape_matches_optional_layout() {
        assert_eq!(
            <Boxed<Uint16> as Objectify>::shape(),
            Shape::option(Shape::object("uint16"))
        );
    }
}
