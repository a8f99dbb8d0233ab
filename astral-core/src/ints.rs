//! Registered numeric and boolean objects.

use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::objectify::{objectify_via_object, Objectify};
use crate::wire::Wire;

macro_rules! number_object {
    ($(#[$meta:meta])* $name:ident($inner:ty) => $type_name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl Object for $name {
            fn object_type(&self) -> &str {
                $type_name
            }

            fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
                self.0.write_wire(w)
            }

            fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
                self.0 = <$inner>::read_wire(src)?;
                Ok(<$inner as Wire>::SIZE)
            }

            fn to_json(&self) -> Result<JsonValue> {
                self.0.json_value()
            }

            fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
                self.0.set_json_value(value, blueprints)
            }

            fn to_text(&self) -> Result<String> {
                Ok(self.0.to_string())
            }

            fn from_text(&mut self, text: &str) -> Result<()> {
                *self = text.parse()?;
                Ok(())
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }

        impl From<$name> for $inner {
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl Deref for $name {
            type Target = $inner;

            fn deref(&self) -> &$inner {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                s.trim()
                    .parse()
                    .map(Self)
                    .map_err(|e| Error::InvalidText(format!("{}: {e}", $type_name)))
            }
        }

        objectify_via_object!($name, $type_name);
    };
}

number_object!(#[derive(Eq, Hash, Ord)] Bool(bool) => "bool");
number_object!(#[derive(Eq, Hash, Ord)] Uint8(u8) => "uint8");
number_object!(#[derive(Eq, Hash, Ord)] Uint16(u16) => "uint16");
number_object!(#[derive(Eq, Hash, Ord)] Uint32(u32) => "uint32");
number_object!(#[derive(Eq, Hash, Ord)] Uint64(u64) => "uint64");
number_object!(#[derive(Eq, Hash, Ord)] Int8(i8) => "int8");
number_object!(#[derive(Eq, Hash, Ord)] Int16(i16) => "int16");
number_object!(#[derive(Eq, Hash, Ord)] Int32(i32) => "int32");
number_object!(#[derive(Eq, Hash, Ord)] Int64(i64) => "int64");
number_object!(Float32(f32) => "float32");
number_object!(Float64(f64) => "float64");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::pack;

    fn decode<T: Object + Default>(payload: &[u8]) -> T {
        let bp = Blueprints::new();
        let mut value = T::default();
        let mut cursor = payload;
        value
            .read_from(&mut Source::new(&mut cursor, &bp))
            .unwrap();
        assert!(cursor.is_empty());
        value
    }

    #[test]
    fn payloads_are_fixed_width() {
        let mut buf = Vec::new();
        assert_eq!(Int32(-3).write_to(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0xff, 0xff, 0xff, 0xfd]);
        assert_eq!(decode::<Int32>(&buf), Int32(-3));

        let mut buf = Vec::new();
        assert_eq!(Uint64(1).write_to(&mut buf).unwrap(), 8);
        assert_eq!(decode::<Uint64>(&buf), Uint64(1));
    }

    #[test]
    fn extremes_round_trip() {
        let mut buf = Vec::new();
        Int64(i64::MIN).write_to(&mut buf).unwrap();
        assert_eq!(decode::<Int64>(&buf), Int64(i64::MIN));

        let mut buf = Vec::new();
        Float32(f32::MAX).write_to(&mut buf).unwrap();
        assert_eq!(decode::<Float32>(&buf), Float32(f32::MAX));
    }

    #[test]
    fn type_names() {
        assert_eq!(pack(&Bool(true)).unwrap(), b"\x04bool\x01");
        assert_eq!(Float64(0.0).object_type(), "float64");
        assert_eq!(Int8(0).object_type(), "int8");
    }

    #[test]
    fn text_forms() {
        assert_eq!(Uint16(65535).to_text().unwrap(), "65535");
        let mut v = Int16::default();
        v.from_text(" -12 ").unwrap();
        assert_eq!(v, Int16(-12));
        assert!(matches!(v.from_text("x"), Err(Error::InvalidText(_))));
        assert_eq!("true".parse::<Bool>().unwrap(), Bool(true));
    }

    #[test]
    fn json_forms() {
        assert_eq!(Uint8(7).to_json().unwrap(), serde_json::json!(7));
        let mut v = Float64::default();
        v.from_json(&serde_json::json!(2.5), &Blueprints::new())
            .unwrap();
        assert_eq!(v, Float64(2.5));
        assert!(Float64(f64::NAN).to_json().is_err());
        assert!(Int8::default()
            .from_json(&serde_json::json!(300), &Blueprints::new())
            .is_err());
    }
}
