//! Length-prefixed UTF-8 strings.

use std::convert::Infallible;
use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::objectify::objectify_via_object;
use crate::wire::{self, Width};

macro_rules! string_object {
    ($name:ident, $width:expr, $type_name:literal) => {
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl Object for $name {
            fn object_type(&self) -> &str {
                $type_name
            }

            fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
                wire::write_prefixed(w, $width, self.0.as_bytes())
            }

            fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
                let bytes = wire::read_prefixed(src, $width)?;
                let n = $width.bytes() + bytes.len() as u64;
                self.0 = String::from_utf8(bytes)?;
                Ok(n)
            }

            fn to_json(&self) -> Result<JsonValue> {
                Ok(JsonValue::String(self.0.clone()))
            }

            fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
                let s = value.as_str().ok_or_else(|| {
                    Error::InvalidJson(format!("{} expects a string, got {value}", $type_name))
                })?;
                self.0 = s.to_owned();
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

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Infallible;

            fn from_str(s: &str) -> Result<Self, Infallible> {
                Ok(Self(s.to_owned()))
            }
        }

        objectify_via_object!($name, $type_name);
    };
}

string_object!(String8, Width::W8, "string8");
string_object!(String16, Width::W16, "string16");
string_object!(String32, Width::W32, "string32");
string_object!(String64, Width::W64, "string64");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_width() {
        let mut buf = Vec::new();
        String16::from("abc").write_to(&mut buf).unwrap();
        assert_eq!(buf, [0, 3, b'a', b'b', b'c']);

        let mut buf = Vec::new();
        String64::from("").write_to(&mut buf).unwrap();
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn string8_capacity() {
        let mut sink = Vec::new();
        assert!(String8("x".repeat(255)).write_to(&mut sink).is_ok());
        let err = String8("x".repeat(256)).write_to(&mut sink).unwrap_err();
        assert!(matches!(err, Error::DataTooLarge { len: 256, .. }));
    }

    #[test]
    fn read_counts_prefix() {
        let bp = Blueprints::new();
        let mut cursor: &[u8] = &[0, 0, 0, 2, b'h', b'i'];
        let mut s = String32::default();
        let n = s.read_from(&mut Source::new(&mut cursor, &bp)).unwrap();
        assert_eq!(n, 6);
        assert_eq!(&*s, "hi");
    }

    #[test]
    fn invalid_utf8() {
        let bp = Blueprints::new();
        let mut cursor: &[u8] = &[2, 0xc3, 0x28];
        let err = String8::default()
            .read_from(&mut Source::new(&mut cursor, &bp))
            .unwrap_err();
        assert!(matches!(err, Error::Utf8(_)));
    }

    #[test]
    fn json_requires_string() {
        let bp = Blueprints::new();
        let mut s = String8::default();
        s.from_json(&serde_json::json!("ok"), &bp).unwrap();
        assert_eq!(s.to_json().unwrap(), serde_json::json!("ok"));
        assert!(matches!(
            s.from_json(&serde_json::json!(1), &bp),
            Err(Error::InvalidJson(_))
        ));
    }
}
