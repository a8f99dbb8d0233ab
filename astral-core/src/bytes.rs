//! Length-prefixed raw byte strings. JSON and text render as standard base64.

use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::objectify::objectify_via_object;
use crate::wire::{self, Width};

pub(crate) fn decode_base64(type_name: &str, text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| Error::InvalidText(format!("{type_name}: {e}")))
}

macro_rules! bytes_object {
    ($name:ident, $width:expr, $type_name:literal) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub Vec<u8>);

        impl Object for $name {
            fn object_type(&self) -> &str {
                $type_name
            }

            fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
                wire::write_prefixed(w, $width, &self.0)
            }

            fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
                self.0 = wire::read_prefixed(src, $width)?;
                Ok($width.bytes() + self.0.len() as u64)
            }

            fn to_json(&self) -> Result<JsonValue> {
                Ok(JsonValue::String(STANDARD.encode(&self.0)))
            }

            fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
                let text = value.as_str().ok_or_else(|| {
                    Error::InvalidJson(format!("{} expects base64, got {value}", $type_name))
                })?;
                self.0 = decode_base64($type_name, text)?;
                Ok(())
            }

            fn to_text(&self) -> Result<String> {
                Ok(STANDARD.encode(&self.0))
            }

            fn from_text(&mut self, text: &str) -> Result<()> {
                self.0 = decode_base64($type_name, text)?;
                Ok(())
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(v: Vec<u8>) -> Self {
                Self(v)
            }
        }

        impl From<&[u8]> for $name {
            fn from(v: &[u8]) -> Self {
                Self(v.to_vec())
            }
        }

        impl Deref for $name {
            type Target = [u8];

            fn deref(&self) -> &[u8] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&STANDARD.encode(&self.0))
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                decode_base64($type_name, s).map(Self)
            }
        }

        objectify_via_object!($name, $type_name);
    };
}

bytes_object!(Bytes8, Width::W8, "bytes8");
bytes_object!(Bytes16, Width::W16, "bytes16");
bytes_object!(Bytes32, Width::W32, "bytes32");
bytes_object!(Bytes64, Width::W64, "bytes64");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes16_at_capacity() {
        let data = Bytes16(vec![1; 65535]);
        let mut buf = Vec::new();
        assert_eq!(data.write_to(&mut buf).unwrap(), 65537);

        let bp = Blueprints::new();
        let mut back = Bytes16::default();
        let mut cursor = &buf[..];
        back.read_from(&mut Source::new(&mut cursor, &bp)).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn bytes16_over_capacity() {
        let err = Bytes16(vec![1; 65536])
            .write_to(&mut Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, Error::DataTooLarge { len: 65536, width: Width::W16 }));
    }

    #[test]
    fn base64_forms() {
        let b = Bytes8::from(&b"hello"[..]);
        assert_eq!(b.to_text().unwrap(), "aGVsbG8=");
        assert_eq!(b.to_json().unwrap(), serde_json::json!("aGVsbG8="));

        let parsed: Bytes8 = "aGVsbG8=".parse().unwrap();
        assert_eq!(parsed, b);
        assert!("not base64!".parse::<Bytes8>().is_err());
    }
}
