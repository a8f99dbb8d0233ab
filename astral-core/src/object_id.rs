use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::objectify::objectify_via_object;

/// Text prefix of every object id.
pub const ID_PREFIX: &str = "data1";

const ZBASE32: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";
const ID_LEN: usize = 40;
const ENCODED_LEN: usize = 64;

/// Content address of an object: payload size plus SHA-256 digest.
///
/// The text form is `data1` followed by the zbase32 encoding of
/// `size (8 bytes, big-endian) || hash`, with leading zero digits trimmed.
/// The zero id has an all-zero hash and renders as an empty string in JSON.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub size: u64,
    pub hash: [u8; 32],
}

impl ObjectId {
    pub const ZERO: ObjectId = ObjectId { size: 0, hash: [0; 32] };

    pub fn new(size: u64, hash: [u8; 32]) -> Self {
        Self { size, hash }
    }

    /// Computes the id of raw content.
    pub fn from_data(data: &[u8]) -> Self {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(data));
        Self::new(data.len() as u64, hash)
    }

    /// Computes the id of an object over its canonical encoding.
    pub fn resolve(obj: &dyn Object) -> Result<Self> {
        crate::resolver::resolve_object_id(obj)
    }

    pub fn is_zero(&self) -> bool {
        self.hash == [0; 32]
    }

    pub fn to_bytes(&self) -> [u8; ID_LEN] {
        let mut out = [0u8; ID_LEN];
        out[..8].copy_from_slice(&self.size.to_be_bytes());
        out[8..].copy_from_slice(&self.hash);
        out
    }

    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[..8]);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[8..]);
        Self::new(u64::from_be_bytes(size), hash)
    }
}

fn zbase32_encode(data: &[u8; ID_LEN]) -> String {
    let mut out = String::with_capacity(ENCODED_LEN);
    let mut buffer = 0u64;
    let mut bits = 0;
    for &b in data {
        buffer = (buffer << 8) | u64::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ZBASE32[((buffer >> bits) & 31) as usize] as char);
        }
    }
    out
}

fn zbase32_decode(text: &str) -> Option<[u8; ID_LEN]> {
    if text.len() != ENCODED_LEN {
        return None;
    }
    let mut out = [0u8; ID_LEN];
    let mut buffer = 0u64;
    let mut bits = 0;
    let mut i = 0;
    for c in text.bytes() {
        let digit = ZBASE32.iter().position(|&z| z == c)? as u64;
        buffer = (buffer << 5) | digit;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out[i] = (buffer >> bits) as u8;
            i += 1;
        }
    }
    Some(out)
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = zbase32_encode(&self.to_bytes());
        write!(f, "{ID_PREFIX}{}", encoded.trim_start_matches('y'))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidObjectId(s.to_owned());
        let digits = s.strip_prefix(ID_PREFIX).ok_or_else(invalid)?;
        if digits.len() > ENCODED_LEN {
            return Err(invalid());
        }
        let padded = format!("{}{digits}", "y".repeat(ENCODED_LEN - digits.len()));
        zbase32_decode(&padded)
            .map(Self::from_bytes)
            .ok_or_else(invalid)
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_zero() {
            serializer.serialize_str("")
        } else {
            serializer.collect_str(self)
        }
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ObjectIdVisitor;

        impl serde::de::Visitor<'_> for ObjectIdVisitor {
            type Value = ObjectId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object id string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v.is_empty() {
                    return Ok(ObjectId::ZERO);
                }
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(ObjectIdVisitor)
    }
}

impl Object for ObjectId {
    fn object_type(&self) -> &str {
        "object_id.sha256"
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        let bytes = if self.is_zero() { [0u8; ID_LEN] } else { self.to_bytes() };
        w.write_all(&bytes)?;
        Ok(ID_LEN as u64)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let mut bytes = [0u8; ID_LEN];
        std::io::Read::read_exact(src, &mut bytes)?;
        *self = Self::from_bytes(bytes);
        Ok(ID_LEN as u64)
    }

    fn to_json(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        *self = ObjectId::deserialize(value)?;
        Ok(())
    }

    fn to_text(&self) -> Result<String> {
        Ok(self.to_string())
    }

    fn from_text(&mut self, text: &str) -> Result<()> {
        *self = text.trim().parse()?;
        Ok(())
    }
}

objectify_via_object!(ObjectId, "object_id.sha256");
