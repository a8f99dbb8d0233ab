//! Timestamps, durations and random nonces.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::objectify::objectify_via_object;
use crate::wire::Wire;

/// A point in time stored as signed nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub DateTime<Utc>);

impl Time {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self(DateTime::from_timestamp_nanos(nanos))
    }

    pub fn unix_nanos(&self) -> Result<i64> {
        self.0
            .timestamp_nanos_opt()
            .ok_or_else(|| Error::Unsupported(format!("time {} is out of range", self.0)))
    }
}

impl Object for Time {
    fn object_type(&self) -> &str {
        "time"
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        self.unix_nanos()?.write_wire(w)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        *self = Self::from_unix_nanos(i64::read_wire(src)?);
        Ok(8)
    }

    fn to_json(&self) -> Result<JsonValue> {
        Ok(JsonValue::String(self.to_string()))
    }

    fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        let text = value
            .as_str()
            .ok_or_else(|| Error::InvalidJson(format!("time expects a string, got {value}")))?;
        *self = text.parse()?;
        Ok(())
    }

    fn to_text(&self) -> Result<String> {
        Ok(self.to_string())
    }

    fn from_text(&mut self, text: &str) -> Result<()> {
        *self = text.parse()?;
        Ok(())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl FromStr for Time {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|t| Self(t.with_timezone(&Utc)))
            .map_err(|e| Error::InvalidText(format!("time: {e}")))
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(t: DateTime<Utc>) -> Self {
        Self(t)
    }
}

objectify_via_object!(Time, "time");

/// A span of time stored as unsigned nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub std::time::Duration);

impl Duration {
    pub fn nanos(&self) -> Result<u64> {
        u64::try_from(self.0.as_nanos()).map_err(|_| {
            Error::Unsupported(format!("duration {:?} overflows 64-bit nanoseconds", self.0))
        })
    }
}

impl Object for Duration {
    fn object_type(&self) -> &str {
        "duration"
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        self.nanos()?.write_wire(w)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        self.0 = std::time::Duration::from_nanos(u64::read_wire(src)?);
        Ok(8)
    }

    fn to_json(&self) -> Result<JsonValue> {
        Ok(JsonValue::from(self.nanos()?))
    }

    fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        let nanos = value.as_u64().ok_or_else(|| {
            Error::InvalidJson(format!("duration expects nanoseconds, got {value}"))
        })?;
        self.0 = std::time::Duration::from_nanos(nanos);
        Ok(())
    }

    fn to_text(&self) -> Result<String> {
        Ok(format!("{}ns", self.nanos()?))
    }

    fn from_text(&mut self, text: &str) -> Result<()> {
        *self = text.parse()?;
        Ok(())
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s.strip_suffix("ns").unwrap_or(s);
        digits
            .parse()
            .map(|n| Self(std::time::Duration::from_nanos(n)))
            .map_err(|e| Error::InvalidText(format!("duration {s:?}: {e}")))
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Self(d)
    }
}

objectify_via_object!(Duration, "duration");

/// A random 64-bit value, rendered as 16 hex digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nonce(pub u64);

impl Nonce {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl Object for Nonce {
    fn object_type(&self) -> &str {
        "nonce"
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        self.0.write_wire(w)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        self.0 = u64::read_wire(src)?;
        Ok(8)
    }

    fn to_json(&self) -> Result<JsonValue> {
        Ok(JsonValue::String(self.to_string()))
    }

    fn from_json(&mut self, value: &JsonValue, _: &Blueprints) -> Result<()> {
        let text = value
            .as_str()
            .ok_or_else(|| Error::InvalidJson(format!("nonce expects hex, got {value}")))?;
        *self = text.parse()?;
        Ok(())
    }

    fn to_text(&self) -> Result<String> {
        Ok(self.to_string())
    }

    fn from_text(&mut self, text: &str) -> Result<()> {
        *self = text.parse()?;
        Ok(())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

impl FromStr for Nonce {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut buf = [0u8; 8];
        hex::decode_to_slice(s.trim(), &mut buf)
            .map_err(|e| Error::InvalidText(format!("nonce {s:?}: {e}")))?;
        Ok(Self(u64::from_be_bytes(buf)))
    }
}

objectify_via_object!(Nonce, "nonce");

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back<T: Object + Default>(obj: &T) -> T {
        let mut buf = Vec::new();
        obj.write_to(&mut buf).unwrap();
        let bp = Blueprints::new();
        let mut out = T::default();
        let mut cursor = &buf[..];
        out.read_from(&mut Source::new(&mut cursor, &bp)).unwrap();
        out
    }

    #[test]
    fn time_is_unix_nanos() {
        let t = Time::from_unix_nanos(1_500_000_000_123_456_789);
        let mut buf = Vec::new();
        t.write_to(&mut buf).unwrap();
        assert_eq!(buf, 1_500_000_000_123_456_789i64.to_be_bytes());
        assert_eq!(read_back(&t), t);
    }

    #[test]
    fn time_before_epoch() {
        let t = Time::from_unix_nanos(-1);
        assert_eq!(read_back(&t), t);
    }

    #[test]
    fn time_text_is_rfc3339() {
        let t = Time::from_unix_nanos(0);
        assert_eq!(t.to_text().unwrap(), "1970-01-01T00:00:00Z");
        let parsed: Time = "2024-05-01T12:00:00.5+02:00".parse().unwrap();
        assert_eq!(parsed.to_string(), "2024-05-01T10:00:00.500Z");
        assert!("yesterday".parse::<Time>().is_err());
    }

    #[test]
    fn duration_forms() {
        let d = Duration(std::time::Duration::from_millis(3));
        assert_eq!(d.to_text().unwrap(), "3000000ns");
        assert_eq!(d.to_json().unwrap(), serde_json::json!(3_000_000));
        assert_eq!("3000000ns".parse::<Duration>().unwrap(), d);
        assert_eq!(read_back(&d), d);
    }

    #[test]
    fn duration_overflow() {
        let d = Duration(std::time::Duration::from_secs(u64::MAX));
        assert!(matches!(d.write_to(&mut Vec::<u8>::new()), Err(Error::Unsupported(_))));
    }

    #[test]
    fn nonce_hex() {
        let n = Nonce(0x0123_4567_89ab_cdef);
        assert_eq!(n.to_text().unwrap(), "0123456789abcdef");
        assert_eq!("0123456789abcdef".parse::<Nonce>().unwrap(), n);
        assert!("0123".parse::<Nonce>().is_err());
        assert_eq!(read_back(&n), n);
    }

    #[test]
    fn random_nonces_differ() {
        assert_ne!(Nonce::random(), Nonce::random());
    }
}
