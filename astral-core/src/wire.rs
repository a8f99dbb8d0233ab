//! Fixed-width big-endian codecs and bounded length prefixes.
//!
//! Every multi-byte value in astral travels big-endian. Variable-size data is
//! written as an unsigned length of a declared [`Width`] followed by the raw bytes.

use std::fmt;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on speculative allocation while reading untrusted lengths.
const PREALLOC_LIMIT: u64 = 64 * 1024;

/// A value with a fixed-size big-endian encoding.
pub trait Wire: Copy + Sized {
    /// Encoded size in bytes.
    const SIZE: u64;

    fn write_wire(self, w: &mut dyn Write) -> Result<u64>;

    fn read_wire(r: &mut dyn Read) -> Result<Self>;
}

macro_rules! impl_wire {
    ($($t:ty),* $(,)?) => {$(
        impl Wire for $t {
            const SIZE: u64 = std::mem::size_of::<$t>() as u64;

            fn write_wire(self, w: &mut dyn Write) -> Result<u64> {
                w.write_all(&self.to_be_bytes())?;
                Ok(Self::SIZE)
            }

            fn read_wire(r: &mut dyn Read) -> Result<Self> {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                r.read_exact(&mut buf)?;
                Ok(<$t>::from_be_bytes(buf))
            }
        }
    )*};
}

impl_wire!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Wire for bool {
    const SIZE: u64 = 1;

    fn write_wire(self, w: &mut dyn Write) -> Result<u64> {
        u8::from(self).write_wire(w)
    }

    fn read_wire(r: &mut dyn Read) -> Result<Self> {
        Ok(u8::read_wire(r)? != 0)
    }
}

/// Bit width of a length prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Width {
    W8,
    W16,
    #[default]
    W32,
    W64,
}

impl Width {
    pub const fn bits(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }

    /// Size of the prefix itself in bytes.
    pub const fn bytes(self) -> u64 {
        self.bits() as u64 / 8
    }

    /// Largest length representable by this prefix.
    pub const fn max_len(self) -> u64 {
        match self {
            Width::W64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Width::W8),
            16 => Some(Width::W16),
            32 => Some(Width::W32),
            64 => Some(Width::W64),
            _ => None,
        }
    }

    pub fn fits(self, len: u64) -> bool {
        len <= self.max_len()
    }

    /// Fails with [`Error::DataTooLarge`] when `len` does not fit.
    pub fn check(self, len: u64) -> Result<()> {
        if self.fits(len) {
            Ok(())
        } else {
            Err(Error::DataTooLarge { len, width: self })
        }
    }

    pub fn write_len(self, w: &mut dyn Write, len: u64) -> Result<u64> {
        self.check(len)?;
        match self {
            Width::W8 => (len as u8).write_wire(w),
            Width::W16 => (len as u16).write_wire(w),
            Width::W32 => (len as u32).write_wire(w),
            Width::W64 => len.write_wire(w),
        }
    }

    pub fn read_len(self, r: &mut dyn Read) -> Result<u64> {
        Ok(match self {
            Width::W8 => u8::read_wire(r)?.into(),
            Width::W16 => u16::read_wire(r)?.into(),
            Width::W32 => u32::read_wire(r)?.into(),
            Width::W64 => u64::read_wire(r)?,
        })
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

impl TryFrom<u32> for Width {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Width::from_bits(bits).ok_or_else(|| format!("unsupported width: {bits} bits"))
    }
}

impl From<Width> for u32 {
    fn from(width: Width) -> Self {
        width.bits()
    }
}

/// Writes `data` behind a length prefix of the given width.
pub fn write_prefixed(w: &mut dyn Write, width: Width, data: &[u8]) -> Result<u64> {
    let n = width.write_len(w, data.len() as u64)?;
    w.write_all(data)?;
    Ok(n + data.len() as u64)
}

/// Reads a length prefix of the given width and then exactly that many bytes.
pub fn read_prefixed(r: &mut dyn Read, width: Width) -> Result<Vec<u8>> {
    let len = width.read_len(r)?;
    read_bytes(r, len)
}

/// Reads one length-prefixed frame from a sequence of frames.
///
/// Returns `None` when the source is exhausted before the first prefix byte.
/// Running dry anywhere after that is [`Error::Truncated`].
pub fn read_frame_bytes(r: &mut dyn Read, width: Width) -> Result<Option<Vec<u8>>> {
    let mut first = [0u8; 1];
    loop {
        match r.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let len = width
        .read_len(&mut (&first[..]).chain(&mut *r))
        .map_err(|e| truncated(e, "length prefix"))?;
    read_bytes(r, len)
        .map(Some)
        .map_err(|e| truncated(e, &format!("{len}-byte body")))
}

fn truncated(e: Error, stage: &str) -> Error {
    if e.is_eof() {
        Error::Truncated(format!("source ended inside the {stage}"))
    } else {
        e
    }
}

/// Reads exactly `len` bytes without trusting `len` for the allocation size.
pub fn read_bytes(r: &mut dyn Read, len: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len.min(PREALLOC_LIMIT) as usize);
    Read::take(&mut *r, len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(Error::eof());
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut buf = Vec::new();
        0x0102_0304u32.write_wire(&mut buf).unwrap();
        (-2i16).write_wire(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 0xff, 0xfe]);

        let mut r = &buf[..];
        assert_eq!(u32::read_wire(&mut r).unwrap(), 0x0102_0304);
        assert_eq!(i16::read_wire(&mut r).unwrap(), -2);
    }

    #[test]
    fn floats_round_trip() {
        let mut buf = Vec::new();
        1.5f64.write_wire(&mut buf).unwrap();
        assert_eq!(buf, 1.5f64.to_be_bytes());
        assert_eq!(f64::read_wire(&mut &buf[..]).unwrap(), 1.5);
    }

    #[test]
    fn bool_nonzero_is_true() {
        assert!(bool::read_wire(&mut &[7u8][..]).unwrap());
        assert!(!bool::read_wire(&mut &[0u8][..]).unwrap());
    }

    #[test]
    fn width_limits() {
        assert_eq!(Width::W8.max_len(), 255);
        assert_eq!(Width::W16.max_len(), 65535);
        assert_eq!(Width::W32.max_len(), u32::MAX as u64);
        assert_eq!(Width::W64.max_len(), u64::MAX);
        assert!(Width::W32.check(1 << 32).is_err());
        assert!(Width::W64.check(1 << 40).is_ok());
    }

    #[test]
    fn prefixed_at_capacity() {
        let data = vec![0xab; 255];
        let mut buf = Vec::new();
        let n = write_prefixed(&mut buf, Width::W8, &data).unwrap();
        assert_eq!(n, 256);
        assert_eq!(read_prefixed(&mut &buf[..], Width::W8).unwrap(), data);
    }

    #[test]
    fn prefixed_over_capacity() {
        let mut buf = Vec::new();
        let err = write_prefixed(&mut buf, Width::W8, &[0; 256]).unwrap_err();
        assert!(matches!(err, Error::DataTooLarge { len: 256, width: Width::W8 }));
        assert!(buf.is_empty());

        let err = write_prefixed(&mut buf, Width::W16, &vec![0; 65536]).unwrap_err();
        assert!(matches!(err, Error::DataTooLarge { len: 65536, .. }));
    }

    #[test]
    fn truncated_payload_is_eof() {
        let buf = [0u8, 0, 0, 10, 1, 2, 3];
        let err = read_prefixed(&mut &buf[..], Width::W32).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn frame_reader_separates_clean_end_from_truncation() {
        assert!(read_frame_bytes(&mut &[][..], Width::W16).unwrap().is_none());

        let whole = [0u8, 2, 7, 8];
        let frame = read_frame_bytes(&mut &whole[..], Width::W16).unwrap();
        assert_eq!(frame.as_deref(), Some(&[7u8, 8][..]));

        let err = read_frame_bytes(&mut &[0u8][..], Width::W16).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
        assert!(!err.is_eof());

        let err = read_frame_bytes(&mut &[0u8, 7, 5, b'u'][..], Width::W16).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn huge_length_does_not_preallocate() {
        let buf = [0xffu8; 8];
        let err = read_prefixed(&mut &buf[..], Width::W64).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn width_serde_as_bits() {
        assert_eq!(serde_json::to_string(&Width::W16).unwrap(), "16");
        let w: Width = serde_json::from_str("64").unwrap();
        assert_eq!(w, Width::W64);
        assert!(serde_json::from_str::<Width>("12").is_err());
    }
}
