use std::io::{Read, Write};
use std::sync::Arc;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::raw::RawObject;
use crate::wire::{self, Width};

/// Something objects can be written to.
pub trait ObjectWriter {
    /// Writes one object, returning the number of bytes put on the transport.
    fn write_object(&mut self, obj: &dyn Object) -> Result<u64>;
}

/// Something objects can be read from.
pub trait ObjectReader {
    fn read_object(&mut self) -> Result<Box<dyn Object>>;
}

/// Writes `frame-length || type || payload`, with the type encoded by the registry's codec.
///
/// An untyped object with an empty payload is skipped and writes nothing.
pub(crate) fn write_frame(
    w: &mut dyn Write,
    width: Width,
    blueprints: &Blueprints,
    obj: &dyn Object,
) -> Result<u64> {
    let type_name = obj.object_type();
    if type_name.is_empty() {
        let mut payload = Vec::new();
        obj.write_to(&mut payload)?;
        if payload.is_empty() {
            log::trace!("eliding empty untyped object");
            return Ok(0);
        }
        return Err(Error::EmptyType);
    }
    let mut frame = Vec::new();
    blueprints.write(&mut frame, obj)?;
    let n = wire::write_prefixed(w, width, &frame)?;
    log::trace!("wrote {type_name} frame of {} bytes", frame.len());
    Ok(n)
}

/// Reads one frame and decodes it through the registry.
///
/// A source that ends cleanly between frames is an end-of-input error
/// ([`Error::is_eof`]); one that ends inside a frame is [`Error::Truncated`].
pub(crate) fn read_frame(
    r: &mut dyn Read,
    width: Width,
    blueprints: &Blueprints,
    raw_fallback: bool,
) -> Result<Box<dyn Object>> {
    let frame = wire::read_frame_bytes(r, width)?.ok_or_else(Error::eof)?;
    let mut cursor = &frame[..];
    let (type_name, _) = blueprints.codec().read_type(&mut cursor)?;
    log::trace!("read {type_name} frame of {} bytes", frame.len());
    let Some(mut obj) = blueprints.instantiate(&type_name) else {
        if raw_fallback {
            log::debug!("keeping unregistered {type_name} as a raw object");
            return Ok(Box::new(RawObject::new(type_name, cursor.to_vec())));
        }
        return Err(Error::BlueprintNotFound(type_name));
    };
    blueprints.read_payload(obj.as_mut(), cursor)?;
    Ok(obj)
}

/// Length-framed objects over a byte transport.
///
/// Each frame is `length (width) || type || payload`; the type is encoded with
/// the [`TypeCodec`](crate::TypeCodec) of the bound registry. Bytes left in a
/// frame after the payload are an error.
#[derive(Debug)]
pub struct Stream<T> {
    transport: T,
    width: Width,
    blueprints: Arc<Blueprints>,
    raw_fallback: bool,
}

impl<T> Stream<T> {
    pub fn new(transport: T, width: Width, blueprints: Arc<Blueprints>) -> Self {
        Self {
            transport,
            width,
            blueprints,
            raw_fallback: false,
        }
    }

    /// Decode unregistered types as [`RawObject`] instead of failing.
    pub fn with_raw_fallback(mut self, enabled: bool) -> Self {
        self.raw_fallback = enabled;
        self
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn blueprints(&self) -> &Arc<Blueprints> {
        &self.blueprints
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: Write> ObjectWriter for Stream<T> {
    fn write_object(&mut self, obj: &dyn Object) -> Result<u64> {
        write_frame(&mut self.transport, self.width, &self.blueprints, obj)
    }
}

impl<T: Read> ObjectReader for Stream<T> {
    fn read_object(&mut self) -> Result<Box<dyn Object>> {
        read_frame(&mut self.transport, self.width, &self.blueprints, self.raw_fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ints::Uint8;
    use crate::objectify::Objectified;
    use crate::strings::String8;

    fn builtins() -> Arc<Blueprints> {
        Arc::new(Blueprints::with_builtins())
    }

    #[test]
    fn short_frame_layout() {
        let mut stream = Stream::new(Vec::new(), Width::W16, builtins());
        stream.write_object(&Uint8(7)).unwrap();
        assert_eq!(stream.into_inner(), b"\x00\x07\x05uint8\x07");
    }

    #[test]
    fn frames_round_trip_in_order() {
        let bp = builtins();
        let mut writer = Stream::new(Vec::new(), Width::W32, bp.canonical());
        writer.write_object(&String8::from("a")).unwrap();
        writer.write_object(&Uint8(2)).unwrap();
        let bytes = writer.into_inner();

        let mut reader = Stream::new(&bytes[..], Width::W32, bp.canonical());
        let first = reader.read_object().unwrap();
        assert_eq!(first.downcast_ref::<String8>().unwrap().0, "a");
        let second = reader.read_object().unwrap();
        assert_eq!(second.downcast_ref::<Uint8>(), Some(&Uint8(2)));
        assert!(reader.read_object().unwrap_err().is_eof());
    }

    #[test]
    fn truncated_frame_is_not_end_of_input() {
        let mut cut_body = Stream::new(&b"\x00\x07\x05ui"[..], Width::W16, builtins());
        let err = cut_body.read_object().unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
        assert!(!err.is_eof());

        let mut cut_prefix = Stream::new(&b"\x00\x00\x00"[..], Width::W32, builtins());
        assert!(matches!(cut_prefix.read_object(), Err(Error::Truncated(_))));
    }

    #[test]
    fn empty_untyped_object_is_elided() {
        let mut stream = Stream::new(Vec::new(), Width::W8, builtins());
        assert_eq!(stream.write_object(&Objectified([0u8; 0])).unwrap(), 0);
        assert!(stream.get_ref().is_empty());
        assert!(matches!(
            stream.write_object(&Objectified(1u8)),
            Err(Error::EmptyType)
        ));
    }

    #[test]
    fn trailing_bytes_in_frame() {
        let frame = b"\x05uint8\x07\x00";
        let mut bytes = vec![frame.len() as u8];
        bytes.extend_from_slice(frame);
        let mut reader = Stream::new(&bytes[..], Width::W8, builtins());
        assert!(matches!(reader.read_object(), Err(Error::TrailingData(1))));
    }

    #[test]
    fn unknown_type_with_and_without_fallback() {
        let bytes = b"\x06\x03foo\x01\x02";
        let mut strict = Stream::new(&bytes[..], Width::W8, builtins());
        assert!(matches!(strict.read_object(), Err(Error::BlueprintNotFound(_))));

        let mut lenient = Stream::new(&bytes[..], Width::W8, builtins()).with_raw_fallback(true);
        let obj = lenient.read_object().unwrap();
        let raw = obj.downcast_ref::<RawObject>().unwrap();
        assert_eq!(raw.type_name, "foo");
        assert_eq!(raw.payload, [1, 2]);
    }

    #[test]
    fn frame_width_is_enforced() {
        let mut stream = Stream::new(Vec::new(), Width::W8, builtins());
        let err = stream
            .write_object(&crate::bytes::Bytes16(vec![0; 300]))
            .unwrap_err();
        assert!(matches!(err, Error::DataTooLarge { width: Width::W8, .. }));
    }
}
