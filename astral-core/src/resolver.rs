use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::object::Object;
use crate::object_id::ObjectId;
use crate::stamp::ObjectHeader;

/// A sink that hashes and counts every byte written, optionally passing it on.
#[derive(Debug, Clone)]
pub struct WriteResolver<W = io::Sink> {
    hasher: Sha256,
    size: u64,
    inner: W,
}

impl WriteResolver {
    pub fn new() -> Self {
        Self::tee(io::sink())
    }
}

impl Default for WriteResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> WriteResolver<W> {
    /// Hashes everything that is successfully written to `inner`.
    pub fn tee(inner: W) -> Self {
        Self {
            hasher: Sha256::new(),
            size: 0,
            inner,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The id of everything written so far.
    pub fn resolve(&self) -> ObjectId {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&self.hasher.clone().finalize());
        ObjectId::new(self.size, hash)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn absorb(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.size += data.len() as u64;
    }
}

impl<W: Write> Write for WriteResolver<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.absorb(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A source that hashes every byte read through it.
#[derive(Debug)]
pub struct ReadResolver<R> {
    inner: R,
    resolver: WriteResolver,
}

impl<R: Read> ReadResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            resolver: WriteResolver::new(),
        }
    }

    pub fn size(&self) -> u64 {
        self.resolver.size()
    }

    /// The id of everything read so far.
    pub fn resolve(&self) -> ObjectId {
        self.resolver.resolve()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ReadResolver<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.resolver.absorb(&buf[..n]);
        Ok(n)
    }
}

/// Computes the id of an object over `stamp || string8(type) || payload`.
pub fn resolve_object_id(obj: &dyn Object) -> Result<ObjectId> {
    let mut resolver = WriteResolver::new();
    ObjectHeader::new(obj.object_type()).write_to(&mut resolver)?;
    obj.write_to(&mut resolver)?;
    Ok(resolver.resolve())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ints::{Int64, Uint8};
    use crate::object::write_canonical;
    use crate::strings::String8;

    #[test]
    fn resolver_matches_from_data() {
        let mut r = WriteResolver::new();
        r.write_all(b"hello ").unwrap();
        r.write_all(b"world").unwrap();
        assert_eq!(r.size(), 11);
        assert_eq!(r.resolve(), ObjectId::from_data(b"hello world"));
    }

    #[test]
    fn tee_passes_bytes_on() {
        let mut r = WriteResolver::tee(Vec::new());
        r.write_all(b"abc").unwrap();
        let id = r.resolve();
        assert_eq!(r.into_inner(), b"abc");
        assert_eq!(id, ObjectId::from_data(b"abc"));
    }

    #[test]
    fn read_resolver_hashes_consumed_bytes() {
        let mut r = ReadResolver::new(&b"payload"[..]);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(r.resolve(), ObjectId::from_data(b"payload"));
    }

    #[test]
    fn object_id_covers_canonical_bytes() {
        let obj = String8::from("hi");
        let mut canonical = Vec::new();
        write_canonical(&mut canonical, &obj).unwrap();
        assert_eq!(resolve_object_id(&obj).unwrap(), ObjectId::from_data(&canonical));
    }

    #[test]
    fn id_depends_on_type_and_payload() {
        let a = resolve_object_id(&Uint8(1)).unwrap();
        let b = resolve_object_id(&Uint8(2)).unwrap();
        let c = resolve_object_id(&Int64(1)).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, ObjectId::resolve(&Uint8(1)).unwrap());
    }
}
