//! Astral is a self-describing binary object encoding.
//!
//! Core concepts:
//! - **Object**: a value with a type name and a binary payload
//! - **Blueprints**: a chained registry mapping type names to fresh zero values
//! - **Objectify**: the generic codec for records, sequences, maps and optionals,
//!   derived with `#[derive(Objectify)]`
//! - **ObjectId**: the SHA-256 content address of an object
//! - **Stream / Channel**: framed object I/O over any byte transport
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use astral_core::{Blueprints, ObjectReader, ObjectWriter, Stream, Uint32, Width};
//!
//! let blueprints = Arc::new(Blueprints::with_builtins());
//!
//! let mut out = Stream::new(Vec::new(), Width::W32, blueprints.canonical());
//! out.write_object(&Uint32(7))?;
//! let bytes = out.into_inner();
//!
//! let mut input = Stream::new(&bytes[..], Width::W32, blueprints.canonical());
//! let obj = input.read_object()?;
//! assert_eq!(obj.downcast_ref::<Uint32>(), Some(&Uint32(7)));
//! # Ok::<(), astral_core::Error>(())
//! ```

extern crate self as astral_core;

mod array;
mod blueprints;
mod boxed;
mod bundle;
mod bytes;
mod channel;
mod error;
mod ints;
pub mod json;
mod object;
mod object_id;
mod object_map;
mod objectify;
mod raw;
mod resolver;
mod shape;
mod stamp;
mod stream;
mod strings;
mod time;
pub mod wire;

pub use array::{Array, Count8, Count16, Count32, Count64, CountWidth, Slice};
pub use blueprints::{
    Blueprint, Blueprints, RegisterError, RegistrationError, default_blueprints, register_builtins,
};
pub use boxed::Boxed;
pub use bundle::Bundle;
pub use bytes::{Bytes8, Bytes16, Bytes32, Bytes64};
pub use channel::{Channel, ChannelConfig, Format};
pub use error::{Error, Result};
pub use ints::{
    Bool, Float32, Float64, Int8, Int16, Int32, Int64, Uint8, Uint16, Uint32, Uint64,
};
pub use json::JsonEnvelope;
pub use object::{
    AsAny, CloneObject, Object, Source, open_canonical, pack, read_short, write_canonical,
    write_short,
};
pub use object_id::{ID_PREFIX, ObjectId};
pub use object_map::ObjectMap;
pub use objectify::{AnyObject, AnyOf, Objectified, Objectify, decode, encode};
pub use raw::RawObject;
pub use resolver::{ReadResolver, WriteResolver, resolve_object_id};
pub use shape::{FloatType, IntType, Shape, inspect_short};
pub use stamp::{ObjectHeader, STAMP, TypeCodec};
pub use stream::{ObjectReader, ObjectWriter, Stream};
pub use strings::{String8, String16, String32, String64};
pub use time::{Duration, Nonce, Time};
pub use wire::{Width, Wire};

#[cfg(feature = "derive")]
pub use astral_derive::{Objectify, object};
