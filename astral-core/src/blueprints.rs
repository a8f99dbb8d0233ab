use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::stamp::TypeCodec;

type Factory = dyn Fn() -> Box<dyn Object> + Send + Sync;

/// A registered prototype: a type name and a way to produce fresh zero values of it.
#[derive(Clone)]
pub struct Blueprint {
    type_name: String,
    rust_type: &'static str,
    factory: Arc<Factory>,
}

impl Blueprint {
    /// Registers `T` by its default value.
    pub fn of<T: Object + Default>() -> Self {
        Self {
            type_name: T::default().object_type().to_owned(),
            rust_type: std::any::type_name::<T>(),
            factory: Arc::new(|| Box::new(T::default()) as Box<dyn Object>),
        }
    }

    /// Registers a prototype value; instances are clones of it.
    pub fn from_prototype<T: Object>(prototype: T) -> Self {
        Self {
            type_name: prototype.object_type().to_owned(),
            rust_type: std::any::type_name::<T>(),
            factory: Arc::new(move || prototype.clone_object()),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn instantiate(&self) -> Box<dyn Object> {
        (self.factory)()
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("type_name", &self.type_name)
            .field("rust_type", &self.rust_type)
            .finish()
    }
}

/// A single rejected registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("{0} has an empty object type")]
    EmptyType(&'static str),
    #[error("blueprint for {0} already added")]
    Duplicate(String),
}

/// Every failure of one [`Blueprints::add`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_failures(.failures))]
pub struct RegistrationError {
    pub failures: Vec<RegisterError>,
}

fn join_failures(failures: &[RegisterError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A registry of blueprints keyed by type name, optionally chained to a parent.
///
/// Lookups that miss fall through to the parent. Each level carries the
/// [`TypeCodec`] its `read`/`write` helpers and bound streams use.
pub struct Blueprints {
    entries: RwLock<IndexMap<String, Blueprint>>,
    parent: Option<Arc<Blueprints>>,
    codec: TypeCodec,
}

impl Blueprints {
    /// An empty root registry using the short type codec.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            parent: None,
            codec: TypeCodec::Short,
        }
    }

    /// A root registry holding every built-in type.
    pub fn try_with_builtins() -> Result<Self, RegistrationError> {
        let bp = Self::new();
        register_builtins(&bp)?;
        Ok(bp)
    }

    /// Like [`try_with_builtins`](Self::try_with_builtins). The built-in names
    /// are distinct and the level starts empty, so registration cannot fail;
    /// a failure would be logged and leave the registry partially filled.
    pub fn with_builtins() -> Self {
        let bp = Self::new();
        if let Err(e) = register_builtins(&bp) {
            log::error!("built-in registration failed: {e}");
        }
        bp
    }

    /// An empty level chained to `parent` with an explicit codec.
    pub fn with_parent(parent: Arc<Blueprints>, codec: TypeCodec) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            parent: Some(parent),
            codec,
        }
    }

    /// A child level that inherits this level's codec.
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self::with_parent(Arc::clone(self), self.codec.clone()))
    }

    pub fn canonical(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self::with_parent(Arc::clone(self), TypeCodec::Canonical))
    }

    pub fn short(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self::with_parent(Arc::clone(self), TypeCodec::Short))
    }

    pub fn indexed<I, S>(self: &Arc<Self>, types: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self::with_parent(Arc::clone(self), TypeCodec::indexed(types)))
    }

    pub fn codec(&self) -> &TypeCodec {
        &self.codec
    }

    pub fn parent(&self) -> Option<&Arc<Blueprints>> {
        self.parent.as_ref()
    }

    /// Registers a batch of blueprints at this level.
    ///
    /// Empty type names and names already present at this level are rejected
    /// without touching the existing entry. The rest of the batch still
    /// registers; every failure is reported together.
    pub fn add(&self, blueprints: impl IntoIterator<Item = Blueprint>) -> Result<(), RegistrationError> {
        let mut failures = Vec::new();
        let mut entries = self.entries.write();
        for blueprint in blueprints {
            if blueprint.type_name.is_empty() {
                failures.push(RegisterError::EmptyType(blueprint.rust_type));
                continue;
            }
            if entries.contains_key(&blueprint.type_name) {
                failures.push(RegisterError::Duplicate(blueprint.type_name));
                continue;
            }
            log::debug!("registered {} as {}", blueprint.rust_type, blueprint.type_name);
            entries.insert(blueprint.type_name.clone(), blueprint);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistrationError { failures })
        }
    }

    pub fn add_type<T: Object + Default>(&self) -> Result<(), RegistrationError> {
        self.add([Blueprint::of::<T>()])
    }

    /// A fresh zero value of the named type, searching ancestors on a miss.
    pub fn instantiate(&self, type_name: &str) -> Option<Box<dyn Object>> {
        if let Some(blueprint) = self.entries.read().get(type_name) {
            return Some(blueprint.instantiate());
        }
        self.parent.as_ref()?.instantiate(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.read().contains_key(type_name)
            || self.parent.as_ref().is_some_and(|p| p.contains(type_name))
    }

    /// Ancestor names first, then this level's names in registration order.
    pub fn type_names(&self) -> Vec<String> {
        let mut names = self.parent.as_ref().map(|p| p.type_names()).unwrap_or_default();
        names.extend(self.entries.read().keys().cloned());
        names
    }

    /// Reads `type || payload` using this level's codec.
    pub fn read(&self, r: &mut dyn Read) -> Result<(Box<dyn Object>, u64)> {
        let (type_name, n) = self.codec.read_type(r)?;
        let mut obj = self
            .instantiate(&type_name)
            .ok_or(Error::BlueprintNotFound(type_name))?;
        let m = obj.read_from(&mut Source::new(r, self))?;
        Ok((obj, n + m))
    }

    /// Writes `type || payload` using this level's codec.
    pub fn write(&self, w: &mut dyn Write, obj: &dyn Object) -> Result<u64> {
        let n = self.codec.write_type(w, obj.object_type())?;
        Ok(n + obj.write_to(w)?)
    }

    pub fn pack(&self, obj: &dyn Object) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(&mut buf, obj)?;
        Ok(buf)
    }

    /// Decodes a packed object, requiring every byte to be consumed.
    pub fn unpack(&self, data: &[u8]) -> Result<Box<dyn Object>> {
        let mut cursor = data;
        let (obj, _) = self.read(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(Error::TrailingData(cursor.len() as u64));
        }
        Ok(obj)
    }

    /// Decodes a bare payload into `obj`, requiring every byte to be consumed.
    pub fn read_payload(&self, obj: &mut dyn Object, payload: &[u8]) -> Result<u64> {
        let mut cursor = payload;
        let n = obj.read_from(&mut Source::new(&mut cursor, self))?;
        if !cursor.is_empty() {
            return Err(Error::TrailingData(cursor.len() as u64));
        }
        Ok(n)
    }
}

impl Default for Blueprints {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Blueprints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprints")
            .field("types", &self.entries.read().keys().collect::<Vec<_>>())
            .field("codec", &self.codec)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Registers every built-in object type.
pub fn register_builtins(bp: &Blueprints) -> Result<(), RegistrationError> {
    use crate::bundle::Bundle;
    use crate::bytes::{Bytes8, Bytes16, Bytes32, Bytes64};
    use crate::ints::*;
    use crate::object_id::ObjectId;
    use crate::object_map::ObjectMap;
    use crate::stamp::ObjectHeader;
    use crate::strings::{String8, String16, String32, String64};
    use crate::time::{Duration, Nonce, Time};

    bp.add([
        Blueprint::of::<Bool>(),
        Blueprint::of::<Uint8>(),
        Blueprint::of::<Uint16>(),
        Blueprint::of::<Uint32>(),
        Blueprint::of::<Uint64>(),
        Blueprint::of::<Int8>(),
        Blueprint::of::<Int16>(),
        Blueprint::of::<Int32>(),
        Blueprint::of::<Int64>(),
        Blueprint::of::<Float32>(),
        Blueprint::of::<Float64>(),
        Blueprint::of::<String8>(),
        Blueprint::of::<String16>(),
        Blueprint::of::<String32>(),
        Blueprint::of::<String64>(),
        Blueprint::of::<Bytes8>(),
        Blueprint::of::<Bytes16>(),
        Blueprint::of::<Bytes32>(),
        Blueprint::of::<Bytes64>(),
        Blueprint::of::<Time>(),
        Blueprint::of::<Duration>(),
        Blueprint::of::<Nonce>(),
        Blueprint::of::<ObjectId>(),
        Blueprint::of::<ObjectHeader>(),
        Blueprint::of::<Bundle>(),
        Blueprint::of::<ObjectMap>(),
    ])
}

static DEFAULT_BLUEPRINTS: LazyLock<Arc<Blueprints>> =
    LazyLock::new(|| Arc::new(Blueprints::with_builtins()));

/// The process-wide root registry, populated with the built-ins on first use.
///
/// Applications register their own types here or in a [`Blueprints::child`].
pub fn default_blueprints() -> &'static Arc<Blueprints> {
    &DEFAULT_BLUEPRINTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ints::{Bool, Int32, Uint8};
    use crate::strings::String8;

    #[derive(Debug, Clone, Default)]
    struct Untyped;

    impl Object for Untyped {
        fn object_type(&self) -> &str {
            ""
        }

        fn write_to(&self, _: &mut dyn Write) -> Result<u64> {
            Ok(0)
        }

        fn read_from(&mut self, _: &mut Source<'_>) -> Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn builtins_register_cleanly() {
        let bp = Blueprints::try_with_builtins().unwrap();
        assert!(bp.instantiate("bool").is_some());
        assert!(bp.instantiate("astral.bundle").is_some());

        let err = register_builtins(&bp).unwrap_err();
        assert!(!err.failures.is_empty());
    }

    #[test]
    fn instantiate_returns_fresh_zero_value() {
        let bp = Blueprints::new();
        bp.add([Blueprint::from_prototype(Int32(9))]).unwrap();
        let a = bp.instantiate("int32").unwrap();
        assert_eq!(a.downcast_ref::<Int32>(), Some(&Int32(9)));
        assert!(bp.instantiate("int64").is_none());
    }

    #[test]
    fn duplicates_are_reported_and_first_wins() {
        let bp = Blueprints::new();
        let err = bp
            .add([
                Blueprint::from_prototype(Uint8(1)),
                Blueprint::from_prototype(Uint8(2)),
                Blueprint::of::<Bool>(),
            ])
            .unwrap_err();
        assert_eq!(err.failures, [RegisterError::Duplicate("uint8".into())]);
        assert_eq!(
            bp.instantiate("uint8").unwrap().downcast_ref::<Uint8>(),
            Some(&Uint8(1))
        );
        assert!(bp.contains("bool"));
    }

    #[test]
    fn all_failures_are_aggregated() {
        let bp = Blueprints::new();
        bp.add_type::<Bool>().unwrap();
        let err = bp
            .add([Blueprint::of::<Untyped>(), Blueprint::of::<Bool>()])
            .unwrap_err();
        assert_eq!(err.failures.len(), 2);
        assert!(matches!(err.failures[0], RegisterError::EmptyType(_)));
        let message = err.to_string();
        assert!(message.contains("empty object type"));
        assert!(message.contains("bool already added"));
    }

    #[test]
    fn lookup_falls_through_to_parent() {
        let root = Arc::new(Blueprints::new());
        root.add_type::<Bool>().unwrap();
        let child = root.child();
        child.add_type::<String8>().unwrap();

        assert!(child.instantiate("bool").is_some());
        assert!(child.instantiate("string8").is_some());
        assert!(root.instantiate("string8").is_none());
        assert_eq!(child.type_names(), ["bool", "string8"]);
    }

    #[test]
    fn child_may_shadow_parent() {
        let root = Arc::new(Blueprints::new());
        root.add([Blueprint::from_prototype(Int32(1))]).unwrap();
        let child = root.child();
        child.add([Blueprint::from_prototype(Int32(2))]).unwrap();
        let v = child.instantiate("int32").unwrap();
        assert_eq!(v.downcast_ref::<Int32>(), Some(&Int32(2)));
    }

    #[test]
    fn codec_levels() {
        let root = Arc::new(Blueprints::with_builtins());
        assert_eq!(root.codec(), &TypeCodec::Short);
        let canonical = root.canonical();
        assert_eq!(canonical.codec(), &TypeCodec::Canonical);
        assert_eq!(canonical.child().codec(), &TypeCodec::Canonical);
        assert_eq!(canonical.short().codec(), &TypeCodec::Short);

        let packed = canonical.pack(&Bool(true)).unwrap();
        assert_eq!(packed, b"ADC0\x04bool\x01");
        let back = canonical.unpack(&packed).unwrap();
        assert_eq!(back.downcast_ref::<Bool>(), Some(&Bool(true)));
    }

    #[test]
    fn indexed_level_round_trip() {
        let root = Arc::new(Blueprints::with_builtins());
        let indexed = root.indexed(["bool", "string8"]);
        let packed = indexed.pack(&String8::from("x")).unwrap();
        assert_eq!(packed, [1, 1, b'x']);
        let back = indexed.unpack(&packed).unwrap();
        assert_eq!(back.downcast_ref::<String8>().unwrap().0, "x");
    }

    #[test]
    fn unpack_rejects_trailing_bytes() {
        let bp = Blueprints::with_builtins();
        let mut packed = bp.pack(&Bool(true)).unwrap();
        packed.push(0);
        assert!(matches!(bp.unpack(&packed), Err(Error::TrailingData(1))));
    }

    #[test]
    fn builtins_are_registered() {
        let names = default_blueprints().type_names();
        for name in ["bool", "float64", "bytes64", "time", "object_id.sha256", "astral.bundle"] {
            assert!(names.iter().any(|n| n == name), "{name} missing");
        }
    }
}
