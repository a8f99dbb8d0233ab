use std::io::Write;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::json::{envelope, open_envelope};
use crate::object::{Object, Source, read_short, write_short};
use crate::objectify::objectify_via_object;
use crate::wire::{self, Wire, Width};

/// Named objects in insertion order.
///
/// Binary form: `u32 count` followed by `string16(key) || bytes32(string8(type) || payload)`
/// per entry.
#[derive(Debug, Clone, Default)]
pub struct ObjectMap {
    entries: IndexMap<String, Box<dyn Object>>,
}

impl ObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object, returning the one previously stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, obj: impl Object) -> Option<Box<dyn Object>> {
        self.insert_boxed(key, Box::new(obj))
    }

    pub fn insert_boxed(&mut self, key: impl Into<String>, obj: Box<dyn Object>) -> Option<Box<dyn Object>> {
        self.entries.insert(key.into(), obj)
    }

    pub fn get(&self, key: &str) -> Option<&dyn Object> {
        self.entries.get(key).map(|obj| obj.as_ref())
    }

    pub fn get_as<T: Object>(&self, key: &str) -> Option<&T> {
        self.get(key)?.downcast_ref()
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Object>> {
        self.entries.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Object)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Object for ObjectMap {
    fn object_type(&self) -> &str {
        "astral.object_map"
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        let mut n = Width::W32.write_len(w, self.entries.len() as u64)?;
        for (key, obj) in &self.entries {
            n += wire::write_prefixed(w, Width::W16, key.as_bytes())?;
            let mut packed = Vec::new();
            write_short(&mut packed, obj.as_ref())?;
            n += wire::write_prefixed(w, Width::W32, &packed)?;
        }
        Ok(n)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let count = u32::read_wire(src)?;
        let mut n = 4;
        let mut entries = IndexMap::new();
        for _ in 0..count {
            let key = String::from_utf8(wire::read_prefixed(src, Width::W16)?)?;
            let packed = wire::read_prefixed(src, Width::W32)?;
            n += 6 + (key.len() + packed.len()) as u64;
            let (obj, _) = src.nested(&packed, read_short)?;
            entries.insert(key, obj);
        }
        self.entries = entries;
        Ok(n)
    }

    fn to_json(&self) -> Result<JsonValue> {
        let mut map = Map::new();
        for (key, obj) in &self.entries {
            map.insert(key.clone(), envelope(obj.as_ref())?);
        }
        Ok(JsonValue::Object(map))
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::InvalidJson(format!("object map expects an object, got {value}")))?;
        let mut entries = IndexMap::new();
        for (key, entry) in map {
            entries.insert(key.clone(), open_envelope(entry, blueprints)?);
        }
        self.entries = entries;
        Ok(())
    }
}

objectify_via_object!(ObjectMap, "astral.object_map");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ints::Uint8;
    use crate::strings::String8;

    #[test]
    fn layout() {
        let mut map = ObjectMap::new();
        map.insert("a", Uint8(5));
        let mut buf = Vec::new();
        map.write_to(&mut buf).unwrap();
        assert_eq!(
            buf,
            [0, 0, 0, 1, 0, 1, b'a', 0, 0, 0, 7, 5, b'u', b'i', b'n', b't', b'8', 5]
        );
    }

    #[test]
    fn round_trip_keeps_insertion_order() {
        let mut map = ObjectMap::new();
        map.insert("zeta", String8::from("last"));
        map.insert("alpha", Uint8(1));
        let mut buf = Vec::new();
        map.write_to(&mut buf).unwrap();

        let mut back = ObjectMap::new();
        Blueprints::with_builtins().read_payload(&mut back, &buf).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), ["zeta", "alpha"]);
        assert_eq!(back.get_as::<Uint8>("alpha"), Some(&Uint8(1)));
    }

    #[test]
    fn unknown_member_type_fails() {
        let mut map = ObjectMap::new();
        map.insert("a", Uint8(5));
        let mut buf = Vec::new();
        map.write_to(&mut buf).unwrap();
        let err = Blueprints::new()
            .read_payload(&mut ObjectMap::new(), &buf)
            .unwrap_err();
        assert!(matches!(err, Error::BlueprintNotFound(_)));
    }

    #[test]
    fn json_entries_are_envelopes() {
        let mut map = ObjectMap::new();
        map.insert("name", String8::from("astral"));
        let json = map.to_json().unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": { "type": "string8", "object": "astral" } })
        );
        let mut back = ObjectMap::new();
        back.from_json(&json, &Blueprints::with_builtins()).unwrap();
        assert_eq!(back.get_as::<String8>("name").map(|s| s.0.as_str()), Some("astral"));
    }
}
