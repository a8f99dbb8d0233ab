use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::json::{envelope, open_envelope};
use crate::object::{Object, Source, read_short, write_short};
use crate::object_id::ObjectId;
use crate::objectify::objectify_via_object;
use crate::wire::{self, Wire, Width};

#[derive(Default, Clone)]
struct Members {
    objects: Vec<Arc<dyn Object>>,
    index: HashMap<ObjectId, usize>,
}

impl Members {
    fn append(&mut self, obj: Arc<dyn Object>) -> Result<ObjectId> {
        let id = ObjectId::resolve(obj.as_ref())?;
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateObject(id));
        }
        self.index.insert(id, self.objects.len());
        self.objects.push(obj);
        Ok(id)
    }
}

/// An ordered collection of distinct objects, indexed by [`ObjectId`].
///
/// Binary form: `u32 count` followed by each member as
/// `bytes32(string8(type) || payload)`.
#[derive(Default)]
pub struct Bundle {
    members: Mutex<Members>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object, returning its id. An object whose id is already
    /// present is rejected and the bundle is left unchanged.
    pub fn append(&self, obj: impl Object) -> Result<ObjectId> {
        self.append_shared(Arc::new(obj))
    }

    pub fn append_boxed(&self, obj: Box<dyn Object>) -> Result<ObjectId> {
        self.append_shared(Arc::from(obj))
    }

    pub fn append_shared(&self, obj: Arc<dyn Object>) -> Result<ObjectId> {
        self.members.lock().append(obj)
    }

    /// Appends every object in order. Either all are appended or, on the
    /// first failure, none are.
    pub fn append_all(&self, objects: impl IntoIterator<Item = Box<dyn Object>>) -> Result<Vec<ObjectId>> {
        let mut members = self.members.lock();
        let mut staged = members.clone();
        let ids = objects
            .into_iter()
            .map(|obj| staged.append(Arc::from(obj)))
            .collect::<Result<Vec<_>>>()?;
        *members = staged;
        Ok(ids)
    }

    pub fn fetch(&self, id: &ObjectId) -> Option<Arc<dyn Object>> {
        let members = self.members.lock();
        members.index.get(id).map(|&i| Arc::clone(&members.objects[i]))
    }

    pub fn fetch_as<T: Object>(&self, id: &ObjectId) -> Option<Arc<T>> {
        self.fetch(id)?.downcast_arc()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.members.lock().index.contains_key(id)
    }

    /// Members in insertion order.
    pub fn objects(&self) -> Vec<Arc<dyn Object>> {
        self.members.lock().objects.clone()
    }

    pub fn len(&self) -> usize {
        self.members.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for Bundle {
    fn clone(&self) -> Self {
        Self {
            members: Mutex::new(self.members.lock().clone()),
        }
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members.lock();
        f.debug_list().entries(members.objects.iter()).finish()
    }
}

impl Object for Bundle {
    fn object_type(&self) -> &str {
        "astral.bundle"
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        let members = self.members.lock();
        let mut n = Width::W32.write_len(w, members.objects.len() as u64)?;
        for obj in &members.objects {
            let mut packed = Vec::new();
            write_short(&mut packed, obj.as_ref())?;
            n += wire::write_prefixed(w, Width::W32, &packed)?;
        }
        Ok(n)
    }

    /// Replaces the members. A decoding failure leaves the bundle untouched.
    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let mut members = Members::default();
        let count = u32::read_wire(src)?;
        let mut n = 4;
        for _ in 0..count {
            let packed = wire::read_prefixed(src, Width::W32)?;
            n += 4 + packed.len() as u64;
            let (obj, _) = src.nested(&packed, read_short)?;
            members.append(Arc::from(obj))?;
        }
        log::trace!("decoded bundle of {} objects", members.objects.len());
        *self.members.get_mut() = members;
        Ok(n)
    }

    fn to_json(&self) -> Result<JsonValue> {
        let members = self.members.lock();
        members
            .objects
            .iter()
            .map(|obj| envelope(obj.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array)
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        let entries = value
            .as_array()
            .ok_or_else(|| Error::InvalidJson(format!("bundle expects an array, got {value}")))?;
        let mut members = Members::default();
        for entry in entries {
            members.append(Arc::from(open_envelope(entry, blueprints)?))?;
        }
        *self.members.get_mut() = members;
        Ok(())
    }
}

objectify_via_object!(Bundle, "astral.bundle");
