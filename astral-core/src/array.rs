use std::fmt;
use std::io::Write;
use std::marker::PhantomData;

use serde_json::Value as JsonValue;

use crate::blueprints::Blueprints;
use crate::error::{Error, Result};
use crate::object::{Object, Source};
use crate::objectify::Objectify;
use crate::shape::Shape;
use crate::wire::{self, Width};

const PREALLOC_ITEMS: u64 = 1024;

/// The width of a container's element count, fixed by the container type.
pub trait CountWidth: fmt::Debug + Clone + Send + Sync + 'static {
    const WIDTH: Width;
}

macro_rules! count_widths {
    ($($name:ident => $width:ident),* $(,)?) => {$(
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl CountWidth for $name {
            const WIDTH: Width = Width::$width;
        }
    )*};
}

count_widths!(Count8 => W8, Count16 => W16, Count32 => W32, Count64 => W64);

fn check_count(width: Width, len: usize) {
    assert!(
        width.fits(len as u64),
        "{len} elements do not fit a {width} count"
    );
}

fn items_json<T: Object>(items: &[T]) -> Result<JsonValue> {
    items
        .iter()
        .map(|item| item.to_json())
        .collect::<Result<Vec<_>>>()
        .map(JsonValue::Array)
}

fn items_from_json<T: Object + Default>(value: &JsonValue, blueprints: &Blueprints) -> Result<Vec<T>> {
    let values = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Array(values) => values,
        other => return Err(Error::InvalidJson(format!("expected an array, got {other}"))),
    };
    values
        .iter()
        .map(|v| {
            let mut item = T::default();
            item.from_json(v, blueprints)?;
            Ok(item)
        })
        .collect()
}

macro_rules! list_common {
    ($name:ident, $framed:expr) => {
        impl<T, C: CountWidth> $name<T, C> {
            pub fn new(items: Vec<T>) -> Self {
                Self {
                    items,
                    width: PhantomData,
                }
            }

            pub fn width(&self) -> Width {
                C::WIDTH
            }

            pub fn items(&self) -> &[T] {
                &self.items
            }

            pub fn items_mut(&mut self) -> &mut Vec<T> {
                &mut self.items
            }

            pub fn into_inner(self) -> Vec<T> {
                self.items
            }

            pub fn len(&self) -> usize {
                self.items.len()
            }

            pub fn is_empty(&self) -> bool {
                self.items.is_empty()
            }
        }

        impl<T, C: CountWidth> Default for $name<T, C> {
            fn default() -> Self {
                Self::new(Vec::new())
            }
        }

        impl<T, C: CountWidth> From<Vec<T>> for $name<T, C> {
            fn from(items: Vec<T>) -> Self {
                Self::new(items)
            }
        }

        impl<T: Object + Clone + Default, C: CountWidth> Objectify for $name<T, C> {
            fn shape() -> Shape {
                Shape::list(C::WIDTH, $framed, Shape::object(T::default().object_type()))
            }

            fn write_value(&self, w: &mut dyn Write) -> Result<u64> {
                self.write_to(w)
            }

            fn read_value(&mut self, src: &mut Source<'_>) -> Result<u64> {
                self.read_from(src)
            }

            fn json_value(&self) -> Result<JsonValue> {
                self.to_json()
            }

            fn set_json_value(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
                self.from_json(value, blueprints)
            }
        }
    };
}

/// Objects behind a count whose width is set by `C`.
///
/// # Panics
///
/// Writing panics when the element count exceeds the width.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T, C = Count32> {
    items: Vec<T>,
    width: PhantomData<C>,
}

list_common!(Array, false);

impl<T: Object + Clone + Default, C: CountWidth> Object for Array<T, C> {
    fn object_type(&self) -> &str {
        ""
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        check_count(C::WIDTH, self.items.len());
        let mut n = C::WIDTH.write_len(w, self.items.len() as u64)?;
        for item in &self.items {
            n += item.write_to(w)?;
        }
        Ok(n)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let count = C::WIDTH.read_len(src)?;
        let mut n = C::WIDTH.bytes();
        let mut items = Vec::with_capacity(count.min(PREALLOC_ITEMS) as usize);
        for _ in 0..count {
            let mut item = T::default();
            n += item.read_from(src)?;
            items.push(item);
        }
        self.items = items;
        Ok(n)
    }

    fn to_json(&self) -> Result<JsonValue> {
        items_json(&self.items)
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        self.items = items_from_json(value, blueprints)?;
        Ok(())
    }
}

/// Like [`Array`], but every element also sits behind a u32 length.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T, C = Count32> {
    items: Vec<T>,
    width: PhantomData<C>,
}

list_common!(Slice, true);

impl<T: Object + Clone + Default, C: CountWidth> Object for Slice<T, C> {
    fn object_type(&self) -> &str {
        ""
    }

    fn write_to(&self, w: &mut dyn Write) -> Result<u64> {
        check_count(C::WIDTH, self.items.len());
        let mut n = C::WIDTH.write_len(w, self.items.len() as u64)?;
        for item in &self.items {
            let mut payload = Vec::new();
            item.write_to(&mut payload)?;
            n += wire::write_prefixed(w, Width::W32, &payload)?;
        }
        Ok(n)
    }

    fn read_from(&mut self, src: &mut Source<'_>) -> Result<u64> {
        let count = C::WIDTH.read_len(src)?;
        let mut n = C::WIDTH.bytes();
        let mut items = Vec::with_capacity(count.min(PREALLOC_ITEMS) as usize);
        for _ in 0..count {
            let payload = wire::read_prefixed(src, Width::W32)?;
            n += 4 + payload.len() as u64;
            let mut item = T::default();
            src.nested(&payload, |sub| item.read_from(sub))?;
            items.push(item);
        }
        self.items = items;
        Ok(n)
    }

    fn to_json(&self) -> Result<JsonValue> {
        items_json(&self.items)
    }

    fn from_json(&mut self, value: &JsonValue, blueprints: &Blueprints) -> Result<()> {
        self.items = items_from_json(value, blueprints)?;
        Ok(())
    }
}
