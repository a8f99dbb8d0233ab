//! Property-based tests using proptest

use std::collections::BTreeMap;
use std::sync::Arc;

use astral_core::json;
use astral_core::{
    Blueprints, Bytes32, Error, Object, ObjectId, ObjectReader, ObjectWriter, Objectify, Stream,
    String8, Width, decode, encode,
};
use proptest::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, Objectify)]
struct Sample {
    id: i64,
    flag: bool,
    level: u8,
    ratio: f64,
    name: String,
    limit: Option<u32>,
    deltas: Vec<i16>,
    digest: [u8; 4],
    counts: BTreeMap<String, u64>,
    child: Option<Box<Sample>>,
}

fn leaf() -> impl Strategy<Value = Sample> {
    (
        any::<i64>(),
        any::<bool>(),
        any::<u8>(),
        prop::num::f64::NORMAL,
        ".{0,16}",
        any::<Option<u32>>(),
        prop::collection::vec(any::<i16>(), 0..8),
        any::<[u8; 4]>(),
        prop::collection::btree_map("[a-z]{1,6}", any::<u64>(), 0..4),
    )
        .prop_map(
            |(id, flag, level, ratio, name, limit, deltas, digest, counts)| Sample {
                id,
                flag,
                level,
                ratio,
                name,
                limit,
                deltas,
                digest,
                counts,
                child: None,
            },
        )
}

fn sample() -> impl Strategy<Value = Sample> {
    (leaf(), prop::option::of(leaf())).prop_map(|(mut parent, child)| {
        parent.child = child.map(Box::new);
        parent
    })
}

proptest! {
    #[test]
    fn prop_record_binary_roundtrip(value in sample()) {
        let bytes = encode(&value).unwrap();
        let back: Sample = decode(&bytes, &Blueprints::new()).unwrap();
        prop_assert_eq!(back, value);
    }
}

proptest! {
    #[test]
    fn prop_record_json_roundtrip(value in sample()) {
        let tree = json::to_json(&value).unwrap();
        let back: Sample = json::from_json(&tree, &Blueprints::new()).unwrap();
        prop_assert_eq!(back, value);
    }
}

proptest! {
    #[test]
    fn prop_string8_capacity(len in 0usize..400) {
        let text = "a".repeat(len);
        let result = encode(&String8::from(text.as_str()));
        if len <= 255 {
            let bytes = result.unwrap();
            prop_assert_eq!(bytes.len(), len + 1);
            prop_assert_eq!(usize::from(bytes[0]), len);
        } else {
            let is_too_large = matches!(result, Err(Error::DataTooLarge { width: Width::W8, .. }));
            prop_assert!(is_too_large);
        }
    }
}

proptest! {
    #[test]
    fn prop_object_id_tracks_every_byte(
        data in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
    ) {
        let original = Bytes32(data.clone());
        let mut changed = data;
        let i = index.index(changed.len());
        changed[i] = changed[i].wrapping_add(1);

        let a = ObjectId::resolve(&original).unwrap();
        prop_assert_eq!(a, ObjectId::resolve(&original).unwrap());
        prop_assert_ne!(a, ObjectId::resolve(&Bytes32(changed)).unwrap());
    }
}

proptest! {
    #[test]
    fn prop_object_id_text_roundtrip(size in any::<u64>(), hash in any::<[u8; 32]>()) {
        let id = ObjectId::new(size, hash);
        let text = id.to_string();
        prop_assert!(text.starts_with("data1"));
        prop_assert_eq!(text.parse::<ObjectId>().unwrap(), id);
    }
}

proptest! {
    #[test]
    fn prop_stream_preserves_order(payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8)) {
        let blueprints = Arc::new(Blueprints::with_builtins());
        let mut out = Stream::new(Vec::new(), Width::W16, Arc::clone(&blueprints));
        for payload in &payloads {
            out.write_object(&Bytes32(payload.clone())).unwrap();
        }
        let bytes = out.into_inner();

        let mut input = Stream::new(&bytes[..], Width::W16, blueprints);
        for payload in &payloads {
            let obj = input.read_object().unwrap();
            prop_assert_eq!(obj.object_type(), "bytes32");
            prop_assert_eq!(&obj.downcast_ref::<Bytes32>().unwrap().0, payload);
        }
        prop_assert!(input.read_object().unwrap_err().is_eof());
    }
}
