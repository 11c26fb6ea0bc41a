//! Property tests: serialization reads back, crypt filters invert.

use pdf_core::encryption::CryptFilter;
use pdf_core::parser::parse;
use pdf_core::{Dict, Object, ObjectRef, PdfString};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Object> {
    prop_oneof![
        Just(Object::Null),
        any::<bool>().prop_map(Object::Boolean),
        any::<i64>().prop_map(Object::Integer),
        (-1_000_000i64..1_000_000, 0u32..4)
            .prop_map(|(n, shift)| Object::Real(n as f64 / f64::from(1u32 << shift))),
        prop::collection::vec(any::<u8>(), 0..24)
            .prop_map(|bytes| Object::String(PdfString::literal(bytes))),
        prop::collection::vec(any::<u8>(), 0..24)
            .prop_map(|bytes| Object::String(PdfString::hex(bytes))),
        "[ -~]{1,16}".prop_map(Object::Name),
        (1u32..100_000, 0u16..10)
            .prop_map(|(id, gen)| Object::Reference(ObjectRef::new(id, gen))),
    ]
}

fn object() -> impl Strategy<Value = Object> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Object::Array),
            prop::collection::vec(("[A-Za-z0-9#/ ]{1,8}", inner), 0..6).prop_map(|entries| {
                Object::Dictionary(entries.into_iter().collect::<Dict>())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_written_objects_parse_back(value in object()) {
        let bytes = value.to_pdf_bytes();
        let parsed = parse(&bytes).unwrap();
        prop_assert_eq!(parsed, value);
    }

    #[test]
    fn prop_crypt_filters_invert(
        data in prop::collection::vec(any::<u8>(), 0..200),
        file_key in prop::collection::vec(any::<u8>(), 32),
        number in 1u32..(1 << 24),
        generation in any::<u16>(),
    ) {
        let filters = [
            CryptFilter::V2 { key_len: 5 },
            CryptFilter::V2 { key_len: 16 },
            CryptFilter::AesV2,
            CryptFilter::AesV3,
        ];
        for filter in filters {
            let file_key = &file_key[..filter.key_length()];
            let key = filter.make_key(file_key, number, generation);
            let sealed = filter.encrypt(&key, &data).unwrap();
            match filter {
                CryptFilter::V2 { key_len } => {
                    prop_assert_eq!(key.len(), (key_len + 5).min(16));
                    prop_assert_eq!(sealed.len(), data.len());
                },
                _ => {
                    // IV plus padded blocks
                    prop_assert_eq!(sealed.len(), 16 + (data.len() / 16 + 1) * 16);
                    prop_assert_eq!(key.len(), filter.key_length());
                },
            }
            prop_assert_eq!(filter.decrypt(&key, &sealed).unwrap(), data.clone());
        }
    }
}

#[test]
fn test_identity_filter_passes_through() {
    let filter = CryptFilter::Identity;
    let key = filter.make_key(b"", 7, 0);
    assert_eq!(filter.encrypt(&key, b"plain").unwrap(), b"plain");
    assert_eq!(filter.decrypt(&key, b"plain").unwrap(), b"plain");
}

#[test]
fn test_object_keys_differ_per_object() {
    let filter = CryptFilter::AesV2;
    let file_key = [0x42u8; 16];
    let a = filter.make_key(&file_key, 1, 0);
    let b = filter.make_key(&file_key, 2, 0);
    let c = filter.make_key(&file_key, 1, 1);
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(CryptFilter::AesV3.make_key(&[9u8; 32], 1, 0), vec![9u8; 32]);
}
