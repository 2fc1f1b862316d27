//! Cross-checks against prost-reflect: bytes written by one side must parse to
//! the same values on the other.

mod common;

use common::{file_set, legacy_file, shop_file};
use dynproto_core::{DescriptorPool, DynamicMessage, Value};
use pretty_assertions::assert_eq;
use prost::Message;

fn pools() -> (DescriptorPool, prost_reflect::DescriptorPool) {
    let set = file_set(vec![shop_file(), legacy_file()]);
    let reference = prost_reflect::DescriptorPool::from_file_descriptor_set(set.clone()).unwrap();
    let pool = DescriptorPool::from_file_descriptor_set(set).unwrap();
    (pool, reference)
}

#[test]
fn test_reads_bytes_written_by_prost_reflect() {
    let (pool, reference) = pools();
    let reference_desc = reference.get_message_by_name("shop.Order").unwrap();
    let mut written = prost_reflect::DynamicMessage::new(reference_desc);
    written.set_field_by_name("id", prost_reflect::Value::U64(77));
    written.set_field_by_name("customer", prost_reflect::Value::String("Grace".into()));
    written.set_field_by_name(
        "quantities",
        prost_reflect::Value::List(vec![
            prost_reflect::Value::I32(-5),
            prost_reflect::Value::I32(300),
        ]),
    );
    written.set_field_by_name("status", prost_reflect::Value::EnumNumber(2));
    written.set_field_by_name("delta", prost_reflect::Value::I32(-3));
    written.set_field_by_name("checksum", prost_reflect::Value::U64(42));
    let bytes = written.encode_to_vec();

    let desc = pool.get_message_by_name("shop.Order").unwrap();
    let decoded = DynamicMessage::decode(desc.clone(), bytes.as_slice()).unwrap();
    let get = |name: &str| decoded.get(&desc.get_field_by_name(name).unwrap()).into_owned();

    assert_eq!(get("id"), Value::U64(77));
    assert_eq!(get("customer"), Value::from("Grace"));
    assert_eq!(
        get("quantities"),
        Value::List(vec![Value::I32(-5), Value::I32(300)])
    );
    assert_eq!(get("status"), Value::EnumNumber(2));
    assert_eq!(get("delta"), Value::I32(-3));
    assert_eq!(get("checksum"), Value::U64(42));
    assert!(decoded.unknown_fields().is_empty());
}

#[test]
fn test_prost_reflect_reads_our_bytes() {
    let (pool, reference) = pools();
    let desc = pool.get_message_by_name("shop.Order").unwrap();
    let mut message = DynamicMessage::new(desc.clone());
    let field = |name: &str| desc.get_field_by_name(name).unwrap();

    message.set(&field("id"), Value::U64(5)).unwrap();
    message.set(&field("total"), Value::F64(-0.25)).unwrap();
    message
        .set(
            &field("notes"),
            Value::List(vec![Value::from("a"), Value::from("b")]),
        )
        .unwrap();
    message.set(&field("delta"), Value::I32(i32::MIN)).unwrap();
    let bytes = message.encode_to_vec();

    let reference_desc = reference.get_message_by_name("shop.Order").unwrap();
    let decoded = prost_reflect::DynamicMessage::decode(reference_desc, bytes.as_slice()).unwrap();
    assert_eq!(
        *decoded.get_field_by_name("id").unwrap(),
        prost_reflect::Value::U64(5)
    );
    assert_eq!(
        *decoded.get_field_by_name("total").unwrap(),
        prost_reflect::Value::F64(-0.25)
    );
    assert_eq!(
        *decoded.get_field_by_name("notes").unwrap(),
        prost_reflect::Value::List(vec![
            prost_reflect::Value::String("a".into()),
            prost_reflect::Value::String("b".into()),
        ])
    );
    assert_eq!(
        *decoded.get_field_by_name("delta").unwrap(),
        prost_reflect::Value::I32(i32::MIN)
    );
    assert_eq!(decoded.encoded_len(), message.encoded_len());
}

#[test]
fn test_extension_interop() {
    let (pool, reference) = pools();
    let reference_desc = reference.get_message_by_name("legacy.Base").unwrap();
    let reference_ext = reference.get_extension_by_name("legacy.note").unwrap();
    let mut written = prost_reflect::DynamicMessage::new(reference_desc);
    written.set_field_by_name("id", prost_reflect::Value::I32(1));
    written.set_extension(&reference_ext, prost_reflect::Value::String("ext".into()));
    let bytes = written.encode_to_vec();

    let desc = pool.get_message_by_name("legacy.Base").unwrap();
    let note = pool.get_extension_by_name("legacy.note").unwrap();
    let decoded = DynamicMessage::decode(desc, bytes.as_slice()).unwrap();
    assert_eq!(decoded.get(&note).as_str(), Some("ext"));
    assert_eq!(decoded.encode_to_vec(), bytes);
}
