//! Shared schema builders for integration tests.

#![allow(dead_code)]

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    descriptor_proto::ExtensionRange, DescriptorProto, EnumDescriptorProto, EnumOptions,
    EnumValueDescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MessageOptions, OneofDescriptorProto,
};

pub fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.into()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
    }
}

pub fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

pub fn typed(mut field: FieldDescriptorProto, type_name: &str) -> FieldDescriptorProto {
    field.type_name = Some(type_name.into());
    field
}

pub fn enum_type(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.into()),
        value: values
            .iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some((*name).into()),
                number: Some(*number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// `shop.proto` (proto3): an order with every field shape the engine handles
pub fn shop_file() -> FileDescriptorProto {
    let mut gift = field("gift", 8, Type::Bool);
    gift.proto3_optional = Some(true);
    gift.oneof_index = Some(0);

    let stock_entry = DescriptorProto {
        name: Some("StockEntry".into()),
        field: vec![field("key", 1, Type::String), field("value", 2, Type::Int32)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let order = DescriptorProto {
        name: Some("Order".into()),
        field: vec![
            field("id", 1, Type::Uint64),
            field("customer", 2, Type::String),
            repeated(field("quantities", 3, Type::Int32)),
            typed(field("status", 4, Type::Enum), "Status"),
            typed(field("shipping", 5, Type::Message), "Address"),
            repeated(field("notes", 6, Type::String)),
            repeated(typed(field("stock", 7, Type::Message), "Order.StockEntry")),
            gift,
            field("total", 9, Type::Double),
            field("signature", 10, Type::Bytes),
            field("delta", 11, Type::Sint32),
            field("checksum", 12, Type::Fixed64),
        ],
        nested_type: vec![stock_entry],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("_gift".into()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let address = DescriptorProto {
        name: Some("Address".into()),
        field: vec![field("street", 1, Type::String), field("city", 2, Type::String)],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("shop.proto".into()),
        package: Some("shop".into()),
        syntax: Some("proto3".into()),
        message_type: vec![order, address],
        enum_type: vec![enum_type(
            "Status",
            &[("STATUS_UNKNOWN", 0), ("STATUS_OPEN", 1), ("STATUS_CLOSED", 2)],
        )],
        ..Default::default()
    }
}

/// `legacy.proto` (proto2): closed enums, aliases, defaults and extensions
pub fn legacy_file() -> FileDescriptorProto {
    let mut level = typed(field("level", 2, Type::Enum), ".legacy.Level");
    level.default_value = Some("HIGH".into());
    let mut retries = field("retries", 3, Type::Int32);
    retries.default_value = Some("3".into());

    let base = DescriptorProto {
        name: Some("Base".into()),
        field: vec![field("id", 1, Type::Int32), level, retries],
        extension_range: vec![ExtensionRange {
            start: Some(100),
            end: Some(200),
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut note = field("note", 100, Type::String);
    note.extendee = Some(".legacy.Base".into());

    let mut alias = enum_type("Alias", &[("FIRST", 4), ("SECOND", 4)]);
    alias.options = Some(EnumOptions {
        allow_alias: Some(true),
        ..Default::default()
    });

    FileDescriptorProto {
        name: Some("legacy.proto".into()),
        package: Some("legacy".into()),
        message_type: vec![base],
        enum_type: vec![enum_type("Level", &[("LOW", 1), ("HIGH", 2)]), alias],
        extension: vec![note],
        ..Default::default()
    }
}

pub fn file_set(files: Vec<FileDescriptorProto>) -> FileDescriptorSet {
    FileDescriptorSet { file: files }
}
