//! Human-readable outlines of message types and message values.

use dynproto_core::{
    Cardinality, DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor, Syntax,
    Value,
};
use std::fmt::{self, Write as FmtWrite};

/// Writes indented outlines into any `fmt::Write`
pub(crate) struct OutlineWriter<'a, W: FmtWrite> {
    writer: &'a mut W,
    indent_str: &'static str,
    indent_level: usize,
}

impl<'a, W: FmtWrite> OutlineWriter<'a, W> {
    pub(crate) fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            indent_str: "  ",
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.indent_str)?;
        }
        Ok(())
    }

    fn writeln(&mut self, s: &str) -> fmt::Result {
        self.write_indent()?;
        writeln!(self.writer, "{}", s)
    }

    /// Outline of a message type: fields, oneofs, nested types and extension ranges
    pub(crate) fn write_message_type(&mut self, desc: &MessageDescriptor) -> fmt::Result {
        let suffix = if desc.is_map_entry() { " (map entry)" } else { "" };
        self.writeln(&format!("message {}{} {{", desc.full_name(), suffix))?;
        self.indent();

        for field in desc.fields() {
            if field
                .containing_oneof()
                .map_or(false, |oneof| !oneof.is_synthetic())
            {
                continue;
            }
            self.writeln(&field_line(&field))?;
        }

        for oneof in desc.oneofs().filter(|oneof| !oneof.is_synthetic()) {
            self.writeln(&format!("oneof {} {{", oneof.name()))?;
            self.indent();
            for field in oneof.fields() {
                self.writeln(&field_line(&field))?;
            }
            self.dedent();
            self.writeln("}")?;
        }

        for range in desc.extension_ranges() {
            self.writeln(&format!("extensions {} to {};", range.start, range.end - 1))?;
        }

        for extension in desc.extensions() {
            self.writeln(&format!(
                "extension {} ({})",
                field_line(&extension),
                extension.full_name()
            ))?;
        }

        for nested in desc.nested_messages() {
            self.write_message_type(&nested)?;
        }
        for nested in desc.nested_enums() {
            self.write_enum_type(&nested)?;
        }

        self.dedent();
        self.writeln("}")
    }

    pub(crate) fn write_enum_type(&mut self, desc: &EnumDescriptor) -> fmt::Result {
        let suffix = if desc.is_closed() { " (closed)" } else { "" };
        self.writeln(&format!("enum {}{} {{", desc.full_name(), suffix))?;
        self.indent();
        for value in desc.values() {
            self.writeln(&format!("{} = {};", value.name(), value.number()))?;
        }
        self.dedent();
        self.writeln("}")
    }

    /// Field-by-field dump of a message value
    pub(crate) fn write_message(&mut self, message: &DynamicMessage) -> fmt::Result {
        self.writeln(&format!("{} {{", message.descriptor().full_name()))?;
        self.indent();
        self.write_fields(message)?;
        self.dedent();
        self.writeln("}")
    }

    fn write_fields(&mut self, message: &DynamicMessage) -> fmt::Result {
        for (field, value) in message.fields() {
            match value {
                Value::List(values) => {
                    for value in values {
                        self.write_field(field, value)?;
                    }
                }
                value => self.write_field(field, value)?,
            }
        }

        for unknown in message.unknown_fields() {
            self.writeln(&format!(
                "{}: <unknown {:?}> {}",
                unknown.number(),
                unknown.wire_type(),
                hex(unknown.value())
            ))?;
        }
        Ok(())
    }

    fn write_field(&mut self, field: &FieldDescriptor, value: &Value) -> fmt::Result {
        let name = if field.is_extension() {
            format!("[{}]", field.full_name())
        } else {
            field.name().to_string()
        };

        match value {
            Value::Message(nested) => {
                self.writeln(&format!("{} {{", name))?;
                self.indent();
                self.write_fields(nested)?;
                self.dedent();
                self.writeln("}")
            }
            value => self.writeln(&format!("{}: {}", name, scalar_text(field, value))),
        }
    }
}

/// One field declaration in schema-like form, e.g. `repeated int32 ids = 3 [packed];`
fn field_line(field: &FieldDescriptor) -> String {
    let label = match field.cardinality() {
        Cardinality::Repeated if field.is_map() => "",
        Cardinality::Repeated => "repeated ",
        Cardinality::Required => "required ",
        Cardinality::Optional if field.is_proto3_optional() => "optional ",
        Cardinality::Optional
            if field.parent_file().syntax() == Syntax::Proto2
                && field.containing_oneof().is_none() =>
        {
            "optional "
        }
        Cardinality::Optional => "",
    };

    let kind = field.kind();
    let type_name = match &kind {
        Kind::Message(entry) if field.is_map() => {
            let key = entry.get_field(1).map(|f| f.kind().name().to_string());
            let value = entry.get_field(2).map(|f| f.kind().name().to_string());
            format!(
                "map<{}, {}>",
                key.unwrap_or_default(),
                value.unwrap_or_default()
            )
        }
        Kind::Message(group) if field.is_group() => format!("group {}", group.full_name()),
        kind => kind.name().to_string(),
    };

    let options = if field.is_packed() { " [packed]" } else { "" };
    format!(
        "{}{} {} = {}{};",
        label,
        type_name,
        field.name(),
        field.number(),
        options
    )
}

fn scalar_text(field: &FieldDescriptor, value: &Value) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::String(v) => format!("{:?}", v),
        Value::Bytes(v) => format!("b\"{}\"", v.escape_ascii()),
        Value::EnumNumber(number) => {
            let name = field
                .kind()
                .as_enum()
                .and_then(|desc| desc.get_value(*number))
                .map(|value| value.name().to_string());
            match name {
                Some(name) => format!("{} ({})", name, number),
                None => number.to_string(),
            }
        }
        Value::Message(message) => message.descriptor().full_name().to_string(),
        Value::List(values) => format!("[{} values]", values.len()),
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
