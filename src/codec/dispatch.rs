//! Tag dispatcher: сопоставляет каждому значению ровно один тег.
//!
//! Чистая функция без состояния. Всё, что не входит в поддерживаемый набор
//! типов, отклоняется с `UnsupportedType` до записи первого байта.

use std::sync::Arc;

use zgraph_error::EncodeError;

use super::{
    extension::{Extension, ExtensionRegistry},
    tags::WireTag,
};
use crate::value::{CustomObject, Graph, Node, NodeId, Primitive, Value};

/// Допустимые флаги RegExp.
pub const REGEXP_FLAGS: &str = "dgimsuvy";

/// Флаги из допустимого набора, без повторов.
pub fn valid_regexp_flags(flags: &str) -> bool {
    let mut seen = 0u8;
    for c in flags.chars() {
        let Some(pos) = REGEXP_FLAGS.find(c) else {
            return false;
        };
        let bit = 1u8 << pos;
        if seen & bit != 0 {
            return false;
        }
        seen |= bit;
    }
    true
}

/// Тег для любого значения; ссылки классифицируются по узлу, на который
/// они указывают.
pub fn classify(
    value: &Value,
    graph: &Graph,
    registry: &ExtensionRegistry,
) -> Result<WireTag, EncodeError> {
    match value {
        Value::Ref(id) => {
            let node = graph
                .get(*id)
                .ok_or(EncodeError::DanglingReference { node: id.0 })?;
            classify_node(node, graph, registry)
        }
        other => classify_scalar(other),
    }
}

/// Тег для инлайн-значения (не `Ref`).
pub fn classify_scalar(value: &Value) -> Result<WireTag, EncodeError> {
    Ok(match value {
        Value::Undefined => WireTag::Undefined,
        Value::Null => WireTag::Null,
        Value::Bool(true) => WireTag::True,
        Value::Bool(false) => WireTag::False,
        Value::Number(_) => WireTag::Number,
        Value::BigInt(_) => WireTag::BigInt,
        Value::String(_) => WireTag::String,
        Value::Date(_) => WireTag::Date,
        Value::RegExp(re) => {
            if !valid_regexp_flags(&re.flags) {
                return Err(EncodeError::unsupported(
                    "RegExp",
                    format!("invalid flags {:?}", re.flags),
                ));
            }
            WireTag::RegExp
        }
        Value::Symbol(desc) => {
            return Err(EncodeError::unsupported(
                "symbol",
                format!("Symbol({desc}) has no wire representation"),
            ))
        }
        Value::Ref(id) => {
            return Err(EncodeError::unsupported(
                "object",
                format!("node #{} must be classified through its graph", id.0),
            ))
        }
    })
}

pub fn classify_node(
    node: &Node,
    graph: &Graph,
    registry: &ExtensionRegistry,
) -> Result<WireTag, EncodeError> {
    Ok(match node {
        Node::Array(arr) => {
            if let Some((&last, _)) = arr.elements.last_key_value() {
                if last >= arr.length {
                    return Err(EncodeError::unsupported(
                        "Array",
                        format!("index {last} is beyond length {}", arr.length),
                    ));
                }
            }
            if arr.is_dense() {
                WireTag::ArrayDense
            } else {
                WireTag::ArraySparse
            }
        }
        Node::Object(_) => WireTag::Object,
        Node::Map(_) => WireTag::Map,
        Node::Set(_) => WireTag::Set,
        Node::Buffer(b) if b.shared => WireTag::SharedBuffer,
        Node::Buffer(_) => WireTag::Buffer,
        Node::TypedArray(t) => WireTag::for_element_kind(t.kind()),
        Node::DataView(view) => {
            check_view(view.buffer, view.byte_offset, view.byte_length, graph)?;
            WireTag::DataView
        }
        Node::Wrapper(Primitive::Bool(_)) => WireTag::WrapperBool,
        Node::Wrapper(Primitive::Number(_)) => WireTag::WrapperNumber,
        Node::Wrapper(Primitive::String(_)) => WireTag::WrapperString,
        Node::Wrapper(Primitive::BigInt(_)) => WireTag::WrapperBigInt,
        Node::Custom(custom) => {
            let ext = extension_for(custom, registry)?;
            ext.validate(&custom.payload, graph).map_err(|reason| {
                EncodeError::unsupported(format!("CustomObject({})", ext.name()), reason)
            })?;
            WireTag::CustomObject
        }
        Node::Opaque(kind) => {
            return Err(EncodeError::unsupported(
                kind.name(),
                "host object has no wire representation",
            ))
        }
    })
}

/// Payload пользовательского объекта в том виде, в каком он пишется в
/// поток: результат [`Extension::encode`](super::Extension::encode).
pub fn encode_custom(
    custom: &CustomObject,
    graph: &Graph,
    registry: &ExtensionRegistry,
) -> Result<Value, EncodeError> {
    let ext = extension_for(custom, registry)?;
    ext.encode(&custom.payload, graph).map_err(|reason| {
        EncodeError::unsupported(format!("CustomObject({})", ext.name()), reason)
    })
}

fn extension_for<'r>(
    custom: &CustomObject,
    registry: &'r ExtensionRegistry,
) -> Result<&'r Arc<dyn Extension>, EncodeError> {
    registry.get(custom.extension).ok_or_else(|| {
        EncodeError::unsupported(
            "CustomObject",
            format!("extension {} is not registered", custom.extension),
        )
    })
}

fn check_view(
    buffer: NodeId,
    offset: usize,
    length: usize,
    graph: &Graph,
) -> Result<(), EncodeError> {
    let target = graph
        .get(buffer)
        .ok_or(EncodeError::DanglingReference { node: buffer.0 })?;
    let Node::Buffer(buf) = target else {
        return Err(EncodeError::unsupported(
            "DataView",
            format!("views a {} instead of a buffer", target.type_name()),
        ));
    };
    match offset.checked_add(length) {
        Some(end) if end <= buf.bytes.len() => Ok(()),
        _ => Err(EncodeError::unsupported(
            "DataView",
            format!(
                "window {offset}+{length} exceeds buffer of {} bytes",
                buf.bytes.len()
            ),
        )),
    }
}
