//! Object builder / reference resolver.
//!
//! Контейнер выделяется в арене в момент чтения его заголовка и сразу
//! регистрируется под следующим id, до того как будет прочитан хоть один
//! его ребёнок. Поэтому обратная ссылка может указывать на ещё не
//! заполненный контейнер: так восстанавливаются циклы.

use std::sync::Arc;

use tracing::trace;
use zgraph_error::DecodeError;

use super::extension::ExtensionRegistry;
use crate::value::{
    Array, BigInt, Buffer, CustomObject, DataView, Document, ElementKind, Endian, Graph, Node,
    NodeId, Object, Primitive, TypedArray, Value,
};

/// Заглушка для DataView, пока не прочитан его буфер.
const UNATTACHED: NodeId = NodeId(u32::MAX);

#[derive(Debug)]
pub struct Builder {
    graph: Graph,
    /// wire id -> узел в арене
    table: Vec<NodeId>,
    registry: Arc<ExtensionRegistry>,
}

impl Builder {
    pub fn new(registry: Arc<ExtensionRegistry>) -> Self {
        Self {
            graph: Graph::new(),
            table: Vec::new(),
            registry,
        }
    }

    /// Кол-во уже выданных id.
    pub fn assigned(&self) -> u64 {
        self.table.len() as u64
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Выделяет контейнер и регистрирует его под следующим id.
    pub fn allocate(
        &mut self,
        node: Node,
    ) -> NodeId {
        let node_id = self.graph.insert(node);
        trace!(
            wire_id = self.table.len(),
            kind = self.graph[node_id].type_name(),
            "allocate"
        );
        self.table.push(node_id);
        node_id
    }

    pub fn allocate_array(
        &mut self,
        length: usize,
    ) -> NodeId {
        self.allocate(Node::Array(Array::with_length(length)))
    }

    pub fn allocate_object(&mut self) -> NodeId {
        self.allocate(Node::Object(Object::new()))
    }

    pub fn allocate_map(&mut self) -> NodeId {
        self.allocate(Node::Map(Vec::new()))
    }

    pub fn allocate_set(&mut self) -> NodeId {
        self.allocate(Node::Set(Vec::new()))
    }

    pub fn allocate_buffer(
        &mut self,
        shared: bool,
    ) -> NodeId {
        self.allocate(Node::Buffer(Buffer {
            bytes: Vec::new(),
            shared,
        }))
    }

    pub fn allocate_typed(
        &mut self,
        kind: ElementKind,
    ) -> NodeId {
        let empty = TypedArray::from_bytes(kind, Endian::Little, &[])
            .unwrap_or(TypedArray::Uint8(Vec::new()));
        self.allocate(Node::TypedArray(empty))
    }

    pub fn allocate_view(
        &mut self,
        byte_offset: usize,
        byte_length: usize,
    ) -> NodeId {
        self.allocate(Node::DataView(DataView {
            buffer: UNATTACHED,
            byte_offset,
            byte_length,
        }))
    }

    pub fn allocate_wrapper(
        &mut self,
        primitive: Primitive,
    ) -> NodeId {
        self.allocate(Node::Wrapper(primitive))
    }

    pub fn allocate_custom(
        &mut self,
        extension: u32,
    ) -> NodeId {
        self.allocate(Node::Custom(CustomObject {
            extension,
            payload: Value::Undefined,
        }))
    }

    /// Разрешает обратную ссылку.
    pub fn resolve(
        &self,
        id: u64,
    ) -> Result<NodeId, DecodeError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.table.get(i).copied())
            .ok_or(DecodeError::UnresolvedReference {
                id,
                assigned: self.assigned(),
            })
    }

    fn node_mut(
        &mut self,
        id: NodeId,
    ) -> Result<&mut Node, DecodeError> {
        self.graph
            .get_mut(id)
            .ok_or_else(|| DecodeError::malformed(format!("node #{} is not allocated", id.0), None))
    }

    pub fn set_element(
        &mut self,
        array: NodeId,
        index: usize,
        value: Value,
    ) -> Result<(), DecodeError> {
        match self.node_mut(array)? {
            Node::Array(arr) => {
                arr.elements.insert(index, value);
                Ok(())
            }
            other => Err(kind_mismatch("Array", other)),
        }
    }

    pub fn insert_property(
        &mut self,
        object: NodeId,
        key: String,
        value: Value,
    ) -> Result<(), DecodeError> {
        match self.node_mut(object)? {
            Node::Object(obj) => {
                obj.insert(key, value);
                Ok(())
            }
            other => Err(kind_mismatch("Object", other)),
        }
    }

    pub fn insert_entry(
        &mut self,
        map: NodeId,
        key: Value,
        value: Value,
    ) -> Result<(), DecodeError> {
        match self.node_mut(map)? {
            Node::Map(entries) => {
                entries.push((key, value));
                Ok(())
            }
            other => Err(kind_mismatch("Map", other)),
        }
    }

    pub fn insert_member(
        &mut self,
        set: NodeId,
        value: Value,
    ) -> Result<(), DecodeError> {
        match self.node_mut(set)? {
            Node::Set(values) => {
                values.push(value);
                Ok(())
            }
            other => Err(kind_mismatch("Set", other)),
        }
    }

    pub fn fill_buffer(
        &mut self,
        buffer: NodeId,
        data: Vec<u8>,
    ) -> Result<(), DecodeError> {
        match self.node_mut(buffer)? {
            Node::Buffer(buf) => {
                buf.bytes = data;
                Ok(())
            }
            other => Err(kind_mismatch("Buffer", other)),
        }
    }

    pub fn fill_typed(
        &mut self,
        typed: NodeId,
        lanes: TypedArray,
    ) -> Result<(), DecodeError> {
        match self.node_mut(typed)? {
            Node::TypedArray(t) => {
                *t = lanes;
                Ok(())
            }
            other => Err(kind_mismatch("TypedArray", other)),
        }
    }

    pub fn fill_wrapper(
        &mut self,
        wrapper: NodeId,
        primitive: Primitive,
    ) -> Result<(), DecodeError> {
        match self.node_mut(wrapper)? {
            Node::Wrapper(p) => {
                *p = primitive;
                Ok(())
            }
            other => Err(kind_mismatch("PrimitiveWrapper", other)),
        }
    }

    /// Привязывает DataView к буферу; окно должно лежать внутри буфера.
    pub fn attach_view(
        &mut self,
        view: NodeId,
        child: &Value,
    ) -> Result<(), DecodeError> {
        let Value::Ref(buffer) = *child else {
            return Err(DecodeError::malformed(
                format!("DataView over a {}", child.type_name()),
                None,
            ));
        };
        let available = match self.graph.get(buffer) {
            Some(Node::Buffer(buf)) => buf.bytes.len(),
            Some(other) => {
                return Err(DecodeError::malformed(
                    format!("DataView over a {}", other.type_name()),
                    None,
                ))
            }
            None => return Err(DecodeError::malformed("DataView over a missing node", None)),
        };
        match self.node_mut(view)? {
            Node::DataView(dv) => {
                let fits = dv
                    .byte_offset
                    .checked_add(dv.byte_length)
                    .is_some_and(|end| end <= available);
                if !fits {
                    return Err(DecodeError::malformed(
                        format!(
                            "DataView window {}+{} exceeds buffer of {available} bytes",
                            dv.byte_offset, dv.byte_length
                        ),
                        None,
                    ));
                }
                dv.buffer = buffer;
                Ok(())
            }
            other => Err(kind_mismatch("DataView", other)),
        }
    }

    /// Передаёт payload зарегистрированному расширению и сохраняет результат.
    pub fn finish_custom(
        &mut self,
        custom: NodeId,
        payload: Value,
    ) -> Result<(), DecodeError> {
        let extension = match self.graph.get(custom) {
            Some(Node::Custom(c)) => c.extension,
            Some(other) => return Err(kind_mismatch("CustomObject", other)),
            None => return Err(DecodeError::malformed("custom object is not allocated", None)),
        };
        let ext = self
            .registry
            .get(extension)
            .cloned()
            .ok_or(DecodeError::UnknownExtension {
                extension: u64::from(extension),
                offset: None,
            })?;
        let decoded = ext.decode(payload, &mut self.graph).map_err(|reason| {
            DecodeError::malformed(
                format!("extension {} rejected payload: {reason}", ext.name()),
                None,
            )
        })?;
        if let Some(Node::Custom(c)) = self.graph.get_mut(custom) {
            c.payload = decoded;
        }
        Ok(())
    }

    pub fn into_document(
        self,
        root: Value,
    ) -> Document {
        Document::new(self.graph, root)
    }
}

pub fn bigint_from_wire(
    negative: bool,
    magnitude: Vec<u8>,
) -> Result<BigInt, DecodeError> {
    if magnitude.first() == Some(&0) {
        return Err(DecodeError::malformed(
            "bigint magnitude has a leading zero byte",
            None,
        ));
    }
    if negative && magnitude.is_empty() {
        return Err(DecodeError::malformed("bigint negative zero", None));
    }
    Ok(BigInt::from_parts(negative, magnitude))
}

fn kind_mismatch(
    expected: &str,
    found: &Node,
) -> DecodeError {
    DecodeError::malformed(
        format!("expected {expected} container, found {}", found.type_name()),
        None,
    )
}
