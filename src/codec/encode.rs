//! Encoder: превращает список элементов обхода в байты.
//!
//! Вся проверка типов выполняется в [`walk`](super::walk::walk), поэтому
//! запись отдельного элемента не может завершиться ошибкой, а ошибка
//! обхода всегда возникает до первого байта.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use super::{
    file::FORMAT_VERSION,
    tags::WireTag,
    varint::write_varint,
    walk::Emit,
};
use crate::value::{BigInt, Endian, Node, Primitive, Value};

/// Размер чанка по умолчанию для [`Serializer`] в роли итератора.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Записывает весь поток (байт версии плюс все элементы).
pub fn encode_all(
    emits: &[Emit<'_>],
    endian: Endian,
) -> Bytes {
    let mut out = BytesMut::with_capacity(emits.len() * 4 + 1);
    out.put_u8(FORMAT_VERSION);
    for emit in emits {
        write_emit(emit, endian, &mut out);
    }
    debug!(bytes = out.len(), items = emits.len(), "value graph encoded");
    out.freeze()
}

/// Записывает один элемент потока.
pub fn write_emit(
    emit: &Emit<'_>,
    endian: Endian,
    out: &mut BytesMut,
) {
    match emit {
        Emit::Scalar { value, tag } => {
            out.put_u8(tag.byte());
            write_scalar_body(value, out);
        }
        Emit::Node { tag, node, id } => {
            trace!(id, ?tag, "encode node");
            out.put_u8(tag.byte());
            write_node_header(node, endian, out);
        }
        Emit::Key(key) => write_raw_string(key, out),
        Emit::BackRef(id) => {
            out.put_u8(WireTag::BackReference.byte());
            write_varint(out, *id);
        }
    }
}

fn write_scalar_body(
    value: &Value,
    out: &mut BytesMut,
) {
    match value {
        Value::Number(n) | Value::Date(n) => out.put_f64(*n),
        Value::BigInt(b) => write_bigint_body(b, out),
        Value::String(s) => write_raw_string(s, out),
        Value::RegExp(re) => {
            write_raw_string(&re.source, out);
            write_raw_string(&re.flags, out);
        }
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Symbol(_) | Value::Ref(_) => {}
    }
}

/// Заголовок узла: всё, что идёт после тега и до детей.
fn write_node_header(
    node: &Node,
    endian: Endian,
    out: &mut BytesMut,
) {
    match node {
        Node::Array(arr) => {
            write_varint(out, arr.length as u64);
            if !arr.is_dense() {
                let mut bitmap = vec![0u8; arr.length.div_ceil(8)];
                for &index in arr.elements.keys() {
                    bitmap[index / 8] |= 1 << (index % 8);
                }
                out.put_slice(&bitmap);
            }
        }
        Node::Object(obj) => {
            write_varint(out, obj.len() as u64);
        }
        Node::Map(entries) => {
            write_varint(out, entries.len() as u64);
        }
        Node::Set(values) => {
            write_varint(out, values.len() as u64);
        }
        Node::Buffer(buf) => write_raw_bytes(&buf.bytes, out),
        Node::TypedArray(typed) => {
            out.put_u8(endian.flag());
            write_raw_bytes(&typed.to_bytes(endian), out);
        }
        Node::DataView(view) => {
            write_varint(out, view.byte_offset as u64);
            write_varint(out, view.byte_length as u64);
        }
        Node::Wrapper(Primitive::Bool(b)) => out.put_u8(u8::from(*b)),
        Node::Wrapper(Primitive::Number(n)) => out.put_f64(*n),
        Node::Wrapper(Primitive::String(s)) => write_raw_string(s, out),
        Node::Wrapper(Primitive::BigInt(b)) => write_bigint_body(b, out),
        Node::Custom(custom) => {
            write_varint(out, u64::from(custom.extension));
        }
        Node::Opaque(_) => {}
    }
}

fn write_bigint_body(
    value: &BigInt,
    out: &mut BytesMut,
) {
    out.put_u8(u8::from(value.is_negative()));
    write_raw_bytes(value.magnitude(), out);
}

fn write_raw_string(
    s: &str,
    out: &mut BytesMut,
) {
    write_raw_bytes(s.as_bytes(), out);
}

fn write_raw_bytes(
    bytes: &[u8],
    out: &mut BytesMut,
) {
    write_varint(out, bytes.len() as u64);
    out.put_slice(bytes);
}

/// Пошаговый кодировщик: отдаёт ровно те же байты, что и
/// [`encode_all`], порциями не больше запрошенного размера.
///
/// Обход графа уже выполнен при создании, поэтому `Serializer` не может
/// завершиться ошибкой.
pub struct Serializer<'g> {
    emits: Vec<Emit<'g>>,
    cursor: usize,
    pending: BytesMut,
    endian: Endian,
    produced: u64,
    chunk_size: usize,
}

impl<'g> Serializer<'g> {
    pub fn new(
        emits: Vec<Emit<'g>>,
        endian: Endian,
    ) -> Self {
        let mut pending = BytesMut::with_capacity(DEFAULT_CHUNK_SIZE.min(emits.len() * 4 + 1));
        pending.put_u8(FORMAT_VERSION);
        Self {
            emits,
            cursor: 0,
            pending,
            endian,
            produced: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Размер чанка для [`Iterator`]; не меньше 1.
    pub fn with_chunk_size(
        mut self,
        chunk_size: usize,
    ) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Следующая порция длиной не больше `max` (минимум 1 байт).
    /// `None` — поток закончился.
    pub fn next_chunk(
        &mut self,
        max: usize,
    ) -> Option<Bytes> {
        let max = max.max(1);
        while self.pending.len() < max && self.cursor < self.emits.len() {
            write_emit(&self.emits[self.cursor], self.endian, &mut self.pending);
            self.cursor += 1;
        }
        if self.pending.is_empty() {
            return None;
        }
        let take = max.min(self.pending.len());
        let chunk = self.pending.split_to(take).freeze();
        self.produced += chunk.len() as u64;
        if self.is_done() {
            debug!(bytes = self.produced, "pull encoder drained");
        }
        Some(chunk)
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty() && self.cursor >= self.emits.len()
    }

    pub fn bytes_produced(&self) -> u64 {
        self.produced
    }
}

impl Iterator for Serializer<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.next_chunk(self.chunk_size)
    }
}

impl io::Read for Serializer<'_> {
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.next_chunk(buf.len()) {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::{
        codec::{extension::ExtensionRegistry, walk::walk},
        value::{Array, Graph, Object, TypedArray},
    };

    fn encode(
        g: &Graph,
        root: &Value,
        endian: Endian,
    ) -> Vec<u8> {
        let emits = walk(g, root, &ExtensionRegistry::new()).unwrap();
        encode_all(&emits, endian).to_vec()
    }

    #[test]
    fn test_null_stream() {
        assert_eq!(encode(&Graph::new(), &Value::Null, Endian::Little), [0x01, 0x00]);
    }

    #[test]
    fn test_number_is_big_endian_bits() {
        let bytes = encode(&Graph::new(), &Value::Number(-0.0), Endian::Little);
        assert_eq!(bytes, [0x01, 0x04, 0x80, 0, 0, 0, 0, 0, 0, 0]);
    }

    /// Тест проверяет точную раскладку `a.self = a`.
    #[test]
    fn test_self_cycle_layout() {
        let mut g = Graph::new();
        let a = g.insert(Node::Object(Object::new()));
        if let Some(Node::Object(obj)) = g.get_mut(a) {
            obj.insert("self", Value::Ref(a));
        }
        let bytes = encode(&g, &Value::Ref(a), Endian::Little);
        assert_eq!(
            bytes,
            [0x01, 0x32, 0x01, 0x04, b's', b'e', b'l', b'f', 0x7F, 0x00]
        );
    }

    #[test]
    fn test_sparse_bitmap_layout() {
        let mut g = Graph::new();
        let mut arr = Array::with_length(3);
        arr.set(0, Value::Null);
        arr.set(2, Value::Null);
        let id = g.insert(Node::Array(arr));
        let bytes = encode(&g, &Value::Ref(id), Endian::Little);
        assert_eq!(bytes, [0x01, 0x31, 0x03, 0b0000_0101, 0x00, 0x00]);
    }

    #[test]
    fn test_typed_array_order_flag() {
        let mut g = Graph::new();
        let id = g.insert(Node::TypedArray(TypedArray::Uint16(vec![0x0102])));
        let be = encode(&g, &Value::Ref(id), Endian::Big);
        assert_eq!(be, [0x01, 0x23, 0x01, 0x02, 0x01, 0x02]);
        let le = encode(&g, &Value::Ref(id), Endian::Little);
        assert_eq!(le, [0x01, 0x23, 0x00, 0x02, 0x02, 0x01]);
    }

    #[test]
    fn test_bigint_body() {
        let v = Value::BigInt(BigInt::from(-256i64));
        let bytes = encode(&Graph::new(), &v, Endian::Little);
        assert_eq!(bytes, [0x01, 0x05, 0x01, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_serializer_matches_one_shot() {
        let mut g = Graph::new();
        let s = g.insert(Node::Object(Object::new()));
        let root_id = g.insert(Node::Array(Array::dense([
            Value::Ref(s),
            Value::String("hello world".into()),
            Value::Ref(s),
        ])));
        let root = Value::Ref(root_id);
        let expected = encode(&g, &root, Endian::Little);

        for size in 1..=expected.len() + 1 {
            let emits = walk(&g, &root, &ExtensionRegistry::new()).unwrap();
            let mut ser = Serializer::new(emits, Endian::Little);
            let mut got = Vec::new();
            while let Some(chunk) = ser.next_chunk(size) {
                assert!(chunk.len() <= size);
                got.extend_from_slice(&chunk);
            }
            assert!(ser.is_done());
            assert_eq!(got, expected, "chunk size {size}");
            assert_eq!(ser.bytes_produced(), expected.len() as u64);
        }
    }

    #[test]
    fn test_serializer_as_reader() {
        let g = Graph::new();
        let root = Value::String("abc".into());
        let emits = walk(&g, &root, &ExtensionRegistry::new()).unwrap();
        let mut out = Vec::new();
        Serializer::new(emits, Endian::Little)
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, [0x01, 0x06, 0x03, b'a', b'b', b'c']);
    }
}
