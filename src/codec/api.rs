//! Точки входа кодека.
//!
//! [`Codec`] владеет реестром расширений и параметрами по умолчанию.
//! Свободные функции ([`serialize`], [`deserialize`] и т.д.) работают через
//! кодек с пустым реестром.

use std::{io::Read, sync::Arc};

use bytes::Bytes;
use tracing::debug;
use zgraph_error::{ResultExt, ZgraphResult};

use super::{
    encode::{encode_all, Serializer},
    events::ParseHandler,
    extension::{Extension, ExtensionRegistry},
    options::{DeserializeOptions, SerializeOptions},
    parser::Deserializer,
    walk::walk,
};
use crate::value::{Document, Graph, Value};

/// Размер буфера чтения для [`Codec::read_from`].
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Кодек: реестр расширений плюс параметры чтения и записи.
///
/// Клонирование дешёвое: реестр разделяется через `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    registry: Arc<ExtensionRegistry>,
    serialize_options: SerializeOptions,
    deserialize_options: DeserializeOptions,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ExtensionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            ..Self::default()
        }
    }

    pub fn with_serialize_options(
        mut self,
        options: SerializeOptions,
    ) -> Self {
        self.serialize_options = options;
        self
    }

    pub fn with_deserialize_options(
        mut self,
        options: DeserializeOptions,
    ) -> Self {
        self.deserialize_options = options;
        self
    }

    /// Регистрирует расширение только в этом кодеке.
    /// Возвращает ранее зарегистрированное расширение с тем же id.
    pub fn register<E: Extension + 'static>(
        &mut self,
        extension: E,
    ) -> Option<Arc<dyn Extension>> {
        debug!(id = extension.id(), name = extension.name(), "register extension");
        Arc::make_mut(&mut self.registry).register(Arc::new(extension))
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn serialize_options(&self) -> &SerializeOptions {
        &self.serialize_options
    }

    pub fn deserialize_options(&self) -> &DeserializeOptions {
        &self.deserialize_options
    }

    /// Кодирует граф целиком.
    pub fn serialize(
        &self,
        graph: &Graph,
        root: &Value,
    ) -> ZgraphResult<Bytes> {
        let emits = walk(graph, root, &self.registry).context("serialize")?;
        Ok(encode_all(&emits, self.serialize_options.endian))
    }

    /// Пошаговый кодировщик. Все ошибки типов возвращаются здесь, до
    /// первого байта.
    pub fn serializable<'g>(
        &self,
        graph: &'g Graph,
        root: &'g Value,
    ) -> ZgraphResult<Serializer<'g>> {
        let emits = walk(graph, root, &self.registry).context("serializable")?;
        Ok(Serializer::new(emits, self.serialize_options.endian))
    }

    /// Декодирует полное сообщение. Лишние байты после корня — ошибка.
    pub fn deserialize(
        &self,
        bytes: &[u8],
    ) -> ZgraphResult<Document> {
        let mut session = self.deserializable()?;
        session.feed(bytes).context("deserialize")?;
        session.finish().context("deserialize")
    }

    /// Новая сессия пошагового декодирования.
    pub fn deserializable(&self) -> ZgraphResult<Deserializer> {
        Deserializer::new(&self.deserialize_options, Arc::clone(&self.registry))
    }

    /// Сессия с наблюдателем событий разбора.
    pub fn deserializable_with<H: ParseHandler>(
        &self,
        handler: H,
    ) -> ZgraphResult<Deserializer<H>> {
        Deserializer::with_handler(
            &self.deserialize_options,
            Arc::clone(&self.registry),
            handler,
        )
    }

    /// Декодирует последовательность чанков.
    pub fn deserializing<I>(
        &self,
        chunks: I,
    ) -> ZgraphResult<Document>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut session = self.deserializable()?;
        for chunk in chunks {
            session.feed(chunk.as_ref()).context("deserializing")?;
        }
        session.finish().context("deserializing")
    }

    /// Читает сообщение из `reader` до EOF.
    pub fn read_from<R: Read>(
        &self,
        mut reader: R,
    ) -> ZgraphResult<Document> {
        let mut session = self.deserializable()?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("read_from"),
            };
            session.feed(&buf[..n]).context("read_from")?;
        }
        session.finish().context("read_from")
    }
}

/// Кодирует граф с пустым реестром расширений.
pub fn serialize(
    graph: &Graph,
    root: &Value,
    options: &SerializeOptions,
) -> ZgraphResult<Bytes> {
    Codec::new()
        .with_serialize_options(*options)
        .serialize(graph, root)
}

pub fn serializable<'g>(
    graph: &'g Graph,
    root: &'g Value,
    options: &SerializeOptions,
) -> ZgraphResult<Serializer<'g>> {
    Codec::new()
        .with_serialize_options(*options)
        .serializable(graph, root)
}

/// Декодирует полное сообщение с пустым реестром расширений.
pub fn deserialize(
    bytes: &[u8],
    options: &DeserializeOptions,
) -> ZgraphResult<Document> {
    Codec::new()
        .with_deserialize_options(*options)
        .deserialize(bytes)
}

pub fn deserializable(options: &DeserializeOptions) -> ZgraphResult<Deserializer> {
    Codec::new()
        .with_deserialize_options(*options)
        .deserializable()
}

pub fn deserializing<I>(
    chunks: I,
    options: &DeserializeOptions,
) -> ZgraphResult<Document>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    Codec::new()
        .with_deserialize_options(*options)
        .deserializing(chunks)
}

pub fn read_from<R: Read>(
    reader: R,
    options: &DeserializeOptions,
) -> ZgraphResult<Document> {
    Codec::new()
        .with_deserialize_options(*options)
        .read_from(reader)
}

#[cfg(test)]
mod tests {
    use zgraph_error::{DecodeError, EncodeError, StatusCode};

    use super::*;
    use crate::value::{Array, CustomObject, Node, Object};

    struct Point;

    impl Extension for Point {
        fn id(&self) -> u32 {
            7
        }

        fn name(&self) -> &str {
            "point"
        }
    }

    fn custom_graph() -> (Graph, Value) {
        let mut g = Graph::new();
        let payload = g.insert(Node::Array(Array::dense([
            Value::Number(1.0),
            Value::Number(2.0),
        ])));
        let id = g.insert(Node::Custom(CustomObject {
            extension: 7,
            payload: Value::Ref(payload),
        }));
        (g, Value::Ref(id))
    }

    #[test]
    fn test_roundtrip_with_registered_extension() {
        let mut codec = Codec::new();
        assert!(codec.register(Point).is_none());
        let (g, root) = custom_graph();
        let bytes = codec.serialize(&g, &root).unwrap();
        let doc = codec.deserialize(&bytes).unwrap();
        assert!(doc.is_isomorphic(&Document::new(g, root)));
    }

    /// Точка хранится в памяти как массив `[x, y]`, а в поток пишется
    /// строкой `"x,y"`.
    struct PackedPoint;

    impl Extension for PackedPoint {
        fn id(&self) -> u32 {
            9
        }

        fn name(&self) -> &str {
            "packed-point"
        }

        fn encode(
            &self,
            payload: &Value,
            graph: &Graph,
        ) -> Result<Value, String> {
            let coords = payload
                .as_ref_id()
                .and_then(|id| graph.get(id))
                .and_then(|node| match node {
                    Node::Array(arr) => Some(arr),
                    _ => None,
                })
                .ok_or("payload is not an array")?;
            match (coords.get(0), coords.get(1)) {
                (Some(Value::Number(x)), Some(Value::Number(y))) if coords.length == 2 => {
                    Ok(Value::String(format!("{x},{y}")))
                }
                _ => Err("expected [x, y]".to_string()),
            }
        }

        fn decode(
            &self,
            payload: Value,
            graph: &mut Graph,
        ) -> Result<Value, String> {
            let Value::String(text) = payload else {
                return Err(format!("unexpected {}", payload.type_name()));
            };
            let (x, y) = text.split_once(',').ok_or("missing comma")?;
            let x: f64 = x.parse().map_err(|e| format!("{e}"))?;
            let y: f64 = y.parse().map_err(|e| format!("{e}"))?;
            let id = graph.insert(Node::Array(Array::dense([
                Value::Number(x),
                Value::Number(y),
            ])));
            Ok(Value::Ref(id))
        }
    }

    /// Тест проверяет, что payload проходит через `encode` при записи и
    /// через `decode` при чтении, и граф восстанавливается.
    #[test]
    fn test_extension_encode_decode_pair_roundtrips() {
        let mut codec = Codec::new();
        codec.register(PackedPoint);

        let mut g = Graph::new();
        let coords = g.insert(Node::Array(Array::dense([
            Value::Number(1.5),
            Value::Number(-2.0),
        ])));
        let point = g.insert(Node::Custom(CustomObject {
            extension: 9,
            payload: Value::Ref(coords),
        }));
        let root_node = g.insert(Node::Array(Array::dense([
            Value::Ref(point),
            Value::Ref(point),
        ])));
        let root = Value::Ref(root_node);

        let bytes = codec.serialize(&g, &root).unwrap();
        // Custom #1, id расширения 9, затем String "1.5,-2".
        let tail = [0x50, 0x09, 0x06, 0x06, b'1', b'.', b'5', b',', b'-', b'2'];
        assert!(
            bytes.windows(tail.len()).any(|w| w == tail),
            "payload was not encoded by the extension: {bytes:?}"
        );

        let doc = codec.deserialize(&bytes).unwrap();
        assert!(doc.is_isomorphic(&Document::new(g.clone(), root.clone())));

        let chunked = codec.deserializing(bytes.chunks(1)).unwrap();
        assert!(chunked.is_isomorphic(&Document::new(g, root)));
    }

    #[test]
    fn test_extension_encode_error_is_unsupported() {
        let mut codec = Codec::new();
        codec.register(PackedPoint);

        let mut g = Graph::new();
        let point = g.insert(Node::Custom(CustomObject {
            extension: 9,
            payload: Value::Null,
        }));
        let err = codec.serialize(&g, &Value::Ref(point)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UnsupportedType);
        assert!(err.to_string().contains("payload is not an array"));
    }

    /// Тест проверяет, что реестр принадлежит кодеку, а не процессу.
    #[test]
    fn test_registry_is_per_codec() {
        let mut with_ext = Codec::new();
        with_ext.register(Point);
        let plain = Codec::new();
        let (g, root) = custom_graph();

        let err = plain.serialize(&g, &root).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EncodeError>(),
            Some(EncodeError::UnsupportedType { .. })
        ));

        let bytes = with_ext.serialize(&g, &root).unwrap();
        let err = plain.deserialize(&bytes).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UnknownExtension);
    }

    #[test]
    fn test_clone_shares_then_diverges() {
        let mut a = Codec::new();
        a.register(Point);
        let b = a.clone();
        assert!(b.registry().contains(7));
        a.register(Point);
        assert_eq!(a.registry().len(), 1);
        assert_eq!(b.registry().len(), 1);
    }

    #[test]
    fn test_free_functions() {
        let mut g = Graph::new();
        let mut obj = Object::new();
        obj.insert("k", Value::String("v".into()));
        let id = g.insert(Node::Object(obj));
        let root = Value::Ref(id);

        let bytes = serialize(&g, &root, &SerializeOptions::default()).unwrap();
        let doc = deserialize(&bytes, &DeserializeOptions::default()).unwrap();
        let expected = Document::new(g.clone(), root.clone());
        assert!(doc.is_isomorphic(&expected));

        let chunked =
            deserializing(bytes.chunks(3), &DeserializeOptions::default()).unwrap();
        assert!(chunked.is_isomorphic(&expected));

        let read = read_from(&bytes[..], &DeserializeOptions::default()).unwrap();
        assert!(read.is_isomorphic(&expected));
    }

    #[test]
    fn test_invalid_options() {
        let err = deserializable(&DeserializeOptions { max_length: 0 }).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidOptions);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let err = deserialize(&[0x01, 0x00, 0x00], &DeserializeOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DecodeError>(),
            Some(DecodeError::Malformed { .. })
        ));
    }
}
