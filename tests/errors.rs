use std::time::{Duration, Instant};

use zgraph::{
    codec::varint::write_varint,
    deserializable, deserialize, deserializing, serializable, serialize, Array, Codec,
    CustomObject, DecodeError, DeserializeOptions, EncodeError, Graph, Node, Object, OpaqueKind,
    OptionsError, SerializeOptions, StatusCode, Value,
};

fn decode_err(bytes: &[u8]) -> zgraph::StackError {
    deserialize(bytes, &DeserializeOptions::default()).unwrap_err()
}

fn decode_error(bytes: &[u8]) -> DecodeError {
    decode_err(bytes)
        .downcast_ref::<DecodeError>()
        .cloned()
        .expect("expected a DecodeError")
}

/// Тест проверяет лимит длины: 20 байт при `max_length = 10`.
#[test]
fn test_length_limit() {
    let mut graph = Graph::new();
    let arr = graph.insert(Node::Array(Array::dense(
        (0..18).map(|_| Value::Null).collect::<Vec<_>>(),
    )));
    let bytes = serialize(&graph, &Value::Ref(arr), &SerializeOptions::default()).unwrap();
    assert_eq!(bytes.len(), 21);

    let options = DeserializeOptions::default().with_max_length(10);
    let err = deserialize(&bytes[..20], &options).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::LengthExceeded);
    assert_eq!(
        err.downcast_ref::<DecodeError>(),
        Some(&DecodeError::LengthExceeded {
            max_length: 10,
            received: 20
        })
    );

    // По кускам лимит считается по сумме.
    let err = deserializing(bytes[..20].chunks(4), &options).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::LengthExceeded);
}

#[test]
fn test_length_limit_exact_is_accepted() {
    let bytes = serialize(
        &Graph::new(),
        &Value::from("abc"),
        &SerializeOptions::default(),
    )
    .unwrap();
    let options = DeserializeOptions::default().with_max_length(bytes.len() as u64);
    assert_eq!(
        deserialize(&bytes, &options).unwrap().root,
        Value::from("abc")
    );
}

#[test]
fn test_zero_max_length_rejected() {
    let options = DeserializeOptions::default().with_max_length(0);
    let err = deserializable(&options).err().unwrap();
    assert_eq!(err.status_code(), StatusCode::InvalidOptions);
    assert!(matches!(
        err.downcast_ref::<OptionsError>(),
        Some(OptionsError::InvalidOptions { option, .. }) if option == "max_length"
    ));
}

/// Тест проверяет, что обрыв потока на каждой позиции даёт `Truncated`.
#[test]
fn test_truncation_at_every_offset() {
    let mut graph = Graph::new();
    let obj = graph.insert(Node::Object(Object::new()));
    let arr = graph.insert(Node::Array(Array::dense([
        Value::from("hello"),
        Value::Number(1.5),
        Value::Ref(obj),
    ])));
    if let Some(Node::Object(o)) = graph.get_mut(obj) {
        o.insert("parent", Value::Ref(arr));
    }
    let bytes = serialize(&graph, &Value::Ref(arr), &SerializeOptions::default()).unwrap();

    for cut in 0..bytes.len() {
        let err = decode_err(&bytes[..cut]);
        assert_eq!(err.status_code(), StatusCode::TruncatedStream, "cut at {cut}");
    }
}

#[test]
fn test_truncated_reports_open_structures() {
    // [ { "a": ...
    let bytes = [0x01, 0x30, 0x01, 0x32, 0x01, 0x01, b'a'];
    match decode_error(&bytes) {
        DecodeError::Truncated {
            open_structures,
            offset,
        } => {
            assert_eq!(open_structures, 2);
            assert_eq!(offset, bytes.len() as u64);
        }
        other => panic!("expected Truncated, got {other:?}"),
    }
}

#[test]
fn test_unknown_tag() {
    match decode_error(&[0x01, 0x6E]) {
        DecodeError::Malformed { offset, .. } => assert_eq!(offset, Some(1)),
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn test_wrong_version() {
    assert!(matches!(
        decode_error(&[0x02, 0x00]),
        DecodeError::Malformed { .. }
    ));
}

#[test]
fn test_trailing_bytes() {
    assert!(matches!(
        decode_error(&[0x01, 0x00, 0x00]),
        DecodeError::Malformed { .. }
    ));
}

/// Тест проверяет ссылку вперёд: id ещё не выдан.
#[test]
fn test_forward_reference() {
    // [ -> #5 ]
    match decode_error(&[0x01, 0x30, 0x01, 0x7F, 0x05]) {
        DecodeError::UnresolvedReference { id, assigned } => {
            assert_eq!(id, 5);
            assert_eq!(assigned, 1);
        }
        other => panic!("expected UnresolvedReference, got {other:?}"),
    }
}

#[test]
fn test_root_back_reference() {
    assert!(matches!(
        decode_error(&[0x01, 0x7F, 0x00]),
        DecodeError::UnresolvedReference { id: 0, assigned: 0 }
    ));
}

#[test]
fn test_invalid_utf8() {
    assert_eq!(
        decode_err(&[0x01, 0x06, 0x02, 0xC3, 0x28]).status_code(),
        StatusCode::MalformedStream
    );
}

#[test]
fn test_unknown_extension() {
    let err = decode_err(&[0x01, 0x50, 0x09, 0x00]);
    assert_eq!(err.status_code(), StatusCode::UnknownExtension);
}

/// Тест проверяет, что после ошибки сессия больше не принимает байты.
#[test]
fn test_failed_session_is_poisoned() {
    let mut session = deserializable(&DeserializeOptions::default()).unwrap();
    assert!(session.feed(&[0x01, 0x6E]).is_err());
    assert!(session.is_failed());
    assert!(session.feed(&[0x00]).is_err());
    assert!(session.finish().is_err());
}

#[test]
fn test_io_error_kinds() {
    let truncated: std::io::Error = decode_err(&[0x01, 0x30]).into();
    assert_eq!(truncated.kind(), std::io::ErrorKind::UnexpectedEof);
    let malformed: std::io::Error = decode_err(&[0x01, 0x6E]).into();
    assert_eq!(malformed.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn test_unsupported_values_fail_before_output() {
    let options = SerializeOptions::default();

    let mut graph = Graph::new();
    let arr = graph.insert(Node::Array(Array::dense([
        Value::Null,
        Value::Symbol("sym".into()),
    ])));
    let root = Value::Ref(arr);
    let err = serializable(&graph, &root, &options).err().unwrap();
    assert_eq!(err.status_code(), StatusCode::UnsupportedType);

    let mut graph = Graph::new();
    let func = graph.insert(Node::Opaque(OpaqueKind::Function));
    let err = serialize(&graph, &Value::Ref(func), &options).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EncodeError>(),
        Some(EncodeError::UnsupportedType { .. })
    ));
}

#[test]
fn test_dangling_reference() {
    let err = serialize(
        &Graph::new(),
        &Value::Ref(zgraph::NodeId(3)),
        &SerializeOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<EncodeError>(),
        Some(&EncodeError::DanglingReference { node: 3 })
    );
}

#[test]
fn test_unregistered_extension_on_write() {
    let mut graph = Graph::new();
    let custom = graph.insert(Node::Custom(CustomObject {
        extension: 11,
        payload: Value::Null,
    }));
    let err = Codec::new()
        .serialize(&graph, &Value::Ref(custom))
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UnsupportedType);
}

/// Поток `[версия, Object, n, n × (ключ "k{i}", null)]`.
fn wide_object_stream(n: u64) -> Vec<u8> {
    let mut bytes = vec![0x01, 0x32];
    write_varint(&mut bytes, n);
    for i in 0..n {
        let key = format!("k{i}");
        write_varint(&mut bytes, key.len() as u64);
        bytes.extend_from_slice(key.as_bytes());
        bytes.push(0x00);
    }
    bytes
}

/// Тест проверяет, что объект со 100k ключами декодируется за линейное
/// время: вставка свойства не сканирует уже прочитанные ключи.
#[test]
fn test_wide_object_decodes_in_bounded_time() {
    let bytes = wide_object_stream(100_000);

    let started = Instant::now();
    let doc = deserializing(bytes.chunks(4096), &DeserializeOptions::default()).unwrap();
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(5),
        "decoding 100k keys took {elapsed:?}"
    );
    match doc.root_node() {
        Some(Node::Object(obj)) => {
            assert_eq!(obj.len(), 100_000);
            assert_eq!(obj.get("k99999"), Some(&Value::Null));
            assert_eq!(obj.entries()[12_345].0, "k12345");
        }
        other => panic!("expected object, got {other:?}"),
    }
}

/// Тест проверяет, что повторный ключ в потоке заменяет значение на
/// исходной позиции, а не добавляет новое свойство.
#[test]
fn test_duplicate_key_replaces_in_place() {
    // {a: null, b: null, a: true}
    let bytes = [
        0x01, 0x32, 0x03, 0x01, b'a', 0x00, 0x01, b'b', 0x00, 0x01, b'a', 0x02,
    ];
    let doc = deserialize(&bytes, &DeserializeOptions::default()).unwrap();
    match doc.root_node() {
        Some(Node::Object(obj)) => {
            assert_eq!(obj.keys().collect::<Vec<_>>(), ["a", "b"]);
            assert_eq!(obj.get("a"), Some(&Value::Bool(true)));
        }
        other => panic!("expected object, got {other:?}"),
    }
}
