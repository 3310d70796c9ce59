use zgraph::{
    deserialize, serialize, Array, BigInt, Buffer, DataView, DeserializeOptions, Document,
    Endian, Graph, Node, Object, Primitive, RegExp, SerializeOptions, TypedArray, Value,
};

fn encode(
    graph: &Graph,
    root: &Value,
) -> Vec<u8> {
    serialize(graph, root, &SerializeOptions::default())
        .unwrap()
        .to_vec()
}

fn decode(bytes: &[u8]) -> Document {
    deserialize(bytes, &DeserializeOptions::default()).unwrap()
}

fn roundtrip(
    graph: Graph,
    root: Value,
) -> Document {
    let bytes = encode(&graph, &root);
    let doc = decode(&bytes);
    assert!(
        doc.is_isomorphic(&Document::new(graph, root)),
        "roundtrip changed the graph: {doc:?}"
    );
    doc
}

fn f64_bytes(n: f64) -> [u8; 8] {
    n.to_bits().to_be_bytes()
}

#[test]
fn test_null_root() {
    let bytes = encode(&Graph::new(), &Value::Null);
    assert_eq!(bytes, vec![0x01, 0x00]);
    assert_eq!(decode(&bytes).root, Value::Null);
}

#[test]
fn test_scalars() {
    for value in [
        Value::Undefined,
        Value::Bool(true),
        Value::Bool(false),
        Value::Number(42.5),
        Value::String(String::new()),
        Value::String("привет, мир".into()),
        Value::Date(1_700_000_000_000.0),
        Value::RegExp(RegExp::new("^a+$", "gi")),
        Value::BigInt(BigInt::zero()),
    ] {
        let doc = roundtrip(Graph::new(), value.clone());
        assert_eq!(doc.root, value);
    }
}

/// Тест проверяет точный байтовый образ объекта, ссылающегося на себя.
#[test]
fn test_self_cycle_bytes() {
    let mut graph = Graph::new();
    let a = graph.insert(Node::Object(Object::new()));
    if let Some(Node::Object(obj)) = graph.get_mut(a) {
        obj.insert("self", Value::Ref(a));
    }

    let bytes = encode(&graph, &Value::Ref(a));
    assert_eq!(
        bytes,
        vec![0x01, 0x32, 0x01, 0x04, b's', b'e', b'l', b'f', 0x7F, 0x00]
    );

    let doc = roundtrip(graph, Value::Ref(a));
    let root = doc.root.as_ref_id().unwrap();
    match &doc.graph[root] {
        Node::Object(obj) => assert_eq!(obj.get("self"), Some(&Value::Ref(root))),
        other => panic!("expected object, got {other:?}"),
    }
}

/// Тест проверяет, что одинаковые строки не дедуплицируются.
#[test]
fn test_repeated_string_is_written_twice() {
    let mut graph = Graph::new();
    let arr = graph.insert(Node::Array(Array::dense([
        Value::from("x"),
        Value::from("x"),
    ])));
    let bytes = encode(&graph, &Value::Ref(arr));
    assert_eq!(
        bytes,
        vec![0x01, 0x30, 0x02, 0x06, 0x01, b'x', 0x06, 0x01, b'x']
    );
    roundtrip(graph, Value::Ref(arr));
}

#[test]
fn test_shared_object_stays_shared() {
    let mut graph = Graph::new();
    let shared = graph.insert(Node::Object(Object::new()));
    let arr = graph.insert(Node::Array(Array::dense([
        Value::Ref(shared),
        Value::Ref(shared),
    ])));

    let doc = roundtrip(graph, Value::Ref(arr));
    match doc.root_node() {
        Some(Node::Array(a)) => assert_eq!(a.get(0), a.get(1)),
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn test_sparse_array_bytes() {
    let mut arr = Array::with_length(3);
    arr.set(0, Value::Number(1.0));
    arr.set(2, Value::Number(3.0));
    let mut graph = Graph::new();
    let id = graph.insert(Node::Array(arr));

    let mut expected = vec![0x01, 0x31, 0x03, 0b0000_0101, 0x04];
    expected.extend_from_slice(&f64_bytes(1.0));
    expected.push(0x04);
    expected.extend_from_slice(&f64_bytes(3.0));
    assert_eq!(encode(&graph, &Value::Ref(id)), expected);

    let doc = roundtrip(graph, Value::Ref(id));
    match doc.root_node() {
        Some(Node::Array(a)) => {
            assert_eq!(a.length, 3);
            assert!(a.is_hole(1));
        }
        other => panic!("expected array, got {other:?}"),
    }
}

/// Тест проверяет, что дырка и явный `undefined` различаются.
#[test]
fn test_hole_differs_from_undefined() {
    let mut graph = Graph::new();
    let explicit = graph.insert(Node::Array(Array::dense([Value::Undefined])));
    let doc = roundtrip(graph, Value::Ref(explicit));
    match doc.root_node() {
        Some(Node::Array(a)) => {
            assert!(a.is_dense());
            assert_eq!(a.get(0), Some(&Value::Undefined));
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn test_float_bit_patterns() {
    let quiet_nan = f64::from_bits(0x7ff8_0000_0000_0001);
    for n in [-0.0, 0.0, f64::INFINITY, f64::NEG_INFINITY, quiet_nan] {
        let bytes = encode(&Graph::new(), &Value::Number(n));
        let mut expected = vec![0x01, 0x04];
        expected.extend_from_slice(&f64_bytes(n));
        assert_eq!(bytes, expected);

        match decode(&bytes).root {
            Value::Number(back) => assert_eq!(back.to_bits(), n.to_bits()),
            other => panic!("expected number, got {other:?}"),
        }
    }
}

#[test]
fn test_bigint_128_bits() {
    let big = BigInt::from(1u128 << 127);
    let bytes = encode(&Graph::new(), &Value::BigInt(big.clone()));
    let mut expected = vec![0x01, 0x05, 0x00, 0x10, 0x80];
    expected.extend_from_slice(&[0u8; 15]);
    assert_eq!(bytes, expected);
    assert_eq!(decode(&bytes).root, Value::BigInt(big));

    let negative = BigInt::from(i128::MIN);
    let doc = roundtrip(Graph::new(), Value::BigInt(negative.clone()));
    assert_eq!(doc.root, Value::BigInt(negative));
}

#[test]
fn test_big_endian_typed_array() {
    let mut graph = Graph::new();
    let id = graph.insert(Node::TypedArray(TypedArray::Uint16(vec![0x0102, 0x0304])));
    let options = SerializeOptions::default().with_endian(Endian::Big);
    let bytes = serialize(&graph, &Value::Ref(id), &options).unwrap();
    assert_eq!(
        bytes.as_ref(),
        &[0x01, 0x23, 0x01, 0x04, 0x01, 0x02, 0x03, 0x04]
    );

    let doc = decode(&bytes);
    assert_eq!(
        doc.root_node(),
        Some(&Node::TypedArray(TypedArray::Uint16(vec![0x0102, 0x0304])))
    );
}

#[test]
fn test_every_typed_array_kind() {
    let arrays = [
        TypedArray::Int8(vec![-1, 2]),
        TypedArray::Uint8(vec![255, 0]),
        TypedArray::Int16(vec![-300, 300]),
        TypedArray::Uint16(vec![65535]),
        TypedArray::Int32(vec![i32::MIN, i32::MAX]),
        TypedArray::Uint32(vec![u32::MAX]),
        TypedArray::Float32(vec![f32::from_bits(0x7fc0_0001), -0.0]),
        TypedArray::Float64(vec![f64::NAN, 1.5]),
        TypedArray::BigInt64(vec![i64::MIN]),
        TypedArray::BigUint64(vec![u64::MAX]),
    ];
    for endian in [Endian::Little, Endian::Big] {
        for typed in &arrays {
            let mut graph = Graph::new();
            let id = graph.insert(Node::TypedArray(typed.clone()));
            let options = SerializeOptions::default().with_endian(endian);
            let bytes = serialize(&graph, &Value::Ref(id), &options).unwrap();
            let doc = decode(&bytes);
            assert!(doc.is_isomorphic(&Document::new(graph, Value::Ref(id))));
        }
    }
}

#[test]
fn test_map_set_and_wrappers() {
    let mut graph = Graph::new();
    let key = graph.insert(Node::Object(Object::new()));
    let map = graph.insert(Node::Map(vec![
        (Value::Ref(key), Value::from("object key")),
        (Value::Number(1.0), Value::Ref(key)),
    ]));
    let set = graph.insert(Node::Set(vec![Value::from("a"), Value::Ref(map)]));
    let wrappers = graph.insert(Node::Array(Array::new()));
    let items: Vec<Value> = [
        Primitive::Bool(true),
        Primitive::Number(-0.0),
        Primitive::String("boxed".into()),
        Primitive::BigInt(BigInt::from(-5i64)),
    ]
    .into_iter()
    .map(|p| Value::Ref(graph.insert(Node::Wrapper(p))))
    .chain([Value::Ref(set)])
    .collect();
    if let Some(Node::Array(arr)) = graph.get_mut(wrappers) {
        for item in items {
            arr.push(item);
        }
    }

    roundtrip(graph, Value::Ref(wrappers));
}

#[test]
fn test_buffers_and_views_share_storage() {
    let mut graph = Graph::new();
    let buffer = graph.insert(Node::Buffer(Buffer::new(vec![1, 2, 3, 4, 5])));
    let shared = graph.insert(Node::Buffer(Buffer::shared(vec![9])));
    let first = graph.insert(Node::DataView(DataView {
        buffer,
        byte_offset: 1,
        byte_length: 3,
    }));
    let second = graph.insert(Node::DataView(DataView {
        buffer,
        byte_offset: 0,
        byte_length: 5,
    }));
    let root = graph.insert(Node::Array(Array::dense([
        Value::Ref(first),
        Value::Ref(second),
        Value::Ref(buffer),
        Value::Ref(shared),
    ])));

    let doc = roundtrip(graph, Value::Ref(root));
    let views: Vec<_> = doc
        .graph
        .iter()
        .filter_map(|(_, node)| match node {
            Node::DataView(view) => Some(view.buffer),
            _ => None,
        })
        .collect();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0], views[1]);
}

#[test]
fn test_deeply_nested_arrays() {
    let mut graph = Graph::new();
    let mut inner = Value::Null;
    for _ in 0..10_000 {
        inner = Value::Ref(graph.insert(Node::Array(Array::dense([inner]))));
    }
    roundtrip(graph, inner);
}

#[test]
fn test_object_key_order_preserved() {
    let mut obj = Object::new();
    for key in ["zeta", "alpha", "", "ключ"] {
        obj.insert(key, Value::from(key));
    }
    let mut graph = Graph::new();
    let id = graph.insert(Node::Object(obj));
    let doc = roundtrip(graph, Value::Ref(id));
    match doc.root_node() {
        Some(Node::Object(o)) => {
            let keys: Vec<_> = o.keys().collect();
            assert_eq!(keys, ["zeta", "alpha", "", "ключ"]);
        }
        other => panic!("expected object, got {other:?}"),
    }
}
