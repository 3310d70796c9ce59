//! Мост между JSON и графом значений (для CLI и отладки).
//!
//! Обычный JSON отображается напрямую: объекты и массивы становятся
//! узлами, числа — `Number`. Типы, которых в JSON нет, записываются
//! объектом с одним ключом-маркером:
//!
//! | Маркер | Значение |
//! |---|---|
//! | `{"$undefined": true}` | `undefined` |
//! | `{"$bigint": "-123"}` | BigInt |
//! | `{"$number": "NaN"}` | число, в т.ч. `NaN`, `Infinity`, `-Infinity`, `-0` |
//! | `{"$date": 0}` | Date (миллисекунды) |
//! | `{"$regexp": ["a+", "g"]}` | RegExp |
//! | `{"$buffer": "00ff"}` | Buffer (hex) |
//! | `{"$set": [...]}` | Set |
//! | `{"$map": [[k, v], ...]}` | Map |
//!
//! Экспорт ([`to_json`]) понимает все типы и заменяет повторные
//! встречи узла на `{"$ref": n}`, где `n` — порядковый номер первой
//! встречи. Экспорт предназначен для чтения человеком и не обратим.

use rustc_hash::FxHashMap;
use serde_json::{json, Map, Value as Json};
use zgraph_error::{bail, StatusCode, ZgraphResult};

use crate::value::{
    Array, BigInt, Buffer, Document, Graph, Node, NodeId, Object, Primitive, RegExp, TypedArray,
    Value,
};

/// Глубина, после которой экспорт обрезает вложенные узлы.
pub const MAX_EXPORT_DEPTH: usize = 128;

/// Строит документ из JSON.
pub fn from_json(json: &Json) -> ZgraphResult<Document> {
    let mut graph = Graph::new();
    let root = import(json, &mut graph)?;
    Ok(Document::new(graph, root))
}

/// Разбирает JSON-текст и строит документ.
pub fn from_json_str(text: &str) -> ZgraphResult<Document> {
    let json: Json = match serde_json::from_str(text) {
        Ok(json) => json,
        Err(e) => bail!(StatusCode::InvalidArgs, "invalid JSON input: {}", e),
    };
    from_json(&json)
}

/// Разбирает JSON из байт. Невалидный UTF-8 даёт `InvalidUtf8`.
pub fn from_json_slice(bytes: &[u8]) -> ZgraphResult<Document> {
    from_json_str(std::str::from_utf8(bytes)?)
}

fn import(
    json: &Json,
    graph: &mut Graph,
) -> ZgraphResult<Value> {
    let value = match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(_) => Value::Number(import_number(json)?),
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => {
            let values = import_all(items, graph)?;
            Value::Ref(graph.insert(Node::Array(Array::dense(values))))
        }
        Json::Object(map) => {
            if let Some(value) = import_marker(map, graph)? {
                return Ok(value);
            }
            let mut obj = Object::new();
            for (key, item) in map {
                let value = import(item, graph)?;
                obj.insert(key.clone(), value);
            }
            Value::Ref(graph.insert(Node::Object(obj)))
        }
    };
    Ok(value)
}

fn import_all(
    items: &[Json],
    graph: &mut Graph,
) -> ZgraphResult<Vec<Value>> {
    items.iter().map(|item| import(item, graph)).collect()
}

fn import_marker(
    map: &Map<String, Json>,
    graph: &mut Graph,
) -> ZgraphResult<Option<Value>> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((marker, body)) = map.iter().next() else {
        return Ok(None);
    };

    let value = match (marker.as_str(), body) {
        ("$undefined", _) => Value::Undefined,
        ("$bigint", Json::String(s)) => match s.parse::<BigInt>() {
            Ok(n) => Value::BigInt(n),
            Err(e) => bail!(StatusCode::InvalidArgs, "invalid $bigint {:?}: {}", s, e),
        },
        ("$number", body) => Value::Number(import_number(body)?),
        ("$date", body) => Value::Date(import_number(body)?),
        ("$regexp", Json::Array(parts)) => match parts.as_slice() {
            [Json::String(source), Json::String(flags)] => {
                Value::RegExp(RegExp::new(source.clone(), flags.clone()))
            }
            _ => bail!(StatusCode::InvalidArgs, "$regexp expects [source, flags]"),
        },
        ("$buffer", Json::String(hex)) => {
            let bytes = decode_hex(hex)?;
            Value::Ref(graph.insert(Node::Buffer(Buffer::new(bytes))))
        }
        ("$set", Json::Array(items)) => {
            let values = import_all(items, graph)?;
            Value::Ref(graph.insert(Node::Set(values)))
        }
        ("$map", Json::Array(pairs)) => {
            let mut entries = Vec::with_capacity(pairs.len());
            for pair in pairs {
                let Json::Array(kv) = pair else {
                    bail!(StatusCode::InvalidArgs, "$map entries must be [key, value] pairs");
                };
                let [k, v] = kv.as_slice() else {
                    bail!(StatusCode::InvalidArgs, "$map entries must be [key, value] pairs");
                };
                entries.push((import(k, graph)?, import(v, graph)?));
            }
            Value::Ref(graph.insert(Node::Map(entries)))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn import_number(json: &Json) -> ZgraphResult<f64> {
    match json {
        Json::Number(n) => match n.as_f64() {
            Some(f) => Ok(f),
            None => bail!(StatusCode::InvalidArgs, "number {} is not representable as f64", n),
        },
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => match other.parse::<f64>() {
                Ok(f) => Ok(f),
                Err(_) => bail!(StatusCode::InvalidArgs, "invalid number {:?}", other),
            },
        },
        _ => bail!(StatusCode::InvalidArgs, "expected a number"),
    }
}

fn decode_hex(hex: &str) -> ZgraphResult<Vec<u8>> {
    if hex.len() % 2 != 0 {
        bail!(StatusCode::InvalidArgs, "hex string has odd length");
    }
    let mut out = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let Some(pair) = hex.get(i..i + 2) else {
            bail!(StatusCode::InvalidArgs, "hex string is not ASCII");
        };
        match u8::from_str_radix(pair, 16) {
            Ok(b) => out.push(b),
            Err(_) => bail!(StatusCode::InvalidArgs, "invalid hex byte {:?}", pair),
        }
    }
    Ok(out)
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Экспортирует документ в JSON для просмотра.
pub fn to_json(doc: &Document) -> Json {
    let mut export = Export {
        graph: &doc.graph,
        seen: FxHashMap::default(),
    };
    export.value(&doc.root, 0)
}

struct Export<'g> {
    graph: &'g Graph,
    seen: FxHashMap<NodeId, usize>,
}

impl<'g> Export<'g> {
    fn value(
        &mut self,
        value: &Value,
        depth: usize,
    ) -> Json {
        match value {
            Value::Undefined => json!({ "$undefined": true }),
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => export_number(*n),
            Value::BigInt(n) => json!({ "$bigint": n.to_string() }),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(ms) => json!({ "$date": export_number(*ms) }),
            Value::RegExp(re) => json!({ "$regexp": [re.source, re.flags] }),
            Value::Symbol(s) => json!({ "$symbol": s }),
            Value::Ref(id) => self.node(*id, depth),
        }
    }

    fn node(
        &mut self,
        id: NodeId,
        depth: usize,
    ) -> Json {
        if let Some(&n) = self.seen.get(&id) {
            return json!({ "$ref": n });
        }
        let n = self.seen.len();
        self.seen.insert(id, n);
        if depth >= MAX_EXPORT_DEPTH {
            return json!({ "$truncated": n });
        }
        let graph = self.graph;
        let Some(node) = graph.get(id) else {
            return json!({ "$dangling": id.0 });
        };
        let depth = depth + 1;

        match node {
            Node::Array(arr) if arr.is_dense() => Json::Array(
                arr.elements
                    .values()
                    .map(|v| self.value(v, depth))
                    .collect(),
            ),
            Node::Array(arr) => {
                let elements: Map<String, Json> = arr
                    .elements
                    .iter()
                    .map(|(i, v)| (i.to_string(), self.value(v, depth)))
                    .collect();
                json!({ "$sparse": arr.length, "elements": elements })
            }
            Node::Object(obj) => Json::Object(
                obj.iter()
                    .map(|(k, v)| (k.to_string(), self.value(v, depth)))
                    .collect(),
            ),
            Node::Map(entries) => {
                let pairs: Vec<Json> = entries
                    .iter()
                    .map(|(k, v)| Json::Array(vec![self.value(k, depth), self.value(v, depth)]))
                    .collect();
                json!({ "$map": pairs })
            }
            Node::Set(values) => {
                let items: Vec<Json> = values.iter().map(|v| self.value(v, depth)).collect();
                json!({ "$set": items })
            }
            Node::Buffer(buf) if buf.shared => json!({ "$sharedbuffer": encode_hex(&buf.bytes) }),
            Node::Buffer(buf) => json!({ "$buffer": encode_hex(&buf.bytes) }),
            Node::TypedArray(typed) => {
                json!({ "$typed": typed.kind().name(), "values": typed_values(typed) })
            }
            Node::DataView(view) => {
                let buffer = self.node(view.buffer, depth);
                json!({
                    "$dataview": buffer,
                    "offset": view.byte_offset,
                    "length": view.byte_length,
                })
            }
            Node::Wrapper(p) => {
                let inner = match p {
                    Primitive::Bool(b) => Json::Bool(*b),
                    Primitive::Number(n) => export_number(*n),
                    Primitive::String(s) => Json::String(s.clone()),
                    Primitive::BigInt(n) => json!({ "$bigint": n.to_string() }),
                };
                json!({ "$wrapper": inner })
            }
            Node::Custom(custom) => {
                let payload = self.value(&custom.payload, depth);
                json!({ "$custom": custom.extension, "payload": payload })
            }
            Node::Opaque(kind) => json!({ "$opaque": kind.name() }),
        }
    }
}

fn export_number(n: f64) -> Json {
    if n.is_nan() {
        json!({ "$number": "NaN" })
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        json!({ "$number": s })
    } else if n == 0.0 && n.is_sign_negative() {
        json!({ "$number": "-0" })
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

fn typed_values(typed: &TypedArray) -> Vec<Json> {
    match typed {
        TypedArray::Int8(v) => v.iter().map(|x| json!(x)).collect(),
        TypedArray::Uint8(v) => v.iter().map(|x| json!(x)).collect(),
        TypedArray::Int16(v) => v.iter().map(|x| json!(x)).collect(),
        TypedArray::Uint16(v) => v.iter().map(|x| json!(x)).collect(),
        TypedArray::Int32(v) => v.iter().map(|x| json!(x)).collect(),
        TypedArray::Uint32(v) => v.iter().map(|x| json!(x)).collect(),
        TypedArray::Float32(v) => v.iter().map(|x| export_number(f64::from(*x))).collect(),
        TypedArray::Float64(v) => v.iter().map(|x| export_number(*x)).collect(),
        TypedArray::BigInt64(v) => v.iter().map(|x| Json::String(x.to_string())).collect(),
        TypedArray::BigUint64(v) => v.iter().map(|x| Json::String(x.to_string())).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_rejects_invalid_utf8() {
        let err = from_json_slice(&[b'"', 0xC3, 0x28, b'"']).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidUtf8);

        let doc = from_json_slice(br#"["ok"]"#).unwrap();
        assert_eq!(to_json(&doc), json!(["ok"]));
    }

    #[test]
    fn test_plain_json() {
        let doc = from_json_str(r#"{"a": [1, true, null], "b": "x"}"#).unwrap();
        let Some(Node::Object(obj)) = doc.root_node() else {
            panic!("root is not an object");
        };
        assert_eq!(obj.get("b"), Some(&Value::String("x".into())));
        assert_eq!(to_json(&doc), json!({"a": [1.0, true, null], "b": "x"}));
    }

    #[test]
    fn test_markers() {
        let doc = from_json_str(
            r#"[{"$bigint": "-340282366920938463463374607431768211456"},
                {"$number": "-0"},
                {"$number": "NaN"},
                {"$regexp": ["a+", "g"]},
                {"$buffer": "00ff"},
                {"$undefined": true}]"#,
        )
        .unwrap();
        let Some(Node::Array(arr)) = doc.root_node() else {
            panic!("root is not an array");
        };
        assert!(matches!(arr.get(0), Some(Value::BigInt(n)) if n.is_negative()));
        assert!(matches!(arr.get(1), Some(Value::Number(n)) if n.to_bits() == (-0.0f64).to_bits()));
        assert!(matches!(arr.get(2), Some(Value::Number(n)) if n.is_nan()));
        assert_eq!(arr.get(3), Some(&Value::RegExp(RegExp::new("a+", "g"))));
        let Some(Value::Ref(buf)) = arr.get(4) else {
            panic!("buffer is not a node");
        };
        assert_eq!(doc.graph.get(*buf), Some(&Node::Buffer(Buffer::new(vec![0x00, 0xFF]))));
        assert_eq!(arr.get(5), Some(&Value::Undefined));
    }

    #[test]
    fn test_bad_marker_input() {
        assert!(from_json_str(r#"{"$bigint": "12x"}"#).is_err());
        assert!(from_json_str(r#"{"$buffer": "abc"}"#).is_err());
        assert!(from_json_str(r#"{"$map": [[1]]}"#).is_err());
        assert!(from_json_str("{").is_err());
    }

    /// Тест проверяет, что повторная встреча узла экспортируется как `$ref`.
    #[test]
    fn test_export_cycle() {
        let mut g = Graph::new();
        let a = g.insert(Node::Object(Object::new()));
        if let Some(Node::Object(obj)) = g.get_mut(a) {
            obj.insert("self", Value::Ref(a));
        }
        let doc = Document::new(g, Value::Ref(a));
        assert_eq!(to_json(&doc), json!({"self": {"$ref": 0}}));
    }

    #[test]
    fn test_export_sparse() {
        let mut g = Graph::new();
        let mut arr = Array::with_length(3);
        arr.set(0, Value::Number(1.0));
        arr.set(2, Value::Number(3.0));
        let id = g.insert(Node::Array(arr));
        let doc = Document::new(g, Value::Ref(id));
        assert_eq!(
            to_json(&doc),
            json!({"$sparse": 3, "elements": {"0": 1.0, "2": 3.0}})
        );
    }
}
