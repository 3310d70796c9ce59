//! Reference assigner: один обход графа в прямом порядке.
//!
//! Каждому ссылочному узлу при первой встрече выдаётся следующий id; все
//! повторные встречи (включая ссылку узла на самого себя) превращаются в
//! обратные ссылки. Обход использует явный стек, поэтому глубина графа не
//! ограничена стеком потока. Результат — плоский список элементов в том
//! порядке, в котором они окажутся на проводе.

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use tracing::debug;
use zgraph_error::EncodeError;

use super::{dispatch, extension::ExtensionRegistry, tags::WireTag};
use crate::value::{Graph, Node, NodeId, Value};

/// Один элемент потока записи.
#[derive(Debug, Clone)]
pub enum Emit<'g> {
    /// Инлайн-значение со своим тегом. Своё (`Owned`) только у payload,
    /// который вернул [`Extension::encode`](super::Extension::encode).
    Scalar { value: Cow<'g, Value>, tag: WireTag },
    /// Первая встреча ссылочного узла; его дети идут следом.
    Node {
        id: u64,
        tag: WireTag,
        node: &'g Node,
    },
    /// Ключ свойства объекта (сырая строка без тега).
    Key(&'g str),
    /// Повторная встреча уже выданного узла.
    BackRef(u64),
}

enum Work<'g> {
    Value(&'g Value),
    Owned(Value),
    Ref(NodeId),
    Key(&'g str),
}

/// Обходит граф от `root` и возвращает список элементов в порядке записи.
///
/// Ошибка возвращается до того, как вызывающий код запишет хоть один байт.
pub fn walk<'g>(
    graph: &'g Graph,
    root: &'g Value,
    registry: &ExtensionRegistry,
) -> Result<Vec<Emit<'g>>, EncodeError> {
    let mut out = Vec::new();
    let mut visited: FxHashMap<NodeId, u64> = FxHashMap::default();
    let mut stack = vec![Work::Value(root)];

    while let Some(work) = stack.pop() {
        let id = match work {
            Work::Key(key) => {
                out.push(Emit::Key(key));
                continue;
            }
            Work::Value(Value::Ref(id)) => *id,
            Work::Owned(Value::Ref(id)) => id,
            Work::Value(value) => {
                let tag = dispatch::classify_scalar(value)?;
                out.push(Emit::Scalar {
                    value: Cow::Borrowed(value),
                    tag,
                });
                continue;
            }
            Work::Owned(value) => {
                let tag = dispatch::classify_scalar(&value)?;
                out.push(Emit::Scalar {
                    value: Cow::Owned(value),
                    tag,
                });
                continue;
            }
            Work::Ref(id) => id,
        };

        if let Some(&assigned) = visited.get(&id) {
            out.push(Emit::BackRef(assigned));
            continue;
        }

        let node = graph
            .get(id)
            .ok_or(EncodeError::DanglingReference { node: id.0 })?;
        let tag = dispatch::classify_node(node, graph, registry)?;
        let assigned = visited.len() as u64;
        visited.insert(id, assigned);
        out.push(Emit::Node {
            id: assigned,
            tag,
            node,
        });

        push_children(node, graph, registry, &mut stack)?;
    }

    debug!(
        items = out.len(),
        nodes = visited.len(),
        "value graph walked"
    );
    Ok(out)
}

/// Кладёт детей в стек в обратном порядке, чтобы они снимались по порядку.
fn push_children<'g>(
    node: &'g Node,
    graph: &'g Graph,
    registry: &ExtensionRegistry,
    stack: &mut Vec<Work<'g>>,
) -> Result<(), EncodeError> {
    match node {
        Node::Array(arr) => {
            stack.extend(arr.elements.values().rev().map(Work::Value));
        }
        Node::Object(obj) => {
            for (key, value) in obj.iter().rev() {
                stack.push(Work::Value(value));
                stack.push(Work::Key(key));
            }
        }
        Node::Map(entries) => {
            for (key, value) in entries.iter().rev() {
                stack.push(Work::Value(value));
                stack.push(Work::Value(key));
            }
        }
        Node::Set(values) => {
            stack.extend(values.iter().rev().map(Work::Value));
        }
        Node::DataView(view) => stack.push(Work::Ref(view.buffer)),
        Node::Custom(custom) => {
            let payload = dispatch::encode_custom(custom, graph, registry)?;
            stack.push(Work::Owned(payload));
        }
        Node::Buffer(_) | Node::TypedArray(_) | Node::Wrapper(_) | Node::Opaque(_) => {}
    }
    Ok(())
}
