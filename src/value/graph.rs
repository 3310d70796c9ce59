//! Арена узлов и документ (граф + корень).

use std::ops::Index;

use rustc_hash::FxHashMap;

use super::{Node, NodeId, Primitive, Value};

/// Арена, владеющая всеми узлами одного графа значений.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Переносит `node` в арену и возвращает его id.
    pub fn insert(
        &mut self,
        node: Node,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(
        &self,
        id: NodeId,
    ) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(
        &mut self,
        id: NodeId,
    ) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn contains(
        &self,
        id: NodeId,
    ) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }
}

impl Index<NodeId> for Graph {
    type Output = Node;

    fn index(
        &self,
        id: NodeId,
    ) -> &Node {
        &self.nodes[id.index()]
    }
}

/// Декодированный (или собранный вручную) граф вместе с корнем.
#[derive(Debug, Clone)]
pub struct Document {
    pub graph: Graph,
    pub root: Value,
}

impl Document {
    pub fn new(
        graph: Graph,
        root: Value,
    ) -> Self {
        Self { graph, root }
    }

    /// Узел, на который указывает корень, если корень это ссылка.
    pub fn root_node(&self) -> Option<&Node> {
        self.root.as_ref_id().and_then(|id| self.graph.get(id))
    }

    /// Структурное равенство с точностью до перенумерации узлов.
    ///
    /// Документы изоморфны, если биекция между достижимыми узлами переводит
    /// один в другой: должны совпадать общие узлы и циклы, а не только
    /// содержимое. Числа сравниваются побитово, поэтому `-0.0` не равно
    /// `0.0`, а полезная нагрузка NaN значима.
    pub fn is_isomorphic(
        &self,
        other: &Document,
    ) -> bool {
        Isomorphism::new(&self.graph, &other.graph).check(&self.root, &other.root)
    }
}

struct Isomorphism<'a> {
    left: &'a Graph,
    right: &'a Graph,
    forward: FxHashMap<NodeId, NodeId>,
    backward: FxHashMap<NodeId, NodeId>,
    pending: Vec<(&'a Value, &'a Value)>,
}

impl<'a> Isomorphism<'a> {
    fn new(
        left: &'a Graph,
        right: &'a Graph,
    ) -> Self {
        Self {
            left,
            right,
            forward: FxHashMap::default(),
            backward: FxHashMap::default(),
            pending: Vec::new(),
        }
    }

    fn check(
        mut self,
        a: &'a Value,
        b: &'a Value,
    ) -> bool {
        self.pending.push((a, b));
        while let Some((a, b)) = self.pending.pop() {
            if !self.values(a, b) {
                return false;
            }
        }
        true
    }

    fn values(
        &mut self,
        a: &'a Value,
        b: &'a Value,
    ) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) | (Value::Date(x), Value::Date(y)) => {
                x.to_bits() == y.to_bits()
            }
            (Value::BigInt(x), Value::BigInt(y)) => x == y,
            (Value::String(x), Value::String(y)) | (Value::Symbol(x), Value::Symbol(y)) => x == y,
            (Value::RegExp(x), Value::RegExp(y)) => x == y,
            (Value::Ref(x), Value::Ref(y)) => self.refs(*x, *y),
            _ => false,
        }
    }

    fn refs(
        &mut self,
        x: NodeId,
        y: NodeId,
    ) -> bool {
        match (self.forward.get(&x), self.backward.get(&y)) {
            (Some(mapped), _) => return *mapped == y,
            (None, Some(_)) => return false,
            (None, None) => {}
        }
        self.forward.insert(x, y);
        self.backward.insert(y, x);

        let left = self.left;
        let right = self.right;
        match (left.get(x), right.get(y)) {
            (Some(a), Some(b)) => self.nodes(a, b),
            _ => false,
        }
    }

    fn nodes(
        &mut self,
        a: &'a Node,
        b: &'a Node,
    ) -> bool {
        match (a, b) {
            (Node::Array(x), Node::Array(y)) => {
                if x.length != y.length || x.elements.len() != y.elements.len() {
                    return false;
                }
                for ((i, v), (j, w)) in x.elements.iter().zip(&y.elements) {
                    if i != j {
                        return false;
                    }
                    self.pending.push((v, w));
                }
                true
            }
            (Node::Object(x), Node::Object(y)) => {
                if x.len() != y.len() {
                    return false;
                }
                for ((k, v), (l, w)) in x.iter().zip(y.iter()) {
                    if k != l {
                        return false;
                    }
                    self.pending.push((v, w));
                }
                true
            }
            (Node::Map(x), Node::Map(y)) => {
                if x.len() != y.len() {
                    return false;
                }
                for ((k1, v1), (k2, v2)) in x.iter().zip(y) {
                    self.pending.push((k1, k2));
                    self.pending.push((v1, v2));
                }
                true
            }
            (Node::Set(x), Node::Set(y)) => {
                if x.len() != y.len() {
                    return false;
                }
                self.pending.extend(x.iter().zip(y));
                true
            }
            (Node::Buffer(x), Node::Buffer(y)) => x == y,
            (Node::TypedArray(x), Node::TypedArray(y)) => x.bits_eq(y),
            (Node::DataView(x), Node::DataView(y)) => {
                x.byte_offset == y.byte_offset
                    && x.byte_length == y.byte_length
                    && self.refs(x.buffer, y.buffer)
            }
            (Node::Wrapper(x), Node::Wrapper(y)) => match (x, y) {
                (Primitive::Number(p), Primitive::Number(q)) => p.to_bits() == q.to_bits(),
                _ => x == y,
            },
            (Node::Custom(x), Node::Custom(y)) => {
                if x.extension != y.extension {
                    return false;
                }
                self.pending.push((&x.payload, &y.payload));
                true
            }
            (Node::Opaque(x), Node::Opaque(y)) => x == y,
            _ => false,
        }
    }
}
