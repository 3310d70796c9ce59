//! Граф значений в памяти.
//!
//! Контейнеры с идентичностью живут в арене [`Graph`] и адресуются через
//! [`NodeId`]. Встроенные значения ([`Value`]) ссылаются на них через
//! [`Value::Ref`]. Две ссылки с одним id указывают на один и тот же объект:
//! так выражаются общие подструктуры и циклы.

pub mod bigint;
pub mod graph;
pub mod typed;

use std::{collections::BTreeMap, fmt};

use rustc_hash::FxHashMap;

pub use bigint::{BigInt, ParseBigIntError};
pub use graph::{Document, Graph};
pub use typed::{ElementKind, Endian, TypedArray};

/// Индекс узла в [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Встроенное значение. Своего id в потоке не получает.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(BigInt),
    String(String),
    /// Миллисекунды от эпохи Unix. NaN означает невалидную дату.
    Date(f64),
    RegExp(RegExp),
    /// Символ хоста. В потоке не представим.
    Symbol(String),
    Ref(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegExp {
    pub source: String,
    pub flags: String,
}

impl RegExp {
    pub fn new(
        source: impl Into<String>,
        flags: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }
}

/// Контейнер с идентичностью.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Array(Array),
    Object(Object),
    /// Пары ключ/значение в порядке вставки.
    Map(Vec<(Value, Value)>),
    /// Элементы в порядке вставки.
    Set(Vec<Value>),
    Buffer(Buffer),
    TypedArray(TypedArray),
    DataView(DataView),
    Wrapper(Primitive),
    Custom(CustomObject),
    /// Объект хоста без представления в потоке.
    Opaque(OpaqueKind),
}

/// Массив с явной длиной. Индексы, которых нет в `elements`, это дыры;
/// они отличаются от присутствующего `Value::Undefined`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    pub length: usize,
    pub elements: BTreeMap<usize, Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Массив без дыр.
    pub fn dense(values: impl IntoIterator<Item = Value>) -> Self {
        let elements: BTreeMap<usize, Value> = values.into_iter().enumerate().collect();
        Self {
            length: elements.len(),
            elements,
        }
    }

    /// Массив из `length` дыр.
    pub fn with_length(length: usize) -> Self {
        Self {
            length,
            elements: BTreeMap::new(),
        }
    }

    pub fn push(
        &mut self,
        value: Value,
    ) {
        self.elements.insert(self.length, value);
        self.length += 1;
    }

    /// Записывает `index`, при необходимости увеличивая длину.
    pub fn set(
        &mut self,
        index: usize,
        value: Value,
    ) {
        self.elements.insert(index, value);
        if index >= self.length {
            self.length = index + 1;
        }
    }

    pub fn get(
        &self,
        index: usize,
    ) -> Option<&Value> {
        self.elements.get(&index)
    }

    pub fn is_hole(
        &self,
        index: usize,
    ) -> bool {
        index < self.length && !self.elements.contains_key(&index)
    }

    /// `true`, если определён каждый индекс меньше `length`.
    pub fn is_dense(&self) -> bool {
        self.elements.len() == self.length
    }
}

/// Свойства со строковыми ключами в порядке вставки.
///
/// Рядом с упорядоченным списком лежит индекс ключ → позиция, так что
/// вставка и поиск не зависят от числа свойств.
#[derive(Clone, PartialEq, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Вставляет или заменяет свойство. Замена сохраняет исходную позицию.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) {
        let key = key.into();
        if let Some(&slot) = self.index.get(&key) {
            if let Some(entry) = self.entries.get_mut(slot) {
                entry.1 = value;
                return;
            }
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&Value> {
        let slot = *self.index.get(key)?;
        self.entries.get(slot).map(|(_, v)| v)
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.index.contains_key(key)
    }

    /// Пары ключ/значение в порядке вставки.
    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Object {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut obj = Object::new();
        for (key, value) in iter {
            obj.insert(key, value);
        }
        obj
    }
}

/// Сырой байтовый буфер. `shared` помечает буфер, видимый другим потокам
/// хоста; флаг передаётся в потоке.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Buffer {
    pub bytes: Vec<u8>,
    pub shared: bool,
}

impl Buffer {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            shared: false,
        }
    }

    pub fn shared(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            shared: true,
        }
    }
}

/// Окно байтов поверх узла [`Buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataView {
    pub buffer: NodeId,
    pub byte_offset: usize,
    pub byte_length: usize,
}

/// Упакованный примитив. В отличие от голого значения имеет идентичность.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(BigInt),
}

/// Объект, который кодирует зарегистрированное расширение. `payload` это
/// значение, в котором расширение хранит объект в памяти; в поток пишется
/// результат [`Extension::encode`](crate::codec::Extension::encode).
#[derive(Debug, Clone, PartialEq)]
pub struct CustomObject {
    pub extension: u32,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpaqueKind {
    Function,
    WeakMap,
    WeakSet,
    WeakRef,
    Promise,
    Other(String),
}

impl OpaqueKind {
    pub fn name(&self) -> &str {
        match self {
            OpaqueKind::Function => "Function",
            OpaqueKind::WeakMap => "WeakMap",
            OpaqueKind::WeakSet => "WeakSet",
            OpaqueKind::WeakRef => "WeakRef",
            OpaqueKind::Promise => "Promise",
            OpaqueKind::Other(name) => name,
        }
    }
}

impl Node {
    /// Короткое имя типа для диагностики.
    pub fn type_name(&self) -> &str {
        match self {
            Node::Array(_) => "Array",
            Node::Object(_) => "Object",
            Node::Map(_) => "Map",
            Node::Set(_) => "Set",
            Node::Buffer(b) if b.shared => "SharedArrayBuffer",
            Node::Buffer(_) => "ArrayBuffer",
            Node::TypedArray(t) => t.kind().name(),
            Node::DataView(_) => "DataView",
            Node::Wrapper(_) => "PrimitiveWrapper",
            Node::Custom(_) => "CustomObject",
            Node::Opaque(kind) => kind.name(),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Date(_) => "Date",
            Value::RegExp(_) => "RegExp",
            Value::Symbol(_) => "symbol",
            Value::Ref(_) => "object",
        }
    }

    pub fn as_ref_id(&self) -> Option<NodeId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Ref(id)
    }
}
