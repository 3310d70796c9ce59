//! Incremental parser: возобновляемая машина состояний поверх чанков байт.
//!
//! Входные байты копятся в буфере, пока не наберётся целый заголовок
//! (тег плюс поля фиксированного размера и varint'ы). Длинные поля
//! (строки, буферы, typed-массивы, модули bigint, битовые маски) читаются
//! по частям в аккумулятор. Открытые контейнеры лежат в явном стеке вместе
//! с числом оставшихся детей, поэтому разбор может остановиться в любом
//! байте и продолжиться со следующим чанком.
//!
//! Любая ошибка окончательна: сессия помечается как сломанная, и все
//! последующие вызовы возвращают `Malformed`.

use std::{borrow::Cow, io, mem, sync::Arc};

use bytes::{Buf, BytesMut};
use tracing::debug;
use zgraph_error::{DecodeError, StackError, ZgraphResult};

use super::{
    builder::{bigint_from_wire, Builder},
    dispatch::valid_regexp_flags,
    events::{NoopHandler, ParseEvent, ParseHandler},
    extension::ExtensionRegistry,
    file::FormatVersion,
    options::DeserializeOptions,
    tags::WireTag,
    varint::decode_varint,
};
use crate::{
    logging::log_error,
    value::{BigInt, Document, ElementKind, Endian, NodeId, Primitive, RegExp, TypedArray, Value},
};

/// Верхняя граница предварительного выделения памяти под одно поле.
/// Объявленная длина не доверенная, поэтому буфер растёт по мере прихода
/// байт.
pub const MAX_PREALLOC: usize = 64 * 1024;

#[derive(Debug)]
enum ParseState {
    /// Ждём байт версии.
    Version,
    /// Ждём заголовок следующего элемента.
    Item,
    /// Читаем поле известной длины.
    Payload {
        remaining: usize,
        data: Vec<u8>,
        sink: PayloadSink,
        start: u64,
    },
    /// Корень собран.
    Done,
}

/// Куда отправить поле, когда оно прочитано целиком.
#[derive(Debug)]
enum PayloadSink {
    String,
    RawString,
    BigInt { negative: bool },
    Buffer(NodeId),
    Typed {
        node: NodeId,
        kind: ElementKind,
        order: Endian,
    },
    Bitmap { node: NodeId, length: usize },
    WrapperString(NodeId),
    WrapperBigInt { node: NodeId, negative: bool },
}

/// Открытая составная структура.
#[derive(Debug)]
enum Frame {
    Array { node: NodeId, slots: Slots },
    Object {
        node: NodeId,
        remaining: usize,
        key: Option<String>,
    },
    Map {
        node: NodeId,
        remaining: usize,
        key: Option<Value>,
    },
    Set { node: NodeId, remaining: usize },
    DataView { node: NodeId },
    Custom { node: NodeId },
    RegExp { source: Option<String> },
}

/// Индексы массива, которые ещё предстоит заполнить.
#[derive(Debug)]
enum Slots {
    Dense { next: usize, length: usize },
    Sparse { bitmap: Vec<u8>, next: usize },
}

impl Slots {
    fn current(&self) -> usize {
        match self {
            Slots::Dense { next, .. } | Slots::Sparse { next, .. } => *next,
        }
    }

    /// Переходит к следующему слоту; `false`, если слотов больше нет.
    fn advance(&mut self) -> bool {
        match self {
            Slots::Dense { next, length } => {
                *next += 1;
                *next < *length
            }
            Slots::Sparse { bitmap, next } => match next_set_bit(bitmap, *next + 1) {
                Some(i) => {
                    *next = i;
                    true
                }
                None => false,
            },
        }
    }
}

fn next_set_bit(
    bitmap: &[u8],
    from: usize,
) -> Option<usize> {
    let mut byte_idx = from / 8;
    let mut byte = *bitmap.get(byte_idx)? & (0xFFu8 << (from % 8));
    loop {
        if byte != 0 {
            return Some(byte_idx * 8 + byte.trailing_zeros() as usize);
        }
        byte_idx += 1;
        byte = *bitmap.get(byte_idx)?;
    }
}

/// Разобранный заголовок элемента.
enum Head {
    Value(Value),
    Str(usize),
    BigInt { negative: bool, len: usize },
    RegExp,
    BackRef(u64),
    Buffer { len: usize, shared: bool },
    Typed {
        kind: ElementKind,
        order: Endian,
        len: usize,
    },
    DataView { offset: usize, length: usize },
    Dense(usize),
    Sparse(usize),
    Object(usize),
    Map(usize),
    Set(usize),
    WrapperBool(bool),
    WrapperNumber(f64),
    WrapperString(usize),
    WrapperBigInt { negative: bool, len: usize },
    Custom(u32),
}

enum Header {
    /// Сырая строка (ключ объекта или часть RegExp) заданной длины.
    Raw(usize),
    Tagged(WireTag, Head),
}

enum PeekError {
    Incomplete,
    Malformed(DecodeError),
}

impl From<DecodeError> for PeekError {
    fn from(e: DecodeError) -> Self {
        PeekError::Malformed(e)
    }
}

/// Курсор чтения без потребления: байты снимаются с буфера только когда
/// заголовок прочитан целиком.
struct Peek<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Peek<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, PeekError> {
        let b = *self.buf.get(self.pos).ok_or(PeekError::Incomplete)?;
        self.pos += 1;
        Ok(b)
    }

    fn f64(&mut self) -> Result<f64, PeekError> {
        let end = self.pos + 8;
        let raw: [u8; 8] = self
            .buf
            .get(self.pos..end)
            .and_then(|s| s.try_into().ok())
            .ok_or(PeekError::Incomplete)?;
        self.pos = end;
        Ok(f64::from_be_bytes(raw))
    }

    fn varint(&mut self) -> Result<u64, PeekError> {
        match decode_varint(&self.buf[self.pos..])? {
            Some((value, used)) => {
                self.pos += used;
                Ok(value)
            }
            None => Err(PeekError::Incomplete),
        }
    }

    fn length(&mut self) -> Result<usize, PeekError> {
        let v = self.varint()?;
        usize::try_from(v).map_err(|_| {
            PeekError::Malformed(DecodeError::malformed(
                format!("length {v} does not fit in memory"),
                None,
            ))
        })
    }

    fn flag(
        &mut self,
        what: &str,
    ) -> Result<bool, PeekError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PeekError::Malformed(DecodeError::malformed(
                format!("invalid {what} byte 0x{other:02X}"),
                None,
            ))),
        }
    }
}

/// Сессия пошагового декодирования.
///
/// Байты подаются через [`feed`](Self::feed) кусками любого размера;
/// [`finish`](Self::finish) возвращает документ, если корень собран.
#[derive(Debug)]
pub struct Deserializer<H: ParseHandler = NoopHandler> {
    input: BytesMut,
    /// Смещение `input[0]` от начала потока.
    consumed: u64,
    accepted: u64,
    max_length: u64,
    state: ParseState,
    stack: Vec<Frame>,
    builder: Builder,
    root: Option<Value>,
    failed: bool,
    handler: H,
}

impl Deserializer<NoopHandler> {
    pub fn new(
        options: &DeserializeOptions,
        registry: Arc<ExtensionRegistry>,
    ) -> ZgraphResult<Self> {
        Self::with_handler(options, registry, NoopHandler)
    }
}

impl<H: ParseHandler> Deserializer<H> {
    pub fn with_handler(
        options: &DeserializeOptions,
        registry: Arc<ExtensionRegistry>,
        handler: H,
    ) -> ZgraphResult<Self> {
        options.validate()?;
        debug!(max_length = options.max_length, "decode session started");
        Ok(Self {
            input: BytesMut::new(),
            consumed: 0,
            accepted: 0,
            max_length: options.max_length,
            state: ParseState::Version,
            stack: Vec::new(),
            builder: Builder::new(registry),
            root: None,
            failed: false,
            handler,
        })
    }

    /// Принимает очередной чанк и продвигает разбор насколько возможно.
    pub fn feed(
        &mut self,
        chunk: &[u8],
    ) -> ZgraphResult<()> {
        if self.failed {
            return Err(session_failed());
        }
        let received = self.accepted.saturating_add(chunk.len() as u64);
        if received > self.max_length {
            return Err(self.fail(DecodeError::LengthExceeded {
                max_length: self.max_length,
                received,
            }));
        }
        self.accepted = received;
        self.input.extend_from_slice(chunk);

        match self.advance() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Завершает сессию.
    pub fn finish(self) -> ZgraphResult<Document> {
        self.finish_with_handler().0
    }

    /// Как [`finish`](Self::finish), но возвращает и обработчик событий
    /// (даже при ошибке).
    pub fn finish_with_handler(self) -> (ZgraphResult<Document>, H) {
        let Deserializer {
            consumed,
            state,
            stack,
            builder,
            root,
            failed,
            handler,
            ..
        } = self;

        if failed {
            return (Err(session_failed()), handler);
        }
        match (state, root) {
            (ParseState::Done, Some(root)) => (Ok(builder.into_document(root)), handler),
            (state, _) => {
                let open_structures =
                    stack.len() + usize::from(matches!(state, ParseState::Payload { .. }));
                let err = StackError::new(DecodeError::Truncated {
                    open_structures,
                    offset: consumed,
                });
                log_error(&err, "stream ended before the root value was complete");
                (Err(err), handler)
            }
        }
    }

    /// Корень уже собран.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, ParseState::Done)
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn bytes_accepted(&self) -> u64 {
        self.accepted
    }

    /// Кол-во открытых составных структур.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    fn fail(
        &mut self,
        err: DecodeError,
    ) -> StackError {
        self.failed = true;
        self.input.clear();
        self.stack.clear();
        let err = StackError::new(err);
        log_error(&err, "stream rejected");
        err
    }

    fn consume(
        &mut self,
        n: usize,
    ) {
        self.input.advance(n);
        self.consumed += n as u64;
    }

    fn advance(&mut self) -> Result<(), DecodeError> {
        loop {
            match self.state {
                ParseState::Version => {
                    let Some(&byte) = self.input.first() else {
                        return Ok(());
                    };
                    let version = FormatVersion::try_from(byte)?;
                    self.consume(1);
                    self.handler.handle_event(ParseEvent::Version { version });
                    self.state = ParseState::Item;
                }
                ParseState::Item => {
                    if !self.parse_item()? {
                        return Ok(());
                    }
                }
                ParseState::Payload { .. } => {
                    if !self.continue_payload()? {
                        return Ok(());
                    }
                }
                ParseState::Done => {
                    if !self.input.is_empty() {
                        return Err(DecodeError::malformed(
                            "trailing bytes after root value",
                            Some(self.consumed),
                        ));
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Следующий элемент — сырая строка без тега.
    fn expects_raw_string(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Object { key: None, .. }) | Some(Frame::RegExp { .. })
        )
    }

    /// Читает один заголовок. `false` — байтов пока недостаточно.
    fn parse_item(&mut self) -> Result<bool, DecodeError> {
        let offset = self.consumed;
        let Some((header, used)) = self.read_header().map_err(|e| e.with_offset(offset))? else {
            return Ok(false);
        };
        self.consume(used);

        let result = match header {
            Header::Raw(len) => self.begin_payload(len, PayloadSink::RawString, offset),
            Header::Tagged(tag, head) => self.apply(tag, head, offset),
        };
        result.map_err(|e| e.with_offset(offset))?;
        Ok(true)
    }

    fn read_header(&self) -> Result<Option<(Header, usize)>, DecodeError> {
        let mut peek = Peek::new(&self.input);
        let header = if self.expects_raw_string() {
            peek.length().map(Header::Raw)
        } else {
            self.read_tagged(&mut peek)
        };
        match header {
            Ok(h) => Ok(Some((h, peek.pos))),
            Err(PeekError::Incomplete) => Ok(None),
            Err(PeekError::Malformed(e)) => Err(e),
        }
    }

    fn read_tagged(
        &self,
        peek: &mut Peek<'_>,
    ) -> Result<Header, PeekError> {
        let byte = peek.u8()?;
        let tag = WireTag::from_byte(byte)
            .ok_or_else(|| DecodeError::malformed(format!("unknown tag 0x{byte:02X}"), None))?;

        if let Some(Frame::DataView { .. }) = self.stack.last() {
            if !matches!(
                tag,
                WireTag::Buffer | WireTag::SharedBuffer | WireTag::BackReference
            ) {
                return Err(DecodeError::malformed(
                    format!("DataView must be followed by a buffer, found {tag:?}"),
                    None,
                )
                .into());
            }
        }

        let head = match tag {
            WireTag::Null => Head::Value(Value::Null),
            WireTag::Undefined => Head::Value(Value::Undefined),
            WireTag::True => Head::Value(Value::Bool(true)),
            WireTag::False => Head::Value(Value::Bool(false)),
            WireTag::Number => Head::Value(Value::Number(peek.f64()?)),
            WireTag::Date => Head::Value(Value::Date(peek.f64()?)),
            WireTag::BigInt => {
                let negative = peek.flag("bigint sign")?;
                Head::BigInt {
                    negative,
                    len: peek.length()?,
                }
            }
            WireTag::String => Head::Str(peek.length()?),
            WireTag::RegExp => Head::RegExp,
            WireTag::Buffer => Head::Buffer {
                len: peek.length()?,
                shared: false,
            },
            WireTag::SharedBuffer => Head::Buffer {
                len: peek.length()?,
                shared: true,
            },
            WireTag::DataView => {
                let offset = peek.length()?;
                let length = peek.length()?;
                Head::DataView { offset, length }
            }
            WireTag::Int8Array
            | WireTag::Uint8Array
            | WireTag::Int16Array
            | WireTag::Uint16Array
            | WireTag::Int32Array
            | WireTag::Uint32Array
            | WireTag::Float32Array
            | WireTag::Float64Array
            | WireTag::BigInt64Array
            | WireTag::BigUint64Array => {
                let kind = tag.element_kind().ok_or_else(|| {
                    DecodeError::malformed(format!("{tag:?} has no element kind"), None)
                })?;
                let flag = peek.u8()?;
                let order = Endian::from_flag(flag).ok_or_else(|| {
                    DecodeError::malformed(format!("invalid byte-order flag 0x{flag:02X}"), None)
                })?;
                let len = peek.length()?;
                if len % kind.width() != 0 {
                    return Err(DecodeError::malformed(
                        format!(
                            "{} byte length {len} is not a multiple of {}",
                            kind.name(),
                            kind.width()
                        ),
                        None,
                    )
                    .into());
                }
                Head::Typed { kind, order, len }
            }
            WireTag::ArrayDense => Head::Dense(peek.length()?),
            WireTag::ArraySparse => Head::Sparse(peek.length()?),
            WireTag::Object => Head::Object(peek.length()?),
            WireTag::Map => Head::Map(peek.length()?),
            WireTag::Set => Head::Set(peek.length()?),
            WireTag::WrapperBool => Head::WrapperBool(peek.flag("boolean wrapper")?),
            WireTag::WrapperNumber => Head::WrapperNumber(peek.f64()?),
            WireTag::WrapperString => Head::WrapperString(peek.length()?),
            WireTag::WrapperBigInt => {
                let negative = peek.flag("bigint sign")?;
                Head::WrapperBigInt {
                    negative,
                    len: peek.length()?,
                }
            }
            WireTag::CustomObject => {
                let extension = peek.varint()?;
                let id = u32::try_from(extension)
                    .ok()
                    .filter(|id| self.builder.registry().contains(*id))
                    .ok_or(DecodeError::UnknownExtension {
                        extension,
                        offset: None,
                    })?;
                Head::Custom(id)
            }
            WireTag::BackReference => Head::BackRef(peek.varint()?),
        };
        Ok(Header::Tagged(tag, head))
    }

    fn apply(
        &mut self,
        tag: WireTag,
        head: Head,
        offset: u64,
    ) -> Result<(), DecodeError> {
        let id = match head {
            Head::BackRef(target) => Some(target),
            _ if tag.is_referenceable() => Some(self.builder.assigned()),
            _ => None,
        };
        self.handler.handle_event(ParseEvent::Item {
            offset,
            tag,
            id,
            depth: self.stack.len(),
        });

        match head {
            Head::Value(value) => self.deliver(value),
            Head::Str(len) => self.begin_payload(len, PayloadSink::String, offset),
            Head::BigInt { negative, len } => {
                self.begin_payload(len, PayloadSink::BigInt { negative }, offset)
            }
            Head::RegExp => {
                self.stack.push(Frame::RegExp { source: None });
                Ok(())
            }
            Head::BackRef(id) => {
                let node = self.builder.resolve(id)?;
                self.deliver(Value::Ref(node))
            }
            Head::Buffer { len, shared } => {
                let node = self.builder.allocate_buffer(shared);
                self.begin_payload(len, PayloadSink::Buffer(node), offset)
            }
            Head::Typed { kind, order, len } => {
                let node = self.builder.allocate_typed(kind);
                self.begin_payload(len, PayloadSink::Typed { node, kind, order }, offset)
            }
            Head::DataView {
                offset: byte_offset,
                length,
            } => {
                let node = self.builder.allocate_view(byte_offset, length);
                self.stack.push(Frame::DataView { node });
                Ok(())
            }
            Head::Dense(length) => {
                let node = self.builder.allocate_array(length);
                self.open(
                    length,
                    node,
                    Frame::Array {
                        node,
                        slots: Slots::Dense { next: 0, length },
                    },
                )
            }
            Head::Sparse(length) => {
                let node = self.builder.allocate_array(length);
                self.begin_payload(
                    length.div_ceil(8),
                    PayloadSink::Bitmap { node, length },
                    offset,
                )
            }
            Head::Object(count) => {
                let node = self.builder.allocate_object();
                self.open(
                    count,
                    node,
                    Frame::Object {
                        node,
                        remaining: count,
                        key: None,
                    },
                )
            }
            Head::Map(count) => {
                let node = self.builder.allocate_map();
                self.open(
                    count,
                    node,
                    Frame::Map {
                        node,
                        remaining: count,
                        key: None,
                    },
                )
            }
            Head::Set(count) => {
                let node = self.builder.allocate_set();
                self.open(
                    count,
                    node,
                    Frame::Set {
                        node,
                        remaining: count,
                    },
                )
            }
            Head::WrapperBool(b) => {
                let node = self.builder.allocate_wrapper(Primitive::Bool(b));
                self.deliver(Value::Ref(node))
            }
            Head::WrapperNumber(n) => {
                let node = self.builder.allocate_wrapper(Primitive::Number(n));
                self.deliver(Value::Ref(node))
            }
            Head::WrapperString(len) => {
                let node = self
                    .builder
                    .allocate_wrapper(Primitive::String(String::new()));
                self.begin_payload(len, PayloadSink::WrapperString(node), offset)
            }
            Head::WrapperBigInt { negative, len } => {
                let node = self
                    .builder
                    .allocate_wrapper(Primitive::BigInt(BigInt::zero()));
                self.begin_payload(len, PayloadSink::WrapperBigInt { node, negative }, offset)
            }
            Head::Custom(extension) => {
                let node = self.builder.allocate_custom(extension);
                self.stack.push(Frame::Custom { node });
                Ok(())
            }
        }
    }

    /// Кладёт контейнер в стек, если у него есть дети; пустой сразу готов.
    fn open(
        &mut self,
        children: usize,
        node: NodeId,
        frame: Frame,
    ) -> Result<(), DecodeError> {
        if children == 0 {
            self.deliver(Value::Ref(node))
        } else {
            self.stack.push(frame);
            Ok(())
        }
    }

    fn begin_payload(
        &mut self,
        len: usize,
        sink: PayloadSink,
        start: u64,
    ) -> Result<(), DecodeError> {
        if len == 0 {
            return self.complete_payload(Vec::new(), sink, start);
        }
        self.state = ParseState::Payload {
            remaining: len,
            data: Vec::with_capacity(len.min(MAX_PREALLOC)),
            sink,
            start,
        };
        Ok(())
    }

    /// Дочитывает поле. `false` — байтов пока недостаточно.
    fn continue_payload(&mut self) -> Result<bool, DecodeError> {
        let ParseState::Payload {
            remaining, data, ..
        } = &mut self.state
        else {
            return Ok(true);
        };
        let take = (*remaining).min(self.input.len());
        data.extend_from_slice(&self.input[..take]);
        *remaining -= take;
        let done = *remaining == 0;
        self.consume(take);
        if !done {
            return Ok(false);
        }

        let ParseState::Payload {
            data, sink, start, ..
        } = mem::replace(&mut self.state, ParseState::Item)
        else {
            return Ok(true);
        };
        self.complete_payload(data, sink, start)
            .map_err(|e| e.with_offset(start))?;
        Ok(true)
    }

    fn complete_payload(
        &mut self,
        data: Vec<u8>,
        sink: PayloadSink,
        start: u64,
    ) -> Result<(), DecodeError> {
        match sink {
            PayloadSink::String => {
                let s = utf8(data)?;
                self.deliver(Value::String(s))
            }
            PayloadSink::RawString => {
                let s = utf8(data)?;
                self.handler.handle_event(ParseEvent::RawString {
                    offset: start,
                    value: Cow::Borrowed(&s),
                    depth: self.stack.len(),
                });
                self.deliver_raw(s)
            }
            PayloadSink::BigInt { negative } => {
                let n = bigint_from_wire(negative, data)?;
                self.deliver(Value::BigInt(n))
            }
            PayloadSink::Buffer(node) => {
                self.builder.fill_buffer(node, data)?;
                self.deliver(Value::Ref(node))
            }
            PayloadSink::Typed { node, kind, order } => {
                let lanes = TypedArray::from_bytes(kind, order, &data).ok_or_else(|| {
                    DecodeError::malformed(
                        format!("{} payload is not a whole number of lanes", kind.name()),
                        None,
                    )
                })?;
                self.builder.fill_typed(node, lanes)?;
                self.deliver(Value::Ref(node))
            }
            PayloadSink::Bitmap { node, length } => {
                let tail = length % 8;
                if tail != 0 {
                    let padding = data.last().copied().unwrap_or(0) & (0xFFu8 << tail);
                    if padding != 0 {
                        return Err(DecodeError::malformed(
                            "sparse array bitmap has padding bits set",
                            None,
                        ));
                    }
                }
                match next_set_bit(&data, 0) {
                    None => self.deliver(Value::Ref(node)),
                    Some(first) => {
                        self.stack.push(Frame::Array {
                            node,
                            slots: Slots::Sparse {
                                bitmap: data,
                                next: first,
                            },
                        });
                        Ok(())
                    }
                }
            }
            PayloadSink::WrapperString(node) => {
                let s = utf8(data)?;
                self.builder.fill_wrapper(node, Primitive::String(s))?;
                self.deliver(Value::Ref(node))
            }
            PayloadSink::WrapperBigInt { node, negative } => {
                let n = bigint_from_wire(negative, data)?;
                self.builder.fill_wrapper(node, Primitive::BigInt(n))?;
                self.deliver(Value::Ref(node))
            }
        }
    }

    /// Отдаёт готовое значение родителю; закрывает заполненные контейнеры.
    fn deliver(
        &mut self,
        mut value: Value,
    ) -> Result<(), DecodeError> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                self.finish_root(value);
                return Ok(());
            };

            let completed = match frame {
                Frame::Array { node, slots } => {
                    let node = *node;
                    let index = slots.current();
                    let more = slots.advance();
                    self.builder.set_element(node, index, value)?;
                    if more {
                        return Ok(());
                    }
                    node
                }
                Frame::Object {
                    node,
                    remaining,
                    key,
                } => {
                    let node = *node;
                    let Some(key) = key.take() else {
                        return Err(DecodeError::malformed(
                            "object value arrived before its key",
                            None,
                        ));
                    };
                    *remaining -= 1;
                    let done = *remaining == 0;
                    self.builder.insert_property(node, key, value)?;
                    if !done {
                        return Ok(());
                    }
                    node
                }
                Frame::Map {
                    node,
                    remaining,
                    key,
                } => {
                    let node = *node;
                    let Some(k) = key.take() else {
                        *key = Some(value);
                        return Ok(());
                    };
                    *remaining -= 1;
                    let done = *remaining == 0;
                    self.builder.insert_entry(node, k, value)?;
                    if !done {
                        return Ok(());
                    }
                    node
                }
                Frame::Set { node, remaining } => {
                    let node = *node;
                    *remaining -= 1;
                    let done = *remaining == 0;
                    self.builder.insert_member(node, value)?;
                    if !done {
                        return Ok(());
                    }
                    node
                }
                Frame::DataView { node } => {
                    let node = *node;
                    self.builder.attach_view(node, &value)?;
                    node
                }
                Frame::Custom { node } => {
                    let node = *node;
                    self.builder.finish_custom(node, value)?;
                    node
                }
                Frame::RegExp { .. } => {
                    return Err(DecodeError::malformed(
                        "RegExp body must be raw strings",
                        None,
                    ))
                }
            };

            self.stack.pop();
            value = Value::Ref(completed);
        }
    }

    fn deliver_raw(
        &mut self,
        s: String,
    ) -> Result<(), DecodeError> {
        match self.stack.last_mut() {
            Some(Frame::Object { key, .. }) if key.is_none() => {
                *key = Some(s);
                Ok(())
            }
            Some(Frame::RegExp { source }) => match source.take() {
                None => {
                    *source = Some(s);
                    Ok(())
                }
                Some(source) => {
                    if !valid_regexp_flags(&s) {
                        return Err(DecodeError::malformed(
                            format!("invalid RegExp flags {s:?}"),
                            None,
                        ));
                    }
                    self.stack.pop();
                    self.deliver(Value::RegExp(RegExp { source, flags: s }))
                }
            },
            _ => Err(DecodeError::malformed(
                "raw string outside of a key position",
                None,
            )),
        }
    }

    fn finish_root(
        &mut self,
        root: Value,
    ) {
        self.root = Some(root);
        self.state = ParseState::Done;
        let nodes = self.builder.assigned();
        self.handler.handle_event(ParseEvent::End {
            bytes: self.consumed,
            nodes,
        });
        debug!(bytes = self.consumed, nodes, "value graph decoded");
    }
}

fn utf8(data: Vec<u8>) -> Result<String, DecodeError> {
    String::from_utf8(data).map_err(|e| DecodeError::malformed(format!("invalid UTF-8: {e}"), None))
}

fn session_failed() -> StackError {
    StackError::new(DecodeError::malformed("session already failed", None))
}

/// Каждый `write` — это `feed`.
impl<H: ParseHandler> io::Write for Deserializer<H> {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.feed(buf).map_err(io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
