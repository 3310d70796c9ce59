//! События разбора для наблюдателей (`inspect`, отладка, метрики).
//!
//! Парсер сообщает о каждом прочитанном заголовке через [`ParseHandler`].
//! По умолчанию используется [`NoopHandler`], который ничего не делает.

use std::borrow::Cow;

use super::{file::FormatVersion, tags::WireTag};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent<'a> {
    /// Прочитан байт версии.
    Version { version: FormatVersion },
    /// Прочитан заголовок значения. Для ссылочных тегов `id` — выданный
    /// id, для `BackReference` — id цели.
    Item {
        offset: u64,
        tag: WireTag,
        id: Option<u64>,
        depth: usize,
    },
    /// Прочитана сырая строка (ключ объекта или часть RegExp).
    RawString {
        offset: u64,
        value: Cow<'a, str>,
        depth: usize,
    },
    /// Корневое значение собрано.
    End { bytes: u64, nodes: u64 },
}

impl ParseEvent<'_> {
    pub fn into_owned(self) -> ParseEvent<'static> {
        match self {
            ParseEvent::Version { version } => ParseEvent::Version { version },
            ParseEvent::Item {
                offset,
                tag,
                id,
                depth,
            } => ParseEvent::Item {
                offset,
                tag,
                id,
                depth,
            },
            ParseEvent::RawString {
                offset,
                value,
                depth,
            } => ParseEvent::RawString {
                offset,
                value: Cow::Owned(value.into_owned()),
                depth,
            },
            ParseEvent::End { bytes, nodes } => ParseEvent::End { bytes, nodes },
        }
    }
}

/// Трейт для обработки событий разбора.
pub trait ParseHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent<'_>,
    );
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ParseHandler for NoopHandler {
    #[inline]
    fn handle_event(
        &mut self,
        _event: ParseEvent<'_>,
    ) {
    }
}

/// Сохраняет все события.
#[derive(Debug, Default, Clone)]
pub struct CollectHandler {
    events: Vec<ParseEvent<'static>>,
}

impl CollectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ParseEvent<'static>] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ParseEvent<'static>> {
        self.events
    }
}

impl ParseHandler for CollectHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent<'_>,
    ) {
        self.events.push(event.into_owned());
    }
}

/// Считает заголовки по тегам.
#[derive(Debug, Default, Clone)]
pub struct CountHandler {
    pub items: u64,
    pub back_references: u64,
    pub raw_strings: u64,
}

impl ParseHandler for CountHandler {
    fn handle_event(
        &mut self,
        event: ParseEvent<'_>,
    ) {
        match event {
            ParseEvent::Item {
                tag: WireTag::BackReference,
                ..
            } => {
                self.items += 1;
                self.back_references += 1;
            }
            ParseEvent::Item { .. } => self.items += 1,
            ParseEvent::RawString { .. } => self.raw_strings += 1,
            ParseEvent::Version { .. } | ParseEvent::End { .. } => {}
        }
    }
}
