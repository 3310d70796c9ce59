//! Расширения для пользовательских объектов (`Node::Custom`).
//!
//! Расширение владеет числовым id. При записи кодек проверяет, что id
//! зарегистрирован, пропускает payload через [`Extension::encode`] и пишет
//! результат как обычное значение. При чтении payload собирается как
//! обычное значение и передаётся в [`Extension::decode`]. Пара
//! `encode`/`decode` должна быть взаимно обратной. Реестр принадлежит
//! одному [`Codec`](super::Codec) и никогда не бывает глобальным.

use std::{fmt, sync::Arc};

use rustc_hash::FxHashMap;

use crate::value::{Graph, Value};

pub trait Extension: Send + Sync {
    fn id(&self) -> u32;

    fn name(&self) -> &str;

    /// Проверка payload перед записью. Ошибка превращается в
    /// `UnsupportedType`.
    fn validate(
        &self,
        _payload: &Value,
        _graph: &Graph,
    ) -> Result<(), String> {
        Ok(())
    }

    /// Превращает payload пользовательского объекта в значение, которое
    /// пишется в поток. Ссылки в результате должны указывать на узлы
    /// `graph`. По умолчанию payload пишется как есть.
    fn encode(
        &self,
        payload: &Value,
        _graph: &Graph,
    ) -> Result<Value, String> {
        Ok(payload.clone())
    }

    /// Превращает прочитанный payload в итоговое значение payload
    /// пользовательского объекта. По умолчанию payload не меняется.
    fn decode(
        &self,
        payload: Value,
        _graph: &mut Graph,
    ) -> Result<Value, String> {
        Ok(payload)
    }
}

#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: FxHashMap<u32, Arc<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует расширение. Возвращает предыдущее с тем же id.
    pub fn register(
        &mut self,
        extension: Arc<dyn Extension>,
    ) -> Option<Arc<dyn Extension>> {
        self.extensions.insert(extension.id(), extension)
    }

    pub fn get(
        &self,
        id: u32,
    ) -> Option<&Arc<dyn Extension>> {
        self.extensions.get(&id)
    }

    pub fn contains(
        &self,
        id: u32,
    ) -> bool {
        self.extensions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut ids: Vec<_> = self
            .extensions
            .values()
            .map(|e| (e.id(), e.name().to_string()))
            .collect();
        ids.sort();
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &ids)
            .finish()
    }
}
