//! Бинарный кодек графов значений.
//!
//! Запись: [`walk`] (назначение id и проверка типов) → [`encode`] (байты).
//! Чтение: [`parser`] (возобновляемая машина состояний) → [`builder`]
//! (выделение контейнеров и разрешение обратных ссылок).

pub mod api;
pub mod builder;
pub mod dispatch;
pub mod encode;
pub mod events;
pub mod extension;
pub mod file;
pub mod io;
pub mod options;
pub mod parser;
pub mod tags;
pub mod varint;
pub mod walk;

pub use api::{
    deserializable, deserialize, deserializing, read_from, serializable, serialize, Codec,
};
pub use encode::{Serializer, DEFAULT_CHUNK_SIZE};
pub use events::{CollectHandler, CountHandler, NoopHandler, ParseEvent, ParseHandler};
pub use extension::{Extension, ExtensionRegistry};
pub use file::{FormatVersion, FORMAT_VERSION};
pub use io::{read_from_async, write_to_async};
pub use options::{DeserializeOptions, SerializeOptions, DEFAULT_MAX_LENGTH};
pub use parser::Deserializer;
pub use tags::WireTag;
