/// Binary codec: walk, encoder, incremental parser, builder, public API.
pub mod codec;
/// Settings loading (defaults, `zgraph.toml`, `ZGRAPH_*` environment).
pub mod config;
/// JSON bridge used by the CLI.
pub mod json;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Value graph model: arena, inline values, containers.
pub mod value;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Encode/decode entry points and streaming sessions.
pub use codec::{
    deserializable, deserialize, deserializing, read_from, read_from_async, serializable,
    serialize, write_to_async, Codec, DeserializeOptions, Deserializer, Extension,
    ExtensionRegistry, SerializeOptions, Serializer, WireTag,
};
/// config
pub use config::Settings;
/// Value model.
pub use value::{
    Array, BigInt, Buffer, CustomObject, DataView, Document, ElementKind, Endian, Graph, Node,
    NodeId, Object, OpaqueKind, Primitive, RegExp, TypedArray, Value,
};
/// Errors and result type.
pub use zgraph_error::{DecodeError, EncodeError, OptionsError, StackError, StatusCode, ZgraphResult};
