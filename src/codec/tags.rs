//! Однобайтовые теги бинарного формата.
//!
//! Каждое значение на проводе начинается с тега. Набор тегов закрытый:
//! байт, которого нет в [`WireTag`], означает повреждённый поток.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::value::ElementKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum WireTag {
    Null = 0x00,
    Undefined = 0x01,
    True = 0x02,
    False = 0x03,
    /// f64, big-endian, битовый образ без нормализации
    Number = 0x04,
    /// знак (0/1), varint длина, модуль big-endian
    BigInt = 0x05,
    String = 0x06,
    /// f64 миллисекунды от эпохи
    Date = 0x07,
    /// две «сырые» строки: source и flags
    RegExp = 0x08,

    Buffer = 0x10,
    SharedBuffer = 0x11,
    /// varint offset, varint length, затем дочерний Buffer/BackReference
    DataView = 0x12,

    Int8Array = 0x20,
    Uint8Array = 0x21,
    Int16Array = 0x22,
    Uint16Array = 0x23,
    Int32Array = 0x24,
    Uint32Array = 0x25,
    Float32Array = 0x26,
    Float64Array = 0x27,
    BigInt64Array = 0x28,
    BigUint64Array = 0x29,

    ArrayDense = 0x30,
    /// varint длина, битовая маска ceil(len/8) байт (LSB first), дети по
    /// установленным битам
    ArraySparse = 0x31,
    Object = 0x32,
    Map = 0x33,
    Set = 0x34,

    WrapperBool = 0x40,
    WrapperNumber = 0x41,
    WrapperString = 0x42,
    WrapperBigInt = 0x43,

    /// varint id расширения, затем payload
    CustomObject = 0x50,

    BackReference = 0x7F,
}

impl WireTag {
    pub fn byte(self) -> u8 {
        self.into()
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::try_from(byte).ok()
    }

    /// Получает ли значение с этим тегом идентификатор на проводе.
    pub fn is_referenceable(self) -> bool {
        use WireTag::*;
        match self {
            Null | Undefined | True | False | Number | BigInt | String | Date | RegExp
            | BackReference => false,
            Buffer | SharedBuffer | DataView | Int8Array | Uint8Array | Int16Array
            | Uint16Array | Int32Array | Uint32Array | Float32Array | Float64Array
            | BigInt64Array | BigUint64Array | ArrayDense | ArraySparse | Object | Map | Set
            | WrapperBool | WrapperNumber | WrapperString | WrapperBigInt | CustomObject => true,
        }
    }

    pub fn element_kind(self) -> Option<ElementKind> {
        Some(match self {
            WireTag::Int8Array => ElementKind::Int8,
            WireTag::Uint8Array => ElementKind::Uint8,
            WireTag::Int16Array => ElementKind::Int16,
            WireTag::Uint16Array => ElementKind::Uint16,
            WireTag::Int32Array => ElementKind::Int32,
            WireTag::Uint32Array => ElementKind::Uint32,
            WireTag::Float32Array => ElementKind::Float32,
            WireTag::Float64Array => ElementKind::Float64,
            WireTag::BigInt64Array => ElementKind::BigInt64,
            WireTag::BigUint64Array => ElementKind::BigUint64,
            _ => return None,
        })
    }

    pub fn for_element_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Int8 => WireTag::Int8Array,
            ElementKind::Uint8 => WireTag::Uint8Array,
            ElementKind::Int16 => WireTag::Int16Array,
            ElementKind::Uint16 => WireTag::Uint16Array,
            ElementKind::Int32 => WireTag::Int32Array,
            ElementKind::Uint32 => WireTag::Uint32Array,
            ElementKind::Float32 => WireTag::Float32Array,
            ElementKind::Float64 => WireTag::Float64Array,
            ElementKind::BigInt64 => WireTag::BigInt64Array,
            ElementKind::BigUint64 => WireTag::BigUint64Array,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_bytes_rejected() {
        for byte in [0x09u8, 0x13, 0x2A, 0x35, 0x44, 0x51, 0x7E, 0x80, 0xFF] {
            assert_eq!(WireTag::from_byte(byte), None, "byte 0x{byte:02X}");
        }
    }

    #[test]
    fn test_byte_roundtrip_for_known_tags() {
        for byte in 0u8..=0xFF {
            if let Some(tag) = WireTag::from_byte(byte) {
                assert_eq!(tag.byte(), byte);
            }
        }
    }

    /// Тест проверяет, что каждому виду элементов соответствует ровно один тег.
    #[test]
    fn test_element_kind_tags() {
        for kind in ElementKind::ALL {
            let tag = WireTag::for_element_kind(kind);
            assert_eq!(tag.element_kind(), Some(kind));
            assert!(tag.is_referenceable());
        }
        assert_eq!(WireTag::Object.element_kind(), None);
    }

    #[test]
    fn test_referenceable_split() {
        assert!(!WireTag::Date.is_referenceable());
        assert!(!WireTag::RegExp.is_referenceable());
        assert!(!WireTag::BackReference.is_referenceable());
        assert!(WireTag::WrapperBool.is_referenceable());
        assert!(WireTag::CustomObject.is_referenceable());
    }
}
