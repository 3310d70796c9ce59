//! Типизированные числовые массивы и порядок байт их элементов.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Порядок байт элементов typed-массива в потоке.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[serde(alias = "le")]
    Little,
    #[serde(alias = "be")]
    Big,
}

impl Endian {
    /// Порядок байт платформы, под которую собран бинарник.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Флаг в потоке: 0 = little-endian, 1 = big-endian.
    pub const fn flag(self) -> u8 {
        match self {
            Endian::Little => 0,
            Endian::Big => 1,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Endian::Little),
            1 => Some(Endian::Big),
            _ => None,
        }
    }
}

impl Default for Endian {
    fn default() -> Self {
        Self::native()
    }
}

impl std::str::FromStr for Endian {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(Endian::Little),
            "big" | "be" => Ok(Endian::Big),
            "native" => Ok(Endian::native()),
            other => Err(format!("unknown byte order '{other}'")),
        }
    }
}

/// Тип элемента typed-массива.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

impl ElementKind {
    pub const ALL: [ElementKind; 10] = [
        ElementKind::Int8,
        ElementKind::Uint8,
        ElementKind::Int16,
        ElementKind::Uint16,
        ElementKind::Int32,
        ElementKind::Uint32,
        ElementKind::Float32,
        ElementKind::Float64,
        ElementKind::BigInt64,
        ElementKind::BigUint64,
    ];

    /// Ширина элемента в байтах.
    pub const fn width(self) -> usize {
        match self {
            ElementKind::Int8 | ElementKind::Uint8 => 1,
            ElementKind::Int16 | ElementKind::Uint16 => 2,
            ElementKind::Int32 | ElementKind::Uint32 | ElementKind::Float32 => 4,
            ElementKind::Float64 | ElementKind::BigInt64 | ElementKind::BigUint64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::Int8 => "Int8Array",
            ElementKind::Uint8 => "Uint8Array",
            ElementKind::Int16 => "Int16Array",
            ElementKind::Uint16 => "Uint16Array",
            ElementKind::Int32 => "Int32Array",
            ElementKind::Uint32 => "Uint32Array",
            ElementKind::Float32 => "Float32Array",
            ElementKind::Float64 => "Float64Array",
            ElementKind::BigInt64 => "BigInt64Array",
            ElementKind::BigUint64 => "BigUint64Array",
        }
    }
}

/// Типизированный числовой массив. Float-элементы хранят точные биты.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    BigInt64(Vec<i64>),
    BigUint64(Vec<u64>),
}

impl TypedArray {
    pub fn kind(&self) -> ElementKind {
        match self {
            TypedArray::Int8(_) => ElementKind::Int8,
            TypedArray::Uint8(_) => ElementKind::Uint8,
            TypedArray::Int16(_) => ElementKind::Int16,
            TypedArray::Uint16(_) => ElementKind::Uint16,
            TypedArray::Int32(_) => ElementKind::Int32,
            TypedArray::Uint32(_) => ElementKind::Uint32,
            TypedArray::Float32(_) => ElementKind::Float32,
            TypedArray::Float64(_) => ElementKind::Float64,
            TypedArray::BigInt64(_) => ElementKind::BigInt64,
            TypedArray::BigUint64(_) => ElementKind::BigUint64,
        }
    }

    /// Кол-во элементов.
    pub fn len(&self) -> usize {
        match self {
            TypedArray::Int8(v) => v.len(),
            TypedArray::Uint8(v) => v.len(),
            TypedArray::Int16(v) => v.len(),
            TypedArray::Uint16(v) => v.len(),
            TypedArray::Int32(v) => v.len(),
            TypedArray::Uint32(v) => v.len(),
            TypedArray::Float32(v) => v.len(),
            TypedArray::Float64(v) => v.len(),
            TypedArray::BigInt64(v) => v.len(),
            TypedArray::BigUint64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.kind().width()
    }

    /// Сериализует элементы в заданном порядке байт.
    pub fn to_bytes(
        &self,
        order: Endian,
    ) -> Vec<u8> {
        let mut out = vec![0u8; self.byte_len()];
        match order {
            Endian::Little => self.write_lanes::<LittleEndian>(&mut out),
            Endian::Big => self.write_lanes::<BigEndian>(&mut out),
        }
        out
    }

    fn write_lanes<B: ByteOrder>(
        &self,
        out: &mut [u8],
    ) {
        match self {
            TypedArray::Int8(v) => {
                for (dst, src) in out.iter_mut().zip(v) {
                    *dst = *src as u8;
                }
            }
            TypedArray::Uint8(v) => out.copy_from_slice(v),
            TypedArray::Int16(v) => B::write_i16_into(v, out),
            TypedArray::Uint16(v) => B::write_u16_into(v, out),
            TypedArray::Int32(v) => B::write_i32_into(v, out),
            TypedArray::Uint32(v) => B::write_u32_into(v, out),
            TypedArray::Float32(v) => B::write_f32_into(v, out),
            TypedArray::Float64(v) => B::write_f64_into(v, out),
            TypedArray::BigInt64(v) => B::write_i64_into(v, out),
            TypedArray::BigUint64(v) => B::write_u64_into(v, out),
        }
    }

    /// Восстанавливает элементы из сырых байт. Возвращает `None`, если
    /// длина `bytes` не кратна ширине элемента.
    pub fn from_bytes(
        kind: ElementKind,
        order: Endian,
        bytes: &[u8],
    ) -> Option<Self> {
        if bytes.len() % kind.width() != 0 {
            return None;
        }
        Some(match order {
            Endian::Little => Self::read_lanes::<LittleEndian>(kind, bytes),
            Endian::Big => Self::read_lanes::<BigEndian>(kind, bytes),
        })
    }

    fn read_lanes<B: ByteOrder>(
        kind: ElementKind,
        bytes: &[u8],
    ) -> Self {
        let n = bytes.len() / kind.width();
        match kind {
            ElementKind::Int8 => TypedArray::Int8(bytes.iter().map(|b| *b as i8).collect()),
            ElementKind::Uint8 => TypedArray::Uint8(bytes.to_vec()),
            ElementKind::Int16 => {
                let mut v = vec![0; n];
                B::read_i16_into(bytes, &mut v);
                TypedArray::Int16(v)
            }
            ElementKind::Uint16 => {
                let mut v = vec![0; n];
                B::read_u16_into(bytes, &mut v);
                TypedArray::Uint16(v)
            }
            ElementKind::Int32 => {
                let mut v = vec![0; n];
                B::read_i32_into(bytes, &mut v);
                TypedArray::Int32(v)
            }
            ElementKind::Uint32 => {
                let mut v = vec![0; n];
                B::read_u32_into(bytes, &mut v);
                TypedArray::Uint32(v)
            }
            ElementKind::Float32 => {
                let mut v = vec![0.0; n];
                B::read_f32_into(bytes, &mut v);
                TypedArray::Float32(v)
            }
            ElementKind::Float64 => {
                let mut v = vec![0.0; n];
                B::read_f64_into(bytes, &mut v);
                TypedArray::Float64(v)
            }
            ElementKind::BigInt64 => {
                let mut v = vec![0; n];
                B::read_i64_into(bytes, &mut v);
                TypedArray::BigInt64(v)
            }
            ElementKind::BigUint64 => {
                let mut v = vec![0; n];
                B::read_u64_into(bytes, &mut v);
                TypedArray::BigUint64(v)
            }
        }
    }

    /// Побитовое равенство: float-элементы сравниваются по битам.
    pub fn bits_eq(
        &self,
        other: &TypedArray,
    ) -> bool {
        match (self, other) {
            (TypedArray::Float32(a), TypedArray::Float32(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (TypedArray::Float64(a), TypedArray::Float64(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => self == other,
        }
    }
}
