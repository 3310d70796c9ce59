//! Variable-length integer encoding (LEB128-style).
//!
//! Младшие группы по 7 бит идут первыми, старший бит байта означает
//! продолжение:
//! - 0-127: 1 байт
//! - 128-16383: 2 байта
//! - до u64::MAX: 10 байт максимум

use bytes::BufMut;
use zgraph_error::DecodeError;

/// Максимальное кол-во байт для u64 в varint encoding.
pub const MAX_VARINT_LEN: usize = 10;

/// Записывает u64 в varint формате, возвращает кол-во записанных байт.
///
/// # Examples
/// ```
/// use zgraph::codec::varint::write_varint;
///
/// let mut buf = Vec::new();
/// write_varint(&mut buf, 127);
/// assert_eq!(buf, vec![0x7F]);
///
/// let mut buf = Vec::new();
/// write_varint(&mut buf, 128);
/// assert_eq!(buf, vec![0x80, 0x01]);
/// ```
pub fn write_varint<B: BufMut>(
    buf: &mut B,
    mut value: u64,
) -> usize {
    let mut written = 0;
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        written += 1;
        if value == 0 {
            return written;
        }
    }
}

/// Пытается прочитать varint из начала `input`.
///
/// Возвращает `Ok(None)`, если байтов пока недостаточно (поток может
/// дозаполниться следующим чанком), и `Ok(Some((value, consumed)))` при
/// успехе.
///
/// # Errors
/// `Malformed`, если varint длиннее 10 байт или не помещается в u64.
///
/// ```
/// use zgraph::codec::varint::decode_varint;
///
/// assert_eq!(decode_varint(&[0x80, 0x01]).unwrap(), Some((128, 2)));
/// assert_eq!(decode_varint(&[0x80]).unwrap(), None);
/// ```
pub fn decode_varint(input: &[u8]) -> Result<Option<(u64, usize)>, DecodeError> {
    let mut result: u64 = 0;

    for (i, &byte) in input.iter().enumerate().take(MAX_VARINT_LEN) {
        let group = u64::from(byte & 0x7F);
        if i == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(DecodeError::malformed("varint overflows u64", None));
        }
        result |= group << (7 * i);

        if byte & 0x80 == 0 {
            return Ok(Some((result, i + 1)));
        }
    }

    if input.len() >= MAX_VARINT_LEN {
        return Err(DecodeError::malformed(
            format!("varint longer than {MAX_VARINT_LEN} bytes"),
            None,
        ));
    }
    Ok(None)
}

/// Вычисляет размер varint для числа (без записи).
pub fn varint_size(mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}
