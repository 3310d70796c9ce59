//! Целые произвольной точности для `BigInt` значений и обёрток.

use std::{fmt, str::FromStr};

/// Целое произвольной точности: знак и модуль в big-endian.
///
/// Модуль не содержит ведущих нулевых байт, а ноль никогда не бывает
/// отрицательным, поэтому равные числа всегда представлены одинаково.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

/// Ошибка разбора десятичной строки.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid bigint literal: {0:?}")]
pub struct ParseBigIntError(String);

impl BigInt {
    /// Собирает число из знака и модуля, убирая ведущие нули и
    /// отрицательный ноль.
    pub fn from_parts(
        negative: bool,
        magnitude: impl Into<Vec<u8>>,
    ) -> Self {
        let mut magnitude = magnitude.into();
        let leading = magnitude.iter().take_while(|b| **b == 0).count();
        magnitude.drain(..leading);
        let negative = negative && !magnitude.is_empty();
        Self {
            negative,
            magnitude,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Модуль без ведущих нулей (пустой для нуля).
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// Кол-во значащих бит модуля.
    pub fn bits(&self) -> u64 {
        match self.magnitude.first() {
            None => 0,
            Some(top) => {
                (self.magnitude.len() as u64 - 1) * 8 + u64::from(8 - top.leading_zeros())
            }
        }
    }

    pub fn to_i128(&self) -> Option<i128> {
        if self.magnitude.len() > 16 {
            return None;
        }
        let mut raw: u128 = 0;
        for b in &self.magnitude {
            raw = (raw << 8) | u128::from(*b);
        }
        if self.negative {
            if raw <= i128::MAX as u128 {
                Some(-(raw as i128))
            } else if raw == i128::MIN.unsigned_abs() {
                Some(i128::MIN)
            } else {
                None
            }
        } else {
            i128::try_from(raw).ok()
        }
    }

    /// Делит модуль на месте на `divisor` и возвращает остаток.
    fn div_rem_small(
        magnitude: &mut Vec<u8>,
        divisor: u8,
    ) -> u8 {
        let mut rem: u16 = 0;
        for byte in magnitude.iter_mut() {
            let cur = (rem << 8) | u16::from(*byte);
            *byte = (cur / u16::from(divisor)) as u8;
            rem = cur % u16::from(divisor);
        }
        let leading = magnitude.iter().take_while(|b| **b == 0).count();
        magnitude.drain(..leading);
        rem as u8
    }

    /// Умножает модуль на месте на `factor` и прибавляет `addend`.
    fn mul_add_small(
        magnitude: &mut Vec<u8>,
        factor: u8,
        addend: u8,
    ) {
        let mut carry = u16::from(addend);
        for byte in magnitude.iter_mut().rev() {
            let cur = u16::from(*byte) * u16::from(factor) + carry;
            *byte = cur as u8;
            carry = cur >> 8;
        }
        while carry > 0 {
            magnitude.insert(0, carry as u8);
            carry >>= 8;
        }
    }
}

impl From<u128> for BigInt {
    fn from(v: u128) -> Self {
        Self::from_parts(false, v.to_be_bytes())
    }
}

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        Self::from_parts(v < 0, v.unsigned_abs().to_be_bytes())
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> Self {
        Self::from(u128::from(v))
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        Self::from(i128::from(v))
    }
}

impl fmt::Display for BigInt {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let mut digits = Vec::new();
        let mut rest = self.magnitude.clone();
        while !rest.is_empty() {
            digits.push(b'0' + Self::div_rem_small(&mut rest, 10));
        }
        if self.negative {
            f.write_str("-")?;
        }
        digits.reverse();
        // Только ASCII цифры.
        f.write_str(&String::from_utf8_lossy(&digits))
    }
}

impl FromStr for BigInt {
    type Err = ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseBigIntError(s.to_string()));
        }
        let mut magnitude = Vec::new();
        for b in digits.bytes() {
            Self::mul_add_small(&mut magnitude, 10, b - b'0');
        }
        Ok(Self::from_parts(negative, magnitude))
    }
}
