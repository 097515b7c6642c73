//! Fixed-point helpers for deterministic combat math.
//!
//! Scaling multipliers, blend weights and percentages are fractional, but
//! every number that reaches a unit (damage, healing, MP) is an integer.
//! Fractions are carried as [`Fixed`] and converted back by rounding down, so
//! identical inputs give identical outputs on every platform.

use fixed::types::I32F32;

/// Fixed-point number type for all fractional combat math.
///
/// 32 integer bits and 32 fractional bits.
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes as the raw bit representation (i64) so values survive
/// RON/bincode round trips bit-for-bit.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as decimal literals.
///
/// Used for hand-written data files (`scaling: 1.5`), where raw bits would be
/// unreadable. Parsing goes through `f64` once at load time; all arithmetic
/// afterwards stays fixed-point.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a decimal number.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize from a decimal number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("{raw} is out of fixed-point range")))
    }
}

/// Build a fixed-point value from a percentage (`25` -> `0.25`).
#[must_use]
pub fn from_percent(percent: u32) -> Fixed {
    Fixed::from_num(percent) / Fixed::from_num(100)
}

/// Multiply an integer by a fixed-point factor, rounding down.
#[must_use]
pub fn scale(value: i64, factor: Fixed) -> i64 {
    let clamped = value.clamp(i64::from(i32::MIN), i64::from(i32::MAX));
    Fixed::from_num(clamped)
        .saturating_mul(factor)
        .to_num::<i64>()
}

/// Integer percentage of a value, rounding down.
#[must_use]
pub const fn percent_of(value: u32, percent: u32) -> u32 {
    ((value as u64 * percent as u64) / 100) as u32
}

/// Square root rounded to the nearest integer.
///
/// Pure integer arithmetic so heuristic values never depend on float
/// behaviour.
#[must_use]
pub fn isqrt_round(n: u64) -> u64 {
    if n < 2 {
        return n;
    }

    // Newton iteration for floor(sqrt(n)).
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }

    // Round half up: sqrt(n) >= x + 0.5  <=>  n > x^2 + x.
    if n > x * x + x {
        x + 1
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isqrt_round() {
        assert_eq!(isqrt_round(0), 0);
        assert_eq!(isqrt_round(1), 1);
        assert_eq!(isqrt_round(2), 1);
        assert_eq!(isqrt_round(3), 2);
        assert_eq!(isqrt_round(18), 4);
        assert_eq!(isqrt_round(20), 4);
        assert_eq!(isqrt_round(21), 5);
        assert_eq!(isqrt_round(100), 10);
    }

    #[test]
    fn test_scale_rounds_down() {
        assert_eq!(scale(10, Fixed::from_num(1.5)), 15);
        assert_eq!(scale(7, from_percent(50)), 3);
        assert_eq!(scale(0, Fixed::from_num(3)), 0);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(200, 10), 20);
        assert_eq!(percent_of(9, 10), 0);
        assert_eq!(percent_of(u32::MAX, 100), u32::MAX);
    }

    #[test]
    fn test_fixed_serde_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "fixed_serde")]
            value: Fixed,
        }

        let original = Wrapper {
            value: Fixed::from_num(1.25),
        };
        let bytes = bincode::serialize(&original).unwrap();
        let decoded: Wrapper = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.value, original.value);
    }
}
