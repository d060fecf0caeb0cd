//! Integer literals
//!
//! Constant expressions are evaluated with unbounded precision and only then
//! checked against the 256-bit limit of the target machine, so intermediate
//! results like `3 << 126` keep every bit.

use std::fmt;

use num_bigint::{BigInt, Sign};
use serde::de::{self, Unexpected, Visitor};
use serde::{Deserializer, Serializer};

/// Widest integer a literal may denote
pub const MAX_LITERAL_BITS: u64 = 256;

/// Bits of the smallest two's complement (negative) or unsigned
/// (non-negative) representation of `v`
pub fn min_bits(v: &BigInt) -> u64 {
    match v.sign() {
        Sign::Minus => (-v - 1u32).bits() + 1,
        _ => v.bits().max(1),
    }
}

/// Bit width of the literal's type, in whole bytes, at least 8
pub fn bitwidth(v: &BigInt) -> u16 {
    let bits = min_bits(v).min(MAX_LITERAL_BITS);
    (bits.div_ceil(8) * 8).max(8) as u16
}

pub fn fits_machine_word(v: &BigInt) -> bool {
    min_bits(v) <= MAX_LITERAL_BITS
}

pub fn is_negative(v: &BigInt) -> bool {
    v.sign() == Sign::Minus
}

pub fn is_zero(v: &BigInt) -> bool {
    v.sign() == Sign::NoSign
}

/// Whether `uint<bits>` holds `v`
pub fn fits_unsigned(v: &BigInt, bits: u16) -> bool {
    !is_negative(v) && v.bits() <= u64::from(bits)
}

/// Whether `int<bits>` holds `v`
pub fn fits_signed(v: &BigInt, bits: u16) -> bool {
    let needed = if is_negative(v) { min_bits(v) } else { v.bits() + 1 };
    needed <= u64::from(bits)
}

/// Serializes literals as decimal strings; accepts JSON integers or strings
pub mod decimal {
    use super::*;

    pub fn serialize<S: Serializer>(v: &BigInt, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigInt, D::Error> {
        d.deserialize_any(DecimalVisitor)
    }

    struct DecimalVisitor;

    impl Visitor<'_> for DecimalVisitor {
        type Value = BigInt;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer or a decimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigInt, E> {
            Ok(BigInt::from(v))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigInt, E> {
            Ok(BigInt::from(v))
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<BigInt, E> {
            Ok(BigInt::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<BigInt, E> {
            Ok(BigInt::from(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigInt, E> {
            v.trim().parse().map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitwidth_rounds_to_bytes() {
        assert_eq!(bitwidth(&BigInt::from(0)), 8);
        assert_eq!(bitwidth(&BigInt::from(255)), 8);
        assert_eq!(bitwidth(&BigInt::from(256)), 16);
        assert_eq!(bitwidth(&BigInt::from(-128)), 8);
        assert_eq!(bitwidth(&BigInt::from(-129)), 16);
        assert_eq!(bitwidth(&(BigInt::from(1) << 200usize)), 208);
    }

    #[test]
    fn test_machine_word_limit() {
        let max = (BigInt::from(1) << 256usize) - 1u32;
        assert!(fits_machine_word(&max));
        assert!(!fits_machine_word(&(max + 1u32)));
        assert!(fits_machine_word(&-(BigInt::from(1) << 255usize)));
        assert!(!fits_machine_word(&(-(BigInt::from(1) << 255usize) - 1u32)));
    }

    #[test]
    fn test_fits_types() {
        assert!(fits_unsigned(&BigInt::from(255), 8));
        assert!(!fits_unsigned(&BigInt::from(256), 8));
        assert!(!fits_unsigned(&BigInt::from(-1), 256));
        assert!(fits_signed(&BigInt::from(-128), 8));
        assert!(!fits_signed(&BigInt::from(128), 8));
    }

    #[test]
    fn test_decimal_accepts_strings_and_numbers() {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct Lit(#[serde(with = "decimal")] BigInt);

        let big: Lit = serde_json::from_str("\"340282366920938463463374607431768211456\"").unwrap();
        assert_eq!(big.0, BigInt::from(1) << 128usize);
        let small: Lit = serde_json::from_str("-7").unwrap();
        assert_eq!(small.0, BigInt::from(-7));
        assert_eq!(serde_json::to_string(&small).unwrap(), "\"-7\"");
        assert!(serde_json::from_str::<Lit>("\"12ab\"").is_err());
    }
}
