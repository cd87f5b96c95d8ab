//! Fixed-width bitvectors
//!
//! A [`Bitvector`] always knows its width. Bit 0 is the least significant
//! bit; printing and concatenation put the most significant bit first.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use std::fmt;

/// Ordered bit sequence with an explicit width
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitvector {
    width: usize,
    /// Invariant: `bits < 2^width`
    bits: BigUint,
}

fn mask(width: usize) -> BigUint {
    (BigUint::one() << width) - BigUint::one()
}

/// Minimal number of bits that represent `n`: unsigned length for
/// non-negative values, two's-complement length for negative ones.
pub fn bits_needed(n: &BigInt) -> usize {
    match n.sign() {
        Sign::Minus => {
            let magnitude_minus_one: BigInt = -n - BigInt::one();
            magnitude_minus_one.bits() as usize + 1
        }
        _ => n.bits() as usize,
    }
}

/// Width given to an integer widened into a bitvector.
///
/// `hint` is the caller's positional requirement (highest referenced bit + 1),
/// or 0 when there is none.
pub fn inferred_width(n: &BigInt, hint: usize) -> usize {
    bits_needed(n).max(hint).max(1)
}

impl Bitvector {
    /// All-zero bitvector
    pub fn zeros(width: usize) -> Self {
        Bitvector {
            width,
            bits: BigUint::zero(),
        }
    }

    /// Keep the low `width` bits of `value`
    pub fn from_biguint(width: usize, value: BigUint) -> Self {
        Bitvector {
            width,
            bits: value & mask(width),
        }
    }

    /// Two's-complement encoding of `n` on `width` bits (wrapping)
    pub fn from_int(width: usize, n: &BigInt) -> Self {
        if n.sign() != Sign::Minus && n.bits() <= width as u64 {
            return Bitvector {
                width,
                bits: n.magnitude().clone(),
            };
        }
        let modulus = BigInt::from(BigUint::one() << width);
        let mut r = n % &modulus;
        if r.sign() == Sign::Minus {
            r += &modulus;
        }
        let bits = r.to_biguint().unwrap_or_default();
        Bitvector { width, bits }
    }

    /// Parse `"1010"` (most significant bit first); spaces are ignored
    pub fn from_bit_string(s: &str) -> Option<Self> {
        let mut bits = BigUint::zero();
        let mut width = 0;
        for c in s.chars() {
            let bit = match c {
                '0' => 0u8,
                '1' => 1u8,
                ' ' => continue,
                _ => return None,
            };
            bits = (bits << 1usize) | BigUint::from(bit);
            width += 1;
        }
        Some(Bitvector { width, bits })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Bit at position `i`; positions past the width read as 0
    pub fn bit(&self, i: usize) -> bool {
        self.bits.bit(i as u64)
    }

    /// Unsigned magnitude
    pub fn to_unsigned(&self) -> BigInt {
        BigInt::from(self.bits.clone())
    }

    /// Two's-complement reading; width 0 reads as 0
    pub fn to_signed(&self) -> BigInt {
        let unsigned = self.to_unsigned();
        if self.width > 0 && self.bit(self.width - 1) {
            unsigned - BigInt::from(BigUint::one() << self.width)
        } else {
            unsigned
        }
    }

    /// `length` bits starting at `start`, or `None` if out of range
    pub fn extract(&self, start: usize, length: usize) -> Option<Bitvector> {
        if start.checked_add(length)? > self.width {
            return None;
        }
        Some(Bitvector {
            width: length,
            bits: (&self.bits >> start) & mask(length),
        })
    }

    /// `length` bits of the two's-complement encoding of `n` starting at
    /// `start`. Integers have no upper bound, so this never fails.
    pub fn extract_int(n: &BigInt, start: usize, length: usize) -> Bitvector {
        let shifted: BigInt = n >> start;
        Bitvector::from_int(length, &shifted)
    }

    /// Copy of `self` with `src` written at `start`, or `None` if out of range
    pub fn write(&self, start: usize, src: &Bitvector) -> Option<Bitvector> {
        if start.checked_add(src.width)? > self.width {
            return None;
        }
        let old = (&self.bits >> start) & mask(src.width);
        let kept = &self.bits - (old << start);
        Some(Bitvector {
            width: self.width,
            bits: kept | (&src.bits << start),
        })
    }

    /// Concatenate, first element most significant
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Bitvector>) -> Bitvector {
        let mut out = Bitvector::zeros(0);
        for part in parts {
            out.bits = (out.bits << part.width) | &part.bits;
            out.width += part.width;
        }
        out
    }

    pub fn and(&self, other: &Bitvector) -> Bitvector {
        Bitvector::from_biguint(self.width, &self.bits & &other.bits)
    }

    pub fn or(&self, other: &Bitvector) -> Bitvector {
        Bitvector::from_biguint(self.width, &self.bits | &other.bits)
    }

    pub fn xor(&self, other: &Bitvector) -> Bitvector {
        Bitvector::from_biguint(self.width, &self.bits ^ &other.bits)
    }

    pub fn not(&self) -> Bitvector {
        Bitvector::from_biguint(self.width, &self.bits ^ mask(self.width))
    }

    /// Modular addition of an integer
    pub fn add_int(&self, n: &BigInt) -> Bitvector {
        Bitvector::from_int(self.width, &(self.to_unsigned() + n))
    }
}

impl fmt::Display for Bitvector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'")?;
        for i in (0..self.width).rev() {
            write!(f, "{}", if self.bit(i) { '1' } else { '0' })?;
        }
        write!(f, "'")
    }
}
