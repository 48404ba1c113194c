//! Finite-field arithmetic substrate.
//!
//! Every value in the MPC stack — bid bits, polynomial coefficients, shares,
//! beacon output — lives in `F_p` with `p = 2^31 - 1`, a Mersenne prime chosen
//! so that two field elements always multiply without overflowing a `u64`.

pub mod bivariate;
pub mod polynomial;

use std::fmt;

use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bivariate::BivariatePolynomial;
pub use polynomial::Polynomial;

/// `p = 2^31 - 1`.
pub const MODULUS: u64 = (1 << 31) - 1;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    #[error("cannot invert zero")]
    DivideByZero,
    #[error("duplicate x-coordinate supplied to interpolation")]
    DuplicatePoint,
}

/// An element of `F_p`, always normalised into `[0, p)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldElement(u32);

impl FieldElement {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    /// Embeds an integer into the field, reducing modulo `p`.
    #[must_use]
    pub fn embed(x: i64) -> Self {
        let m = i64::try_from(MODULUS).unwrap();
        Self(x.rem_euclid(m) as u32)
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn add(self, other: Self) -> Self {
        Self(((u64::from(self.0) + u64::from(other.0)) % MODULUS) as u32)
    }

    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        Self(((u64::from(self.0) + MODULUS - u64::from(other.0)) % MODULUS) as u32)
    }

    #[must_use]
    pub fn mul(self, other: Self) -> Self {
        Self(((u64::from(self.0) * u64::from(other.0)) % MODULUS) as u32)
    }

    #[must_use]
    pub fn neg(self) -> Self {
        Self::ZERO.sub(self)
    }

    /// `a^exp mod p` by repeated squaring.
    #[must_use]
    pub fn pow(self, mut exp: u64) -> Self {
        let mut base = self;
        let mut result = Self::ONE;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result.mul(base);
            }
            base = base.mul(base);
            exp >>= 1;
        }
        result
    }

    /// Multiplicative inverse via Fermat's little theorem: `a^(p-2) = a^-1 (mod p)`.
    pub fn inv(self) -> Result<Self, FieldError> {
        if self == Self::ZERO {
            return Err(FieldError::DivideByZero);
        }
        Ok(self.pow(MODULUS - 2))
    }

    pub fn div(self, other: Self) -> Result<Self, FieldError> {
        Ok(self.mul(other.inv()?))
    }

    #[must_use]
    pub fn random(rng: &mut impl RngCore) -> Self {
        // Rejection sampling keeps the distribution uniform over [0, p).
        loop {
            let candidate = rng.next_u32() & 0x7fff_ffff;
            if u64::from(candidate) < MODULUS {
                return Self(candidate);
            }
        }
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.0)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FieldElement {
    fn from(x: u32) -> Self {
        Self::embed(i64::from(x))
    }
}

impl From<bool> for FieldElement {
    fn from(b: bool) -> Self {
        if b {
            Self::ONE
        } else {
            Self::ZERO
        }
    }
}

impl std::ops::Add for FieldElement {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        FieldElement::add(self, rhs)
    }
}

impl std::ops::Sub for FieldElement {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        FieldElement::sub(self, rhs)
    }
}

impl std::ops::Mul for FieldElement {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        FieldElement::mul(self, rhs)
    }
}

impl std::ops::Neg for FieldElement {
    type Output = Self;
    fn neg(self) -> Self {
        FieldElement::neg(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::thread_rng;

    #[test]
    fn add_stays_in_field() {
        let a = FieldElement::embed(MODULUS as i64 - 1);
        let b = FieldElement::from(2u32);
        let c = a.add(b);
        assert!(c.value() < MODULUS as u32);
        assert_eq!(c, FieldElement::from(1u32));
    }

    #[test]
    fn mul_matches_naive_arithmetic() {
        assert_eq!(FieldElement::from(7u32).mul(11u32.into()), FieldElement::from(77u32));
    }

    #[test]
    fn inv_is_multiplicative_inverse() {
        for a in [1u32, 2, 7, 1234567] {
            let fa = FieldElement::from(a);
            let inv = fa.inv().unwrap();
            assert_eq!(fa.mul(inv), FieldElement::ONE);
        }
    }

    #[test]
    fn inv_zero_fails() {
        assert_eq!(FieldElement::ZERO.inv().unwrap_err(), FieldError::DivideByZero);
    }

    #[test]
    fn random_is_in_range() {
        let mut rng = thread_rng();
        for _ in 0..1000 {
            let r = FieldElement::random(&mut rng);
            assert!(u64::from(r.value()) < MODULUS);
        }
    }

    proptest! {
        #[test]
        fn add_is_commutative(a in 0u32..u32::MAX, b in 0u32..u32::MAX) {
            let (a, b) = (FieldElement::from(a), FieldElement::from(b));
            prop_assert_eq!(a.add(b), b.add(a));
        }

        #[test]
        fn mul_distributes_over_add(a in 0u32..u32::MAX, b in 0u32..u32::MAX, c in 0u32..u32::MAX) {
            let (a, b, c) = (FieldElement::from(a), FieldElement::from(b), FieldElement::from(c));
            prop_assert_eq!(a.mul(b.add(c)), a.mul(b).add(a.mul(c)));
        }

        #[test]
        fn nonzero_inverse_round_trips(a in 1u32..u32::MAX) {
            let a = FieldElement::from(a);
            prop_assume!(!a.is_zero());
            prop_assert_eq!(a.mul(a.inv().unwrap()), FieldElement::ONE);
        }
    }
}
