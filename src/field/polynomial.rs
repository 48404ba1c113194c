use rand_core::RngCore;

use super::{FieldElement, FieldError};

/// A univariate polynomial over `F_p`, stored low-degree-coefficient first.
///
/// The zero polynomial is represented as a single `[0]` coefficient; otherwise
/// the leading coefficient is always non-zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polynomial {
    coeffs: Vec<FieldElement>,
}

impl Polynomial {
    #[must_use]
    pub fn new(mut coeffs: Vec<FieldElement>) -> Self {
        if coeffs.is_empty() {
            coeffs.push(FieldElement::ZERO);
        }
        while coeffs.len() > 1 && coeffs.last() == Some(&FieldElement::ZERO) {
            coeffs.pop();
        }
        Self { coeffs }
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::new(vec![FieldElement::ZERO])
    }

    /// A random polynomial of the given degree with `coeffs[0] = constant`
    /// (or random too, if `constant` is `None`).
    #[must_use]
    pub fn random(degree: usize, constant: Option<FieldElement>, rng: &mut impl RngCore) -> Self {
        let mut coeffs = Vec::with_capacity(degree + 1);
        coeffs.push(constant.unwrap_or_else(|| FieldElement::random(rng)));
        for _ in 0..degree {
            coeffs.push(FieldElement::random(rng));
        }
        Self { coeffs }
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    #[must_use]
    pub fn coeffs(&self) -> &[FieldElement] {
        &self.coeffs
    }

    /// Horner's method, coefficients high-to-low.
    #[must_use]
    pub fn eval(&self, x: FieldElement) -> FieldElement {
        let mut result = FieldElement::ZERO;
        for &coeff in self.coeffs.iter().rev() {
            result = result.mul(x).add(coeff);
        }
        result
    }

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let max_len = self.coeffs.len().max(other.coeffs.len());
        let mut result = Vec::with_capacity(max_len);
        for i in 0..max_len {
            let a = self.coeffs.get(i).copied().unwrap_or(FieldElement::ZERO);
            let b = other.coeffs.get(i).copied().unwrap_or(FieldElement::ZERO);
            result.push(a.add(b));
        }
        Self::new(result)
    }

    #[must_use]
    pub fn scalar_mul(&self, k: FieldElement) -> Self {
        Self::new(self.coeffs.iter().map(|&c| c.mul(k)).collect())
    }

    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let mut result = vec![FieldElement::ZERO; self.coeffs.len() + other.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in other.coeffs.iter().enumerate() {
                result[i + j] = result[i + j].add(a.mul(b));
            }
        }
        Self::new(result)
    }

    /// Lagrange interpolation through `points`. `points` must carry pairwise
    /// distinct x-coordinates.
    pub fn interpolate(points: &[(FieldElement, FieldElement)]) -> Result<Self, FieldError> {
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                if points[i].0 == points[j].0 {
                    return Err(FieldError::DuplicatePoint);
                }
            }
        }

        let mut result = Polynomial::zero();
        for (i, &(xi, yi)) in points.iter().enumerate() {
            let mut basis = Polynomial::new(vec![FieldElement::ONE]);
            for (j, &(xj, _)) in points.iter().enumerate() {
                if i == j {
                    continue;
                }
                // basis *= (x - xj) / (xi - xj)
                let numerator = Polynomial::new(vec![xj.neg(), FieldElement::ONE]);
                let denom_inv = xi.sub(xj).inv()?;
                basis = basis.mul(&numerator).scalar_mul(denom_inv);
            }
            result = result.add(&basis.scalar_mul(yi));
        }
        Ok(result)
    }

    /// The i-th Lagrange coefficient for interpolating at `eval_point`, given
    /// the x-coordinates of all participating points.
    pub fn lagrange_coefficient(
        i: usize,
        xs: &[FieldElement],
        eval_point: FieldElement,
    ) -> Result<FieldElement, FieldError> {
        let xi = xs[i];
        let mut result = FieldElement::ONE;
        for (j, &xj) in xs.iter().enumerate() {
            if i == j {
                continue;
            }
            let numerator = eval_point.sub(xj);
            let denominator = xi.sub(xj);
            result = result.mul(numerator.div(denominator)?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::thread_rng;

    #[test]
    fn eval_horner() {
        // 1 + 2x + 3x^2
        let poly = Polynomial::new(vec![1u32.into(), 2u32.into(), 3u32.into()]);
        assert_eq!(poly.eval(FieldElement::ZERO), FieldElement::from(1u32));
        assert_eq!(poly.eval(FieldElement::ONE), FieldElement::from(6u32));
    }

    #[test]
    fn round_trip_interpolation() {
        let mut rng = thread_rng();
        for degree in 0..=10 {
            let poly = Polynomial::random(degree, None, &mut rng);
            let points: Vec<_> = (1..=degree as u32 + 1)
                .map(|x| {
                    let x = FieldElement::from(x);
                    (x, poly.eval(x))
                })
                .collect();
            let reconstructed = Polynomial::interpolate(&points).unwrap();
            for fresh in (degree as u32 + 2)..(degree as u32 + 7) {
                let x = FieldElement::from(fresh);
                assert_eq!(poly.eval(x), reconstructed.eval(x));
            }
        }
    }

    #[test]
    fn duplicate_point_rejected() {
        let a = (FieldElement::from(1u32), FieldElement::from(2u32));
        let b = (FieldElement::from(1u32), FieldElement::from(3u32));
        assert_eq!(
            Polynomial::interpolate(&[a, b]).unwrap_err(),
            FieldError::DuplicatePoint
        );
    }

    #[test]
    fn trailing_zero_coeffs_are_trimmed() {
        let poly = Polynomial::new(vec![1u32.into(), 0u32.into(), 0u32.into()]);
        assert_eq!(poly.degree(), 0);
    }

    proptest! {
        #[test]
        fn eval_matches_between_a_degree_3_polynomial_and_its_interpolation(
            coeffs in prop::collection::vec(0u32..u32::MAX, 4),
            probe in 10u32..1000,
        ) {
            let poly = Polynomial::new(coeffs.into_iter().map(FieldElement::from).collect());
            let points: Vec<_> = (1..=4u32)
                .map(|x| {
                    let x = FieldElement::from(x);
                    (x, poly.eval(x))
                })
                .collect();
            let reconstructed = Polynomial::interpolate(&points).unwrap();
            let probe = FieldElement::from(probe);
            prop_assert_eq!(poly.eval(probe), reconstructed.eval(probe));
        }
    }
}
