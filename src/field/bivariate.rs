use std::collections::HashMap;

use rand_core::RngCore;

use super::{FieldElement, Polynomial};

/// A symmetric bivariate polynomial `F(x, y) = sum_{i,j<=degree} c_ij x^i y^j`
/// with `c_ij == c_ji`, used so that `F(0, 0)` is the shared secret and every
/// row `F(i, y)` / column `F(x, i)` polynomial is handed to party `i` during
/// complete secret sharing.
#[derive(Clone, Debug)]
pub struct BivariatePolynomial {
    degree: usize,
    coeffs: HashMap<(usize, usize), FieldElement>,
}

impl BivariatePolynomial {
    /// Builds a random symmetric bivariate polynomial of the given degree
    /// with `F(0, 0) = secret`.
    #[must_use]
    pub fn random(degree: usize, secret: FieldElement, rng: &mut impl RngCore) -> Self {
        let mut coeffs = HashMap::new();
        for i in 0..=degree {
            for j in i..=degree {
                let value = if i == 0 && j == 0 {
                    secret
                } else {
                    FieldElement::random(rng)
                };
                coeffs.insert((i, j), value);
                coeffs.insert((j, i), value);
            }
        }
        Self { degree, coeffs }
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[must_use]
    pub fn secret(&self) -> FieldElement {
        self.eval(FieldElement::ZERO, FieldElement::ZERO)
    }

    #[must_use]
    pub fn eval(&self, x: FieldElement, y: FieldElement) -> FieldElement {
        let mut result = FieldElement::ZERO;
        for i in 0..=self.degree {
            for j in 0..=self.degree {
                let c = self.coeffs[&(i, j)];
                let term = c.mul(x.pow(i as u64)).mul(y.pow(j as u64));
                result = result.add(term);
            }
        }
        result
    }

    /// The univariate polynomial `F(x_point, y)`, handed to the party whose
    /// id embeds to `x_point` as its "row" share.
    #[must_use]
    pub fn row_polynomial(&self, x_point: FieldElement) -> Polynomial {
        let coeffs = (0..=self.degree)
            .map(|j| {
                let mut acc = FieldElement::ZERO;
                for i in 0..=self.degree {
                    acc = acc.add(self.coeffs[&(i, j)].mul(x_point.pow(i as u64)));
                }
                acc
            })
            .collect();
        Polynomial::new(coeffs)
    }

    /// The univariate polynomial `F(x, y_point)`, handed to the party whose
    /// id embeds to `y_point` as its "column" share. Identical to
    /// `row_polynomial` under symmetry but kept distinct for readability at
    /// call sites that reason in terms of rows vs. columns.
    #[must_use]
    pub fn col_polynomial(&self, y_point: FieldElement) -> Polynomial {
        self.row_polynomial(y_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn secret_is_at_origin() {
        let mut rng = thread_rng();
        let secret = FieldElement::from(42u32);
        let poly = BivariatePolynomial::random(3, secret, &mut rng);
        assert_eq!(poly.secret(), secret);
    }

    #[test]
    fn symmetric_cross_evaluation() {
        let mut rng = thread_rng();
        let poly = BivariatePolynomial::random(4, FieldElement::from(7u32), &mut rng);
        for i in 1..=5u32 {
            for j in 1..=5u32 {
                let xi = FieldElement::from(i);
                let xj = FieldElement::from(j);
                // party i's row polynomial at j must match party j's row
                // polynomial at i, since F is symmetric.
                assert_eq!(
                    poly.row_polynomial(xi).eval(xj),
                    poly.row_polynomial(xj).eval(xi)
                );
            }
        }
    }

    #[test]
    fn row_polynomial_matches_direct_eval() {
        let mut rng = thread_rng();
        let poly = BivariatePolynomial::random(3, FieldElement::from(5u32), &mut rng);
        let xi = FieldElement::from(2u32);
        let row = poly.row_polynomial(xi);
        for y in 0..6u32 {
            let y = FieldElement::from(y);
            assert_eq!(row.eval(y), poly.eval(xi, y));
        }
    }
}
