/// Gauss-Legendre quadrature on the unit interval `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    pub points: Vec<f64>,
    /// Weights summing to 1, the interval length.
    pub weights: Vec<f64>,
}

impl GaussLegendre {
    /// 5-point rule, exact for polynomials up to degree 9.
    #[must_use]
    pub fn line_5point() -> Self {
        // abscissae and weights on [-1, 1]
        let nodes = [
            (0.0, 128.0 / 225.0),
            (-0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
            (0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
            (-0.906_179_845_938_664, 0.236_926_885_056_189_1),
            (0.906_179_845_938_664, 0.236_926_885_056_189_1),
        ];
        let mut rule: Vec<(f64, f64)> = nodes.iter().map(|(x, w)| (0.5 * (x + 1.0), 0.5 * w)).collect();
        rule.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            points: rule.iter().map(|(x, _)| *x).collect(),
            weights: rule.iter().map(|(_, w)| *w).collect(),
        }
    }

    /// Integral over `[0, 1]` of an integrand that may fail at a sample.
    pub fn try_integrate<E>(&self, mut f: impl FnMut(f64) -> Result<f64, E>) -> Result<f64, E> {
        let mut total = 0.0;
        for (x, w) in self.points.iter().zip(&self.weights) {
            total += w * f(*x)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrates_degree_nine_exactly() {
        let rule = GaussLegendre::line_5point();
        assert!((rule.weights.iter().sum::<f64>() - 1.0).abs() < 1e-14);
        let integral = rule.try_integrate(|x| Ok::<f64, ()>(x.powi(9))).unwrap();
        assert!((integral - 0.1).abs() < 1e-13);
    }
}
