//! Distance metrics handed through to pairwise computation

/// Distance between two points of equal dimensionality.
pub trait Metric {
    /// Distance from `a` to `b`.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;
}

/// L2 distance.
#[derive(Debug, Default, Clone, Copy)]
pub struct EuclideanMetric;

impl Metric for EuclideanMetric {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}
