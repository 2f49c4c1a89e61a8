use crate::util::weighted_average;
use std::ops::Add;

/// Weighted value used in `MergingDigest`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Centroid {
    /// Mean of the centroid
    pub mean: f64,
    /// Weight of the centroid
    pub weight: f64,
}

impl Centroid {
    pub fn new(mean: f64, weight: f64) -> Self {
        Centroid { mean, weight }
    }

    /// A centroid holding exactly one unit-weight sample
    pub fn is_singleton(&self) -> bool {
        self.weight == 1.0
    }
}

impl Add for Centroid {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Centroid {
            mean: weighted_average(self.mean, self.weight, other.mean, other.weight),
            weight: self.weight + other.weight,
        }
    }
}
