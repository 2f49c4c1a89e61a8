//! The arcsine scale function and its inverse.
//!
//! `k1` maps a quantile onto a notional position so that a centroid is
//! acceptable while it spans at most one unit of `k1`. The derivative grows
//! without bound towards both tails and is `comp_factor / PI` at the median,
//! so centroids are small near the extremes and large in the middle.
use std::f64::consts::PI;

pub fn k1(quantile: f64, comp_factor: f64) -> f64 {
    let quantile = quantile.max(0.0).min(1.0);
    (comp_factor / (2.0 * PI)) * (2.0 * quantile - 1.0).asin()
}

/// Inverse of `k1`, saturating at quantiles 0 and 1 outside of `k1`'s range
pub fn inv_k1(scale: f64, comp_factor: f64) -> f64 {
    let limit = comp_factor / 4.0;
    if scale >= limit {
        1.0
    } else if scale <= -limit {
        0.0
    } else {
        (1.0 + (2.0 * PI * scale / comp_factor).sin()) / 2.0
    }
}

/// Size of a candidate centroid on the `k1` axis
///
/// # Arguments
/// * `weight_before` Weight of all centroids to the left of the candidate
/// * `weight` Weight of the candidate
/// * `total_weight` Weight of the whole digest
/// * `comp_factor` Compression factor
pub fn k_size(weight_before: f64, weight: f64, total_weight: f64, comp_factor: f64) -> f64 {
    let q_left = weight_before / total_weight;
    let q_right = (weight_before + weight) / total_weight;
    k1(q_right, comp_factor) - k1(q_left, comp_factor)
}

/// Largest weight a centroid starting at `weight_before` may hold so its `k_size` stays within one
pub fn weight_limit(weight_before: f64, total_weight: f64, comp_factor: f64) -> f64 {
    let k_left = k1(weight_before / total_weight, comp_factor);
    inv_k1(k_left + 1.0, comp_factor) * total_weight - weight_before
}

#[cfg(test)]
mod test {
    use crate::t_digest::scale_functions::{inv_k1, k1, k_size, weight_limit};
    use approx::assert_relative_eq;

    #[test]
    fn k1_is_symmetric_and_monotone() {
        let comp = 100.0;
        let mut prev = f64::NEG_INFINITY;
        for i in 0..=100 {
            let q = i as f64 / 100.0;
            let k = k1(q, comp);
            assert!(k >= prev);
            assert_relative_eq!(k + k1(1.0 - q, comp), 0.0, epsilon = 1e-9);
            prev = k;
        }
        assert_relative_eq!(k1(0.0, comp), -25.0);
        assert_relative_eq!(k1(1.0, comp), 25.0);
    }

    #[test]
    fn inv_k1_inverts_k1() {
        for i in 0..=20 {
            let q = i as f64 / 20.0;
            assert_relative_eq!(inv_k1(k1(q, 200.0), 200.0), q, epsilon = 1e-9);
        }
    }

    #[test]
    fn inv_k1_saturates() {
        assert_eq!(inv_k1(30.0, 100.0), 1.0);
        assert_eq!(inv_k1(-30.0, 100.0), 0.0);
        assert_eq!(k1(1.5, 100.0), k1(1.0, 100.0));
    }

    #[test]
    fn tails_are_tighter_than_the_middle() {
        let total = 1_000_000.0;
        let tail = weight_limit(0.0, total, 100.0);
        let middle = weight_limit(total / 2.0, total, 100.0);
        assert!(tail < middle);
        // Roughly PI / comp_factor of the mass fits around the median
        assert_relative_eq!(middle / total, 0.0314, epsilon = 0.001);
    }

    #[test]
    fn weight_limit_gives_unit_k_size() {
        let total = 10_000.0;
        for before in [10.0, 500.0, 5000.0, 9000.0].iter() {
            let limit = weight_limit(*before, total, 100.0);
            if *before + limit < total {
                assert_relative_eq!(k_size(*before, limit, total, 100.0), 1.0, epsilon = 1e-6);
            }
        }
    }
}
