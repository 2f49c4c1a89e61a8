//! Quantile and CDF estimation over a flushed centroid store.
//!
//! Both queries interpolate linearly between the same anchor points: the
//! centre of every centroid, `min` one unit of weight into the distribution
//! and `max` one unit before its end. A unit-weight centroid is a sample
//! seen exactly, so it covers a whole unit of rank instead of a point.
//!
//! Based on https://github.com/tdunning/t-digest/blob/cba43e734ffe226efc7829b622459a6efb64e1e1/core/src/main/java/com/tdunning/math/stats/MergingDigest.java
use crate::t_digest::centroid::Centroid;
use crate::t_digest::centroid_store::CentroidStore;

/// Interpolate a value at `rank` between `(left_rank, left)` and `(right_rank, right)`
fn interpolate_value(rank: f64, left_rank: f64, left: f64, right_rank: f64, right: f64) -> f64 {
    if left == right || right_rank <= left_rank {
        return left;
    }
    // Infinite extremes are only ever returned at their own rank
    if left.is_infinite() && right.is_finite() {
        return right;
    }
    if right.is_infinite() && left.is_finite() {
        return left;
    }
    // Each step is monotone in `rank`
    let t = (rank - left_rank) / (right_rank - left_rank);
    if t <= 0.0 {
        left
    } else if t >= 1.0 {
        right
    } else {
        (left + (right - left) * t).max(left).min(right)
    }
}

/// Proportion of the way `value` lies from `left` to `right`
fn proportion(value: f64, left: f64, right: f64) -> f64 {
    if left.is_infinite() {
        1.0
    } else if right.is_infinite() {
        0.0
    } else {
        ((value - left) / (right - left)).max(0.0).min(1.0)
    }
}

/// Estimate the value at `quantile` (already validated to lie in `[0, 1]`)
pub fn quantile(store: &CentroidStore, min: f64, max: f64, quantile: f64) -> f64 {
    let centroids = store.as_slice();
    let total_weight = store.total_weight();
    if quantile <= 0.0 {
        return min;
    }
    if quantile >= 1.0 {
        return max;
    }

    let target = quantile * total_weight;
    if target < 1.0 {
        return min;
    }
    if target > total_weight - 1.0 {
        return max;
    }

    let (index, offset) = match store.index_for_rank(target) {
        Some(located) => located,
        None => return min,
    };
    let current = &centroids[index];
    if current.is_singleton() {
        return current.mean;
    }

    let centre = store.weight_before(index) + current.weight / 2.0;
    if offset < current.weight / 2.0 {
        // Left half, interpolate from the previous anchor
        if index == 0 {
            interpolate_value(target, 1.0, min, centre, current.mean)
        } else {
            let prev = &centroids[index - 1];
            let prev_rank = if prev.is_singleton() {
                store.weight_before(index)
            } else {
                store.weight_before(index - 1) + prev.weight / 2.0
            };
            interpolate_value(target, prev_rank, prev.mean, centre, current.mean)
        }
    } else {
        // Right half, interpolate towards the next anchor
        if index + 1 == centroids.len() {
            interpolate_value(target, centre, current.mean, total_weight - 1.0, max)
        } else {
            let next = &centroids[index + 1];
            let next_rank = if next.is_singleton() {
                store.weight_before(index + 1)
            } else {
                store.weight_before(index + 1) + next.weight / 2.0
            };
            interpolate_value(target, centre, current.mean, next_rank, next.mean)
        }
    }
}

/// Estimate the fraction of the distribution at or below `value` (not NaN)
pub fn cdf(store: &CentroidStore, min: f64, max: f64, value: f64) -> f64 {
    let centroids = store.as_slice();
    let total_weight = store.total_weight();
    if value < min {
        return 0.0;
    }
    if value > max {
        return 1.0;
    }
    if centroids.len() == 1 {
        let only = &centroids[0];
        return if value == only.mean || max - min <= 0.0 {
            0.5
        } else if value < only.mean {
            0.5 * proportion(value, min, only.mean)
        } else {
            0.5 + 0.5 * proportion(value, only.mean, max)
        };
    }

    let first = &centroids[0];
    if value < first.mean {
        return head_rank(first, value, min) / total_weight;
    }

    let last = &centroids[centroids.len() - 1];
    if value > last.mean {
        return 1.0 - head_rank(last, value, max) / total_weight;
    }

    let mut weight_so_far = 0.0;
    for (i, current) in centroids.iter().enumerate() {
        if current.mean == value {
            // Half the weight of every centroid sitting exactly at the value
            let at_value: f64 = centroids[i..]
                .iter()
                .take_while(|c| c.mean == value)
                .map(|c| c.weight)
                .sum();
            return (weight_so_far + at_value / 2.0) / total_weight;
        }

        if let Some(next) = centroids.get(i + 1) {
            if value < next.mean {
                return (weight_so_far + between_rank(current, next, value)) / total_weight;
            }
        }
        weight_so_far += current.weight;
    }

    // Only reachable if the means are not sorted
    weight_so_far / total_weight
}

/// Rank between the extreme `bound` and the outermost centroid `edge`, measured from `bound`
fn head_rank(edge: &Centroid, value: f64, bound: f64) -> f64 {
    if value == bound {
        return f64::min(0.5, edge.weight / 2.0);
    }
    let low = f64::min(1.0, edge.weight / 2.0);
    let t = proportion(value, bound, edge.mean);
    low + t * (edge.weight / 2.0 - low)
}

/// Rank of `value` strictly between `left` and `right`, measured from the start of `left`
fn between_rank(left: &Centroid, right: &Centroid, value: f64) -> f64 {
    let mut left_excluded = 0.0;
    let mut right_excluded = 0.0;
    if left.is_singleton() {
        if right.is_singleton() {
            // Nothing to interpolate between two exact samples
            return 1.0;
        }
        left_excluded = 0.5;
    } else if right.is_singleton() {
        right_excluded = 0.5;
    }
    let dw = (left.weight + right.weight) / 2.0;
    let base = left.weight / 2.0 + left_excluded;
    base + (dw - left_excluded - right_excluded) * proportion(value, left.mean, right.mean)
}
