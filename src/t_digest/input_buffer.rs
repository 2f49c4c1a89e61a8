use crate::error::{Result, TDigestError};
use crate::t_digest::centroid::Centroid;
use crate::traits::OwnedSize;
use rayon::prelude::*;

/// Unsorted staging area for incoming samples.
///
/// Sorting a whole buffer at once is much cheaper than keeping the digest
/// sorted on every insert, and lets one merge amortise the scale function
/// evaluations over many samples.
#[derive(Clone, Debug)]
pub struct InputBuffer {
    entries: Vec<Centroid>,
    weight: f64,
    capacity: usize,
}

impl InputBuffer {
    /// Empty buffer flushing at `capacity` samples, allocating as samples arrive
    pub fn new(capacity: usize) -> Self {
        InputBuffer {
            entries: Vec::new(),
            weight: 0.0,
            capacity,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        InputBuffer {
            entries: Vec::with_capacity(capacity),
            weight: 0.0,
            capacity,
        }
    }

    /// Stage a sample.
    ///
    /// NaN values and weights that are not strictly positive are rejected.
    /// Infinite values are accepted.
    pub fn push(&mut self, value: f64, weight: f64) -> Result<()> {
        if value.is_nan() || !(weight > 0.0) || weight.is_infinite() {
            return Err(TDigestError::InvalidSample { value, weight });
        }
        self.entries.push(Centroid::new(value, weight));
        self.weight += weight;
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of the staged weights
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn iter(&self) -> impl Iterator<Item = &Centroid> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.weight = 0.0;
    }

    /// Sort the staged entries by value and drain them.
    ///
    /// The sort is stable so equal values keep their insertion order.
    pub fn drain_sorted(&mut self) -> std::vec::Drain<'_, Centroid> {
        self.entries
            .par_sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap_or(std::cmp::Ordering::Equal));
        self.weight = 0.0;
        self.entries.drain(..)
    }
}

impl OwnedSize for InputBuffer {
    fn owned_size(&self) -> usize {
        std::mem::size_of::<Self>() + std::mem::size_of::<Centroid>() * self.entries.capacity()
    }
}
