use crate::error::{Result, TDigestError};
use crate::t_digest::builder::MergingDigestBuilder;
use crate::t_digest::centroid::Centroid;
use crate::t_digest::centroid_store::CentroidStore;
use crate::t_digest::input_buffer::InputBuffer;
use crate::t_digest::merge::{compress, merge_sorted};
use crate::t_digest::query;
use crate::traits::{Digest, OwnedSize};
use tracing::{debug, trace};

/// Streaming quantile sketch built from a bounded set of centroids.
///
/// Samples are staged in an unsorted buffer and merged into the centroids
/// in bulk whenever the buffer fills or a query needs an up to date view.
/// Queries therefore take `&mut self`.
///
/// ```
/// use tdigest_bench::MergingDigest;
///
/// let mut digest = MergingDigest::new(100.0).unwrap();
/// for i in 1..=1000 {
///     digest.add(i as f64).unwrap();
/// }
/// assert_eq!(digest.quantile(0.0).unwrap(), 1.0);
/// assert_eq!(digest.quantile(1.0).unwrap(), 1000.0);
/// assert_eq!(digest.size(), 1000);
/// ```
#[derive(Clone, Debug)]
pub struct MergingDigest {
    /// Merged centroids
    pub(crate) store: CentroidStore,
    /// Samples waiting to be merged
    pub(crate) buffer: InputBuffer,
    /// Output of the ordered merge, input of the compression walk
    merged: Vec<Centroid>,
    /// Output of the compression walk, swapped into the store
    compressed: Vec<Centroid>,
    /// Compression factor of the scale function
    pub(crate) compression: f64,
    /// Smallest value observed
    pub(crate) min: f64,
    /// Largest value observed
    pub(crate) max: f64,
}

impl MergingDigest {
    /// Create a digest with the default capacities, `2 * compression`
    /// centroids and a buffer of `5 * compression` samples
    pub fn new(compression: f64) -> Result<Self> {
        MergingDigestBuilder::new(compression).build()
    }

    /// Create a digest with explicit capacities
    ///
    /// # Arguments
    /// * `compression` Compression factor, must be greater than 1
    /// * `centroid_capacity` Maximum number of centroids, at least `2 * compression`
    /// * `buffer_capacity` Samples staged between merges, at least `centroid_capacity`
    pub fn with_capacity(
        compression: f64,
        centroid_capacity: usize,
        buffer_capacity: usize,
    ) -> Result<Self> {
        MergingDigestBuilder::new(compression)
            .centroid_capacity(centroid_capacity)
            .buffer_capacity(buffer_capacity)
            .build()
    }

    /// Allocate a digest from already validated parameters
    pub(crate) fn from_config(
        compression: f64,
        centroid_capacity: usize,
        buffer_capacity: usize,
    ) -> Self {
        MergingDigest {
            store: CentroidStore::with_capacity(centroid_capacity),
            buffer: InputBuffer::with_capacity(buffer_capacity),
            merged: Vec::with_capacity(centroid_capacity + buffer_capacity),
            compressed: Vec::with_capacity(centroid_capacity),
            compression,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Like `from_config`, but every vector starts empty and grows as samples
    /// and merges need it. Used when the capacities were not chosen locally.
    pub(crate) fn unallocated(
        compression: f64,
        centroid_capacity: usize,
        buffer_capacity: usize,
    ) -> Self {
        MergingDigest {
            store: CentroidStore::new(centroid_capacity),
            buffer: InputBuffer::new(buffer_capacity),
            merged: Vec::new(),
            compressed: Vec::new(),
            compression,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add a single sample of unit weight
    pub fn add(&mut self, value: f64) -> Result<()> {
        self.add_weighted(value, 1.0)
    }

    /// Add a sample with a positive weight
    pub fn add_weighted(&mut self, value: f64, weight: f64) -> Result<()> {
        if !(self.total_weight() + weight).is_finite() {
            return Err(TDigestError::InvalidSample { value, weight });
        }
        self.buffer.push(value, weight)?;
        self.min = f64::min(self.min, value);
        self.max = f64::max(self.max, value);
        if self.buffer.is_full() {
            self.flush();
        }
        Ok(())
    }

    /// Add every value of a slice with unit weight, stopping at the first invalid one
    pub fn add_buffer(&mut self, values: &[f64]) -> Result<()> {
        values.iter().try_for_each(|value| self.add(*value))
    }

    /// Merge the staged samples into the centroids
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let incoming = self.buffer.len();
        let before = self.store.len();
        let total_weight = self.store.total_weight() + self.buffer.weight();
        merge_sorted(
            self.buffer.drain_sorted(),
            self.store.as_slice(),
            &mut self.merged,
        );

        let capacity = self.store.capacity();
        let mut compression = self.compression;
        while !compress(
            &self.merged,
            total_weight,
            compression,
            &mut self.compressed,
            capacity,
        ) {
            compression /= 2.0;
            debug!(
                compression = self.compression,
                tightened = compression,
                capacity,
                "centroids exceed capacity, tightening compression for this merge"
            );
        }
        self.store.replace(&mut self.compressed, total_weight);
        trace!(
            incoming,
            before,
            after = self.store.len(),
            total_weight,
            "flushed input buffer"
        );
    }

    /// Estimate the value at `quantile`
    ///
    /// # Arguments
    /// * `quantile` Quantile to estimate, `0 <= quantile <= 1`
    pub fn quantile(&mut self, quantile: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(TDigestError::invalid_query(format!(
                "quantile must be within [0, 1], got {}",
                quantile
            )));
        }
        self.flush();
        if self.store.is_empty() {
            return Err(TDigestError::EmptySketch);
        }
        Ok(query::quantile(&self.store, self.min, self.max, quantile))
    }

    /// Estimate the fraction of the samples at or below `value`
    pub fn cdf(&mut self, value: f64) -> Result<f64> {
        if value.is_nan() {
            return Err(TDigestError::invalid_query("cdf of NaN"));
        }
        self.flush();
        if self.store.is_empty() {
            return Err(TDigestError::EmptySketch);
        }
        Ok(query::cdf(&self.store, self.min, self.max, value))
    }

    /// Fold another digest into this one.
    ///
    /// The other digest's centroids and staged samples are replayed as
    /// weighted samples, so its compression and capacities do not matter.
    ///
    /// Fails with `InvalidConfig`, leaving `self` untouched, when the
    /// combined total weight would not be finite.
    pub fn merge(&mut self, other: &MergingDigest) -> Result<()> {
        if !(self.total_weight() + other.total_weight()).is_finite() {
            return Err(TDigestError::invalid_config(format!(
                "combined weight of {} and {} overflows",
                self.total_weight(),
                other.total_weight()
            )));
        }
        for c in other.store.as_slice().iter().chain(other.buffer.iter()) {
            self.add_weighted(c.mean, c.weight)?;
        }
        self.min = f64::min(self.min, other.min);
        self.max = f64::max(self.max, other.max);
        Ok(())
    }

    /// Total weight inserted, rounded to the nearest integer.
    ///
    /// Fractional weights round away: a digest holding only a sample of
    /// weight 0.4 reports 0 here while `is_empty` is false and queries
    /// succeed. Use `total_weight` for the exact amount.
    pub fn size(&self) -> u64 {
        self.total_weight().round() as u64
    }

    /// Total weight inserted, including staged samples
    pub fn total_weight(&self) -> f64 {
        self.store.total_weight() + self.buffer.weight()
    }

    /// Number of centroids after merging any staged samples
    pub fn centroid_count(&mut self) -> usize {
        self.flush();
        self.store.len()
    }

    /// Merged centroids, sorted by mean
    pub fn centroids(&mut self) -> &[Centroid] {
        self.flush();
        self.store.as_slice()
    }

    /// Forget every sample, keeping the configuration and allocations
    pub fn reset(&mut self) {
        self.store.clear();
        self.buffer.clear();
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty() && self.buffer.is_empty()
    }

    /// Smallest value observed, `None` when empty
    pub fn min(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.min)
        }
    }

    /// Largest value observed, `None` when empty
    pub fn max(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.max)
        }
    }

    pub fn compression(&self) -> f64 {
        self.compression
    }

    pub fn centroid_capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl OwnedSize for MergingDigest {
    fn owned_size(&self) -> usize {
        std::mem::size_of::<Self>() - std::mem::size_of::<CentroidStore>()
            - std::mem::size_of::<InputBuffer>()
            + self.store.owned_size()
            + self.buffer.owned_size()
            + std::mem::size_of::<Centroid>() * (self.merged.capacity() + self.compressed.capacity())
    }
}

impl Digest for MergingDigest {
    fn add(&mut self, item: f64) -> Result<()> {
        MergingDigest::add(self, item)
    }

    fn add_buffer(&mut self, buffer: &[f64]) -> Result<()> {
        MergingDigest::add_buffer(self, buffer)
    }

    fn est_quantile_at_value(&mut self, value: f64) -> Result<f64> {
        self.cdf(value)
    }

    fn est_value_at_quantile(&mut self, quantile: f64) -> Result<f64> {
        self.quantile(quantile)
    }

    fn count(&self) -> u64 {
        self.size()
    }
}
