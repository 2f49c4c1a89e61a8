use crate::error::{Result, TDigestError};
use crate::t_digest::merging_digest::MergingDigest;

/// Centroid capacity per unit of compression when none is given
pub const DEFAULT_CENTROID_FACTOR: f64 = 2.0;
/// Buffer capacity per unit of compression when none is given
pub const DEFAULT_BUFFER_FACTOR: f64 = 5.0;
/// Largest capacity accepted per unit of compression
pub const MAX_CAPACITY_FACTOR: f64 = 10_000.0;

/// Configures and validates a `MergingDigest`.
///
/// ```
/// use tdigest_bench::MergingDigestBuilder;
///
/// let digest = MergingDigestBuilder::new(100.0)
///     .buffer_factor(5)
///     .build()
///     .unwrap();
/// assert_eq!(digest.centroid_capacity(), 200);
/// assert_eq!(digest.buffer_capacity(), 600);
/// ```
#[derive(Clone, Debug)]
pub struct MergingDigestBuilder {
    compression: f64,
    centroid_capacity: Option<usize>,
    buffer_capacity: Option<usize>,
}

impl MergingDigestBuilder {
    pub fn new(compression: f64) -> Self {
        MergingDigestBuilder {
            compression,
            centroid_capacity: None,
            buffer_capacity: None,
        }
    }

    /// Maximum number of centroids kept after a merge
    pub fn centroid_capacity(mut self, capacity: usize) -> Self {
        self.centroid_capacity = Some(capacity);
        self
    }

    /// Number of samples staged between merges
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    /// Size the buffer as `(factor + 1) * compression`
    pub fn buffer_factor(mut self, factor: usize) -> Self {
        let capacity = ((factor as f64 + 1.0) * self.compression).ceil();
        self.buffer_capacity = Some(capacity_from_f64(capacity));
        self
    }

    pub fn build(self) -> Result<MergingDigest> {
        let (compression, centroid_capacity, buffer_capacity) = self.resolve()?;
        Ok(MergingDigest::from_config(
            compression,
            centroid_capacity,
            buffer_capacity,
        ))
    }

    /// Validated compression, centroid capacity and buffer capacity, with
    /// the defaults filled in
    pub(crate) fn resolve(self) -> Result<(f64, usize, usize)> {
        let compression = self.compression;
        if !compression.is_finite() || compression <= 1.0 {
            return Err(TDigestError::invalid_config(format!(
                "compression must be finite and greater than 1, got {}",
                compression
            )));
        }
        let centroid_capacity = self.centroid_capacity.unwrap_or_else(|| {
            capacity_from_f64((DEFAULT_CENTROID_FACTOR * compression).ceil())
        });
        let buffer_capacity = self
            .buffer_capacity
            .unwrap_or_else(|| capacity_from_f64((DEFAULT_BUFFER_FACTOR * compression).ceil()));
        validate_capacities(compression, centroid_capacity, buffer_capacity)?;
        Ok((compression, centroid_capacity, buffer_capacity))
    }
}

/// Saturates at `usize::MAX` so oversized requests fail validation instead of wrapping
fn capacity_from_f64(capacity: f64) -> usize {
    if capacity >= usize::MAX as f64 {
        usize::MAX
    } else {
        capacity as usize
    }
}

/// Check a set of capacities against a compression factor.
///
/// Capacities are stored as `u32` when serialized, so anything larger is
/// rejected. So is a centroid capacity below `2 * compression`, a buffer
/// smaller than the centroid capacity and a buffer above
/// `MAX_CAPACITY_FACTOR * ceil(compression)`.
pub(crate) fn validate_capacities(
    compression: f64,
    centroid_capacity: usize,
    buffer_capacity: usize,
) -> Result<()> {
    if buffer_capacity > u32::MAX as usize {
        return Err(TDigestError::invalid_config(format!(
            "buffer capacity {} does not fit in 32 bits",
            buffer_capacity
        )));
    }
    if (centroid_capacity as f64) < DEFAULT_CENTROID_FACTOR * compression {
        return Err(TDigestError::invalid_config(format!(
            "centroid capacity {} is below 2 * compression ({})",
            centroid_capacity, compression
        )));
    }
    if buffer_capacity < centroid_capacity {
        return Err(TDigestError::invalid_config(format!(
            "buffer capacity {} is smaller than centroid capacity {}",
            buffer_capacity, centroid_capacity
        )));
    }
    if buffer_capacity as f64 > MAX_CAPACITY_FACTOR * compression.ceil() {
        return Err(TDigestError::invalid_config(format!(
            "buffer capacity {} exceeds {} * compression ({})",
            buffer_capacity, MAX_CAPACITY_FACTOR, compression
        )));
    }
    Ok(())
}
