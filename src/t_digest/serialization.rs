//! Little-endian binary encoding of a `MergingDigest`.
//!
//! Layout:
//!
//! | Field | Type |
//! |---|---|
//! | magic | u32 |
//! | version | u16 |
//! | flags | u16 |
//! | compression | f64 |
//! | min | f64 |
//! | max | f64 |
//! | total weight | f64 |
//! | centroid capacity, buffer capacity | u32, u32 (only with `FLAG_CAPACITIES`) |
//! | centroid count | u32 |
//! | centroids | (mean f64, weight f64 or f32 with `FLAG_F32_WEIGHTS`) |
//!
//! Centroids are written in ascending order of their means. The buffer is
//! always flushed first so it never appears in the encoding.
use crate::error::{Result, TDigestError};
use crate::t_digest::builder::MergingDigestBuilder;
use crate::t_digest::centroid::Centroid;
use crate::t_digest::centroid_store::CentroidStore;
use crate::t_digest::merging_digest::MergingDigest;
use byteorder::{ReadBytesExt, LE};
use std::io::{Cursor, Write};
use tracing::debug;

pub const MAGIC: u32 = u32::from_le_bytes(*b"TDMG");
pub const SERIAL_VERSION: u16 = 1;
/// Weights are stored as f32
pub const FLAG_F32_WEIGHTS: u16 = 1;
/// Centroid and buffer capacities follow the total weight
pub const FLAG_CAPACITIES: u16 = 1 << 1;
const KNOWN_FLAGS: u16 = FLAG_F32_WEIGHTS | FLAG_CAPACITIES;

const HEADER_BYTES: usize = 4 + 2 + 2 + 4 * 8 + 2 * 4 + 4;

/// Relative slack allowed between the stored total weight and the sum of the weights
const F64_WEIGHT_TOLERANCE: f64 = 1e-9;
const F32_WEIGHT_TOLERANCE: f64 = 1e-6;

impl MergingDigest {
    /// Flush and encode the digest with f64 weights
    pub fn serialize(&mut self) -> Vec<u8> {
        self.encode(false)
    }

    /// Flush and encode the digest with f32 weights.
    ///
    /// Falls back to f64 weights when a weight does not fit in an f32.
    pub fn serialize_compact(&mut self) -> Vec<u8> {
        self.encode(true)
    }

    /// Flush and write the f64 encoding to `writer`
    pub fn serialize_into<W: Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.serialize())
    }

    fn encode(&mut self, compact: bool) -> Vec<u8> {
        self.flush();
        let centroids = self.store.as_slice();
        let f32_weights = compact && centroids.iter().all(|c| c.weight <= f32::MAX as f64);
        let weight_bytes = if f32_weights { 4 } else { 8 };
        let mut bytes = Vec::with_capacity(HEADER_BYTES + centroids.len() * (8 + weight_bytes));

        let mut flags = FLAG_CAPACITIES;
        if f32_weights {
            flags |= FLAG_F32_WEIGHTS;
        }
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&SERIAL_VERSION.to_le_bytes());
        bytes.extend_from_slice(&flags.to_le_bytes());
        bytes.extend_from_slice(&self.compression.to_le_bytes());
        bytes.extend_from_slice(&self.min.to_le_bytes());
        bytes.extend_from_slice(&self.max.to_le_bytes());
        bytes.extend_from_slice(&self.store.total_weight().to_le_bytes());
        // capacities are validated to fit in 32 bits on construction
        bytes.extend_from_slice(&(self.store.capacity() as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.buffer.capacity() as u32).to_le_bytes());
        bytes.extend_from_slice(&(centroids.len() as u32).to_le_bytes());

        for c in centroids {
            bytes.extend_from_slice(&c.mean.to_le_bytes());
            if f32_weights {
                bytes.extend_from_slice(&(c.weight as f32).to_le_bytes());
            } else {
                bytes.extend_from_slice(&c.weight.to_le_bytes());
            }
        }
        bytes
    }

    /// Decode a digest written by `serialize` or `serialize_compact`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> TDigestError {
            move |_| reject(format!("insufficient data reading {}", tag))
        }

        let mut cursor = Cursor::new(bytes);
        let magic = cursor.read_u32::<LE>().map_err(make_error("magic"))?;
        let version = cursor.read_u16::<LE>().map_err(make_error("version"))?;
        let flags = cursor.read_u16::<LE>().map_err(make_error("flags"))?;
        if magic != MAGIC {
            return Err(reject(format!("bad magic {:#010x}", magic)));
        }
        if version != SERIAL_VERSION {
            return Err(reject(format!("unsupported version {}", version)));
        }
        if flags & !KNOWN_FLAGS != 0 {
            return Err(reject(format!("unknown flags {:#06x}", flags)));
        }
        let f32_weights = flags & FLAG_F32_WEIGHTS != 0;

        let compression = cursor.read_f64::<LE>().map_err(make_error("compression"))?;
        let min = cursor.read_f64::<LE>().map_err(make_error("min"))?;
        let max = cursor.read_f64::<LE>().map_err(make_error("max"))?;
        let total_weight = cursor.read_f64::<LE>().map_err(make_error("total weight"))?;
        let capacities = if flags & FLAG_CAPACITIES != 0 {
            let centroid_capacity = cursor
                .read_u32::<LE>()
                .map_err(make_error("centroid capacity"))?;
            let buffer_capacity = cursor
                .read_u32::<LE>()
                .map_err(make_error("buffer capacity"))?;
            Some((centroid_capacity as usize, buffer_capacity as usize))
        } else {
            None
        };
        let count = cursor.read_u32::<LE>().map_err(make_error("centroid count"))? as usize;

        if !total_weight.is_finite() || total_weight < 0.0 {
            return Err(reject(format!("invalid total weight {}", total_weight)));
        }
        let entry_bytes = if f32_weights { 12 } else { 16 };
        let remaining = bytes.len() - cursor.position() as usize;
        if remaining < count * entry_bytes {
            return Err(reject(format!(
                "{} centroids need {} bytes, {} remain",
                count,
                count * entry_bytes,
                remaining
            )));
        }

        let mut digest = build_digest(compression, capacities, count)?;

        let mut centroids = Vec::with_capacity(count);
        let mut weight_sum = 0.0;
        for _ in 0..count {
            let mean = cursor.read_f64::<LE>().map_err(make_error("centroid mean"))?;
            let weight = if f32_weights {
                cursor
                    .read_f32::<LE>()
                    .map_err(make_error("centroid weight"))? as f64
            } else {
                cursor
                    .read_f64::<LE>()
                    .map_err(make_error("centroid weight"))?
            };
            if mean.is_nan() {
                return Err(reject("centroid mean is NaN"));
            }
            if !(weight > 0.0) || !weight.is_finite() {
                return Err(reject(format!("invalid centroid weight {}", weight)));
            }
            if let Some(prev) = centroids.last().map(|c: &Centroid| c.mean) {
                if !(prev <= mean) {
                    return Err(reject(format!(
                        "centroid means are not sorted ({} after {})",
                        mean, prev
                    )));
                }
            }
            weight_sum += weight;
            centroids.push(Centroid::new(mean, weight));
        }
        if cursor.position() as usize != bytes.len() {
            return Err(reject(format!(
                "{} trailing bytes",
                bytes.len() - cursor.position() as usize
            )));
        }

        match (centroids.first(), centroids.last()) {
            (Some(first), Some(last)) => {
                if !(min <= first.mean) || !(last.mean <= max) {
                    return Err(reject(format!(
                        "centroids [{}, {}] fall outside of min {} and max {}",
                        first.mean, last.mean, min, max
                    )));
                }
            }
            _ => {
                if total_weight != 0.0 {
                    return Err(reject(format!(
                        "no centroids but a total weight of {}",
                        total_weight
                    )));
                }
            }
        }

        let tolerance = if f32_weights {
            F32_WEIGHT_TOLERANCE
        } else {
            F64_WEIGHT_TOLERANCE
        };
        if (weight_sum - total_weight).abs() > tolerance * total_weight {
            return Err(reject(format!(
                "centroid weights sum to {} instead of {}",
                weight_sum, total_weight
            )));
        }
        let total_weight = if f32_weights { weight_sum } else { total_weight };

        if !centroids.is_empty() {
            digest.min = min;
            digest.max = max;
        }
        digest.store = CentroidStore::from_parts(centroids, total_weight, digest.centroid_capacity());
        Ok(digest)
    }
}

/// Create the digest described by a header, falling back to the default
/// capacities when none were written.
///
/// Nothing is preallocated from the header: the vectors grow from what the
/// payload and later samples actually need.
fn build_digest(
    compression: f64,
    capacities: Option<(usize, usize)>,
    count: usize,
) -> Result<MergingDigest> {
    let builder = MergingDigestBuilder::new(compression);
    let (compression, centroid_capacity, buffer_capacity) = match capacities {
        Some((centroid_capacity, buffer_capacity)) => builder
            .centroid_capacity(centroid_capacity)
            .buffer_capacity(buffer_capacity)
            .resolve(),
        None => {
            let defaults = builder.clone().resolve().map_err(config_error)?;
            if count <= defaults.1 {
                Ok(defaults)
            } else {
                builder
                    .centroid_capacity(count)
                    .buffer_capacity(count.max(defaults.2))
                    .resolve()
            }
        }
    }
    .map_err(config_error)?;

    if count > centroid_capacity {
        return Err(reject(format!(
            "{} centroids exceed the capacity of {}",
            count, centroid_capacity
        )));
    }
    Ok(MergingDigest::unallocated(
        compression,
        centroid_capacity,
        buffer_capacity,
    ))
}

fn config_error(err: TDigestError) -> TDigestError {
    match err {
        TDigestError::InvalidConfig { reason } => reject(reason),
        other => other,
    }
}

fn reject(reason: impl Into<String>) -> TDigestError {
    let reason = reason.into();
    debug!(%reason, "rejected serialized digest");
    TDigestError::corrupt(reason)
}

#[cfg(test)]
mod test {
    use crate::error::TDigestError;
    use crate::t_digest::merging_digest::MergingDigest;
    use crate::t_digest::serialization::{FLAG_CAPACITIES, MAGIC, SERIAL_VERSION};
    use crate::traits::OwnedSize;
    use crate::util::gen_asc_vec;
    use approx::assert_relative_eq;

    fn filled_digest() -> MergingDigest {
        let mut digest = MergingDigest::new(100.0).unwrap();
        digest.add_buffer(&gen_asc_vec(10_000)).unwrap();
        digest.add_weighted(0.5, 3.0).unwrap();
        digest
    }

    fn is_corrupt(bytes: &[u8]) -> bool {
        matches!(
            MergingDigest::deserialize(bytes),
            Err(TDigestError::CorruptData { .. })
        )
    }

    /// Hand written encoding without capacities and with f64 weights
    fn encode(compression: f64, min: f64, max: f64, total: f64, centroids: &[(f64, f64)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&SERIAL_VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        for x in [compression, min, max, total].iter() {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        bytes.extend_from_slice(&(centroids.len() as u32).to_le_bytes());
        for (mean, weight) in centroids {
            bytes.extend_from_slice(&mean.to_le_bytes());
            bytes.extend_from_slice(&weight.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn round_trip_answers_identically() {
        let mut digest = filled_digest();
        let bytes = digest.serialize();
        let mut decoded = MergingDigest::deserialize(&bytes).unwrap();

        assert_eq!(decoded.compression(), digest.compression());
        assert_eq!(decoded.centroid_capacity(), digest.centroid_capacity());
        assert_eq!(decoded.buffer_capacity(), digest.buffer_capacity());
        assert_eq!(decoded.total_weight(), digest.total_weight());
        assert_eq!(decoded.centroids(), digest.centroids());
        for q in [0.0, 0.01, 0.25, 0.5, 0.99, 1.0].iter() {
            assert_eq!(
                decoded.quantile(*q).unwrap().to_bits(),
                digest.quantile(*q).unwrap().to_bits()
            );
        }
        for x in [-1.0, 0.0, 0.5, 5000.0, 9999.0].iter() {
            assert_eq!(decoded.cdf(*x).unwrap(), digest.cdf(*x).unwrap());
        }
    }

    #[test]
    fn round_trip_keeps_accepting_samples() {
        let mut digest = filled_digest();
        let mut decoded = MergingDigest::deserialize(&digest.serialize()).unwrap();
        decoded.add(20_000.0).unwrap();
        assert_eq!(decoded.quantile(1.0).unwrap(), 20_000.0);
        assert_eq!(decoded.size(), 10_004);
    }

    #[test]
    fn round_trip_empty() {
        let mut digest = MergingDigest::new(50.0).unwrap();
        let mut decoded = MergingDigest::deserialize(&digest.serialize()).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.min(), None);
        assert_eq!(decoded.quantile(0.5), Err(TDigestError::EmptySketch));
    }

    #[test]
    fn compact_round_trip() {
        let mut digest = filled_digest();
        let compact = digest.serialize_compact();
        let full = digest.serialize();
        assert!(compact.len() < full.len());

        let mut decoded = MergingDigest::deserialize(&compact).unwrap();
        assert_eq!(decoded.centroid_count(), digest.centroid_count());
        assert_relative_eq!(decoded.total_weight(), digest.total_weight());
        for q in [0.0, 0.1, 0.5, 0.9, 1.0].iter() {
            assert_relative_eq!(
                decoded.quantile(*q).unwrap(),
                digest.quantile(*q).unwrap(),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn serialize_into_matches_serialize() {
        let mut digest = filled_digest();
        let mut written = Vec::new();
        digest.serialize_into(&mut written).unwrap();
        assert_eq!(written, digest.serialize());
        assert_eq!(
            u16::from_le_bytes([written[6], written[7]]),
            FLAG_CAPACITIES
        );
    }

    #[test]
    fn decodes_without_capacities() {
        let bytes = encode(10.0, 0.0, 2.0, 3.0, &[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)]);
        let mut digest = MergingDigest::deserialize(&bytes).unwrap();
        assert_eq!(digest.centroid_capacity(), 20);
        assert_eq!(digest.buffer_capacity(), 50);
        assert_eq!(digest.size(), 3);
        assert_eq!(digest.quantile(0.5).unwrap(), 1.0);
    }

    #[test]
    fn rejects_malformed_headers() {
        let mut digest = filled_digest();
        let bytes = digest.serialize();

        let mut bad_magic = bytes.clone();
        bad_magic[0] ^= 0xff;
        assert!(is_corrupt(&bad_magic));

        let mut bad_version = bytes.clone();
        bad_version[4] = 9;
        assert!(is_corrupt(&bad_version));

        let mut bad_flags = bytes.clone();
        bad_flags[7] = 0x80;
        assert!(is_corrupt(&bad_flags));

        assert!(is_corrupt(&bytes[..bytes.len() - 1]));
        assert!(is_corrupt(&bytes[..3]));
        assert!(is_corrupt(&[]));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(is_corrupt(&trailing));
    }

    #[test]
    fn rejects_invalid_contents() {
        let good = [(0.0, 1.0), (1.0, 2.0), (2.0, 1.0)];
        assert!(MergingDigest::deserialize(&encode(10.0, 0.0, 2.0, 4.0, &good)).is_ok());

        // compression out of range
        assert!(is_corrupt(&encode(1.0, 0.0, 2.0, 4.0, &good)));
        assert!(is_corrupt(&encode(f64::NAN, 0.0, 2.0, 4.0, &good)));
        // unsorted means
        assert!(is_corrupt(&encode(
            10.0,
            0.0,
            2.0,
            4.0,
            &[(0.0, 1.0), (2.0, 2.0), (1.0, 1.0)]
        )));
        // NaN mean
        assert!(is_corrupt(&encode(10.0, 0.0, 2.0, 4.0, &[(0.0, 1.0), (f64::NAN, 2.0), (2.0, 1.0)])));
        // weights do not sum to the total
        assert!(is_corrupt(&encode(10.0, 0.0, 2.0, 5.0, &good)));
        // non-positive weight
        assert!(is_corrupt(&encode(10.0, 0.0, 2.0, 3.0, &[(0.0, 1.0), (1.0, 0.0), (2.0, 2.0)])));
        // centroids outside of min and max
        assert!(is_corrupt(&encode(10.0, 0.5, 2.0, 4.0, &good)));
        assert!(is_corrupt(&encode(10.0, 0.0, 1.5, 4.0, &good)));
        // empty with weight
        assert!(is_corrupt(&encode(10.0, 0.0, 2.0, 1.0, &[])));
    }

    #[test]
    fn rejects_too_many_centroids() {
        let mut digest = MergingDigest::with_capacity(10.0, 20, 50).unwrap();
        digest.add_buffer(&gen_asc_vec(1000)).unwrap();
        let mut bytes = digest.serialize();
        // centroid capacity sits right after the four f64 header fields
        bytes[40..44].copy_from_slice(&2u32.to_le_bytes());
        assert!(is_corrupt(&bytes));
    }

    #[test]
    fn rejects_oversized_capacities() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&SERIAL_VERSION.to_le_bytes());
        bytes.extend_from_slice(&FLAG_CAPACITIES.to_le_bytes());
        for x in [10.0, f64::INFINITY, f64::NEG_INFINITY, 0.0].iter() {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(bytes.len(), 52);
        assert!(is_corrupt(&bytes));
    }

    #[test]
    fn decoding_allocates_only_the_payload() {
        // default capacities of 1.6e9 centroids and 4e9 buffered samples
        let bytes = encode(8e8, 1.0, 2.0, 2.0, &[(1.0, 1.0), (2.0, 1.0)]);
        let mut digest = MergingDigest::deserialize(&bytes).unwrap();
        assert_eq!(digest.buffer_capacity(), 4_000_000_000);
        assert!(digest.owned_size() < 4096);

        digest.add(3.0).unwrap();
        assert_eq!(digest.quantile(1.0).unwrap(), 3.0);
        assert_eq!(digest.size(), 3);
    }
}
