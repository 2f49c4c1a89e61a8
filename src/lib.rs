//! Streaming quantile estimation with a merging t-digest, plus the
//! sampling and reference tooling used to benchmark it.

pub mod error;
pub mod t_digest;
pub mod traits;
pub mod util;

pub use error::{Result, TDigestError};
pub use t_digest::{Centroid, MergingDigest, MergingDigestBuilder};
