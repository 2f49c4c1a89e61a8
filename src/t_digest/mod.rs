pub mod builder;
pub mod centroid;
pub mod centroid_store;
pub mod input_buffer;
pub mod merge;
pub mod merging_digest;
pub mod query;
pub mod scale_functions;
pub mod serialization;

pub use builder::MergingDigestBuilder;
pub use centroid::Centroid;
pub use merging_digest::MergingDigest;
