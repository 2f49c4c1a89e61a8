use crate::error::{Result, TDigestError};
use crate::traits::Digest;

/// Keeps every value, giving exact answers to compare the sketches against
pub struct LinearDigest {
    pub values: Vec<f64>,
}

impl LinearDigest {
    pub fn new() -> Self {
        LinearDigest { values: Vec::new() }
    }
}

impl Default for LinearDigest {
    fn default() -> Self {
        LinearDigest::new()
    }
}

impl Digest for LinearDigest {
    fn add(&mut self, item: f64) -> Result<()> {
        if item.is_nan() {
            return Err(TDigestError::InvalidSample {
                value: item,
                weight: 1.0,
            });
        }
        self.values.push(item);
        Ok(())
    }

    fn add_buffer(&mut self, items: &[f64]) -> Result<()> {
        items.iter().try_for_each(|item| self.add(*item))
    }

    fn est_quantile_at_value(&mut self, target_value: f64) -> Result<f64> {
        if self.values.is_empty() {
            return Err(TDigestError::EmptySketch);
        }
        let less_than = self.values.iter().filter(|x| **x < target_value).count() as f64;
        let equal_to = self.values.iter().filter(|x| **x == target_value).count() as f64;
        Ok((less_than + equal_to / 2.0) / self.values.len() as f64)
    }

    fn est_value_at_quantile(&mut self, target_quantile: f64) -> Result<f64> {
        if self.values.is_empty() {
            return Err(TDigestError::EmptySketch);
        }
        let target_index = (target_quantile * self.values.len() as f64).floor() as usize;
        self.values
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(self.values[target_index.min(self.values.len() - 1)])
    }

    fn count(&self) -> u64 {
        self.values.len() as u64
    }
}
