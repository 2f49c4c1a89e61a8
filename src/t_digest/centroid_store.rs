use crate::t_digest::centroid::Centroid;
use crate::traits::OwnedSize;

/// Sorted, size-bounded sequence of centroids.
///
/// The store is only ever replaced wholesale by the output of a merge.
/// Alongside the centroids it keeps the weight preceding each one so rank
/// lookups are a binary search.
#[derive(Clone, Debug)]
pub struct CentroidStore {
    centroids: Vec<Centroid>,
    weight_before: Vec<f64>,
    total_weight: f64,
    capacity: usize,
}

impl CentroidStore {
    /// Empty store bounded by `capacity`, allocating on the first merge
    pub fn new(capacity: usize) -> Self {
        CentroidStore {
            centroids: Vec::new(),
            weight_before: Vec::new(),
            total_weight: 0.0,
            capacity,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CentroidStore {
            centroids: Vec::with_capacity(capacity),
            weight_before: Vec::with_capacity(capacity),
            total_weight: 0.0,
            capacity,
        }
    }

    /// Build a store from already validated centroids, allocating only what they need
    pub(crate) fn from_parts(centroids: Vec<Centroid>, total_weight: f64, capacity: usize) -> Self {
        let mut store = CentroidStore::new(capacity);
        let mut centroids = centroids;
        store.replace(&mut centroids, total_weight);
        store
    }

    /// Swap in a freshly merged sequence.
    ///
    /// `next` receives the previous centroids so its allocation can be reused
    /// by the following merge.
    pub fn replace(&mut self, next: &mut Vec<Centroid>, total_weight: f64) {
        debug_assert!(next.windows(2).all(|w| w[0].mean <= w[1].mean));
        debug_assert!(next.len() <= self.capacity);
        std::mem::swap(&mut self.centroids, next);
        self.total_weight = total_weight;

        self.weight_before.clear();
        let mut cumulative = 0.0;
        for c in &self.centroids {
            self.weight_before.push(cumulative);
            cumulative += c.weight;
        }
    }

    pub fn clear(&mut self) {
        self.centroids.clear();
        self.weight_before.clear();
        self.total_weight = 0.0;
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn as_slice(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Weight of all centroids before `index`
    pub fn weight_before(&self, index: usize) -> f64 {
        self.weight_before[index]
    }

    /// Locate the centroid covering a cumulative weight.
    ///
    /// Returns the index of the centroid whose weight range contains `rank`
    /// and the offset of `rank` into that centroid. Ranks outside of
    /// `[0, total_weight]` are clamped.
    pub fn index_for_rank(&self, rank: f64) -> Option<(usize, f64)> {
        if self.centroids.is_empty() {
            return None;
        }
        let rank = rank.max(0.0).min(self.total_weight);
        let index = self
            .weight_before
            .partition_point(|before| *before <= rank)
            .saturating_sub(1);
        Some((index, rank - self.weight_before[index]))
    }
}

impl OwnedSize for CentroidStore {
    fn owned_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + std::mem::size_of::<Centroid>() * self.centroids.capacity()
            + std::mem::size_of::<f64>() * self.weight_before.capacity()
    }
}
