use crate::t_digest::centroid::Centroid;
use crate::t_digest::scale_functions::weight_limit;

/// Merge sorted incoming entries with the existing centroids, by mean.
///
/// On equal means the existing centroid is placed first.
pub fn merge_sorted<I>(incoming: I, existing: &[Centroid], out: &mut Vec<Centroid>)
where
    I: IntoIterator<Item = Centroid>,
{
    out.clear();
    let mut existing = existing.iter().copied().peekable();
    for c in incoming {
        while let Some(e) = existing.next_if(|e| e.mean <= c.mean) {
            out.push(e);
        }
        out.push(c);
    }
    out.extend(existing);
}

/// Compress a sorted run of centroids into `out`.
///
/// Walks the run left to right folding each entry into the current centroid
/// while the result stays within one unit of the scale function. The first
/// and last entries are never folded into a neighbour so the extreme values
/// keep their own centroids.
///
/// Returns `false`, leaving `out` partially filled, if the result would need
/// more than `capacity` centroids.
///
/// # Arguments
/// * `input` Centroids sorted by mean
/// * `total_weight` Sum of the weights in `input`
/// * `compress_factor` Compression factor of the scale function
/// * `out` Destination of the compressed centroids
/// * `capacity` Maximum number of centroids to produce
pub fn compress(
    input: &[Centroid],
    total_weight: f64,
    compress_factor: f64,
    out: &mut Vec<Centroid>,
    capacity: usize,
) -> bool {
    out.clear();
    let (first, rest) = match input.split_first() {
        Some(split) => split,
        None => return true,
    };
    let last_index = input.len() - 1;

    // Use weights instead of quantiles to minimise scale function evaluations in the main loop
    let mut weight_so_far = 0.0;
    let mut w_size_limit = weight_limit(weight_so_far, total_weight, compress_factor);
    let mut current = *first;

    for (index, next) in rest.iter().enumerate().map(|(i, c)| (i + 1, c)) {
        let proposed = current.weight + next.weight;
        let extreme = index == 1 || index == last_index;

        if !extreme && proposed <= w_size_limit {
            current = current + *next;
        } else {
            if out.len() >= capacity {
                return false;
            }
            weight_so_far += current.weight;
            out.push(current);
            w_size_limit = weight_limit(weight_so_far, total_weight, compress_factor);
            current = *next;
        }
    }

    if out.len() >= capacity {
        return false;
    }
    out.push(current);
    true
}

#[cfg(test)]
mod test {
    use crate::t_digest::centroid::Centroid;
    use crate::t_digest::merge::{compress, merge_sorted};
    use crate::t_digest::scale_functions::k_size;
    use approx::assert_relative_eq;

    fn asc_centroids(size: usize) -> Vec<Centroid> {
        (0..size).map(|x| Centroid::new(x as f64, 1.0)).collect()
    }

    #[test]
    fn merge_sorted_interleaves_with_existing_first() {
        let existing = vec![Centroid::new(1.0, 5.0), Centroid::new(3.0, 5.0)];
        let incoming = vec![
            Centroid::new(0.0, 1.0),
            Centroid::new(1.0, 1.0),
            Centroid::new(4.0, 1.0),
        ];
        let mut out = Vec::new();
        merge_sorted(incoming, &existing, &mut out);

        let got: Vec<(f64, f64)> = out.iter().map(|c| (c.mean, c.weight)).collect();
        assert_eq!(
            got,
            vec![(0.0, 1.0), (1.0, 5.0), (1.0, 1.0), (3.0, 5.0), (4.0, 1.0)]
        );
    }

    #[test]
    fn compress_single_centroid() {
        let mut out = Vec::new();
        assert!(compress(&[Centroid::new(1.0, 1.0)], 1.0, 100.0, &mut out, 10));
        assert_eq!(out, vec![Centroid::new(1.0, 1.0)]);

        assert!(compress(&[], 0.0, 100.0, &mut out, 10));
        assert!(out.is_empty());
    }

    #[test]
    fn compress_keeps_extremes_and_weight() {
        let input = asc_centroids(10_001);
        let mut out = Vec::new();
        assert!(compress(&input, 10_001.0, 100.0, &mut out, 200));

        assert_eq!(out.first(), Some(&Centroid::new(0.0, 1.0)));
        assert_eq!(out.last(), Some(&Centroid::new(10_000.0, 1.0)));
        assert_relative_eq!(out.iter().map(|c| c.weight).sum::<f64>(), 10_001.0);
        assert!(out.windows(2).all(|w| w[0].mean <= w[1].mean));
        assert!(out.len() <= 104, "{} centroids", out.len());
    }

    #[test]
    fn compress_respects_size_bound() {
        let input = asc_centroids(50_000);
        let mut out = Vec::new();
        assert!(compress(&input, 50_000.0, 50.0, &mut out, 100));

        let mut before = 0.0;
        for c in &out {
            if !c.is_singleton() {
                assert!(k_size(before, c.weight, 50_000.0, 50.0) <= 1.0 + 1e-9);
            }
            before += c.weight;
        }
    }

    #[test]
    fn compress_reports_overflow() {
        let input = asc_centroids(1000);
        let mut out = Vec::new();
        assert!(!compress(&input, 1000.0, 100.0, &mut out, 5));
        assert!(out.len() <= 5);
    }
}
