use crate::error::Result;
use crate::traits::Digest;
use crate::util::linear_digest::LinearDigest;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::{Gamma, GammaError, StandardNormal};
use std::f64::consts::PI;

pub mod linear_digest;

/// Shape of the gamma distribution used by the benchmarks
pub const GAMMA_SHAPE: f64 = 0.1;
/// Rate of the gamma distribution used by the benchmarks
pub const GAMMA_RATE: f64 = 0.1;
/// Mean and standard deviation of the normal distribution used by the benchmarks
pub const NORMAL_MEAN: f64 = 0.1;
pub const NORMAL_STD_DEV: f64 = 0.1;
/// Step of the sequential distribution
pub const SEQUENTIAL_STEP: f64 = PI * 1e-5;

/// Weighted mean of two values, clamped to lie between them
pub fn weighted_average(x1: f64, w1: f64, x2: f64, w2: f64) -> f64 {
    if x1 == x2 || w1 + w2 <= 0.0 {
        return x1;
    }
    let weighted = (x1 * w1 + x2 * w2) / (w1 + w2);
    let max = f64::max(x1, x2);
    let min = f64::min(x1, x2);
    f64::max(min, f64::min(weighted, max))
}

/// Input distributions swept by the insertion benchmarks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleDistribution {
    /// Uniform on [0, 1)
    Uniform,
    /// Strictly increasing values in steps of `SEQUENTIAL_STEP`
    Sequential,
    /// Uniform integers in 0..10, so every value repeats heavily
    Repeated,
    /// Gamma with shape `GAMMA_SHAPE` and rate `GAMMA_RATE`
    Gamma,
    /// Normal with mean `NORMAL_MEAN` and standard deviation `NORMAL_STD_DEV`
    Normal,
}

impl SampleDistribution {
    pub const ALL: [SampleDistribution; 5] = [
        SampleDistribution::Uniform,
        SampleDistribution::Sequential,
        SampleDistribution::Repeated,
        SampleDistribution::Gamma,
        SampleDistribution::Normal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SampleDistribution::Uniform => "uniform",
            SampleDistribution::Sequential => "sequential",
            SampleDistribution::Repeated => "repeated",
            SampleDistribution::Gamma => "gamma",
            SampleDistribution::Normal => "normal",
        }
    }

    pub fn sampler(self) -> std::result::Result<Sampler, GammaError> {
        Ok(Sampler {
            distribution: self,
            base: 0.0,
            gamma: Gamma::new(GAMMA_SHAPE, 1.0 / GAMMA_RATE)?,
        })
    }
}

/// Stateful source of samples for a `SampleDistribution`
#[derive(Clone, Debug)]
pub struct Sampler {
    distribution: SampleDistribution,
    base: f64,
    gamma: Gamma<f64>,
}

impl Sampler {
    pub fn next_sample<R: Rng>(&mut self, rng: &mut R) -> f64 {
        match self.distribution {
            SampleDistribution::Uniform => rng.gen::<f64>(),
            SampleDistribution::Sequential => {
                self.base += SEQUENTIAL_STEP;
                self.base
            }
            SampleDistribution::Repeated => rng.gen_range(0..10) as f64,
            SampleDistribution::Gamma => self.gamma.sample(rng),
            SampleDistribution::Normal => {
                let z: f64 = rng.sample(StandardNormal);
                NORMAL_MEAN + NORMAL_STD_DEV * z
            }
        }
    }

    /// Draw `size` samples into a vector
    pub fn gen_vec<R: Rng>(&mut self, size: usize, rng: &mut R) -> Vec<f64> {
        (0..size).map(|_| self.next_sample(rng)).collect()
    }
}

/// Generate a vector of values from a uniform distribution
/// # Arguments
/// `size` Size of the vector to generate
pub fn gen_uniform_vec(size: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    let uniform = Uniform::from(0.0..1001.0);
    (0..size).map(|_| uniform.sample(&mut rng)).collect()
}

/// Generate a vector of ascending values 0, 1, .., (size - 1)
/// # Arguments
/// `size` Size of the vector to generate
pub fn gen_asc_vec(size: usize) -> Vec<f64> {
    (0..size).map(|x| x as f64).collect()
}

/// Sample the error for a digest and test function compared to the generated datasets.
/// # Arguments
/// `create_digest` Function which takes a dataset and returns a filled digest
/// `gen_dataset` Function which generates a dataset for the digest
/// `test_func` Function which takes a digest and performs the desired query, returning that value.
/// `error_func` Function which takes the measured and actual values as parameters and returns the error.
/// `test_count` Number of tests to perform
/// # Returns
/// `return` Vector of errors compared to the generated datasets
pub fn sample_digest_accuracy<D, C, G, T, E>(
    create_digest: C,
    gen_dataset: G,
    test_func: T,
    error_func: E,
    test_count: u32,
) -> Result<Vec<f64>>
where
    C: Fn(&[f64]) -> Result<D>,
    G: Fn() -> Vec<f64>,
    T: Fn(&mut dyn Digest) -> Result<f64>,
    D: Digest,
    E: Fn(f64, f64) -> f64,
{
    let mut results = Vec::new();
    for _ in 0..test_count {
        let dataset = gen_dataset();
        let mut linear_digest = LinearDigest::new();
        linear_digest.add_buffer(&dataset)?;
        let mut digest = create_digest(&dataset)?;
        results.push(error_func(
            test_func(&mut digest)?,
            test_func(&mut linear_digest)?,
        ));
    }
    Ok(results)
}

#[cfg(test)]
mod test {
    use crate::t_digest::MergingDigest;
    use crate::traits::Digest;
    use crate::util::{
        gen_asc_vec, sample_digest_accuracy, weighted_average, SampleDistribution,
        SEQUENTIAL_STEP,
    };
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn weighted_average_is_clamped() {
        assert_relative_eq!(weighted_average(1.0, 1.0, 3.0, 1.0), 2.0);
        assert_relative_eq!(weighted_average(1.0, 3.0, 3.0, 1.0), 1.5);
        assert_eq!(weighted_average(0.1, 0.3, 0.1, 0.7), 0.1);
        assert_eq!(weighted_average(2.0, 0.0, 4.0, 0.0), 2.0);
    }

    #[test]
    fn distributions_produce_expected_shapes() {
        let mut rng = StdRng::seed_from_u64(7);

        let uniform = SampleDistribution::Uniform
            .sampler()
            .unwrap()
            .gen_vec(10_000, &mut rng);
        assert!(uniform.iter().all(|x| (0.0..1.0).contains(x)));

        let sequential = SampleDistribution::Sequential
            .sampler()
            .unwrap()
            .gen_vec(3, &mut rng);
        assert_relative_eq!(sequential[2], 3.0 * SEQUENTIAL_STEP);

        let repeated = SampleDistribution::Repeated
            .sampler()
            .unwrap()
            .gen_vec(1000, &mut rng);
        assert!(repeated.iter().all(|x| x.fract() == 0.0 && *x >= 0.0 && *x < 10.0));

        let gamma = SampleDistribution::Gamma
            .sampler()
            .unwrap()
            .gen_vec(100_000, &mut rng);
        assert!(gamma.iter().all(|x| *x >= 0.0));
        // mean of gamma(shape 0.1, rate 0.1) is 1
        assert_relative_eq!(gamma.iter().sum::<f64>() / 100_000.0, 1.0, epsilon = 0.1);

        let normal = SampleDistribution::Normal
            .sampler()
            .unwrap()
            .gen_vec(100_000, &mut rng);
        assert_relative_eq!(normal.iter().sum::<f64>() / 100_000.0, 0.1, epsilon = 0.005);
    }

    #[test]
    fn sample_digest_accuracy_against_linear() {
        let errors = sample_digest_accuracy(
            |dataset: &[f64]| {
                let mut digest = MergingDigest::new(100.0)?;
                digest.add_buffer(dataset)?;
                Ok(digest)
            },
            || gen_asc_vec(10_000),
            |digest: &mut dyn Digest| digest.est_value_at_quantile(0.5),
            |measured, actual| (measured - actual).abs(),
            3,
        )
        .unwrap();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| *e < 50.0));
    }
}
