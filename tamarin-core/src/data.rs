//! Core data types: seeds, random sources and generation options.

use std::fmt;

/// Splittable random seed for deterministic generation.
///
/// Seeds can be split to create independent random streams,
/// ensuring deterministic and reproducible sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed(pub u64, pub u64);

impl Seed {
    /// Create a new seed from a single value.
    pub fn from_u64(value: u64) -> Self {
        let state = splitmix64_mix(value);
        let gamma = mix_gamma(state);
        Seed(state, gamma)
    }

    /// Split a seed into two independent seeds.
    /// Uses SplitMix64 splitting strategy for independence.
    pub fn split(self) -> (Self, Self) {
        let Seed(state, gamma) = self;
        let new_state = state.wrapping_add(gamma);
        let output = splitmix64_mix(new_state);
        let new_gamma = mix_gamma(output);

        (Seed(new_state, gamma), Seed(output, new_gamma))
    }

    /// Generate the next random value and advance the seed.
    pub fn next_u64(self) -> (u64, Self) {
        let Seed(state, gamma) = self;
        let new_state = state.wrapping_add(gamma);
        let output = splitmix64_mix(new_state);
        (output, Seed(new_state, gamma))
    }

    /// Generate a bounded random value [0, bound).
    pub fn next_bounded(self, bound: u64) -> (u64, Self) {
        let (value, new_seed) = self.next_u64();
        ((value as u128 * bound as u128 >> 64) as u64, new_seed)
    }

    /// Generate a random seed.
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        Seed(rng.gen(), rng.gen())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({}, {})", self.0, self.1)
    }
}

/// Mutable random cursor handed to sampling functions.
///
/// A `Source` owns a [`Seed`] and advances it on every draw. It is the only
/// randomness the engine consumes; plugging in another runtime means
/// producing values inside [`crate::CombinableArbitrary::from_fn`].
#[derive(Debug, Clone)]
pub struct Source {
    seed: Seed,
}

impl Source {
    pub fn new(seed: Seed) -> Self {
        Source { seed }
    }

    /// Deterministic source for a numeric seed.
    pub fn from_u64(value: u64) -> Self {
        Source::new(Seed::from_u64(value))
    }

    /// Source seeded from the thread-local generator.
    pub fn random() -> Self {
        Source::new(Seed::random())
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    /// Split off an independent source, advancing this one.
    pub fn split(&mut self) -> Source {
        let (left, right) = self.seed.split();
        self.seed = left;
        Source::new(right)
    }

    pub fn next_u64(&mut self) -> u64 {
        let (value, next) = self.seed.next_u64();
        self.seed = next;
        value
    }

    /// Uniform value in `[0, bound)`. A zero bound yields zero.
    pub fn next_bounded(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        let (value, next) = self.seed.next_bounded(bound);
        self.seed = next;
        value
    }

    pub fn next_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// True with the given probability.
    pub fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            self.next_f64() < probability
        }
    }

    /// Uniform integer in the inclusive range `[min, max]`.
    pub fn int_in(&mut self, min: i128, max: i128) -> i128 {
        if min >= max {
            return min;
        }
        let span = (max - min) as u128 + 1;
        let offset = if span <= u64::MAX as u128 {
            self.next_bounded(span as u64) as u128
        } else if span == u64::MAX as u128 + 1 {
            self.next_u64() as u128
        } else {
            let wide = ((self.next_u64() as u128) << 64) | self.next_u64() as u128;
            wide % span
        };
        min + offset as i128
    }

    /// Uniform index in `[0, len)`.
    pub fn index(&mut self, len: usize) -> usize {
        self.next_bounded(len as u64) as usize
    }
}

/// What to do when a node cannot be generated.
///
/// The default is [`FailureMode::Error`]: every failure surfaces as a
/// [`crate::TamarinError`] from the sampling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Fail the whole sample with the underlying error.
    #[default]
    Error,
    /// Replace the failing (non-root) node with `Value::Null` and log a warning.
    BestEffort,
}

/// Configuration for generation.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Fixed seed for reproducible runs; `None` draws a random seed.
    pub seed: Option<u64>,

    /// Probability that a nullable property is generated as null.
    pub null_probability: f64,

    /// Default inclusive element-count range for containers.
    pub container_size: (usize, usize),

    /// Default inclusive length range for strings.
    pub string_length: (usize, usize),

    /// Retry budget of post-conditions registered without an explicit limit.
    pub default_retry_limit: usize,

    /// How many times a whole sample is regenerated when a validator rejects it.
    pub validation_retry_limit: usize,

    /// Resampling budget for a duplicate set element or map key.
    pub unique_retry_limit: usize,

    /// Depth at which containers stop growing and nullable records become null.
    pub max_depth: usize,

    /// Number of resolved types kept in the property cache.
    pub cache_capacity: usize,

    /// Behaviour on node-level failures.
    pub failure_mode: FailureMode,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            seed: None,
            null_probability: 0.2,
            container_size: (0, 3),
            string_length: (0, 10),
            default_retry_limit: 1_000,
            validation_retry_limit: 100,
            unique_retry_limit: 100,
            max_depth: 5,
            cache_capacity: 2_048,
            failure_mode: FailureMode::Error,
        }
    }
}

impl GenerateOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_null_probability(mut self, probability: f64) -> Self {
        self.null_probability = probability.clamp(0.0, 1.0);
        self
    }

    pub fn with_container_size(mut self, min: usize, max: usize) -> Self {
        self.container_size = (min, max.max(min));
        self
    }

    pub fn with_string_length(mut self, min: usize, max: usize) -> Self {
        self.string_length = (min, max.max(min));
        self
    }

    pub fn with_default_retry_limit(mut self, limit: usize) -> Self {
        self.default_retry_limit = limit;
        self
    }

    pub fn with_validation_retry_limit(mut self, limit: usize) -> Self {
        self.validation_retry_limit = limit;
        self
    }

    pub fn with_unique_retry_limit(mut self, limit: usize) -> Self {
        self.unique_retry_limit = limit;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }
}

/// SplitMix64 mixing function for high-quality output.
fn splitmix64_mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Generate a good gamma value for SplitMix64 splitting.
fn mix_gamma(mut z: u64) -> u64 {
    z = splitmix64_mix(z);
    // Ensure gamma is odd for maximal period
    (z | 1).wrapping_mul(0x9e3779b97f4a7c15)
}
