//! # RandomNumberGenerator
//!
//! The `RandomNumberGenerator` struct provides a simple interface for the
//! random decisions a search makes: picking indices, drawing acceptance
//! probabilities and choosing between legal move kinds. It wraps the `rand`
//! crate's `StdRng` so that every search can be seeded for reproducible runs.
//!
//! ## Example
//!
//! ```rust
//! use coresel::rng::RandomNumberGenerator;
//!
//! let mut rng = RandomNumberGenerator::from_seed(42);
//! let index = rng.gen_index(10);
//! let coin = rng.gen_bool(0.5);
//!
//! println!("index: {:?}, coin: {}", index, coin);
//! ```
//!
//! ## Thread-safe RNG
//!
//! For parallel processing, the library provides a `ThreadLocalRng` that can
//! be used without synchronization overhead:
//!
//! ```rust
//! use coresel::rng::ThreadLocalRng;
//!
//! // Get a thread-local RNG
//! let random_number = ThreadLocalRng::gen_range(0.0..1.0);
//! ```

use rand::{rngs::StdRng, thread_rng, Rng, SeedableRng};

/// A thread-local random number generator that can be used without synchronization.
///
/// This is useful for parallel processing where each thread needs its own RNG.
/// It uses the built-in `ThreadRng` from the `rand` crate, which is automatically
/// seeded from the system entropy and is thread-local.
pub struct ThreadLocalRng;

impl ThreadLocalRng {
    /// Generates a random number in the given range.
    ///
    /// # Arguments
    ///
    /// * `range` - The range to generate a random number in.
    ///
    /// # Returns
    ///
    /// A random number in the given range.
    pub fn gen_range<T, R>(range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        thread_rng().gen_range(range)
    }

    /// Returns `true` with the given probability.
    ///
    /// # Arguments
    ///
    /// * `probability` - The probability of returning `true`, clamped to `[0, 1]`.
    pub fn gen_bool(probability: f64) -> bool {
        thread_rng().gen_bool(probability.clamp(0.0, 1.0))
    }
}

/// A wrapper around the `rand` crate's `StdRng` that provides methods for the
/// random draws a running search performs.
#[derive(Clone)]
pub struct RandomNumberGenerator {
    pub rng: StdRng,
}

impl RandomNumberGenerator {
    /// Creates a new `RandomNumberGenerator` instance seeded from the system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a new `RandomNumberGenerator` instance with a specific seed.
    ///
    /// This is useful for reproducible tests and benchmarks.
    ///
    /// # Arguments
    ///
    /// * `seed` - The seed to use for the random number generator.
    ///
    /// # Returns
    ///
    /// A new `RandomNumberGenerator` instance.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Spawns an independent generator seeded from this one.
    ///
    /// Parallel searches fork one generator per replica so that a single
    /// user-provided seed still yields a reproducible run.
    pub fn fork(&mut self) -> Self {
        Self::from_seed(self.rng.gen())
    }

    /// Generates a random number in the given range.
    ///
    /// # Arguments
    ///
    /// * `range` - The range to generate a random number in.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    /// Returns `true` with the given probability.
    ///
    /// # Arguments
    ///
    /// * `probability` - The probability of returning `true`, clamped to `[0, 1]`.
    pub fn gen_bool(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    /// Generates a random index below `len`, or `None` when `len` is zero.
    ///
    /// # Arguments
    ///
    /// * `len` - The exclusive upper bound, typically a collection length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use coresel::rng::RandomNumberGenerator;
    ///
    /// let mut rng = RandomNumberGenerator::new();
    /// assert!(rng.gen_index(5).is_some_and(|i| i < 5));
    /// assert!(rng.gen_index(0).is_none());
    /// ```
    pub fn gen_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.rng.gen_range(0..len))
        }
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}
