//! Seeded random number generation.
//!
//! Uses Xoshiro256** so identical seeds produce identical models.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// Odd constant used to spread stream indices across the seed space.
const STREAM_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Maximum number of RNG calls before warning.
const RNG_CALLS_WARNING_THRESHOLD: u64 = 1_000_000_000;

/// Reproducible RNG used by the generators.
///
/// # Example
///
/// ```rust
/// use fm_random::ModelRng;
///
/// let mut a = ModelRng::for_stream(7, 2);
/// let mut b = ModelRng::for_stream(7, 2);
/// assert_eq!(a.gen::<u64>(), b.gen::<u64>());
/// ```
pub struct ModelRng {
    seed: u64,
    rng: Xoshiro256StarStar,
    calls_count: u64,
}

impl ModelRng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            calls_count: 0,
        }
    }

    /// RNG for an independent stream (one per requested model) of a run.
    #[must_use]
    pub fn for_stream(run_seed: u64, stream: u64) -> Self {
        Self::new(run_seed ^ stream.wrapping_add(1).wrapping_mul(STREAM_MIX))
    }

    /// Seed this RNG was created from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of random values drawn so far.
    #[must_use]
    pub fn calls_count(&self) -> u64 {
        self.calls_count
    }

    fn record_call(&mut self) {
        self.calls_count += 1;
        debug_assert!(
            self.calls_count < RNG_CALLS_WARNING_THRESHOLD,
            "Very high number of RNG calls - possible infinite loop"
        );
    }

    /// Generate a random value of type T.
    pub fn gen<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.record_call();
        self.rng.gen()
    }

    /// Generate a random value in the given range.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.record_call();
        self.rng.gen_range(range)
    }

    /// Generate a boolean with the given probability of true.
    pub fn gen_bool(&mut self, probability: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "Probability must be in [0.0, 1.0]"
        );
        self.record_call();
        self.rng.gen_bool(probability)
    }

    /// Random index into a collection of `len` items.
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.gen_range(0..len))
    }

    /// Two distinct random indices below `len`.
    pub fn pick_distinct_pair(&mut self, len: usize) -> Option<(usize, usize)> {
        if len < 2 {
            return None;
        }
        let first = self.gen_range(0..len);
        let mut second = self.gen_range(0..len - 1);
        if second >= first {
            second += 1;
        }
        Some((first, second))
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        self.record_call();
        slice.shuffle(&mut self.rng);
    }

    /// Choose a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        use rand::seq::SliceRandom;
        self.record_call();
        slice.choose(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut rng1 = ModelRng::new(42);
        let mut rng2 = ModelRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
        }
    }

    #[test]
    fn test_streams_differ() {
        let mut a = ModelRng::for_stream(42, 0);
        let mut b = ModelRng::for_stream(42, 1);

        let seq_a: Vec<u64> = (0..10).map(|_| a.gen()).collect();
        let seq_b: Vec<u64> = (0..10).map(|_| b.gen()).collect();
        assert_ne!(seq_a, seq_b);
        assert_ne!(ModelRng::for_stream(42, 0).seed(), 42);
    }

    #[test]
    fn test_pick_index() {
        let mut rng = ModelRng::new(12345);
        assert_eq!(rng.pick_index(0), None);
        for _ in 0..100 {
            let index = rng.pick_index(5).unwrap();
            assert!(index < 5);
        }
    }

    #[test]
    fn test_pick_distinct_pair() {
        let mut rng = ModelRng::new(12345);
        assert_eq!(rng.pick_distinct_pair(1), None);
        for _ in 0..200 {
            let (a, b) = rng.pick_distinct_pair(3).unwrap();
            assert!(a < 3 && b < 3);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_gen_bool_extremes() {
        let mut rng = ModelRng::new(12345);
        for _ in 0..10 {
            assert!(!rng.gen_bool(0.0));
            assert!(rng.gen_bool(1.0));
        }
    }

    #[test]
    fn test_calls_are_counted() {
        let mut rng = ModelRng::new(12345);
        let mut items = [1, 2, 3, 4];
        rng.shuffle(&mut items);
        assert!(rng.choose(&items).is_some());
        let _: u64 = rng.gen();
        assert_eq!(rng.calls_count(), 3);

        items.sort_unstable();
        assert_eq!(items, [1, 2, 3, 4]);
        assert_eq!(rng.choose::<u8>(&[]), None);
    }
}
