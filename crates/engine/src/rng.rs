//! Injected randomness
//!
//! Phrase selection draws indices through this trait so tests can script
//! the sequence instead of depending on a live RNG.

use rand::Rng;

/// Pseudo-random index source
pub trait RandomSource: Send + Sync {
    /// Uniform draw in `[0, bound)`; `bound` is always at least 1
    fn next_index(&self, bound: usize) -> usize;
}

/// Default source backed by the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn next_index(&self, bound: usize) -> usize {
        if bound <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..bound)
    }
}
