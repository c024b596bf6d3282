//! Random number generator abstraction for determinism.
//!
//! Seat order, character deal, automated player names and every choice an
//! automated player makes are drawn through [`DeterministicRng`]. In
//! production this wraps a seeded [`StdRng`]; tests inject scripted
//! implementations. [`RngBridge`] hands the seam to `rand::seq`.

use rand::rand_core::impls;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;
}

/// Production RNG backed by `rand`'s standard generator.
#[derive(Debug, Clone)]
pub struct SeededRng {
    inner: StdRng,
}

impl SeededRng {
    /// Creates a generator whose whole sequence is fixed by `seed`.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            inner: StdRng::from_os_rng(),
        }
    }
}

impl DeterministicRng for SeededRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.inner.random_range(min..=max)
    }
}

/// Returns an index in `0..len`. `len` must be non-zero.
#[allow(clippy::cast_possible_truncation)]
pub fn pick_index(rng: &mut dyn DeterministicRng, len: usize) -> usize {
    debug_assert!(len > 0, "cannot pick from an empty range");
    let max = len.saturating_sub(1).min(u32::MAX as usize) as u32;
    (rng.next_u32_range(0, max) as usize).min(len.saturating_sub(1))
}

/// Exposes a [`DeterministicRng`] as a [`RngCore`], so `rand`'s slice and
/// index helpers draw through the same seam as everything else.
pub struct RngBridge<'a> {
    inner: &'a mut dyn DeterministicRng,
}

impl<'a> RngBridge<'a> {
    #[must_use]
    pub fn new(inner: &'a mut dyn DeterministicRng) -> Self {
        Self { inner }
    }
}

impl RngCore for RngBridge<'_> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32_range(0, u32::MAX)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        impls::fill_bytes_via_next(self, dst);
    }
}
