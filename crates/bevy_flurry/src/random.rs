use rand::{Rng, SeedableRng, rngs::StdRng};

/// Source of uniform random numbers consumed by [`Variation`](crate::asset::Variation) sampling.
///
/// Implementors only need to provide [`random_float`](Self::random_float); the range
/// helpers are derived from it.
pub trait RandomSource: Send + Sync {
    /// Returns a random float in `[0.0, 1.0)`.
    fn random_float(&mut self) -> f32;

    /// Returns a random float between `low` and `high`.
    ///
    /// The bounds may be given in either order.
    fn random_float_in_range(&mut self, low: f32, high: f32) -> f32 {
        self.random_float() * (high - low) + low
    }

    /// Returns a random integer in the inclusive range spanned by `low` and `high`.
    fn random_int_in_range(&mut self, low: i32, high: i32) -> i32 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let span = (high as i64 - low as i64 + 1) as f32;
        let offset = ((self.random_float() * span) as i64).min(span as i64 - 1);
        (low as i64 + offset) as i32
    }
}

/// Default [`RandomSource`] backed by a [`StdRng`].
pub struct ParticleRng {
    rng: StdRng,
}

impl ParticleRng {
    /// Creates a generator. A `fixed_seed` makes every sample sequence repeatable
    /// within the same build; `None` seeds from the operating system.
    pub fn new(fixed_seed: Option<u64>) -> Self {
        let rng = match fixed_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl Default for ParticleRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RandomSource for ParticleRng {
    fn random_float(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    fn random_int_in_range(&mut self, low: i32, high: i32) -> i32 {
        if low <= high {
            self.rng.random_range(low..=high)
        } else {
            self.rng.random_range(high..=low)
        }
    }
}
