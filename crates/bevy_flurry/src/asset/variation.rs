use bevy::math::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::random::RandomSource;

/// How a [`Variation`] produces its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VariationKind {
    /// Always yields [`Variation::low`].
    #[default]
    Constant,
    /// Samples every component independently between `low` and `high`.
    RandomInRange,
    /// Samples one scalar between `low.x` and `high.x` and broadcasts it to every
    /// component. Behaves like [`RandomInRange`](Self::RandomInRange) for scalars.
    UniformInRange,
}

/// A value type that a [`Variation`] can sample.
pub trait Sample: Copy {
    /// Samples between `low` and `high`, component by component.
    fn sample_random(low: Self, high: Self, rng: &mut dyn RandomSource) -> Self;

    /// Samples a single scalar and broadcasts it to every component.
    fn sample_uniform(low: Self, high: Self, rng: &mut dyn RandomSource) -> Self {
        Self::sample_random(low, high, rng)
    }
}

impl Sample for i32 {
    fn sample_random(low: Self, high: Self, rng: &mut dyn RandomSource) -> Self {
        rng.random_int_in_range(low, high)
    }
}

impl Sample for f32 {
    fn sample_random(low: Self, high: Self, rng: &mut dyn RandomSource) -> Self {
        rng.random_float_in_range(low, high)
    }
}

macro_rules! impl_vector_sample {
    ($($ty:ty),*) => {$(
        impl Sample for $ty {
            fn sample_random(low: Self, high: Self, rng: &mut dyn RandomSource) -> Self {
                let mut out = low.to_array();
                for (value, high) in out.iter_mut().zip(high.to_array()) {
                    *value = rng.random_float_in_range(*value, high);
                }
                Self::from_array(out)
            }

            fn sample_uniform(low: Self, high: Self, rng: &mut dyn RandomSource) -> Self {
                Self::splat(rng.random_float_in_range(low.x, high.x))
            }
        }
    )*};
}

impl_vector_sample!(Vec2, Vec3, Vec4);

/// A configurable distribution over a particle property.
///
/// ```
/// use bevy::math::Vec2;
/// use bevy_flurry::asset::{Variation, VariationKind};
///
/// let size = Variation::uniform(Vec2::splat(0.5), Vec2::splat(2.0));
/// assert_eq!(size.kind, VariationKind::UniformInRange);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Deserialize<'de> + Default"
))]
pub struct Variation<T> {
    /// The sampling strategy. Defaults to [`VariationKind::Constant`].
    #[serde(default)]
    pub kind: VariationKind,
    /// The constant value, or the lower bound of the range.
    pub low: T,
    /// The upper bound of the range. Unused by [`VariationKind::Constant`].
    #[serde(default)]
    pub high: T,
}

impl<T: Sample> Variation<T> {
    /// A variation that always yields `value`.
    pub fn constant(value: T) -> Self {
        Self {
            kind: VariationKind::Constant,
            low: value,
            high: value,
        }
    }

    /// A variation sampled independently per component between `low` and `high`.
    pub fn random(low: T, high: T) -> Self {
        Self {
            kind: VariationKind::RandomInRange,
            low,
            high,
        }
    }

    /// A variation sampling one scalar from `low.x..high.x` for every component.
    pub fn uniform(low: T, high: T) -> Self {
        Self {
            kind: VariationKind::UniformInRange,
            low,
            high,
        }
    }

    pub fn set_constant(&mut self, value: T) {
        *self = Self::constant(value);
    }

    pub fn set_random(&mut self, low: T, high: T) {
        *self = Self::random(low, high);
    }

    pub fn set_uniform(&mut self, low: T, high: T) {
        *self = Self::uniform(low, high);
    }

    pub fn is_constant(&self) -> bool {
        self.kind == VariationKind::Constant
    }

    /// Produces a value. Random kinds draw from `rng` on every call.
    pub fn evaluate(&self, rng: &mut dyn RandomSource) -> T {
        match self.kind {
            VariationKind::Constant => self.low,
            VariationKind::RandomInRange => T::sample_random(self.low, self.high, rng),
            VariationKind::UniformInRange => T::sample_uniform(self.low, self.high, rng),
        }
    }
}

impl<T: Sample + Default> Default for Variation<T> {
    fn default() -> Self {
        Self::constant(T::default())
    }
}
