pub(crate) mod serde_helpers;
mod variation;
/// Template format version tracking and compatibility validation.
pub mod versioning;

pub use variation::{Sample, Variation, VariationKind};

use bevy::{
    asset::{AssetLoader, LoadContext, io::Reader},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use serde_helpers::*;
use versioning::{FORMAT_VERSION, VersionStatus};

/// Asset loader for [`ParticleTemplateAsset`] files in RON format.
#[derive(Default, TypePath)]
pub struct ParticleTemplateAssetLoader;

/// Errors that can occur when loading a [`ParticleTemplateAsset`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ParticleTemplateAssetLoaderError {
    /// An I/O error occurred while reading the asset file.
    #[error("Could not load asset: {0}")]
    Io(#[from] std::io::Error),
    /// The asset file contained invalid RON syntax.
    #[error("Could not parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
    /// The template was written by a later release.
    #[error(
        "Template flurry_version \"{found}\" is newer than \"{current}\". You may need a newer version of Flurry."
    )]
    NewerVersion { found: String, current: &'static str },
    /// The template's `flurry_version` is not a known format version.
    #[error("Unrecognized flurry_version \"{0}\".")]
    UnknownVersion(String),
}

impl AssetLoader for ParticleTemplateAssetLoader {
    type Asset = ParticleTemplateAsset;
    type Settings = ();
    type Error = ParticleTemplateAssetLoaderError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &(),
        load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let mut asset = ron::de::from_bytes::<ParticleTemplateAsset>(&bytes)?;

        match asset.version_status() {
            VersionStatus::Current => {}
            VersionStatus::Newer { found } => {
                return Err(ParticleTemplateAssetLoaderError::NewerVersion {
                    found,
                    current: FORMAT_VERSION,
                });
            }
            VersionStatus::Unknown { found } => {
                return Err(ParticleTemplateAssetLoaderError::UnknownVersion(found));
            }
        }

        asset.emitter.sort_bursts();
        if let Some(path) = asset.emitter.texture_path.clone() {
            asset.emitter.texture = Some(load_context.load(path));
        }

        Ok(asset)
    }

    fn extensions(&self) -> &[&str] {
        &["ron"]
    }
}

/// A burst of particles emitted once per loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstEntry {
    /// When the burst fires, as a fraction of [`EmitterTemplate::loop_duration`].
    pub time_fraction: f32,
    /// How many particles the burst emits.
    pub amount: Variation<i32>,
}

impl BurstEntry {
    pub fn new(time_fraction: f32, amount: Variation<i32>) -> Self {
        Self {
            time_fraction: time_fraction.clamp(0.0, 1.0),
            amount,
        }
    }
}

/// Splits a texture into sub-images for UV animation: `cols` cells along X and
/// `rows` along Y.
///
/// Particles animate from the top-left cell to the bottom-right cell over their
/// lifetime. A zero dimension disables UV animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubImageGrid {
    pub cols: u32,
    pub rows: u32,
}

impl SubImageGrid {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    /// Number of sub-images. `0` when either dimension is zero or the grid is too
    /// large to count.
    pub fn cell_count(&self) -> u32 {
        self.cols.checked_mul(self.rows).unwrap_or(0)
    }

    /// Size of one cell in UV space. A zero dimension counts as `1`.
    pub fn tiling(&self) -> Vec2 {
        Vec2::new(
            1.0 / self.cols.max(1) as f32,
            1.0 / self.rows.max(1) as f32,
        )
    }

    /// The first animation cell: the left column of the top row.
    pub fn first_cell(&self) -> UVec2 {
        UVec2::new(0, self.rows.saturating_sub(1))
    }

    /// The last animation cell: the right column of the bottom row.
    pub fn last_cell(&self) -> UVec2 {
        UVec2::new(self.cols.saturating_sub(1), 0)
    }

    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

fn default_loop_duration() -> f32 {
    1.0
}

fn default_spawn_rate() -> Variation<f32> {
    Variation::constant(10.0)
}

fn default_size() -> Variation<Vec2> {
    Variation::constant(Vec2::ONE)
}

fn default_color() -> Variation<Vec4> {
    Variation::constant(Vec4::ONE)
}

fn default_lifetime() -> Variation<f32> {
    Variation::constant(1.0)
}

fn default_pool_capacity() -> u32 {
    100
}

/// Complete configuration for a particle emitter.
///
/// Every per-particle property is a [`Variation`] sampled when the particle is
/// emitted. Rotations are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterTemplate {
    /// If `true`, particles follow the attach parent's movement.
    ///
    /// Defaults to `false`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub local_space: bool,
    /// Number of loops to run. `0` or less loops forever. Defaults to `0`.
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub loop_count: i32,
    /// Length of one loop in seconds. Defaults to `1.0`.
    #[serde(default = "default_loop_duration")]
    pub loop_duration: f32,
    /// Particles emitted per second. A negative sample disables rate emission.
    ///
    /// Defaults to a constant `10.0`.
    #[serde(default = "default_spawn_rate")]
    pub spawn_rate: Variation<f32>,
    /// Bursts emitted once per loop, ordered by [`BurstEntry::time_fraction`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bursts: Vec<BurstEntry>,
    /// Spawn offset relative to the emitter origin.
    #[serde(default)]
    pub initial_position: Variation<Vec2>,
    #[serde(default)]
    pub initial_rotation: Variation<f32>,
    /// Degrees per second.
    #[serde(default)]
    pub rotation_rate: Variation<f32>,
    #[serde(default = "default_size")]
    pub size_begin: Variation<Vec2>,
    #[serde(default = "default_size")]
    pub size_end: Variation<Vec2>,
    #[serde(default)]
    pub initial_velocity: Variation<Vec2>,
    /// Share of the attach parent's velocity added to world-space particles.
    ///
    /// Clamped to `0.0..=1.0` per component when the emitter is evaluated. Ignored in
    /// local space, where the full parent velocity applies. Defaults to [`Vec2::ZERO`].
    #[serde(default, skip_serializing_if = "is_zero_vec2")]
    pub inherit_velocity_ratio: Vec2,
    /// Linear RGBA color at birth. Defaults to opaque white.
    #[serde(default = "default_color")]
    pub color_begin: Variation<Vec4>,
    /// Linear RGBA color at death. Defaults to opaque white.
    #[serde(default = "default_color")]
    pub color_end: Variation<Vec4>,
    /// Particle lifetime in seconds. Defaults to a constant `1.0`.
    #[serde(default = "default_lifetime")]
    pub lifetime: Variation<f32>,
    /// Asset path of the particle texture, resolved into [`texture`](Self::texture)
    /// by the loader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_path: Option<String>,
    /// The particle texture. Particles are drawn as flat-colored quads without one.
    #[serde(skip)]
    pub texture: Option<Handle<Image>>,
    #[serde(default, skip_serializing_if = "SubImageGrid::is_default")]
    pub sub_image_grid: SubImageGrid,
    /// Maximum number of live particles. Fixed once an instance is created.
    ///
    /// Defaults to `100`.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: u32,
}

impl Default for EmitterTemplate {
    fn default() -> Self {
        Self {
            local_space: false,
            loop_count: 0,
            loop_duration: default_loop_duration(),
            spawn_rate: default_spawn_rate(),
            bursts: Vec::new(),
            initial_position: Variation::default(),
            initial_rotation: Variation::default(),
            rotation_rate: Variation::default(),
            size_begin: default_size(),
            size_end: default_size(),
            initial_velocity: Variation::default(),
            inherit_velocity_ratio: Vec2::ZERO,
            color_begin: default_color(),
            color_end: default_color(),
            lifetime: default_lifetime(),
            texture_path: None,
            texture: None,
            sub_image_grid: SubImageGrid::default(),
            pool_capacity: default_pool_capacity(),
        }
    }
}

impl EmitterTemplate {
    /// Adds a burst of a constant `amount` at `time_fraction` of the loop.
    pub fn add_burst(&mut self, time_fraction: f32, amount: i32) {
        self.push_burst(BurstEntry::new(time_fraction, Variation::constant(amount)));
    }

    /// Adds a burst whose amount is sampled between `low` and `high`.
    pub fn add_random_burst(&mut self, time_fraction: f32, low: i32, high: i32) {
        self.push_burst(BurstEntry::new(time_fraction, Variation::random(low, high)));
    }

    fn push_burst(&mut self, burst: BurstEntry) {
        let index = self
            .bursts
            .partition_point(|b| b.time_fraction <= burst.time_fraction);
        self.bursts.insert(index, burst);
    }

    /// Restores burst ordering after the list was edited directly.
    pub fn sort_bursts(&mut self) {
        self.bursts
            .sort_by(|a, b| a.time_fraction.total_cmp(&b.time_fraction));
    }

    /// Returns `true` if the template loops forever.
    pub fn is_infinite_loop(&self) -> bool {
        self.loop_count <= 0
    }
}

/// A particle emitter template asset, loadable from RON files.
///
/// Reference it from a [`ParticleEmitter`](crate::ParticleEmitter) component to spawn
/// an emitter instance.
#[derive(Asset, TypePath, Debug, Clone, Serialize, Deserialize)]
pub struct ParticleTemplateAsset {
    flurry_version: String,
    /// Display name for this template.
    pub name: String,
    /// The emitter configuration.
    pub emitter: EmitterTemplate,
}

impl ParticleTemplateAsset {
    /// Creates a new template asset with the current format version.
    pub fn new(name: String, emitter: EmitterTemplate) -> Self {
        Self {
            flurry_version: FORMAT_VERSION.to_string(),
            name,
            emitter,
        }
    }

    pub fn version(&self) -> &str {
        &self.flurry_version
    }

    pub fn version_status(&self) -> VersionStatus {
        versioning::validate_version(&self.flurry_version)
    }
}
