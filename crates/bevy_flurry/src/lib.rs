//! **Flurry** is a CPU particle emitter system for the
//! [Bevy game engine](https://bevyengine.org/).
//!
//! Each emitter owns a fixed pool of short-lived 2D particles whose position,
//! velocity, size, color, rotation and lifetime are sampled from an
//! [`EmitterTemplate`]. Emission is scheduled by a spawn rate and a list of
//! bursts repeated every loop, and live particles are drawn as textured or
//! flat-colored quads.
//!
//! # Getting started
//!
//! Add [`FlurryPlugin`] to your app and spawn a [`ParticleEmitter`] pointing at a
//! template asset:
//!
//! ```no_run
//! use bevy::prelude::*;
//! use bevy_flurry::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins((DefaultPlugins, FlurryPlugin))
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(mut commands: Commands, asset_server: Res<AssetServer>) {
//!     commands.spawn((
//!         ParticleEmitter::new(asset_server.load("sparks.ron")),
//!         Transform::default(),
//!     ));
//! }
//! ```
//!
//! Every frame the quads of all live particles are collected into the
//! [`QuadBatch`] resource, ready for a render backend to upload.
//!
//! # Without the ECS
//!
//! [`ParticleSystemInstance`] and [`ParticleManager`] work on their own:
//!
//! ```
//! use bevy::math::Vec2;
//! use bevy_flurry::prelude::*;
//!
//! let mut template = EmitterTemplate::default();
//! template.spawn_rate = Variation::constant(0.0);
//! template.add_burst(0.0, 10);
//!
//! let mut manager = ParticleManager::default();
//! let id = manager.add(ParticleSystemInstance::new(
//!     template,
//!     Placement::at(Vec2::ZERO),
//!     true,
//! ));
//!
//! let mut batch = QuadBatch::default();
//! manager.render(&mut batch);
//! manager.update(1.0 / 60.0);
//! assert_eq!(manager.get(id).unwrap().active_count(), 10);
//! ```

pub mod asset;
pub mod instance;
pub mod manager;
pub mod prelude;
pub mod random;
pub mod render;
pub mod spawning;

use bevy::prelude::*;

use asset::ParticleTemplateAssetLoader;
use spawning::{
    EmitterLinks, FinishedEmitters, cleanup_particle_emitters, mark_finished_emitters,
    reevaluate_modified_templates, render_particle_systems, setup_particle_emitters,
    sync_emitter_anchors, update_particle_systems,
};

/// Registers the template asset, its loader, the particle resources and the
/// simulation systems.
pub struct FlurryPlugin;

impl Plugin for FlurryPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<ParticleTemplateAsset>()
            .init_asset_loader::<ParticleTemplateAssetLoader>();

        app.init_resource::<ParticleSettings>()
            .init_resource::<ParticleManager>()
            .init_resource::<QuadBatch>()
            .init_resource::<FinishedEmitters>()
            .init_resource::<EmitterLinks>();

        app.add_systems(
            Update,
            (
                setup_particle_emitters,
                sync_emitter_anchors,
                reevaluate_modified_templates,
                update_particle_systems,
                mark_finished_emitters,
                cleanup_particle_emitters,
            )
                .chain(),
        );

        app.add_systems(PostUpdate, render_particle_systems);
    }
}

pub use asset::{
    BurstEntry, EmitterTemplate, ParticleTemplateAsset, ParticleTemplateAssetLoaderError, Sample,
    SubImageGrid, Variation, VariationKind,
};
pub use instance::{
    AttachParent, EmitterAnchor, Particle, ParticleSystemInstance, Placement, SystemState,
};
pub use manager::{InstanceId, ParticleManager};
pub use random::{ParticleRng, RandomSource};
pub use render::{QuadBatch, QuadDrawBatch, QuadInstance, QuadRenderer};
pub use spawning::{
    EmitterAnchorHandle, EmitterFinished, EmitterInstance, ParticleEmitter, ParticleSettings,
};
