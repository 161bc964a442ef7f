#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bevy::asset::{AssetPlugin, AssetServer, LoadState};
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy_flurry::asset::ParticleTemplateAssetLoader;
use bevy_flurry::prelude::*;
use bevy_flurry::spawning::{EmitterLinks, FinishedEmitters};

pub const FRAME: f32 = 1.0 / 60.0;

pub fn fixtures_path() -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .to_string_lossy()
        .to_string()
}

/// Always returns the same value, so every range samples to the same point.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f32);

impl RandomSource for FixedRandom {
    fn random_float(&mut self) -> f32 {
        self.0
    }
}

/// Cycles through a list of values.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f32>,
    next: usize,
}

impl SequenceRandom {
    pub fn new(values: &[f32]) -> Self {
        Self {
            values: values.to_vec(),
            next: 0,
        }
    }
}

impl RandomSource for SequenceRandom {
    fn random_float(&mut self) -> f32 {
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}

/// A template that emits nothing unless the test adds bursts or a spawn rate.
pub fn quiet_template() -> EmitterTemplate {
    EmitterTemplate {
        spawn_rate: Variation::constant(0.0),
        ..default()
    }
}

pub fn burst_template(amount: i32, lifetime: f32, loop_count: i32) -> EmitterTemplate {
    let mut template = EmitterTemplate {
        loop_count,
        lifetime: Variation::constant(lifetime),
        ..quiet_template()
    };
    template.add_burst(0.0, amount);
    template
}

pub fn spawn_instance(template: EmitterTemplate, auto_destroy: bool) -> ParticleSystemInstance {
    ParticleSystemInstance::with_rng(
        template,
        Placement::at(Vec2::ZERO),
        auto_destroy,
        FixedRandom(0.5),
    )
}

/// Renders once so the simulation clock starts.
pub fn start(instance: &mut ParticleSystemInstance) -> QuadBatch {
    let mut batch = QuadBatch::default();
    instance.render(&mut batch);
    batch
}

/// Alternates render and update, like a frame loop.
pub fn run_frames(instance: &mut ParticleSystemInstance, frames: u32, dt: f32) {
    let mut batch = QuadBatch::default();
    for _ in 0..frames {
        batch.clear();
        instance.render(&mut batch);
        instance.update(dt);
    }
}

pub fn anchor_at(position: Vec2) -> Arc<EmitterAnchor> {
    Arc::new(EmitterAnchor::new(position))
}

pub fn create_minimal_app() -> App {
    let mut app = App::new();

    app.add_plugins(
        MinimalPlugins.set(bevy::app::ScheduleRunnerPlugin::run_loop(
            Duration::from_millis(10),
        )),
    );

    app.add_plugins(AssetPlugin {
        file_path: fixtures_path(),
        ..default()
    });

    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(
        16,
    )));

    app.init_asset::<Image>()
        .init_asset::<ParticleTemplateAsset>()
        .init_asset_loader::<ParticleTemplateAssetLoader>();

    app.insert_resource(ParticleSettings {
        fixed_seed: Some(7),
        ..default()
    })
    .init_resource::<ParticleManager>()
    .init_resource::<QuadBatch>()
    .init_resource::<FinishedEmitters>()
    .init_resource::<EmitterLinks>();

    app.add_systems(
        Update,
        (
            bevy_flurry::spawning::setup_particle_emitters,
            bevy_flurry::spawning::sync_emitter_anchors,
            bevy_flurry::spawning::reevaluate_modified_templates,
            bevy_flurry::spawning::update_particle_systems,
            bevy_flurry::spawning::mark_finished_emitters,
            bevy_flurry::spawning::cleanup_particle_emitters,
        )
            .chain(),
    );
    app.add_systems(PostUpdate, bevy_flurry::spawning::render_particle_systems);

    app
}

pub fn load_fixture(app: &mut App, filename: &str) -> Handle<ParticleTemplateAsset> {
    let asset_server = app.world().resource::<AssetServer>();
    asset_server.load(filename.to_string())
}

pub fn run_until_loaded<T: Asset>(app: &mut App, handle: &Handle<T>, max_updates: u32) -> bool {
    for _ in 0..max_updates {
        app.update();

        let asset_server = app.world().resource::<AssetServer>();
        match asset_server.load_state(handle) {
            LoadState::Loaded => return true,
            LoadState::Failed(_) => return false,
            _ => continue,
        }
    }
    false
}

pub fn load_asset(app: &mut App, fixture: &str) -> ParticleTemplateAsset {
    let handle = load_fixture(app, fixture);
    for _ in 0..100 {
        app.update();
        let asset_server = app.world().resource::<AssetServer>();
        match asset_server.load_state(&handle) {
            LoadState::Loaded => {
                let assets = app.world().resource::<Assets<ParticleTemplateAsset>>();
                return assets.get(&handle).expect("asset should exist").clone();
            }
            LoadState::Failed(err) => {
                panic!("fixture failed to load '{fixture}': {err:?}");
            }
            _ => continue,
        }
    }
    panic!("fixture timed out loading: {fixture}");
}

/// Loads a fixture that is expected to fail and returns the error message.
pub fn load_failure(app: &mut App, fixture: &str) -> String {
    let handle = load_fixture(app, fixture);
    for _ in 0..100 {
        app.update();
        let asset_server = app.world().resource::<AssetServer>();
        match asset_server.load_state(&handle) {
            LoadState::Failed(err) => return err.to_string(),
            LoadState::Loaded => panic!("fixture '{fixture}' should fail to load"),
            _ => continue,
        }
    }
    panic!("fixture timed out loading: {fixture}");
}

pub fn setup_loaded_emitter(
    fixture: &str,
    emitter: impl FnOnce(Handle<ParticleTemplateAsset>) -> ParticleEmitter,
) -> (App, Handle<ParticleTemplateAsset>, Entity) {
    let mut app = create_minimal_app();
    let handle = load_fixture(&mut app, fixture);
    let entity = app
        .world_mut()
        .spawn((emitter(handle.clone()), Transform::default()))
        .id();
    assert!(
        run_until_loaded(&mut app, &handle, 100),
        "fixture should load"
    );
    advance_frames(&mut app, 2);
    (app, handle, entity)
}

pub fn advance_frames(app: &mut App, n: u32) {
    for _ in 0..n {
        app.update();
    }
}

pub fn instance_of(app: &App, entity: Entity) -> Option<InstanceId> {
    app.world().get::<EmitterInstance>(entity).map(|i| i.0)
}
