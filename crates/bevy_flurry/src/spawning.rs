use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use bevy::prelude::*;

use crate::{
    asset::ParticleTemplateAsset,
    instance::{EmitterAnchor, ParticleSystemInstance, Placement},
    manager::{InstanceId, ParticleManager},
    random::ParticleRng,
    render::QuadBatch,
};

/// Spawns a particle system from a template once the template asset is loaded.
#[derive(Component, Debug, Clone)]
pub struct ParticleEmitter {
    pub template: Handle<ParticleTemplateAsset>,
    /// Release the system once it finishes. Defaults to `true`.
    pub auto_destroy: bool,
    /// Follow the entity's transform. When `false`, particles spawn at the
    /// entity's position at setup time. Defaults to `true`.
    pub attach: bool,
}

impl ParticleEmitter {
    pub fn new(template: Handle<ParticleTemplateAsset>) -> Self {
        Self {
            template,
            auto_destroy: true,
            attach: true,
        }
    }

    pub fn with_auto_destroy(mut self, auto_destroy: bool) -> Self {
        self.auto_destroy = auto_destroy;
        self
    }

    pub fn detached(mut self) -> Self {
        self.attach = false;
        self
    }
}

/// Links an emitter entity to its instance in the [`ParticleManager`].
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterInstance(pub InstanceId);

/// Keeps the entity's [`EmitterAnchor`] alive; dropping it detaches the instance.
#[derive(Component)]
pub struct EmitterAnchorHandle(pub Arc<EmitterAnchor>);

/// Marks an emitter entity whose particle system has finished.
#[derive(Component, Debug, Default)]
pub struct EmitterFinished;

/// Runtime configuration for particle simulation.
#[derive(Resource, Debug, Clone)]
pub struct ParticleSettings {
    /// Upper bound for the frame delta fed to the simulation, in seconds.
    pub max_frame_delta: f32,
    /// Seed for every emitter's random source. Each entity derives its own seed
    /// from it, so runs are repeatable. `None` seeds from the OS.
    pub fixed_seed: Option<u64>,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            max_frame_delta: 0.1,
            fixed_seed: None,
        }
    }
}

/// Entities whose particle system fired its finished callback this frame.
#[derive(Resource, Default, Clone)]
pub struct FinishedEmitters(Arc<Mutex<Vec<Entity>>>);

impl FinishedEmitters {
    fn push(&self, entity: Entity) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entity);
    }

    fn drain(&self) -> Vec<Entity> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[derive(Resource, Default)]
pub struct EmitterLinks(HashMap<Entity, InstanceId>);

impl EmitterLinks {
    pub fn get(&self, entity: Entity) -> Option<InstanceId> {
        self.0.get(&entity).copied()
    }
}

pub fn setup_particle_emitters(
    mut commands: Commands,
    query: Query<
        (Entity, &ParticleEmitter, Option<&GlobalTransform>),
        (Without<EmitterInstance>, Without<EmitterFinished>),
    >,
    assets: Res<Assets<ParticleTemplateAsset>>,
    settings: Res<ParticleSettings>,
    finished: Res<FinishedEmitters>,
    mut links: ResMut<EmitterLinks>,
    mut manager: ResMut<ParticleManager>,
) {
    for (entity, emitter, transform) in query.iter() {
        let Some(asset) = assets.get(&emitter.template) else {
            continue;
        };

        let position = transform
            .map(|t| t.translation().truncate())
            .unwrap_or(Vec2::ZERO);
        let rng = ParticleRng::new(settings.fixed_seed.map(|seed| seed ^ entity.to_bits()));

        let mut entity_commands = commands.entity(entity);
        let placement = if emitter.attach {
            let anchor = Arc::new(EmitterAnchor::new(position));
            let placement = Placement::attached(&anchor);
            entity_commands.insert(EmitterAnchorHandle(anchor));
            placement
        } else {
            Placement::at(position)
        };

        let mut instance = ParticleSystemInstance::with_rng(
            asset.emitter.clone(),
            placement,
            emitter.auto_destroy,
            rng,
        );
        let queue = FinishedEmitters::clone(&finished);
        instance.set_on_finished(move || queue.push(entity));

        let id = manager.add(instance);
        links.0.insert(entity, id);
        entity_commands.insert(EmitterInstance(id));
        debug!("{entity}: spawned particle system \"{}\" as {id:?}", asset.name);
    }
}

pub fn sync_emitter_anchors(
    time: Res<Time>,
    query: Query<(&GlobalTransform, &EmitterAnchorHandle)>,
) {
    let delta = time.delta_secs();
    for (transform, anchor) in query.iter() {
        anchor.0.move_to(transform.translation().truncate(), delta);
    }
}

pub fn update_particle_systems(
    time: Res<Time>,
    settings: Res<ParticleSettings>,
    mut manager: ResMut<ParticleManager>,
) {
    let delta = time.delta_secs().min(settings.max_frame_delta);
    manager.update(delta);
}

pub fn reevaluate_modified_templates(
    mut events: MessageReader<AssetEvent<ParticleTemplateAsset>>,
    assets: Res<Assets<ParticleTemplateAsset>>,
    query: Query<(&ParticleEmitter, &EmitterInstance)>,
    mut manager: ResMut<ParticleManager>,
) {
    for event in events.read() {
        let AssetEvent::Modified { id } = event else {
            continue;
        };
        let Some(asset) = assets.get(*id) else {
            continue;
        };

        for (emitter, instance) in query.iter() {
            if emitter.template.id() != *id {
                continue;
            }
            if let Some(system) = manager.get_mut(instance.0) {
                system.set_template(asset.emitter.clone());
            }
        }
    }
}

pub fn render_particle_systems(
    mut manager: ResMut<ParticleManager>,
    mut batch: ResMut<QuadBatch>,
) {
    batch.clear();
    manager.render(&mut *batch);
}

pub fn mark_finished_emitters(
    mut commands: Commands,
    finished: Res<FinishedEmitters>,
    mut links: ResMut<EmitterLinks>,
) {
    for entity in finished.drain() {
        // emitters removed earlier were already unlinked by cleanup
        if links.0.remove(&entity).is_none() {
            continue;
        }
        if let Ok(mut entity_commands) = commands.get_entity(entity) {
            entity_commands
                .remove::<(EmitterInstance, EmitterAnchorHandle)>()
                .insert(EmitterFinished);
        }
    }
}

pub fn cleanup_particle_emitters(
    mut commands: Commands,
    mut removed: RemovedComponents<ParticleEmitter>,
    mut links: ResMut<EmitterLinks>,
    mut manager: ResMut<ParticleManager>,
) {
    for entity in removed.read() {
        let Some(id) = links.0.remove(&entity) else {
            continue;
        };

        // let live particles fade out instead of vanishing
        if let Some(instance) = manager.get_mut(id) {
            instance.deactivate();
            instance.set_auto_destroy(true);
        }

        if let Ok(mut entity_commands) = commands.get_entity(entity) {
            entity_commands.remove::<(EmitterInstance, EmitterAnchorHandle)>();
        }
    }
}
