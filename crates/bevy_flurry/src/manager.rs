use bevy::prelude::*;

use crate::{instance::ParticleSystemInstance, render::QuadRenderer};

/// Identifies a [`ParticleSystemInstance`] owned by a [`ParticleManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

/// Owns particle system instances and drives them each frame.
///
/// Instances are updated and rendered in insertion order. Finished instances are
/// released on the update after they reach [`SystemState::PendingDestroy`](crate::SystemState::PendingDestroy).
#[derive(Resource, Default)]
pub struct ParticleManager {
    systems: Vec<(InstanceId, ParticleSystemInstance)>,
    next_id: u64,
}

impl ParticleManager {
    /// Takes ownership of `instance` and returns its id.
    pub fn add(&mut self, instance: ParticleSystemInstance) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        self.systems.push((id, instance));
        id
    }

    pub fn get(&self, id: InstanceId) -> Option<&ParticleSystemInstance> {
        self.systems
            .iter()
            .find(|(other, _)| *other == id)
            .map(|(_, instance)| instance)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut ParticleSystemInstance> {
        self.systems
            .iter_mut()
            .find(|(other, _)| *other == id)
            .map(|(_, instance)| instance)
    }

    /// Releases an instance immediately, returning it to the caller.
    pub fn remove(&mut self, id: InstanceId) -> Option<ParticleSystemInstance> {
        let index = self.systems.iter().position(|(other, _)| *other == id)?;
        Some(self.systems.remove(index).1)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &ParticleSystemInstance)> {
        self.systems.iter().map(|(id, instance)| (*id, instance))
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Total live particles across every instance.
    pub fn active_particle_count(&self) -> usize {
        self.systems
            .iter()
            .map(|(_, instance)| instance.active_count())
            .sum()
    }

    /// Releases finished instances and advances the rest by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        self.systems.retain_mut(|(id, instance)| {
            if instance.is_pending_destroy() {
                debug!("releasing finished particle system {id:?}");
                return false;
            }
            instance.update(dt);
            true
        });
    }

    pub fn render<R: QuadRenderer + ?Sized>(&mut self, renderer: &mut R) {
        for (_, instance) in &mut self.systems {
            instance.render(renderer);
        }
    }

    /// Releases every instance.
    pub fn clear(&mut self) {
        self.systems.clear();
    }
}
