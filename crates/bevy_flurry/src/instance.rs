use std::sync::{Arc, PoisonError, RwLock, Weak};

use bevy::prelude::*;

use crate::{
    asset::EmitterTemplate,
    random::{ParticleRng, RandomSource},
    render::{QuadInstance, QuadRenderer},
};

/// Something a particle system can be attached to.
///
/// Instances hold a [`Weak`] reference to their parent; once the parent is dropped
/// the instance keeps running as if it were unattached.
pub trait AttachParent: Send + Sync {
    /// Current world position.
    fn position(&self) -> Vec2;
    /// Current velocity in units per second.
    fn velocity(&self) -> Vec2;
}

#[derive(Debug, Default, Clone, Copy)]
struct AnchorState {
    position: Vec2,
    velocity: Vec2,
}

/// A thread-safe [`AttachParent`] whose position is pushed in from outside,
/// typically once per frame from an entity's transform.
#[derive(Debug, Default)]
pub struct EmitterAnchor {
    state: RwLock<AnchorState>,
}

impl EmitterAnchor {
    pub fn new(position: Vec2) -> Self {
        Self {
            state: RwLock::new(AnchorState {
                position,
                velocity: Vec2::ZERO,
            }),
        }
    }

    pub fn set(&self, position: Vec2, velocity: Vec2) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = AnchorState { position, velocity };
    }

    /// Moves the anchor, deriving its velocity from the distance covered in `dt`.
    pub fn move_to(&self, position: Vec2, dt: f32) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.velocity = if dt > 0.0 {
            (position - state.position) / dt
        } else {
            Vec2::ZERO
        };
        state.position = position;
    }

    fn read(&self) -> AnchorState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttachParent for EmitterAnchor {
    fn position(&self) -> Vec2 {
        self.read().position
    }

    fn velocity(&self) -> Vec2 {
        self.read().velocity
    }
}

/// Where emitted particles originate.
#[derive(Clone, Default)]
pub struct Placement {
    /// Particles spawn relative to this parent's position and inherit its velocity.
    pub parent: Option<Weak<dyn AttachParent>>,
    /// Fixed world-space offset added to every spawn position.
    pub spawn_origin: Option<Vec2>,
}

impl Placement {
    /// Spawn at a fixed world-space position.
    pub fn at(origin: Vec2) -> Self {
        Self {
            parent: None,
            spawn_origin: Some(origin),
        }
    }

    /// Follow `parent` without keeping it alive.
    pub fn attached<P: AttachParent + 'static>(parent: &Arc<P>) -> Self {
        let parent: Weak<dyn AttachParent> = Arc::downgrade(parent);
        Self {
            parent: Some(parent),
            spawn_origin: None,
        }
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.spawn_origin = Some(origin);
        self
    }
}

/// One slot of a particle pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    /// Degrees.
    pub rotation: f32,
    /// Degrees per second.
    pub rotation_rate: f32,
    pub size_begin: Vec2,
    pub size_end: Vec2,
    pub size: Vec2,
    pub velocity: Vec2,
    pub color_begin: Vec4,
    pub color_end: Vec4,
    pub color: Vec4,
    pub lifetime: f32,
    pub life_remaining: f32,
    /// Current sub-image cell.
    pub uv_offset: UVec2,
    pub active: bool,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            rotation_rate: 0.0,
            size_begin: Vec2::ONE,
            size_end: Vec2::ONE,
            size: Vec2::ONE,
            velocity: Vec2::ZERO,
            color_begin: Vec4::ONE,
            color_end: Vec4::ONE,
            color: Vec4::ONE,
            lifetime: 1.0,
            life_remaining: 1.0,
            uv_offset: UVec2::ZERO,
            active: false,
        }
    }
}

/// Lifecycle state of a [`ParticleSystemInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Created but never rendered. Simulation time does not advance yet.
    Fresh,
    /// Emitting and simulating.
    Active,
    /// Emission stopped; live particles keep aging.
    Paused,
    /// Finished. Every call is a no-op until the owner releases it.
    PendingDestroy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BurstState {
    time_fraction: f32,
    amount: i32,
    processed: bool,
}

/// A running particle emitter with a fixed-capacity particle pool.
///
/// Drive it with [`update`](Self::update) and [`render`](Self::render) once per frame.
/// Nothing is simulated until the first render call.
pub struct ParticleSystemInstance {
    template: EmitterTemplate,
    pool: Box<[Particle]>,
    cursor: usize,
    rng: Box<dyn RandomSource>,

    elapsed: f32,
    loop_start_time: f32,
    spawn_time: f32,
    burst_time: f32,
    uv_anim_time: f32,
    // drifts below zero for infinite loops; `infinite_loop` gates emission instead
    loop_count_remaining: i32,
    infinite_loop: bool,

    spawn_rate: f32,
    bursts: Vec<BurstState>,
    uv_tiling: Vec2,
    uv_anim_interval: f32,
    inherit_velocity_ratio: Vec2,

    active: bool,
    started_rendering: bool,
    system_complete: bool,
    pending_destroy: bool,
    frozen: bool,
    auto_destroy: bool,
    saturated: bool,

    parent: Option<Weak<dyn AttachParent>>,
    spawn_origin: Option<Vec2>,
    on_finished: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ParticleSystemInstance {
    /// Creates an instance sampling from an OS-seeded [`ParticleRng`].
    pub fn new(template: EmitterTemplate, placement: Placement, auto_destroy: bool) -> Self {
        Self::with_rng(template, placement, auto_destroy, ParticleRng::default())
    }

    pub fn with_rng(
        template: EmitterTemplate,
        placement: Placement,
        auto_destroy: bool,
        rng: impl RandomSource + 'static,
    ) -> Self {
        let capacity = template.pool_capacity as usize;
        if capacity == 0 {
            warn!("particle system created with a pool capacity of 0, nothing will be emitted");
        }

        let loop_count = template.loop_count;
        let mut instance = Self {
            pool: vec![Particle::default(); capacity].into_boxed_slice(),
            cursor: capacity.saturating_sub(1),
            rng: Box::new(rng),
            elapsed: 0.0,
            loop_start_time: 0.0,
            spawn_time: 0.0,
            burst_time: 0.0,
            uv_anim_time: 0.0,
            loop_count_remaining: loop_count,
            infinite_loop: loop_count <= 0,
            spawn_rate: 0.0,
            bursts: Vec::new(),
            uv_tiling: Vec2::ONE,
            uv_anim_interval: 0.0,
            inherit_velocity_ratio: Vec2::ZERO,
            active: false,
            started_rendering: false,
            system_complete: false,
            pending_destroy: false,
            frozen: false,
            auto_destroy,
            saturated: false,
            parent: placement.parent,
            spawn_origin: placement.spawn_origin,
            on_finished: None,
            template,
        };
        instance.evaluate_emitter_properties();
        instance.activate();

        debug!(
            "created particle system: capacity {capacity}, loop count {loop_count}, spawn rate {}",
            instance.spawn_rate
        );
        instance
    }

    /// Resamples the emitter-level values (spawn rate, burst amounts, UV tiling) from
    /// the template.
    pub fn evaluate_emitter_properties(&mut self) {
        let rng = &mut *self.rng;

        self.spawn_rate = self.template.spawn_rate.evaluate(rng).max(0.0);
        self.bursts = self
            .template
            .bursts
            .iter()
            .map(|burst| BurstState {
                time_fraction: burst.time_fraction,
                amount: burst.amount.evaluate(rng),
                processed: false,
            })
            .collect();

        let grid = self.template.sub_image_grid;
        if grid.cell_count() == 0 && (grid.cols != 0 || grid.rows != 0) {
            warn!(
                "sub-image grid {}x{} has no usable cells, UV animation disabled",
                grid.cols, grid.rows
            );
        }
        self.uv_tiling = grid.tiling();
        self.inherit_velocity_ratio = self
            .template
            .inherit_velocity_ratio
            .clamp(Vec2::ZERO, Vec2::ONE);
        self.infinite_loop = self.template.is_infinite_loop();
    }

    /// Starts emitting again after [`deactivate`](Self::deactivate), restarting the loop.
    pub fn activate(&mut self) {
        if self.pending_destroy || self.active {
            return;
        }
        self.active = true;
        self.restart_loop();
    }

    /// Stops emitting. Live particles keep aging until they expire.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Restarts the loop schedule without touching live particles.
    pub fn resimulate(&mut self) {
        self.restart_loop();
    }

    /// Resamples the emitter properties and restarts the loop schedule.
    pub fn reevaluate(&mut self) {
        self.evaluate_emitter_properties();
        self.resimulate();
    }

    /// Replaces the template after an external edit and reevaluates.
    ///
    /// The pool keeps the capacity it was created with.
    pub fn set_template(&mut self, template: EmitterTemplate) {
        if template.pool_capacity as usize != self.pool.len() {
            debug!(
                "ignoring pool capacity change {} -> {} on a live particle system",
                self.pool.len(),
                template.pool_capacity
            );
        }
        self.template = template;
        self.reevaluate();
    }

    fn restart_loop(&mut self) {
        self.loop_count_remaining = self.template.loop_count;
        self.elapsed = 0.0;
        self.loop_start_time = 0.0;
        self.spawn_time = 0.0;
        self.burst_time = 0.0;
        self.uv_anim_time = 0.0;
        for burst in &mut self.bursts {
            burst.processed = false;
        }
    }

    /// Suspends the whole simulation: no timer advances and no particle ages.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn toggle_freeze(&mut self) {
        self.frozen = !self.frozen;
    }

    /// Registers the callback fired when the system finishes under auto-destroy.
    pub fn set_on_finished(&mut self, callback: impl FnOnce() + Send + Sync + 'static) {
        self.on_finished = Some(Box::new(callback));
    }

    pub fn attach_to<P: AttachParent + 'static>(&mut self, parent: &Arc<P>) {
        self.parent = Placement::attached(parent).parent;
    }

    pub fn detach(&mut self) {
        self.parent = None;
    }

    pub fn set_spawn_origin(&mut self, origin: Option<Vec2>) {
        self.spawn_origin = origin;
    }

    pub fn set_auto_destroy(&mut self, auto_destroy: bool) {
        self.auto_destroy = auto_destroy;
    }

    /// Advances the simulation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if self.pending_destroy || !self.started_rendering || self.frozen {
            return;
        }

        self.elapsed += dt;
        if self.active {
            self.update_emission(dt);
        }

        let any_active = self.age_particles(dt);
        self.system_complete = !any_active && (self.is_loop_exhausted() || !self.active);

        if self.auto_destroy && self.system_complete {
            self.pending_destroy = true;
            debug!("particle system finished after {:.2}s", self.elapsed);
            if let Some(on_finished) = self.on_finished.take() {
                on_finished();
            }
        }
    }

    fn update_emission(&mut self, dt: f32) {
        let loop_duration = self.template.loop_duration;

        if self.elapsed - self.loop_start_time >= loop_duration {
            self.loop_count_remaining = self.loop_count_remaining.saturating_sub(1);
            self.loop_start_time = self.elapsed;
            self.burst_time = self.elapsed;
            self.restart_bursts();
            trace!("particle system loop boundary at {:.3}s", self.elapsed);
        }

        if self.is_loop_exhausted() {
            return;
        }

        if self.spawn_rate > 0.0
            && (self.spawn_time == 0.0 || self.elapsed - self.spawn_time > 1.0 / self.spawn_rate)
        {
            let count = (self.spawn_rate * dt).ceil() as u32;
            for _ in 0..count {
                if !self.emit() {
                    break;
                }
            }
            self.spawn_time = self.elapsed;
        }

        for index in 0..self.bursts.len() {
            let burst = self.bursts[index];
            if burst.processed || self.elapsed - self.burst_time < burst.time_fraction * loop_duration
            {
                continue;
            }
            self.bursts[index].processed = true;
            for _ in 0..burst.amount.max(0) {
                if !self.emit() {
                    break;
                }
            }
        }
    }

    fn restart_bursts(&mut self) {
        let rng = &mut *self.rng;
        for (state, burst) in self.bursts.iter_mut().zip(&self.template.bursts) {
            if !burst.amount.is_constant() {
                state.amount = burst.amount.evaluate(rng);
            }
        }
        for state in &mut self.bursts {
            state.processed = false;
        }
    }

    fn is_loop_exhausted(&self) -> bool {
        !self.infinite_loop && self.loop_count_remaining <= 0
    }

    fn parent(&self) -> Option<Arc<dyn AttachParent>> {
        self.parent.as_ref()?.upgrade()
    }

    fn inherited_velocity(&self) -> Vec2 {
        let Some(parent) = self.parent() else {
            return Vec2::ZERO;
        };
        if self.template.local_space {
            parent.velocity()
        } else {
            parent.velocity() * self.inherit_velocity_ratio
        }
    }

    /// Ages every live particle and returns whether any is still alive.
    fn age_particles(&mut self, dt: f32) -> bool {
        let inherited = self.inherited_velocity();
        let grid = self.template.sub_image_grid;
        let last_cell = grid.last_cell();
        let advance_uv = self.uv_anim_interval != 0.0
            && self.elapsed - self.uv_anim_time >= self.uv_anim_interval;

        let mut any_active = false;
        for particle in self.pool.iter_mut().filter(|p| p.active) {
            particle.life_remaining -= dt;
            if particle.life_remaining <= 0.0 {
                particle.active = false;
                continue;
            }

            particle.position += (particle.velocity + inherited) * dt;
            particle.rotation += particle.rotation_rate * dt;

            let ratio = particle.life_remaining / particle.lifetime;
            particle.size = particle.size_end.lerp(particle.size_begin, ratio);
            particle.color = particle.color_end.lerp(particle.color_begin, ratio);

            if advance_uv {
                if particle.uv_offset.x >= last_cell.x && particle.uv_offset.y == 0 {
                    particle.active = false;
                    continue;
                }
                particle.uv_offset.x += 1;
                if particle.uv_offset.x >= grid.cols {
                    particle.uv_offset.x = 0;
                    particle.uv_offset.y = particle.uv_offset.y.saturating_sub(1);
                }
            }

            any_active = true;
        }

        if advance_uv {
            self.uv_anim_time = self.elapsed;
        }
        any_active
    }

    /// Draws every live particle. The first call starts the simulation clock.
    pub fn render<R: QuadRenderer + ?Sized>(&mut self, renderer: &mut R) {
        if self.pending_destroy {
            return;
        }
        self.started_rendering = true;

        let texture = self.template.texture.as_ref();
        for particle in self.pool.iter().filter(|p| p.active) {
            let rotation = particle.rotation.to_radians();
            let quad = match texture {
                Some(_) => QuadInstance::textured(
                    particle.position,
                    particle.size,
                    rotation,
                    particle.color,
                    self.uv_tiling,
                    particle.uv_offset.as_vec2(),
                ),
                None => QuadInstance::flat(particle.position, particle.size, rotation, particle.color),
            };
            renderer.draw_quad(quad, texture);
        }
    }

    /// Activates one free pool slot with freshly sampled properties.
    ///
    /// Returns `false` without side effects when every slot is in use or the system
    /// is pending destruction.
    pub fn emit(&mut self) -> bool {
        let capacity = self.pool.len();
        if capacity == 0 || self.pending_destroy {
            return false;
        }

        let mut index = self.cursor;
        let mut found = None;
        for _ in 0..capacity {
            if !self.pool[index].active {
                found = Some(index);
                break;
            }
            index = previous_index(index, capacity);
        }

        let Some(index) = found else {
            if !self.saturated {
                self.saturated = true;
                debug!("particle pool saturated at {capacity} particles");
            }
            return false;
        };
        self.saturated = false;
        self.cursor = previous_index(index, capacity);

        let origin = self.emit_origin();
        let particle = self.sample_particle(origin);
        let cells = self.template.sub_image_grid.cell_count();
        self.uv_anim_interval = if cells == 0 {
            0.0
        } else {
            particle.lifetime / cells as f32
        };
        self.pool[index] = particle;
        true
    }

    fn emit_origin(&self) -> Vec2 {
        let parent = self.parent().map(|p| p.position()).unwrap_or(Vec2::ZERO);
        parent + self.spawn_origin.unwrap_or(Vec2::ZERO)
    }

    fn sample_particle(&mut self, origin: Vec2) -> Particle {
        let template = &self.template;
        let rng = &mut *self.rng;

        let size_begin = template.size_begin.evaluate(rng);
        let size_end = template.size_end.evaluate(rng);
        let color_begin = template.color_begin.evaluate(rng);
        let color_end = template.color_end.evaluate(rng);
        let lifetime = template.lifetime.evaluate(rng);

        Particle {
            position: origin + template.initial_position.evaluate(rng),
            rotation: template.initial_rotation.evaluate(rng),
            rotation_rate: template.rotation_rate.evaluate(rng),
            size_begin,
            size_end,
            size: size_begin,
            velocity: template.initial_velocity.evaluate(rng),
            color_begin,
            color_end,
            color: color_begin,
            lifetime,
            life_remaining: lifetime,
            uv_offset: template.sub_image_grid.first_cell(),
            active: true,
        }
    }

    pub fn state(&self) -> SystemState {
        if self.pending_destroy {
            SystemState::PendingDestroy
        } else if !self.started_rendering {
            SystemState::Fresh
        } else if self.active {
            SystemState::Active
        } else {
            SystemState::Paused
        }
    }

    pub fn template(&self) -> &EmitterTemplate {
        &self.template
    }

    /// Every pool slot, live or not.
    pub fn particles(&self) -> &[Particle] {
        &self.pool
    }

    pub fn active_particles(&self) -> impl Iterator<Item = &Particle> {
        self.pool.iter().filter(|p| p.active)
    }

    pub fn active_count(&self) -> usize {
        self.active_particles().count()
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool.len()
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn loop_start_time(&self) -> f32 {
        self.loop_start_time
    }

    pub fn spawn_time(&self) -> f32 {
        self.spawn_time
    }

    pub fn burst_time(&self) -> f32 {
        self.burst_time
    }

    pub fn loop_count_remaining(&self) -> i32 {
        self.loop_count_remaining
    }

    pub fn is_infinite_loop(&self) -> bool {
        self.infinite_loop
    }

    /// The sampled spawn rate, never negative.
    pub fn spawn_rate(&self) -> f32 {
        self.spawn_rate
    }

    /// The sampled amount of each burst, in template order.
    pub fn burst_amounts(&self) -> impl Iterator<Item = i32> + '_ {
        self.bursts.iter().map(|b| b.amount)
    }

    pub fn uv_tiling(&self) -> Vec2 {
        self.uv_tiling
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn has_started_rendering(&self) -> bool {
        self.started_rendering
    }

    pub fn is_system_complete(&self) -> bool {
        self.system_complete
    }

    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy
    }

    pub fn auto_destroy(&self) -> bool {
        self.auto_destroy
    }

    /// Returns `true` while the attach parent is set and still alive.
    pub fn is_attached(&self) -> bool {
        self.parent().is_some()
    }
}

fn previous_index(index: usize, capacity: usize) -> usize {
    (index + capacity - 1) % capacity
}
