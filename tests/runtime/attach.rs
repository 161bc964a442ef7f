use std::sync::Arc;

use super::helpers::*;

use bevy::prelude::*;
use bevy_flurry::prelude::*;

fn attached_instance(
    template: EmitterTemplate,
    anchor: &Arc<EmitterAnchor>,
) -> ParticleSystemInstance {
    ParticleSystemInstance::with_rng(
        template,
        Placement::attached(anchor),
        false,
        FixedRandom(0.5),
    )
}

#[test]
fn particles_spawn_at_parent_position() {
    let anchor = anchor_at(Vec2::new(10.0, -4.0));
    let mut instance = attached_instance(burst_template(1, 10.0, 0), &anchor);
    assert!(instance.is_attached());
    start(&mut instance);
    instance.update(FRAME);

    let particle = instance.active_particles().next().expect("one particle");
    assert_eq!(particle.position, Vec2::new(10.0, -4.0));
}

#[test]
fn spawn_origin_offsets_parent_position() {
    let anchor = anchor_at(Vec2::new(1.0, 1.0));
    let mut instance = ParticleSystemInstance::with_rng(
        burst_template(1, 10.0, 0),
        Placement::attached(&anchor).with_origin(Vec2::new(2.0, 3.0)),
        false,
        FixedRandom(0.5),
    );
    start(&mut instance);
    instance.update(FRAME);

    let particle = instance.active_particles().next().expect("one particle");
    assert_eq!(particle.position, Vec2::new(3.0, 4.0));
}

#[test]
fn dropped_parent_detaches_silently() {
    let anchor = anchor_at(Vec2::new(10.0, 0.0));
    let mut instance = attached_instance(burst_template(0, 10.0, 0), &anchor);
    instance.set_spawn_origin(Some(Vec2::new(-1.0, 0.0)));

    drop(anchor);
    assert!(!instance.is_attached());

    start(&mut instance);
    instance.update(FRAME);
    assert!(instance.emit());
    let particle = instance.active_particles().next().expect("one particle");
    assert_eq!(particle.position, Vec2::new(-1.0, 0.0));
}

#[test]
fn local_space_follows_parent_velocity() {
    let anchor = anchor_at(Vec2::ZERO);
    anchor.set(Vec2::ZERO, Vec2::new(6.0, 0.0));

    let template = EmitterTemplate {
        local_space: true,
        ..burst_template(1, 10.0, 0)
    };
    let mut instance = attached_instance(template, &anchor);
    start(&mut instance);
    instance.update(0.5);

    let particle = instance.active_particles().next().expect("one particle");
    assert_eq!(particle.position, Vec2::new(3.0, 0.0));
}

#[test]
fn world_space_inherits_a_share_of_velocity() {
    let anchor = anchor_at(Vec2::ZERO);
    anchor.set(Vec2::ZERO, Vec2::new(6.0, 4.0));

    let template = EmitterTemplate {
        inherit_velocity_ratio: Vec2::new(0.5, 2.0),
        ..burst_template(1, 10.0, 0)
    };
    let mut instance = attached_instance(template, &anchor);
    start(&mut instance);
    instance.update(0.5);

    // the y ratio is clamped to 1
    let particle = instance.active_particles().next().expect("one particle");
    assert_eq!(particle.position, Vec2::new(1.5, 2.0));
}

#[test]
fn world_space_ignores_parent_without_ratio() {
    let anchor = anchor_at(Vec2::ZERO);
    anchor.set(Vec2::ZERO, Vec2::new(6.0, 4.0));

    let mut instance = attached_instance(burst_template(1, 10.0, 0), &anchor);
    start(&mut instance);
    instance.update(0.5);

    let particle = instance.active_particles().next().expect("one particle");
    assert_eq!(particle.position, Vec2::ZERO);
}

#[test]
fn reattach_and_detach() {
    let first = anchor_at(Vec2::new(1.0, 0.0));
    let second = anchor_at(Vec2::new(0.0, 5.0));
    let mut instance = attached_instance(burst_template(0, 10.0, 0), &first);

    instance.attach_to(&second);
    assert!(instance.emit());
    assert_eq!(
        instance.active_particles().next().map(|p| p.position),
        Some(Vec2::new(0.0, 5.0))
    );

    instance.detach();
    assert!(!instance.is_attached());
}
