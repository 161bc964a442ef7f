use std::f32::consts::FRAC_PI_2;

use super::helpers::*;

use bevy::prelude::*;
use bevy_flurry::prelude::*;

#[derive(Default)]
struct Recorder {
    quads: Vec<(QuadInstance, bool)>,
}

impl QuadRenderer for Recorder {
    fn draw_quad(&mut self, quad: QuadInstance, texture: Option<&Handle<Image>>) {
        self.quads.push((quad, texture.is_some()));
    }
}

#[test]
fn first_render_starts_the_clock() {
    let mut instance = spawn_instance(burst_template(2, 1.0, 0), false);
    assert!(!instance.has_started_rendering());

    let mut recorder = Recorder::default();
    instance.render(&mut recorder);
    assert!(instance.has_started_rendering());
    assert!(recorder.quads.is_empty());
}

#[test]
fn flat_quads_without_texture() {
    let template = EmitterTemplate {
        initial_rotation: Variation::constant(90.0),
        color_begin: Variation::constant(Vec4::new(1.0, 0.0, 0.0, 1.0)),
        color_end: Variation::constant(Vec4::new(1.0, 0.0, 0.0, 1.0)),
        ..burst_template(3, 10.0, 0)
    };
    let mut instance = spawn_instance(template, false);
    run_frames(&mut instance, 2, FRAME);

    let mut recorder = Recorder::default();
    instance.render(&mut recorder);
    assert_eq!(recorder.quads.len(), 3);
    for (quad, textured) in &recorder.quads {
        assert!(!textured);
        assert!(!quad.is_textured());
        assert_eq!(quad.color, [1.0, 0.0, 0.0, 1.0]);
        assert!((quad.rotation - FRAC_PI_2).abs() < 1e-6);
    }
}

#[test]
fn textured_quads_carry_sub_image() {
    let template = EmitterTemplate {
        texture: Some(Handle::default()),
        sub_image_grid: SubImageGrid::new(4, 2),
        ..burst_template(1, 10.0, 0)
    };
    let mut instance = spawn_instance(template, false);
    run_frames(&mut instance, 2, FRAME);

    let mut recorder = Recorder::default();
    instance.render(&mut recorder);
    let (quad, textured) = recorder.quads[0];
    assert!(textured);
    assert!(quad.is_textured());
    assert_eq!(quad.tiling, [0.25, 0.5]);
    assert_eq!(quad.uv_offset, [0.0, 1.0]);
}

#[test]
fn batch_groups_quads_by_texture() {
    let textured = EmitterTemplate {
        texture: Some(Handle::default()),
        ..burst_template(2, 10.0, 0)
    };
    let mut first = spawn_instance(burst_template(3, 10.0, 0), false);
    let mut second = spawn_instance(textured, false);
    run_frames(&mut first, 2, FRAME);
    run_frames(&mut second, 2, FRAME);

    let mut batch = QuadBatch::default();
    first.render(&mut batch);
    second.render(&mut batch);

    assert_eq!(batch.len(), 5);
    assert_eq!(batch.batches().len(), 2);
    assert!(batch.batches()[0].texture.is_none());
    assert!(batch.batches()[1].texture.is_some());
    assert_eq!(batch.iter().filter(|q| q.is_textured()).count(), 2);

    let bytes = QuadBatch::instance_bytes(&batch.batches()[1]);
    assert_eq!(bytes.len(), 2 * size_of::<QuadInstance>());

    batch.clear();
    assert!(batch.is_empty());
}

#[test]
fn dead_particles_are_not_drawn() {
    let mut instance = spawn_instance(burst_template(4, 0.1, 0), false);
    run_frames(&mut instance, 2, FRAME);

    let mut batch = QuadBatch::default();
    instance.render(&mut batch);
    assert_eq!(batch.len(), 4);

    run_frames(&mut instance, 12, FRAME);
    batch.clear();
    instance.render(&mut batch);
    assert!(batch.is_empty());
}
