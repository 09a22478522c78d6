//! Integration tests for boundary-condition arbitration in the step
//! pipeline: land reflection and surface/bottom reflection.

mod common;

use drift_rs::{
    InMemoryMediator, IntegratorScheme, MeshDataReader, Model, ModelConfig, ParticleSeed,
    TimeDirection, VerticalBoundaryScheme,
};

fn model_with_flow(
    u: f64,
    w: f64,
    time_step: f64,
    vertical: VerticalBoundaryScheme,
    seed_point: (f64, f64, f64),
) -> Model<InMemoryMediator> {
    let grid = common::strip_grid(1, false);
    let frames = common::steady_frames(&grid, 1.0e6, u, 0.0, w, 0.0);
    let mediator = InMemoryMediator::new(frames, TimeDirection::Forward, &grid).unwrap();
    let reader = MeshDataReader::new(grid, mediator, false, false, false);

    let mut config = ModelConfig::default();
    config.simulation.time_step = time_step;
    config.simulation.duration_in_days = Some(1.0);
    config.numerics.num_integrator = IntegratorScheme::Euler;
    config.boundary_conditions.vertical = vertical;

    let seed = ParticleSeed {
        group_ids: vec![0],
        x_positions: vec![seed_point.0],
        y_positions: vec![seed_point.1],
        z_positions: vec![seed_point.2],
    };

    let mut model = Model::new(config, reader, seed, 3).unwrap();
    model.setup_data_access(0.0, 1.0e6).unwrap();
    model.release_particles(0.0).unwrap();
    model
}

/// Westward flow into the closed x = 0 edge: the overshoot is mirrored, so
/// |x_new − x_edge| = |x_old − x_edge + u·dt|.
#[test]
fn land_reflection_mirrors_overshoot() {
    let mut model = model_with_flow(
        -1.0,
        0.0,
        0.5,
        VerticalBoundaryScheme::Reflecting,
        (0.3, 0.6, -1.0),
    );
    model.update(0.0).unwrap();
    let p = &model.particles()[0];
    assert!(p.in_domain);
    // 0.3 − 0.5 = −0.2 reflects off x = 0 to +0.2.
    assert!((p.x1 - 0.2).abs() < 1.0e-9, "x1 = {}", p.x1);
    assert!((p.x2 - 0.6).abs() < 1.0e-9, "x2 = {}", p.x2);
}

/// Repeated forcing against the wall never lets the particle out and never
/// errors (the retry loop is bounded).
#[test]
fn persistent_onshore_flow_is_stable() {
    let mut model = model_with_flow(
        -1.0,
        0.0,
        0.5,
        VerticalBoundaryScheme::Reflecting,
        (0.3, 0.6, -1.0),
    );
    for step in 0..50 {
        model.update(step as f64 * 0.5).unwrap();
        let p = &model.particles()[0];
        assert!(p.in_domain, "left the domain at step {}", step);
        assert!(p.x1 >= -1.0e-9, "x1 = {} at step {}", p.x1, step);
    }
}

/// An upward overshoot past the free surface mirrors around zmax:
/// z = −0.1 displaced by +0.5 commits at −0.4.
#[test]
fn vertical_reflection_at_free_surface() {
    let mut model = model_with_flow(
        0.0,
        0.5,
        1.0,
        VerticalBoundaryScheme::Reflecting,
        (0.5, 0.25, -0.1),
    );
    model.update(0.0).unwrap();
    let p = &model.particles()[0];
    assert!(p.in_domain);
    assert!((p.x3 - (-0.4)).abs() < 1.0e-9, "x3 = {}", p.x3);
}

/// A downward overshoot past the sea bed mirrors around zmin = −h.
#[test]
fn vertical_reflection_at_sea_bed() {
    let mut model = model_with_flow(
        0.0,
        -0.5,
        1.0,
        VerticalBoundaryScheme::Reflecting,
        (0.5, 0.25, -9.8),
    );
    model.update(0.0).unwrap();
    let p = &model.particles()[0];
    assert!(p.in_domain);
    // −9.8 − 0.5 = −10.3 reflects off −10 to −9.7.
    assert!((p.x3 - (-9.7)).abs() < 1.0e-9, "x3 = {}", p.x3);
}

/// The absorbing policy removes the particle instead of reflecting.
#[test]
fn absorbing_surface_removes_particle() {
    let mut model = model_with_flow(
        0.0,
        0.5,
        1.0,
        VerticalBoundaryScheme::Absorbing,
        (0.5, 0.25, -0.1),
    );
    model.update(0.0).unwrap();
    assert!(!model.particles()[0].in_domain);
}

/// After every committed step the particle sits inside the water column.
#[test]
fn committed_positions_stay_within_column() {
    let mut model = model_with_flow(
        0.0,
        0.9,
        1.0,
        VerticalBoundaryScheme::Reflecting,
        (0.5, 0.25, -5.0),
    );
    for step in 0..40 {
        model.update(step as f64).unwrap();
        let p = &model.particles()[0];
        assert!(
            (-10.0..=0.0).contains(&p.x3),
            "x3 = {} at step {}",
            p.x3,
            step
        );
    }
}
