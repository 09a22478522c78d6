//! Integration tests for domain membership: seeding outside the mesh and
//! open-boundary escape.

mod common;

use drift_rs::{
    InMemoryMediator, IntegratorScheme, MeshDataReader, Model, ModelConfig, ParticleSeed,
    TimeDirection,
};

fn strip_model(
    length: usize,
    open_east: bool,
    u: f64,
    time_step: f64,
    seed_points: &[(f64, f64, f64)],
) -> Model<InMemoryMediator> {
    let grid = common::strip_grid(length, open_east);
    let frames = common::steady_frames(&grid, 1.0e6, u, 0.0, 0.0, 0.0);
    let mediator = InMemoryMediator::new(frames, TimeDirection::Forward, &grid).unwrap();
    let reader = MeshDataReader::new(grid, mediator, false, false, false);

    let mut config = ModelConfig::default();
    config.simulation.time_step = time_step;
    config.simulation.duration_in_days = Some(1.0);
    config.numerics.num_integrator = IntegratorScheme::Euler;

    let seed = ParticleSeed {
        group_ids: vec![0; seed_points.len()],
        x_positions: seed_points.iter().map(|p| p.0).collect(),
        y_positions: seed_points.iter().map(|p| p.1).collect(),
        z_positions: seed_points.iter().map(|p| p.2).collect(),
    };

    let mut model = Model::new(config, reader, seed, 5).unwrap();
    model.setup_data_access(0.0, 1.0e6).unwrap();
    model.release_particles(0.0).unwrap();
    model
}

/// A seed outside the mesh is created out-of-domain (no error) and the
/// step is a no-op for it.
#[test]
fn seed_outside_domain_is_inert() {
    let mut model = strip_model(5, false, 1.0, 1.0, &[(7.5, 0.5, -1.0), (-1.0, 0.5, -1.0)]);
    let before: Vec<_> = model.particles().to_vec();
    assert!(before.iter().all(|p| !p.in_domain));
    assert!(before.iter().all(|p| p.host_horizontal_elem == -1));

    for step in 0..5 {
        model.update(step as f64).unwrap();
    }
    assert_eq!(model.particles(), &before[..]);
}

/// A particle carried through the open east edge leaves the domain
/// irrevocably, its position frozen at the last commit before escape.
#[test]
fn open_boundary_escape_is_irrevocable() {
    let mut model = strip_model(5, true, 1.0, 1.0, &[(0.5, 0.25, -1.0)]);

    let mut escape_step = None;
    for step in 0..10 {
        model.update(step as f64).unwrap();
        if !model.particles()[0].in_domain {
            escape_step = Some(step);
            break;
        }
    }

    let p = &model.particles()[0];
    assert!(!p.in_domain);
    // Crossing x = 5 becomes possible on the step from x = 4.5.
    assert_eq!(escape_step, Some(4));
    assert!((p.x1 - 4.5).abs() < 1.0e-9, "frozen x1 = {}", p.x1);

    // Further steps leave it untouched.
    let frozen = p.clone();
    for step in 5..8 {
        model.update(step as f64).unwrap();
    }
    assert_eq!(model.particles()[0], frozen);
}

/// With a closed east edge the same flow reflects instead of escaping.
#[test]
fn closed_east_edge_retains_particle() {
    let mut model = strip_model(5, false, 1.0, 1.0, &[(0.5, 0.25, -1.0)]);
    for step in 0..20 {
        model.update(step as f64).unwrap();
    }
    let p = &model.particles()[0];
    assert!(p.in_domain);
    assert!(p.x1 <= 5.0 + 1.0e-9, "x1 = {}", p.x1);
}
