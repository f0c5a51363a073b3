//! End-to-end stepping scenarios exercising the full pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use nalgebra::{DVector, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shear2d_core::{
    broad_phase, circle_circle_active, Constraint, ImpactMap, ImpactOperator, Sim,
    StaggeredProjectionsSolver, UnconstrainedMap,
};
use shear2d_types::{
    Force, Geometry, PlanarPortal, StaggeredProjectionsConfig, StaggeringKind, State, StaticPlane,
};

fn make_state(
    bodies: &[(Vector2<f64>, Vector2<f64>, f64, f64, f64)],
    forces: Vec<Force>,
    planes: Vec<StaticPlane>,
    portals: Vec<PlanarPortal>,
) -> State {
    let mut q = Vec::new();
    let mut v = Vec::new();
    let mut mass = Vec::new();
    let mut geometry = Vec::new();
    let mut geometry_indices = Vec::new();
    for &(x, vel, r, m, inertia) in bodies {
        q.extend_from_slice(&[x.x, x.y, 0.0]);
        v.extend_from_slice(&[vel.x, vel.y, 0.0]);
        mass.extend_from_slice(&[m, m, inertia]);
        geometry_indices.push(geometry.len());
        geometry.push(Geometry::circle(r));
    }
    State::new(
        DVector::from_vec(q),
        DVector::from_vec(v),
        DVector::from_vec(mass),
        geometry,
        geometry_indices,
        forces,
        planes,
        portals,
    )
    .unwrap()
}

fn slab_portal() -> PlanarPortal {
    let bottom = StaticPlane::new(Vector2::new(0.0, 0.0), Vector2::new(0.0, 1.0)).unwrap();
    let top = StaticPlane::new(Vector2::new(0.0, 10.0), Vector2::new(0.0, -1.0)).unwrap();
    PlanarPortal::new(bottom, top)
}

#[test]
fn free_fall_single_disk_verlet() {
    let gravity = Force::Gravity {
        g: Vector2::new(0.0, -9.81),
    };
    let state = make_state(
        &[(Vector2::new(0.0, 0.0), Vector2::zeros(), 0.5, 1.0, 1.0)],
        vec![gravity],
        Vec::new(),
        Vec::new(),
    );
    let mut sim = Sim::new(state);

    let dt = 1.0 / 60.0;
    for iteration in 1..=60 {
        sim.flow_unconstrained(iteration, dt, &UnconstrainedMap::Verlet);
    }

    // After one second of free fall: dy = -g/2
    let y = sim.state().body_position(0).y;
    assert!((y - (-4.905)).abs() <= 5.0e-3, "free-fall drop was {y}");
}

#[test]
fn head_on_elastic_collision_exchanges_velocities() {
    let state = make_state(
        &[
            (Vector2::new(-2.0, 0.0), Vector2::new(1.0, 0.0), 1.0, 1.0, 1.0),
            (Vector2::new(2.0, 0.0), Vector2::new(-1.0, 0.0), 1.0, 1.0, 1.0),
        ],
        Vec::new(),
        Vec::new(),
        Vec::new(),
    );
    let mut sim = Sim::new(state);

    let umap = UnconstrainedMap::SymplecticEuler;
    let operator = ImpactOperator::GaussSeidel {
        max_iters: 100,
        tol: 1e-12,
    };
    let imap = ImpactMap::new();

    let dt = 0.01;
    for iteration in 1..=120 {
        sim.flow_impact(iteration, dt, &umap, &operator, 1.0, &imap);
    }

    let v0 = sim.state().body_velocity(0);
    let v1 = sim.state().body_velocity(1);
    assert_relative_eq!(v0.x, -1.0, epsilon = 1e-6);
    assert_relative_eq!(v1.x, 1.0, epsilon = 1e-6);

    let p = sim.compute_total_momentum();
    assert!(p.norm() <= 1e-12, "momentum drifted to {p:?}");
}

#[test]
fn disk_rests_on_plane() {
    let gravity = Force::Gravity {
        g: Vector2::new(0.0, -10.0),
    };
    let ground = StaticPlane::new(Vector2::zeros(), Vector2::new(0.0, 1.0)).unwrap();
    let state = make_state(
        &[(Vector2::new(0.0, 1.0), Vector2::zeros(), 1.0, 1.0, 1.0)],
        vec![gravity],
        vec![ground],
        Vec::new(),
    );
    let mut sim = Sim::new(state);

    let solver = StaggeredProjectionsSolver::new(StaggeredProjectionsConfig {
        mu: 0.0,
        cor: 0.0,
        max_iters: 20,
        tol: 1e-10,
        staggering: StaggeringKind::Geometric,
        warm_start_alpha: true,
        warm_start_beta: true,
    });
    let umap = UnconstrainedMap::SymplecticEuler;

    let dt = 1.0e-4;
    for iteration in 1..=100 {
        sim.flow_impact_friction(iteration, dt, &umap, 0.0, 0.0, &solver);
    }

    let y = sim.state().body_position(0).y;
    assert!(
        (0.999..=1.001).contains(&y),
        "disk should rest at its radius, got y = {y}"
    );
    assert!(sim.state().body_velocity(0).norm() <= 1e-6);
}

#[test]
fn periodic_portal_wraps_a_crossing_disk() {
    let state = make_state(
        &[(Vector2::new(0.0, 5.0), Vector2::new(0.0, 20.0), 0.5, 1.0, 1.0)],
        Vec::new(),
        Vec::new(),
        vec![slab_portal()],
    );
    let mut sim = Sim::new(state);

    let dt = 1.0 / 60.0;
    for iteration in 1..=30 {
        sim.flow_unconstrained(iteration, dt, &UnconstrainedMap::SymplecticEuler);
        // The wrap rule keeps every center out of the portal interior
        let x = sim.state().body_position(0);
        for portal in sim.state().portals() {
            assert!(!portal.point_inside_portal(&x));
        }
    }

    // Half a second at 20 m/s is one full domain height: back to the start
    assert_relative_eq!(sim.state().body_position(0).y, 5.0, epsilon = 1e-9);
    // Wrapping never touches velocities
    assert_relative_eq!(sim.state().body_velocity(0).y, 20.0, epsilon = 1e-12);
}

#[test]
fn lees_edwards_crossing_carries_the_kick() {
    let bottom = StaticPlane::new(Vector2::new(0.0, 0.0), Vector2::new(0.0, 1.0)).unwrap();
    let top = StaticPlane::new(Vector2::new(0.0, 10.0), Vector2::new(0.0, -1.0)).unwrap();
    let portal = PlanarPortal::new_lees_edwards(
        bottom,
        top,
        1.0,
        0.0,
        (f64::NEG_INFINITY, f64::INFINITY),
        (f64::NEG_INFINITY, f64::INFINITY),
    )
    .unwrap();

    let state = make_state(
        &[
            (Vector2::new(0.0, 0.5), Vector2::zeros(), 1.0, 1.0, 1.0),
            (Vector2::new(0.0, 9.7), Vector2::zeros(), 1.0, 1.0, 1.0),
        ],
        Vec::new(),
        Vec::new(),
        vec![portal],
    );
    let sim = Sim::new(state);

    let active = sim.compute_active_set(sim.state().q(), sim.state().q());
    assert_eq!(active.len(), 1);

    let Constraint::KinematicKickCircleCircle { kick, .. } = &active[0] else {
        panic!("expected a kicked contact, got {:?}", active[0]);
    };
    // The shearing plane slides at unit speed
    assert_relative_eq!(kick.norm(), 1.0, epsilon = 1e-6);

    // At rest, the pair's relative contact velocity is exactly the
    // negated kick, and it lies along the contact tangent
    let rel = active[0].compute_relative_velocity(sim.state().q(), sim.state().v());
    assert_relative_eq!((&rel + kick).norm(), 0.0, epsilon = 1e-6);

    let normal = active[0].world_space_contact_normal(sim.state().q());
    assert_relative_eq!(normal.dot(&rel), 0.0, epsilon = 1e-6);
}

#[test]
fn broad_phase_is_a_superset_of_narrow_phase() {
    let mut rng = StdRng::seed_from_u64(42);
    let r = 0.5;

    let positions: Vec<Vector2<f64>> = (0..50)
        .map(|_| Vector2::new(rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0)))
        .collect();
    let aabbs: Vec<_> = positions
        .iter()
        .map(|x| Geometry::circle(r).aabb(x, 0.0))
        .collect();

    let candidates = broad_phase::potential_overlap_pairs(&aabbs);
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if circle_circle_active(&positions[i], &positions[j], r, r) {
                assert!(
                    candidates.contains(&(i, j)),
                    "broad phase missed touching pair ({i}, {j})"
                );
            }
        }
    }
}

#[test]
fn spatial_grid_active_set_matches_all_pairs_scan() {
    let mut rng = StdRng::seed_from_u64(7);
    let bodies: Vec<(Vector2<f64>, Vector2<f64>, f64, f64, f64)> = (0..50)
        .map(|_| {
            (
                Vector2::new(rng.gen_range(0.0..15.0), rng.gen_range(0.0..15.0)),
                Vector2::zeros(),
                0.5,
                1.0,
                1.0,
            )
        })
        .collect();
    let state = make_state(&bodies, Vec::new(), Vec::new(), Vec::new());
    let sim = Sim::new(state);

    let grid_set = sim.compute_active_set(sim.state().q(), sim.state().q());
    let mut all_pairs = Vec::new();
    shear2d_core::active_set::compute_body_body_active_set_all_pairs(
        sim.state(),
        sim.state().q(),
        sim.state().q(),
        &mut all_pairs,
    );

    assert_eq!(grid_set.len(), all_pairs.len());
    for constraint in &all_pairs {
        assert!(grid_set.contains(constraint));
    }
    // Every reported contact really touches at the query configuration
    for constraint in &grid_set {
        let (body0, body1) = constraint.body_indices();
        let body1 = body1.unwrap();
        assert!(circle_circle_active(
            &sim.state().body_position(body0),
            &sim.state().body_position(body1),
            0.5,
            0.5
        ));
    }
}

#[test]
fn resting_contact_under_gravity_with_impact_map() {
    // The impact-only pipeline also holds a disk on the ground
    let gravity = Force::Gravity {
        g: Vector2::new(0.0, -10.0),
    };
    let ground = StaticPlane::new(Vector2::zeros(), Vector2::new(0.0, 1.0)).unwrap();
    let state = make_state(
        &[(Vector2::new(0.0, 1.0), Vector2::zeros(), 1.0, 1.0, 1.0)],
        vec![gravity],
        vec![ground],
        Vec::new(),
    );
    let mut sim = Sim::new(state);

    let umap = UnconstrainedMap::SymplecticEuler;
    let operator = ImpactOperator::GaussSeidel {
        max_iters: 100,
        tol: 1e-12,
    };
    let imap = ImpactMap::new();

    let dt = 1.0e-4;
    let mut saw_contact = false;
    for iteration in 1..=100 {
        let impulses = sim.flow_impact(iteration, dt, &umap, &operator, 0.0, &imap);
        saw_contact |= !impulses.is_empty();
    }

    assert!(saw_contact, "the resting contact must activate");
    let y = sim.state().body_position(0).y;
    assert!((0.999..=1.001).contains(&y), "got y = {y}");
}

#[test]
fn hertzian_penalty_pushes_overlapping_disks_apart() {
    let penalty = Force::HertzianPenalty { k: 1.0e4 };
    let state = make_state(
        &[
            (Vector2::new(0.0, 0.0), Vector2::zeros(), 1.0, 1.0, 1.0),
            (Vector2::new(1.5, 0.0), Vector2::zeros(), 1.0, 1.0, 1.0),
        ],
        vec![penalty],
        Vec::new(),
        Vec::new(),
    );
    let mut sim = Sim::new(state);

    let dt = 1.0e-4;
    for iteration in 1..=200 {
        sim.flow_unconstrained(iteration, dt, &UnconstrainedMap::Verlet);
    }

    let gap = (sim.state().body_position(1) - sim.state().body_position(0)).norm();
    assert!(gap > 1.5, "penalty must separate the pair, gap = {gap}");
    // Equal masses: the pair's momentum stays zero
    assert!(sim.compute_total_momentum().norm() <= 1e-9);
}
