//! Active-set construction: narrow phase over broad-phase candidates.
//!
//! Collision queries run against the end-of-step configuration `q1`;
//! constraint normals and anchors are captured from the start-of-step
//! configuration `q0` to preserve angular momentum. Three sources feed
//! the set: body-plane tests, direct body-body tests, and body-body tests
//! through portal images.
//!
//! A wrap-around contact can surface through several broad-phase
//! channels: the first body against the second's image, the second
//! against the first's image, and occasionally image against image.
//! Teleported candidates are therefore keyed by their canonical body
//! pair before any constraint is emitted, so each physical contact
//! produces exactly one constraint. When both candidates are images and
//! the pair already collides in the unteleported configuration, the
//! real-real test is authoritative and the teleported candidate is
//! discarded as a duplicate.

use std::collections::BTreeSet;

use nalgebra::{DVector, Vector2};
use shear2d_types::{Aabb, Geometry, PortalSide, State};

use crate::broad_phase;
use crate::constraint::{circle_circle_active, static_plane_circle_active, Constraint};
use crate::teleport::{append_teleported_aabbs, TeleportedCollision};

/// Build the active constraint set for a step from `q0` to `q1`.
#[must_use]
pub fn compute_active_set(state: &State, q0: &DVector<f64>, q1: &DVector<f64>) -> Vec<Constraint> {
    debug_assert_eq!(q0.len() % 3, 0);
    debug_assert_eq!(q0.len(), q1.len());

    let mut active_set = Vec::new();
    compute_body_body_active_set_spatial_grid(state, q0, q1, &mut active_set);
    compute_body_plane_active_set_all_pairs(state, q0, q1, &mut active_set);

    #[cfg(debug_assertions)]
    for (index, a) in active_set.iter().enumerate() {
        for b in &active_set[index + 1..] {
            debug_assert!(a != b, "duplicate constraint in active set");
        }
    }

    active_set
}

/// Per-body AABBs at configuration `q`.
fn real_aabbs(state: &State, q: &DVector<f64>) -> Vec<Aabb> {
    (0..state.num_bodies())
        .map(|body| {
            let x = Vector2::new(q[3 * body], q[3 * body + 1]);
            state.body_geometry(body).aabb(&x, q[3 * body + 2])
        })
        .collect()
}

/// Body-body constraints found through the broad phase, portals included.
fn compute_body_body_active_set_spatial_grid(
    state: &State,
    q0: &DVector<f64>,
    q1: &DVector<f64>,
    active_set: &mut Vec<Constraint>,
) {
    let nbodies = state.num_bodies();

    let mut aabbs = real_aabbs(state, q1);
    let teleported_bodies = append_teleported_aabbs(state, q1, &mut aabbs);
    let possible_overlaps = broad_phase::potential_overlap_pairs(&aabbs);

    let mut teleported_collisions: BTreeSet<TeleportedCollision> = BTreeSet::new();
    let mut teleported_pairs: BTreeSet<(usize, usize)> = BTreeSet::new();

    for &(first, second) in &possible_overlaps {
        let first_teleported = first >= nbodies;
        let second_teleported = second >= nbodies;

        if !first_teleported && !second_teleported {
            dispatch_narrow_phase(
                first,
                second,
                state.body_geometry(first),
                state.body_geometry(second),
                q0,
                q1,
                active_set,
            );
            continue;
        }

        let (body0, portal0, side0) = if first_teleported {
            let origin = &teleported_bodies[&first];
            (origin.body, Some(origin.portal), origin.side)
        } else {
            (first, None, PortalSide::A)
        };
        let (body1, portal1, side1) = if second_teleported {
            let origin = &teleported_bodies[&second];
            (origin.body, Some(origin.portal), origin.side)
        } else {
            (second, None, PortalSide::A)
        };
        if body0 == body1 {
            // A body does not collide with its own image
            continue;
        }

        // When both candidates are images, the unteleported pair may
        // already be colliding; that real contact was (or will be)
        // picked up by the real-real channel
        if first_teleported
            && second_teleported
            && collision_is_active_between(state, body0, body1, q1)
        {
            continue;
        }

        let candidate = TeleportedCollision::new(body0, body1, portal0, portal1, side0, side1);
        let pair = (candidate.body0, candidate.body1);
        if !teleported_pairs.contains(&pair) && teleported_collision_is_active(state, &candidate, q1)
        {
            teleported_collisions.insert(candidate);
            teleported_pairs.insert(pair);
        }
    }

    for collision in &teleported_collisions {
        debug_assert!(collision.body0 < nbodies && collision.body1 < nbodies);
        debug_assert_ne!(collision.body0, collision.body1);
        dispatch_teleported_narrow_phase(state, collision, q0, q1, active_set);
    }
}

/// Reference body-body scan without the broad phase. Used to cross-check
/// the spatial-grid path; portals are not consulted here.
pub fn compute_body_body_active_set_all_pairs(
    state: &State,
    q0: &DVector<f64>,
    q1: &DVector<f64>,
    active_set: &mut Vec<Constraint>,
) {
    let nbodies = state.num_bodies();
    for body0 in 0..nbodies {
        for body1 in (body0 + 1)..nbodies {
            dispatch_narrow_phase(
                body0,
                body1,
                state.body_geometry(body0),
                state.body_geometry(body1),
                q0,
                q1,
                active_set,
            );
        }
    }
}

/// Body-plane constraints over all pairs.
fn compute_body_plane_active_set_all_pairs(
    state: &State,
    _q0: &DVector<f64>,
    q1: &DVector<f64>,
    active_set: &mut Vec<Constraint>,
) {
    for (plane_index, plane) in state.planes().iter().enumerate() {
        for body in 0..state.num_bodies() {
            match *state.body_geometry(body) {
                Geometry::Circle { r } => {
                    let x = Vector2::new(q1[3 * body], q1[3 * body + 1]);
                    if static_plane_circle_active(&x, r, plane) {
                        active_set.push(Constraint::StaticPlaneCircle {
                            body,
                            plane_index,
                            r,
                            plane: *plane,
                        });
                    }
                }
            }
        }
    }
}

/// Narrow phase for a real body pair.
fn dispatch_narrow_phase(
    body0: usize,
    body1: usize,
    geo0: &Geometry,
    geo1: &Geometry,
    q0: &DVector<f64>,
    q1: &DVector<f64>,
    active_set: &mut Vec<Constraint>,
) {
    match (*geo0, *geo1) {
        (Geometry::Circle { r: r0 }, Geometry::Circle { r: r1 }) => {
            let x0 = Vector2::new(q1[3 * body0], q1[3 * body0 + 1]);
            let x1 = Vector2::new(q1[3 * body1], q1[3 * body1 + 1]);
            if circle_circle_active(&x0, &x1, r0, r1) {
                active_set.push(Constraint::circle_circle(body0, body1, q0, r0, r1));
            }
        }
    }
}

/// Narrow-phase predicate between two posed geometries.
fn collision_is_active(
    x0: &Vector2<f64>,
    _theta0: f64,
    geo0: &Geometry,
    x1: &Vector2<f64>,
    _theta1: f64,
    geo1: &Geometry,
) -> bool {
    match (*geo0, *geo1) {
        (Geometry::Circle { r: r0 }, Geometry::Circle { r: r1 }) => {
            circle_circle_active(x0, x1, r0, r1)
        }
    }
}

/// Narrow-phase predicate for a body pair in the unteleported configuration.
fn collision_is_active_between(state: &State, body0: usize, body1: usize, q: &DVector<f64>) -> bool {
    let x0 = Vector2::new(q[3 * body0], q[3 * body0 + 1]);
    let x1 = Vector2::new(q[3 * body1], q[3 * body1 + 1]);
    collision_is_active(
        &x0,
        q[3 * body0 + 2],
        state.body_geometry(body0),
        &x1,
        q[3 * body1 + 2],
        state.body_geometry(body1),
    )
}

/// Centers of both bodies at `q`, with each body's portal teleport
/// re-applied (identity for a body that was not teleported).
fn teleported_collision_centers(
    state: &State,
    q: &DVector<f64>,
    collision: &TeleportedCollision,
) -> (Vector2<f64>, Vector2<f64>) {
    let mut x0 = Vector2::new(q[3 * collision.body0], q[3 * collision.body0 + 1]);
    if let Some(portal) = collision.portal0 {
        x0 = state.portals()[portal].teleport_point(&x0, collision.side0);
    }
    let mut x1 = Vector2::new(q[3 * collision.body1], q[3 * collision.body1 + 1]);
    if let Some(portal) = collision.portal1 {
        x1 = state.portals()[portal].teleport_point(&x1, collision.side1);
    }
    (x0, x1)
}

/// Whether a teleported candidate is geometrically active at `q`.
fn teleported_collision_is_active(
    state: &State,
    collision: &TeleportedCollision,
    q: &DVector<f64>,
) -> bool {
    let (x0, x1) = teleported_collision_centers(state, q, collision);
    collision_is_active(
        &x0,
        q[3 * collision.body0 + 2],
        state.body_geometry(collision.body0),
        &x1,
        q[3 * collision.body1 + 2],
        state.body_geometry(collision.body1),
    )
}

/// Narrow phase for a confirmed teleported candidate.
///
/// Emits a plain teleported constraint, or a kicked one when one of the
/// involved portals is Lees-Edwards. The teleport displacement of each
/// body is captured at `q0`; portal translations only advance between
/// steps, so the displacement at `q1` matches to within roundoff.
fn dispatch_teleported_narrow_phase(
    state: &State,
    collision: &TeleportedCollision,
    q0: &DVector<f64>,
    q1: &DVector<f64>,
    active_set: &mut Vec<Constraint>,
) {
    let (x0_t0, x1_t0) = teleported_collision_centers(state, q0, collision);
    let delta0 = x0_t0 - Vector2::new(q0[3 * collision.body0], q0[3 * collision.body0 + 1]);
    let delta1 = x1_t0 - Vector2::new(q0[3 * collision.body1], q0[3 * collision.body1 + 1]);

    let (x0_t1, x1_t1) = teleported_collision_centers(state, q1, collision);
    #[cfg(debug_assertions)]
    {
        let delta0_t1 = x0_t1 - Vector2::new(q1[3 * collision.body0], q1[3 * collision.body0 + 1]);
        let delta1_t1 = x1_t1 - Vector2::new(q1[3 * collision.body1], q1[3 * collision.body1 + 1]);
        debug_assert!((delta0 - delta0_t1).amax() <= 1.0e-6);
        debug_assert!((delta1 - delta1_t1).amax() <= 1.0e-6);
    }

    debug_assert!(
        collision.portal0.is_some() || collision.portal1.is_some(),
        "teleported candidate without a teleported body"
    );

    let lees_edwards0 = collision
        .portal0
        .is_some_and(|portal| state.portals()[portal].is_lees_edwards());
    let lees_edwards1 = collision
        .portal1
        .is_some_and(|portal| state.portals()[portal].is_lees_edwards());

    let (Geometry::Circle { r: r0 }, Geometry::Circle { r: r1 }) = (
        *state.body_geometry(collision.body0),
        *state.body_geometry(collision.body1),
    );

    if !circle_circle_active(&x0_t1, &x1_t1, r0, r1) {
        return;
    }

    if !lees_edwards0 && !lees_edwards1 {
        active_set.push(Constraint::TeleportedCircleCircle {
            body0: collision.body0,
            body1: collision.body1,
            x0: x0_t0,
            x1: x1_t0,
            r0,
            r1,
            delta0,
            delta1,
        });
        return;
    }

    // At most one side of a contact can carry the shear
    debug_assert!(lees_edwards0 != lees_edwards1);

    // Collision detection ran at q1, so the kick is evaluated there. The
    // sign makes the kick the velocity of the second body's image frame.
    let kick = if lees_edwards1 {
        let portal = &state.portals()[collision.portal1.unwrap_or_default()];
        let body = collision.body1;
        let x = Vector2::new(q1[3 * body], q1[3 * body + 1]);
        let aabb = state.body_geometry(body).aabb(&x, q1[3 * body + 2]);
        portal.kinematic_velocity_of_aabb(&aabb)
    } else {
        let portal = &state.portals()[collision.portal0.unwrap_or_default()];
        let body = collision.body0;
        let x = Vector2::new(q1[3 * body], q1[3 * body + 1]);
        let aabb = state.body_geometry(body).aabb(&x, q1[3 * body + 2]);
        -portal.kinematic_velocity_of_aabb(&aabb)
    };

    active_set.push(Constraint::KinematicKickCircleCircle {
        body0: collision.body0,
        body1: collision.body1,
        x0: x0_t0,
        x1: x1_t0,
        r0,
        r1,
        kick,
    });
}

/// Whether a trial body at `(x, theta)` with geometry `geo` overlaps any
/// body of the state at configuration `q`, portals included.
#[must_use]
pub fn body_collides_with_another(
    state: &State,
    x: &Vector2<f64>,
    theta: f64,
    geo: &Geometry,
    q: &DVector<f64>,
) -> bool {
    let nbodies = state.num_bodies();
    let trial_aabb = geo.aabb(x, theta);

    let mut aabbs = real_aabbs(state, q);
    let teleported_bodies = append_teleported_aabbs(state, q, &mut aabbs);
    let possible_overlaps = broad_phase::potential_overlaps(&trial_aabb, &aabbs);

    for other in possible_overlaps {
        if other < nbodies {
            let x_other = Vector2::new(q[3 * other], q[3 * other + 1]);
            if collision_is_active(
                x,
                theta,
                geo,
                &x_other,
                q[3 * other + 2],
                state.body_geometry(other),
            ) {
                return true;
            }
        } else {
            let origin = &teleported_bodies[&other];
            let center = Vector2::new(q[3 * origin.body], q[3 * origin.body + 1]);
            let teleported_center =
                state.portals()[origin.portal].teleport_point(&center, origin.side);
            if collision_is_active(
                x,
                theta,
                geo,
                &teleported_center,
                q[3 * origin.body + 2],
                state.body_geometry(origin.body),
            ) {
                return true;
            }
        }
    }
    false
}
