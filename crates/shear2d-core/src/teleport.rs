//! Teleport indexing: virtual broad-phase entries for bodies at portals.
//!
//! A body whose AABB touches a portal plane has a periodic image on the
//! other side that can collide there. The indexer appends an AABB for each
//! such image to the broad-phase input and records how to map the appended
//! index back to `(body, portal, plane side)`. Virtual indices exist only
//! in broad-phase index space; `q`, `v`, and the mass operator never see
//! them.

use std::collections::BTreeMap;

use nalgebra::{DVector, Vector2};
use shear2d_types::{Aabb, PortalSide, State};

/// Where an appended virtual AABB came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeleportedBody {
    /// The real body index.
    pub body: usize,
    /// Index of the portal that produced the image.
    pub portal: usize,
    /// Which plane of the portal the body's AABB touches.
    pub side: PortalSide,
}

/// A candidate contact in which at least one body participates through a
/// portal image.
///
/// Bodies are stored in canonical order (`body0 < body1`), and the derived
/// ordering over all fields makes a `BTreeSet` of these collisions both
/// duplicate-free and deterministically ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TeleportedCollision {
    /// First body index.
    pub body0: usize,
    /// Second body index.
    pub body1: usize,
    /// Portal that teleported `body0`, if any.
    pub portal0: Option<usize>,
    /// Portal that teleported `body1`, if any.
    pub portal1: Option<usize>,
    /// Plane side through which `body0` was teleported.
    pub side0: PortalSide,
    /// Plane side through which `body1` was teleported.
    pub side1: PortalSide,
}

impl TeleportedCollision {
    /// Build a canonically ordered teleported collision.
    #[must_use]
    pub fn new(
        body0: usize,
        body1: usize,
        portal0: Option<usize>,
        portal1: Option<usize>,
        side0: PortalSide,
        side1: PortalSide,
    ) -> Self {
        if body0 <= body1 {
            Self {
                body0,
                body1,
                portal0,
                portal1,
                side0,
                side1,
            }
        } else {
            Self {
                body0: body1,
                body1: body0,
                portal0: portal1,
                portal1: portal0,
                side0: side1,
                side1: side0,
            }
        }
    }
}

/// Append a virtual AABB for every `(body, portal)` pair whose real AABB
/// touches the portal, returning the map from appended index to origin.
///
/// `aabbs` must hold exactly the real per-body AABBs at `q` on entry;
/// appended indices therefore start at the body count.
pub fn append_teleported_aabbs(
    state: &State,
    q: &DVector<f64>,
    aabbs: &mut Vec<Aabb>,
) -> BTreeMap<usize, TeleportedBody> {
    let nbodies = state.num_bodies();
    debug_assert_eq!(aabbs.len(), nbodies);

    let mut teleported = BTreeMap::new();
    for (portal_index, portal) in state.portals().iter().enumerate() {
        for body in 0..nbodies {
            if let Some(side) = portal.aabb_touches_portal(&aabbs[body]) {
                let x = Vector2::new(q[3 * body], q[3 * body + 1]);
                let image = portal.teleport_point(&x, side);
                aabbs.push(state.body_geometry(body).aabb(&image, q[3 * body + 2]));
                teleported.insert(
                    aabbs.len() - 1,
                    TeleportedBody {
                        body,
                        portal: portal_index,
                        side,
                    },
                );
            }
        }
    }
    teleported
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shear2d_types::{Geometry, PlanarPortal, StaticPlane};

    fn slab_state(ys: &[f64]) -> State {
        let bottom = StaticPlane::new(Vector2::new(0.0, 0.0), Vector2::new(0.0, 1.0)).unwrap();
        let top = StaticPlane::new(Vector2::new(0.0, 10.0), Vector2::new(0.0, -1.0)).unwrap();
        let portal = PlanarPortal::new(bottom, top);

        let mut q = Vec::new();
        let mut mass = Vec::new();
        for &y in ys {
            q.extend_from_slice(&[0.0, y, 0.0]);
            mass.extend_from_slice(&[1.0, 1.0, 1.0]);
        }
        State::new(
            DVector::from_vec(q),
            DVector::zeros(3 * ys.len()),
            DVector::from_vec(mass),
            vec![Geometry::circle(0.5)],
            vec![0; ys.len()],
            Vec::new(),
            Vec::new(),
            vec![portal],
        )
        .unwrap()
    }

    fn real_aabbs(state: &State) -> Vec<Aabb> {
        (0..state.num_bodies())
            .map(|b| {
                state
                    .body_geometry(b)
                    .aabb(&state.body_position(b), state.body_theta(b))
            })
            .collect()
    }

    #[test]
    fn test_interior_bodies_produce_no_images() {
        let state = slab_state(&[5.0]);
        let mut aabbs = real_aabbs(&state);
        let map = append_teleported_aabbs(&state, state.q(), &mut aabbs);
        assert_eq!(aabbs.len(), 1);
        assert!(map.is_empty());
    }

    #[test]
    fn test_body_at_top_plane_gets_image_at_bottom() {
        let state = slab_state(&[5.0, 9.7]);
        let mut aabbs = real_aabbs(&state);
        let map = append_teleported_aabbs(&state, state.q(), &mut aabbs);

        assert_eq!(aabbs.len(), 3);
        let origin = map.get(&2).expect("appended index maps back");
        assert_eq!(origin.body, 1);
        assert_eq!(origin.portal, 0);
        assert_eq!(origin.side, PortalSide::B);
        // The image sits just below the bottom plane
        let image_center_y = 0.5 * (aabbs[2].min.y + aabbs[2].max.y);
        assert_relative_eq!(image_center_y, -0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_virtual_indices_start_at_body_count() {
        let state = slab_state(&[0.3, 9.8]);
        let mut aabbs = real_aabbs(&state);
        let map = append_teleported_aabbs(&state, state.q(), &mut aabbs);
        assert_eq!(map.len(), 2);
        assert!(map.keys().all(|&index| index >= 2));
    }

    #[test]
    fn test_canonical_ordering_swaps_portal_data() {
        let a = TeleportedCollision::new(7, 3, Some(1), None, PortalSide::A, PortalSide::B);
        assert_eq!(a.body0, 3);
        assert_eq!(a.body1, 7);
        assert_eq!(a.portal0, None);
        assert_eq!(a.portal1, Some(1));
        assert_eq!(a.side0, PortalSide::B);
        assert_eq!(a.side1, PortalSide::A);
    }

    #[test]
    fn test_same_pair_through_two_channels_is_one_entry() {
        let first = TeleportedCollision::new(3, 7, None, Some(1), PortalSide::B, PortalSide::A);
        let second = TeleportedCollision::new(7, 3, Some(1), None, PortalSide::A, PortalSide::B);
        let mut set = std::collections::BTreeSet::new();
        set.insert(first);
        set.insert(second);
        assert_eq!(set.len(), 1);
    }
}
