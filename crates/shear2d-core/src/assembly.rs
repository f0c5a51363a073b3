//! Assembly of dense and sparse operators from the active set.
//!
//! Solvers consume three views of the active constraints: the impact
//! bases (one world-space normal per column), the contact bases (one
//! orthonormal 2x2 frame per constraint), and the generalized smooth
//! friction basis, a sparse matrix with one column per constraint per
//! tangent sample mapping friction scalars into generalized coordinates.
//! In the plane there is a single tangent sample per contact.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::constraint::Constraint;

/// Impact bases: column `k` is constraint `k`'s world-space normal.
#[must_use]
pub fn compute_impact_bases(q: &DVector<f64>, active_set: &[Constraint]) -> DMatrix<f64> {
    let mut bases = DMatrix::zeros(2, active_set.len());
    for (column, constraint) in active_set.iter().enumerate() {
        let normal = constraint.world_space_contact_normal(q);
        debug_assert!((normal.norm() - 1.0).abs() <= 1.0e-6);
        bases.column_mut(column).copy_from(&normal);
    }
    bases
}

/// Contact bases: block `(:, 2k..2k+2)` is constraint `k`'s orthonormal
/// frame, normal in the first column and tangent in the second.
#[must_use]
pub fn compute_contact_bases(
    q: &DVector<f64>,
    v: &DVector<f64>,
    active_set: &[Constraint],
) -> DMatrix<f64> {
    let mut bases = DMatrix::zeros(2, 2 * active_set.len());
    for (index, constraint) in active_set.iter().enumerate() {
        let basis = constraint.compute_basis(q, v);
        debug_assert!(
            (basis * basis.transpose() - nalgebra::Matrix2::identity()).amax() <= 1.0e-6
        );
        debug_assert!((basis.determinant() - 1.0).abs() <= 1.0e-6);
        bases
            .view_mut((0, 2 * index), (2, 2))
            .copy_from(&basis);
    }
    bases
}

/// Generalized smooth friction basis `D` of shape `ndofs x m`.
///
/// Column `k` is constraint `k`'s generalized friction direction for the
/// tangent stored in the contact bases. Sparsity is bounded by each
/// constraint's friction stencil.
#[must_use]
pub fn form_generalized_smooth_friction_basis(
    ndofs: usize,
    q: &DVector<f64>,
    active_set: &[Constraint],
    contact_bases: &DMatrix<f64>,
) -> CscMatrix<f64> {
    debug_assert_eq!(contact_bases.ncols(), 2 * active_set.len());

    let mut triplets = CooMatrix::new(ndofs, active_set.len());
    for (column, constraint) in active_set.iter().enumerate() {
        let tangent = contact_bases.fixed_view::<2, 1>(0, 2 * column + 1).into_owned();
        constraint.compute_generalized_friction_given_tangent(q, &tangent, column, &mut triplets);
    }

    debug_assert_eq!(
        triplets.nnz(),
        active_set
            .iter()
            .map(Constraint::friction_stencil_size)
            .sum::<usize>()
    );

    CscMatrix::from(&triplets)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use shear2d_types::StaticPlane;

    fn sample_set() -> (DVector<f64>, DVector<f64>, Vec<Constraint>) {
        // Two touching disks plus one resting on the ground
        let q = DVector::from_vec(vec![0.0, 5.0, 0.0, 2.0, 5.0, 0.0, 8.0, 1.0, 0.0]);
        let v = DVector::zeros(9);
        let ground = StaticPlane::new(Vector2::zeros(), Vector2::new(0.0, 1.0)).unwrap();
        let set = vec![
            Constraint::circle_circle(0, 1, &q, 1.0, 1.0),
            Constraint::StaticPlaneCircle {
                body: 2,
                plane_index: 0,
                r: 1.0,
                plane: ground,
            },
        ];
        (q, v, set)
    }

    #[test]
    fn test_impact_bases_shape_and_norms() {
        let (q, _v, set) = sample_set();
        let bases = compute_impact_bases(&q, &set);
        assert_eq!(bases.shape(), (2, 2));
        for column in 0..2 {
            assert_relative_eq!(bases.column(column).norm(), 1.0, epsilon = 1e-9);
        }
        // The plane contact's normal is the plane normal
        assert_relative_eq!(bases[(1, 1)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_contact_bases_blocks_are_frames() {
        let (q, v, set) = sample_set();
        let bases = compute_contact_bases(&q, &v, &set);
        assert_eq!(bases.shape(), (2, 4));
        for index in 0..2 {
            let block = bases.fixed_view::<2, 2>(0, 2 * index).into_owned();
            assert_relative_eq!(block.determinant(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_friction_basis_shape_and_sparsity() {
        let (q, v, set) = sample_set();
        let bases = compute_contact_bases(&q, &v, &set);
        let d = form_generalized_smooth_friction_basis(9, &q, &set, &bases);

        assert_eq!(d.nrows(), 9);
        assert_eq!(d.ncols(), 2);
        // Disk-disk stencil of 6 plus plane-disk stencil of 3
        assert_eq!(d.nnz(), 9);
    }

    #[test]
    fn test_friction_column_is_orthogonal_to_normal_motion() {
        // Pushing along a friction column must not change the normal
        // approach speed for a frictionless symmetric contact
        let (q, _v, set) = sample_set();
        let bases = compute_contact_bases(&q, &DVector::zeros(9), &set);
        let d = form_generalized_smooth_friction_basis(9, &q, &set, &bases);

        // Extract column 0 densely
        let mut column = DVector::zeros(9);
        let col = d.col(0);
        for (&row, &value) in col.row_indices().iter().zip(col.values()) {
            column[row] = value;
        }

        let normal = set[0].world_space_contact_normal(&q);
        // The translational part of each body's block is the tangent
        let t0 = Vector2::new(column[0], column[1]);
        assert_relative_eq!(t0.dot(&normal), 0.0, epsilon = 1e-12);
        assert_relative_eq!(t0.norm(), 1.0, epsilon = 1e-12);
    }
}
