//! Nearest proper rotation of a 3x3 matrix.

use nalgebra::Matrix3;

/// Rotation closest to `m` in the Frobenius norm (the orthogonal factor of
/// its polar decomposition), forced to have determinant `+1`.
///
/// With `m = U Σ Vᵀ` the result is `U Vᵀ`. If that is a reflection, the
/// column of `U` belonging to the smallest singular value is negated. A
/// zero matrix maps to the identity.
pub fn nearest_rotation(m: &Matrix3<f64>) -> Matrix3<f64> {
    if m.iter().all(|&x| x == 0.0) {
        return Matrix3::identity();
    }

    let svd = m.svd(true, true);
    let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Matrix3::identity();
    };

    let r = u * v_t;
    if r.determinant() >= 0.0 {
        return r;
    }

    let weakest = svd.singular_values.imin();
    u.column_mut(weakest).neg_mut();
    u * v_t
}
