use crate::matrix::Matrix;
use crate::types::{ Ray, V3 };

const IDENTITY_LINEAR: [[f32; 3]; 3] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

/// An invertible affine transformation, carrying the forward matrix and its
/// precomputed inverse so the per-ray hot path never inverts anything.
///
/// Shapes solve intersections in object space: the world ray is mapped with
/// the inverse, the hit point is mapped back with the forward matrix, and the
/// normal with the inverse-transpose. The elementary constructors build both
/// directions analytically; only `try_from_matrix` ever runs a real inverse.
#[derive(Copy, Clone, Debug)]
pub struct Transform {
    forward: Matrix,
    inverse: Matrix,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            forward: Matrix::IDENTITY,
            inverse: Matrix::IDENTITY,
        }
    }
}

fn rotation_rows_x(theta_rads: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = theta_rads.sin_cos();
    [
        [1.0, 0.0, 0.0],
        [0.0, cos, sin],
        [0.0, -sin, cos],
    ]
}

fn rotation_rows_y(theta_rads: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = theta_rads.sin_cos();
    [
        [cos, 0.0, -sin],
        [0.0, 1.0, 0.0],
        [sin, 0.0, cos],
    ]
}

fn rotation_rows_z(theta_rads: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = theta_rads.sin_cos();
    [
        [cos, sin, 0.0],
        [-sin, cos, 0.0],
        [0.0, 0.0, 1.0],
    ]
}

impl Transform {
    /// Builds a transform from an arbitrary affine matrix.
    /// Returns None when the matrix cannot be inverted.
    pub fn try_from_matrix(forward: Matrix) -> Option<Transform> {
        let inverse = forward.inverse_affine()?;
        Some(Transform { forward, inverse })
    }

    pub fn translation(offset: V3) -> Transform {
        Transform {
            forward: Matrix::from_parts(IDENTITY_LINEAR, offset),
            inverse: Matrix::from_parts(IDENTITY_LINEAR, -offset),
        }
    }

    pub fn rotation_x(theta_rads: f32) -> Transform {
        Transform {
            forward: Matrix::from_parts(rotation_rows_x(theta_rads), V3::ZERO),
            inverse: Matrix::from_parts(rotation_rows_x(-theta_rads), V3::ZERO),
        }
    }

    pub fn rotation_y(theta_rads: f32) -> Transform {
        Transform {
            forward: Matrix::from_parts(rotation_rows_y(theta_rads), V3::ZERO),
            inverse: Matrix::from_parts(rotation_rows_y(-theta_rads), V3::ZERO),
        }
    }

    pub fn rotation_z(theta_rads: f32) -> Transform {
        Transform {
            forward: Matrix::from_parts(rotation_rows_z(theta_rads), V3::ZERO),
            inverse: Matrix::from_parts(rotation_rows_z(-theta_rads), V3::ZERO),
        }
    }

    /// Returns None for a zero scale on any axis.
    pub fn scaling(scale: V3) -> Option<Transform> {
        if scale.0 == 0.0 || scale.1 == 0.0 || scale.2 == 0.0 {
            return None;
        }
        let diagonal = |s: V3| [
            [s.0, 0.0, 0.0],
            [0.0, s.1, 0.0],
            [0.0, 0.0, s.2],
        ];
        Some(Transform {
            forward: Matrix::from_parts(diagonal(scale), V3::ZERO),
            inverse: Matrix::from_parts(diagonal(V3(1.0 / scale.0, 1.0 / scale.1, 1.0 / scale.2)), V3::ZERO),
        })
    }

    /// Composes two transforms: the result applies `self` first, `next` second.
    pub fn then(self, next: Transform) -> Transform {
        Transform {
            forward: self.forward.compose(&next.forward),
            inverse: next.inverse.compose(&self.inverse),
        }
    }

    pub fn of_point(&self, p: V3) -> V3 {
        self.forward.mul_point(p)
    }

    pub fn of_vector(&self, v: V3) -> V3 {
        self.forward.mul_vector(v)
    }

    /// Normals transform by the inverse-transpose, re-normalized.
    pub fn of_normal(&self, n: V3) -> V3 {
        self.inverse.mul_normal(n).unit()
    }

    /// Maps a world-space ray into object space.
    /// The direction is deliberately not re-normalized so `t` values carry
    /// over between the two spaces unchanged.
    pub fn to_local(&self, ray: &Ray) -> Ray {
        Ray::new(self.inverse.mul_point(ray.origin), self.inverse.mul_vector(ray.direction))
    }
}
