use crate::implementation::{ AABB, Shape, ShapeHit };
use crate::transform::Transform;
use crate::types::{ Ray, V3 };

/// Flat quads get their bounds padded by this much on collapsed axes
const QUAD_BOUNDS_PAD: f32 = 1e-3;

/// A rectangle spanned by two perpendicular edge vectors from an object-space
/// origin corner. Points on the surface are `origin + u*edge_u + v*edge_v`
/// for (u, v) in [0, 1]^2.
pub struct Quad {
    transform: Transform,
    origin: V3,
    edge_u: V3,
    edge_v: V3,
    // Unit object-space plane normal, precomputed from the edge cross product
    normal: V3,
}

impl Quad {
    pub fn new(transform: Transform, origin: V3, edge_u: V3, edge_v: V3) -> Quad {
        Quad {
            transform,
            origin,
            edge_u,
            edge_v,
            normal: V3::cross(edge_u, edge_v).unit(),
        }
    }

    pub(crate) fn corners(&self) -> [V3; 4] {
        [
            self.origin,
            self.origin + self.edge_u,
            self.origin + self.edge_v,
            self.origin + self.edge_u + self.edge_v,
        ]
    }
}

impl Shape for Quad {
    fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<ShapeHit> {
        let local_ray = self.transform.to_local(ray);

        // Ray-plane intersection
        let denominator = V3::dot(local_ray.direction, self.normal);
        if denominator.abs() < 1e-8 {
            // Nearing parallel to the plane
            return None;
        }
        let t = V3::dot(self.origin - local_ray.origin, self.normal) / denominator;
        if t <= t_min || t > t_max {
            return None;
        }

        // Edge-coordinate bounds check
        let q = local_ray.point_at_parameter(t) - self.origin;
        let u = V3::dot(q, self.edge_u) / self.edge_u.length_squared();
        let v = V3::dot(q, self.edge_v) / self.edge_v.length_squared();
        if u < 0.0 || u > 1.0 || v < 0.0 || v > 1.0 {
            return None;
        }

        // Report the face the ray actually sees
        let world_normal = self.transform.of_normal(self.normal);
        let normal = if V3::dot(ray.direction, world_normal) > 0.0 { -world_normal } else { world_normal };

        Some(ShapeHit {
            t,
            p: self.transform.of_point(local_ray.point_at_parameter(t)),
            normal,
        })
    }

    fn world_bounds(&self) -> AABB {
        AABB::from_vertices_iter(self.corners().iter().map(|&c| self.transform.of_point(c)))
            .padded(QUAD_BOUNDS_PAD)
    }
}
