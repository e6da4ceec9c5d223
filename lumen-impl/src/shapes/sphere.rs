use crate::implementation::{ AABB, Shape, ShapeHit };
use crate::transform::Transform;
use crate::types::{ Ray, V3 };
use crate::util::solve_quadratic;

/// A sphere of the given radius, centered at its object-space origin.
/// The transform carries the sphere's world placement; a sphere "at" some
/// world position is a translation transform plus a radius.
pub struct Sphere {
    transform: Transform,
    radius: f32,
}

impl Sphere {
    pub fn new(transform: Transform, radius: f32) -> Sphere {
        Sphere { transform, radius }
    }
}

impl Shape for Sphere {
    fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<ShapeHit> {
        let local_ray = self.transform.to_local(ray);
        let r0 = local_ray.origin;
        let d = local_ray.direction;

        let a = V3::dot(d, d);
        let b = 2.0 * V3::dot(r0, d);
        let c = V3::dot(r0, r0) - (self.radius * self.radius);

        let (t0, t1) = solve_quadratic(a, b, c)?;
        if t0 > t_max || t1 <= t_min {
            return None;
        }

        // Prefer the near root; fall back to the far one when the origin
        // sits on or inside the sphere
        let t = if t0 > t_min { t0 } else { t1 };
        if t > t_max {
            return None;
        }

        let local_p = local_ray.point_at_parameter(t);
        Some(ShapeHit {
            t,
            p: self.transform.of_point(local_p),
            normal: self.transform.of_normal(local_p / self.radius),
        })
    }

    fn world_bounds(&self) -> AABB {
        // Object-space box [-r, r]^3, carried through the transform corner
        // by corner and re-bounded
        let object_bounds = AABB::from_min_max(V3::ZERO - self.radius, V3::ZERO + self.radius);
        AABB::from_vertices_iter(object_bounds.corners().iter().map(|&c| self.transform.of_point(c)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hit_from_outside() {
        let sphere = Sphere::new(Transform::default(), 1.0);
        let ray = Ray::new(V3(0.0, 0.0, 10.0), V3(0.0, 0.0, -1.0));
        let hit = sphere.intersect(&ray, 0.001, f32::MAX).expect("should hit");
        assert!((hit.t - 9.0).abs() < 1e-4);
        assert!((hit.normal - V3(0.0, 0.0, 1.0)).length() < 1e-4);
    }

    #[test]
    fn hit_from_inside_returns_far_root() {
        let sphere = Sphere::new(Transform::default(), 1.0);
        let ray = Ray::new(V3::ZERO, V3(0.0, 0.0, -1.0));
        let hit = sphere.intersect(&ray, 0.001, f32::MAX).expect("should hit the back wall");
        assert!((hit.t - 1.0).abs() < 1e-4);
    }

    #[test]
    fn miss_behind_origin() {
        let sphere = Sphere::new(Transform::default(), 1.0);
        let ray = Ray::new(V3(0.0, 0.0, 10.0), V3(0.0, 0.0, 1.0));
        assert!(sphere.intersect(&ray, 0.001, f32::MAX).is_none());
    }

    #[test]
    fn tangent_ray_is_never_nan() {
        // Grazes the sphere at exactly x = 1: discriminant == 0
        let sphere = Sphere::new(Transform::default(), 1.0);
        let ray = Ray::new(V3(1.0, 0.0, 10.0), V3(0.0, 0.0, -1.0));
        if let Some(hit) = sphere.intersect(&ray, 0.001, f32::MAX) {
            assert!(hit.t.is_finite());
            assert!(hit.p.is_finite());
            assert!(hit.normal.is_finite());
        }
    }

    #[test]
    fn respects_t_max() {
        let sphere = Sphere::new(Transform::default(), 1.0);
        let ray = Ray::new(V3(0.0, 0.0, 10.0), V3(0.0, 0.0, -1.0));
        assert!(sphere.intersect(&ray, 0.001, 5.0).is_none());
    }

    #[test]
    fn translated_bounds() {
        let sphere = Sphere::new(Transform::translation(V3(2.0, 0.0, -1.0)), 1.0);
        let bounds = sphere.world_bounds();
        assert!((bounds.min - V3(1.0, -1.0, -2.0)).length() < 1e-5);
        assert!((bounds.max - V3(3.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn translated_hit() {
        let sphere = Sphere::new(Transform::translation(V3(2.0, 0.0, 0.0)), 1.0);
        let ray = Ray::new(V3(2.0, 0.0, 10.0), V3(0.0, 0.0, -1.0));
        let hit = sphere.intersect(&ray, 0.001, f32::MAX).expect("should hit");
        assert!((hit.t - 9.0).abs() < 1e-4);
        assert!((hit.p - V3(2.0, 0.0, 1.0)).length() < 1e-4);
    }
}
