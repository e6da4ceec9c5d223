use crate::implementation::{ AABB, Shape, ShapeHit };
use crate::shapes::Quad;
use crate::transform::Transform;
use crate::types::{ Ray, V3 };

/// An axis-aligned box in object space, composed of six quads with
/// precomputed outward face normals and corner positions. The transform
/// carries placement and orientation in the world.
pub struct Cuboid {
    transform: Transform,
    faces: [Quad; 6],
    face_normals: [V3; 6],
    local_corners: [V3; 8],
}

impl Cuboid {
    /// Builds a box centered at the object-space origin with the given full
    /// extents along each axis.
    pub fn new(transform: Transform, extents: V3) -> Cuboid {
        let h = extents * 0.5;
        let identity = Transform::default;

        let span_x = V3(extents.0, 0.0, 0.0);
        let span_y = V3(0.0, extents.1, 0.0);
        let span_z = V3(0.0, 0.0, extents.2);

        let faces = [
            // +x / -x
            Quad::new(identity(), V3(h.0, -h.1, -h.2), span_y, span_z),
            Quad::new(identity(), V3(-h.0, -h.1, -h.2), span_z, span_y),
            // +y / -y
            Quad::new(identity(), V3(-h.0, h.1, -h.2), span_z, span_x),
            Quad::new(identity(), V3(-h.0, -h.1, -h.2), span_x, span_z),
            // +z / -z
            Quad::new(identity(), V3(-h.0, -h.1, h.2), span_x, span_y),
            Quad::new(identity(), V3(-h.0, -h.1, -h.2), span_y, span_x),
        ];

        let face_normals = [
            V3::POS_X, -V3::POS_X,
            V3::POS_Y, -V3::POS_Y,
            V3::POS_Z, -V3::POS_Z,
        ];

        let local_bounds = AABB::from_min_max(-h, h);

        Cuboid {
            transform,
            faces,
            face_normals,
            local_corners: local_bounds.corners(),
        }
    }
}

impl Shape for Cuboid {
    fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<ShapeHit> {
        let local_ray = self.transform.to_local(ray);

        // Walk all six faces, tightening the upper bound so the nearest wins
        let mut closest_so_far = t_max;
        let mut nearest_face: Option<usize> = None;
        for (face_index, face) in self.faces.iter().enumerate() {
            if let Some(hit) = face.intersect(&local_ray, t_min, closest_so_far) {
                closest_so_far = hit.t;
                nearest_face = Some(face_index);
            }
        }

        let face_index = nearest_face?;
        let t = closest_so_far;
        Some(ShapeHit {
            t,
            p: self.transform.of_point(local_ray.point_at_parameter(t)),
            normal: self.transform.of_normal(self.face_normals[face_index]),
        })
    }

    fn world_bounds(&self) -> AABB {
        AABB::from_vertices_iter(self.local_corners.iter().map(|&c| self.transform.of_point(c)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn front_face_hit() {
        // Box spanning [-1, 1]^3, ray approaching down -z
        let cuboid = Cuboid::new(Transform::default(), V3(2.0, 2.0, 2.0));
        let ray = Ray::new(V3(0.0, 0.0, 5.0), V3(0.0, 0.0, -1.0));
        let hit = cuboid.intersect(&ray, 0.001, f32::MAX).expect("should hit");
        assert!((hit.t - 4.0).abs() < 1e-4, "t = {}", hit.t);
        assert!((hit.normal - V3(0.0, 0.0, 1.0)).length() < 1e-4);
        assert!((hit.p - V3(0.0, 0.0, 1.0)).length() < 1e-4);
    }

    #[test]
    fn side_face_normal() {
        let cuboid = Cuboid::new(Transform::default(), V3(2.0, 2.0, 2.0));
        let ray = Ray::new(V3(5.0, 0.3, -0.2), V3(-1.0, 0.0, 0.0));
        let hit = cuboid.intersect(&ray, 0.001, f32::MAX).expect("should hit");
        assert!((hit.normal - V3(1.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn corner_miss() {
        let cuboid = Cuboid::new(Transform::default(), V3(2.0, 2.0, 2.0));
        let ray = Ray::new(V3(3.0, 3.0, 5.0), V3(0.0, 0.0, -1.0));
        assert!(cuboid.intersect(&ray, 0.001, f32::MAX).is_none());
    }

    #[test]
    fn hit_from_inside() {
        let cuboid = Cuboid::new(Transform::default(), V3(2.0, 2.0, 2.0));
        let ray = Ray::new(V3::ZERO, V3(0.0, 0.0, -1.0));
        let hit = cuboid.intersect(&ray, 0.001, f32::MAX).expect("should hit the far wall");
        assert!((hit.t - 1.0).abs() < 1e-4);
    }

    #[test]
    fn rotated_bounds_grow() {
        // A 45-degree rotation about y stretches the xz footprint to sqrt(2)
        let transform = Transform::rotation_y(45_f32.to_radians());
        let cuboid = Cuboid::new(transform, V3(2.0, 2.0, 2.0));
        let bounds = cuboid.world_bounds();
        let expected = 2.0_f32.sqrt();
        assert!((bounds.max.x() - expected).abs() < 1e-4);
        assert!((bounds.max.z() - expected).abs() < 1e-4);
        assert!((bounds.max.y() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn translated_box_hit() {
        let cuboid = Cuboid::new(Transform::translation(V3(0.0, 0.0, -3.0)), V3(2.0, 2.0, 2.0));
        let ray = Ray::new(V3(0.0, 0.0, 5.0), V3(0.0, 0.0, -1.0));
        let hit = cuboid.intersect(&ray, 0.001, f32::MAX).expect("should hit");
        assert!((hit.t - 7.0).abs() < 1e-4);
    }
}
