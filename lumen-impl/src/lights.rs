use crate::implementation::{ AABB, Light, LightSample, SurfaceInteraction, VisibilityTester };
use crate::types::V3;

use rand::RngCore;

/// Emits from a single world-space position with inverse-square falloff.
pub struct PointLight {
    origin: V3,
    color: V3,
    intensity: f32,
}

impl PointLight {
    pub fn new(origin: V3, color: V3, intensity: f32) -> PointLight {
        PointLight { origin, color, intensity }
    }
}

impl Light for PointLight {
    fn sample_li(&self, hit: &SurfaceInteraction, _rng: &mut dyn RngCore) -> Option<LightSample> {
        let to_light = self.origin - hit.p;
        let distance_squared = to_light.length_squared();
        if distance_squared <= 0.0 {
            return None;
        }
        Some(LightSample {
            li: self.color * (self.intensity / distance_squared),
            wi: to_light.unit(),
            pdf: 1.0,
            visibility: VisibilityTester {
                p0: hit.p,
                n0: hit.normal,
                p1: self.origin,
            },
        })
    }
}

/// Parallel radiance along a fixed direction, as from a very distant source.
/// The visibility endpoint has to lie outside all geometry, so preprocess
/// learns a radius from the scene bounds at finalization.
pub struct DirectionalLight {
    // Direction the light travels, towards the scene
    direction: V3,
    color: V3,
    intensity: f32,
    world_radius: f32,
}

impl DirectionalLight {
    pub fn new(direction: V3, color: V3, intensity: f32) -> DirectionalLight {
        DirectionalLight {
            direction: direction.unit(),
            color,
            intensity,
            // Overwritten by preprocess; generous enough for unfinalized use
            world_radius: 1.0e4,
        }
    }
}

impl Light for DirectionalLight {
    fn sample_li(&self, hit: &SurfaceInteraction, _rng: &mut dyn RngCore) -> Option<LightSample> {
        let wi = -self.direction;
        Some(LightSample {
            li: self.color * self.intensity,
            wi,
            pdf: 1.0,
            visibility: VisibilityTester {
                p0: hit.p,
                n0: hit.normal,
                p1: hit.p + (wi * (2.0 * self.world_radius)),
            },
        })
    }

    fn preprocess(&mut self, world_bounds: &AABB) {
        if !world_bounds.is_degenerate() {
            self.world_radius = world_bounds.extent().length() * 0.5;
        }
    }
}
