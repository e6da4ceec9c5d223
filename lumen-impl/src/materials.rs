use std::f32::consts::FRAC_1_PI;

use crate::implementation::{ Material, ScatterRecord, SurfaceInteraction, spawn_ray };
use crate::types::{ Ray, V3 };

use rand::{ Rng, RngCore };

//
// Sampling helpers
//

/// An orthonormal frame with {w} along the given direction
pub(crate) struct OrthonormalBasis {
    u: V3,
    v: V3,
    w: V3,
}

impl OrthonormalBasis {
    pub fn from_w(direction: V3) -> OrthonormalBasis {
        let w = direction.unit();
        // Any axis not parallel to {w} anchors the frame
        let a = if w.x().abs() > 0.9 { V3::POS_Y } else { V3::POS_X };
        let v = V3::cross(w, a).unit();
        let u = V3::cross(w, v);
        OrthonormalBasis { u, v, w }
    }

    pub fn local(&self, a: V3) -> V3 {
        (self.u * a.0) + (self.v * a.1) + (self.w * a.2)
    }
}

/// Cosine-weighted hemisphere direction around +w in basis coordinates
fn cosine_weighted_direction(rng: &mut dyn RngCore) -> V3 {
    let r1 = rng.random::<f32>();
    let r2 = rng.random::<f32>();
    let phi = 2.0 * std::f32::consts::PI * r1;
    let r = r2.sqrt();
    V3(r * phi.cos(), r * phi.sin(), (1.0 - r2).max(0.0).sqrt())
}

fn random_in_unit_sphere(rng: &mut dyn RngCore) -> V3 {
    loop {
        let p = V3(
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>() * 2.0 - 1.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

fn reflect(incident_direction: V3, surface_normal: V3) -> V3 {
    let dir = incident_direction.unit();
    dir - (surface_normal * V3::dot(dir, surface_normal) * 2.0)
}

fn refract(v: V3, n: V3, ni_over_nt: f32) -> V3 {
    let uv = v.unit();
    let dt = V3::dot(uv, n);
    let discriminant = 1.0 - ni_over_nt * ni_over_nt * (1.0 - dt * dt);
    if discriminant <= 0.0 {
        V3::ZERO
    } else {
        (uv - (n * dt)) * ni_over_nt - (n * discriminant.sqrt())
    }
}

fn schlick_reflect_prob(cosine: f32, ni_over_nt: f32) -> f32 {
    let r0 = (1.0 - ni_over_nt) / (1.0 + ni_over_nt);
    let r0 = r0 * r0;
    r0 + (1.0 - r0) * (1.0 - cosine).powf(5.0)
}

//
// Materials
//

/// The diffuse reference material: cosine-weighted hemisphere scattering
/// about the surface normal.
#[derive(Clone)]
pub struct MatLambertian {
    albedo: V3,
}

impl MatLambertian {
    pub fn new(albedo: V3) -> Self {
        Self { albedo }
    }
}

impl Material for MatLambertian {
    fn scatter(&self, _ray: &Ray, hit: &SurfaceInteraction, rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        if hit.normal.length_squared() < 1e-12 {
            // Degenerate geometry
            return None;
        }
        let basis = OrthonormalBasis::from_w(hit.normal);
        let direction = basis.local(cosine_weighted_direction(rng));
        Some(ScatterRecord {
            attenuation: self.albedo,
            scattered: spawn_ray(hit.p, hit.normal, direction),
        })
    }

    fn eval(&self, hit: &SurfaceInteraction, wi: V3) -> V3 {
        if V3::dot(hit.normal, wi) <= 0.0 {
            return V3::ZERO;
        }
        self.albedo * FRAC_1_PI
    }
}

/// Mirror reflection, optionally roughened by a fuzz sphere.
#[derive(Clone)]
pub struct MatSpecular {
    albedo: V3,
    fuzz: f32,
}

impl MatSpecular {
    pub fn new(albedo: V3) -> Self {
        Self { albedo, fuzz: 0.0 }
    }

    pub fn with_fuzz(mut self, fuzz: f32) -> Self {
        assert!((0.0..=1.0).contains(&fuzz), "fuzz must be within the range of 0.0 to 1.0");
        self.fuzz = fuzz;
        self
    }
}

impl Material for MatSpecular {
    fn scatter(&self, ray: &Ray, hit: &SurfaceInteraction, rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        let reflected = reflect(ray.direction, hit.normal);
        let direction =
            if self.fuzz == 0.0 {
                reflected
            } else {
                reflected + (random_in_unit_sphere(rng) * self.fuzz)
            };

        // Fuzz can push the ray below the surface; that energy is absorbed
        if V3::dot(direction, hit.normal) <= 0.0 {
            return None;
        }

        Some(ScatterRecord {
            attenuation: self.albedo,
            scattered: spawn_ray(hit.p, hit.normal, direction),
        })
    }

    fn is_specular(&self) -> bool {
        true
    }
}

/// Glass-like transmission: chooses between reflection and refraction per
/// sample with Schlick's approximation, falling back to reflection under
/// total internal reflection.
#[derive(Clone)]
pub struct MatDielectric {
    ref_index: f32,
}

impl MatDielectric {
    pub fn new(ref_index: f32) -> Self {
        Self { ref_index }
    }
}

impl Material for MatDielectric {
    fn scatter(&self, ray: &Ray, hit: &SurfaceInteraction, rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        let unit_direction = ray.direction.unit();
        let entering = V3::dot(unit_direction, hit.normal) < 0.0;
        let (outward_normal, ni_over_nt) =
            if entering {
                (hit.normal, 1.0 / self.ref_index)
            } else {
                (-hit.normal, self.ref_index)
            };

        let cosine = -V3::dot(unit_direction, outward_normal);
        let refracted = refract(unit_direction, outward_normal, ni_over_nt);

        let total_internal_reflection = refracted == V3::ZERO;
        let direction =
            if total_internal_reflection || rng.random::<f32>() < schlick_reflect_prob(cosine, ni_over_nt) {
                reflect(unit_direction, outward_normal)
            } else {
                refracted
            };

        Some(ScatterRecord {
            attenuation: V3::ONE,
            scattered: spawn_ray(hit.p, hit.normal, direction),
        })
    }

    fn is_specular(&self) -> bool {
        true
    }
}

/// A surface which only emits; incident rays are absorbed.
#[derive(Clone)]
pub struct MatEmissive {
    emit: V3,
}

impl MatEmissive {
    pub fn new(emit: V3) -> Self {
        Self { emit }
    }
}

impl Material for MatEmissive {
    fn scatter(&self, _ray: &Ray, _hit: &SurfaceInteraction, _rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        None
    }

    fn emitted(&self) -> V3 {
        self.emit
    }
}
