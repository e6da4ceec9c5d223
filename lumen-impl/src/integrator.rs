use crate::implementation::{ BIAS, Scene, SurfaceInteraction };
use crate::types::{ Ray, V2, V3 };

use rand::{ Rng, RngCore };

//
// Core raytracing routines
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegratorKind {
    /// Direct lighting at the first hit, recursing only on specular surfaces
    Whitted,
    /// Iterative path tracing with next-event estimation and Russian roulette
    Path,
}

#[derive(Clone)]
pub struct RenderSettings {
    pub samples_per_pixel: u32,
    pub max_bounces: u32,
    pub integrator: IntegratorKind,
}

/// One pixel's worth of samples. Radiance is the running total, not the
/// mean; the film keeps accumulators and divides on read.
pub struct PixelSample {
    pub radiance: V3,
    pub samples: u32,
    /// Samples which produced a non-finite value and were dropped
    pub degenerate_samples: u32,
}

/// Roulette termination is only considered after this many bounces
const MIN_BOUNCES_BEFORE_ROULETTE: u32 = 3;

fn random_in_unit_disk(rng: &mut dyn RngCore) -> V2 {
    loop {
        let p = V2(
            rng.random::<f32>() * 2.0 - 1.0,
            rng.random::<f32>() * 2.0 - 1.0);
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

// Lights and shadows

/// Sums `f(wo,wi) * Li * |n.wi| / pdf` over every light whose visibility
/// probe reaches the surface point unoccluded.
fn direct_lighting(scene: &Scene, hit: &SurfaceInteraction, rng: &mut dyn RngCore) -> V3 {
    let material = scene.get_mat(hit.mat_id);

    let mut total = V3::ZERO;
    for light in scene.lights() {
        let Some(sample) = light.sample_li(hit, rng) else { continue };
        if sample.pdf <= 0.0 {
            continue;
        }
        let f = material.eval(hit, sample.wi);
        if f == V3::ZERO {
            continue;
        }
        let cos_theta = V3::dot(hit.normal, sample.wi);
        if cos_theta <= 0.0 {
            continue;
        }
        // The occlusion probe is the expensive part; test it last
        if sample.visibility.is_occluded(scene) {
            continue;
        }
        total = total + (f * sample.li * (cos_theta / sample.pdf));
    }
    total
}

/// Whitted-style recursion: emitted light plus sampled direct lighting at
/// every surface, following only specular reflection and transmission.
fn cast_ray_whitted(scene: &Scene, ray: &Ray, rng: &mut dyn RngCore, depth: u32) -> V3 {
    if depth == 0 {
        return V3::ZERO;
    }

    let Some(hit) = scene.intersect(ray, BIAS, f32::MAX) else {
        return scene.sample_sky(ray);
    };

    let material = scene.get_mat(hit.mat_id);
    let mut radiance = material.emitted() + direct_lighting(scene, &hit, rng);

    if material.is_specular() {
        if let Some(scatter) = material.scatter(ray, &hit, rng) {
            radiance = radiance + (scatter.attenuation * cast_ray_whitted(scene, &scatter.scattered, rng, depth - 1));
        }
    }

    radiance
}

/// Iterative path walk up to the bounce budget.
///
/// Point and directional lights are sampled explicitly at diffuse vertices;
/// emissive surfaces contribute only when the walk lands on them, so the two
/// estimators never count the same light twice.
fn cast_ray_path(scene: &Scene, primary: &Ray, rng: &mut dyn RngCore, max_bounces: u32) -> V3 {
    let mut radiance = V3::ZERO;
    let mut throughput = V3::ONE;
    let mut ray = *primary;

    for bounce in 0..max_bounces {
        let Some(hit) = scene.intersect(&ray, BIAS, f32::MAX) else {
            radiance = radiance + (throughput * scene.sample_sky(&ray));
            break;
        };

        let material = scene.get_mat(hit.mat_id);
        radiance = radiance + (throughput * material.emitted());
        if !material.is_specular() {
            radiance = radiance + (throughput * direct_lighting(scene, &hit, rng));
        }

        // Absorbed?
        let Some(scatter) = material.scatter(&ray, &hit, rng) else {
            break;
        };
        throughput = throughput * scatter.attenuation;
        ray = scatter.scattered;

        // Russian roulette: unbiased early termination once the throughput
        // has had a chance to decay
        if bounce + 1 >= MIN_BOUNCES_BEFORE_ROULETTE {
            let survival = throughput.max_component().clamp(0.05, 0.95);
            if rng.random::<f32>() >= survival {
                break;
            }
            throughput = throughput / survival;
        }
    }

    radiance
}

/// Casts all samples for the pixel at (x, y) on a film of the given size.
///
/// Pixel positions are stratified-jittered when the sample count is a
/// perfect square and independently jittered otherwise; lens samples are
/// drawn on the unit disk. Non-finite samples contribute nothing beyond a
/// bump of the degeneracy counter.
pub fn cast_rays_into_scene(settings: &RenderSettings, scene: &Scene, film_width: usize, film_height: usize, x: usize, y: usize, rng: &mut dyn RngCore) -> PixelSample {
    let samples_per_pixel = settings.samples_per_pixel.max(1);
    let strata = (samples_per_pixel as f32).sqrt() as u32;
    let stratified = strata * strata == samples_per_pixel;

    let mut radiance = V3::ZERO;
    let mut degenerate_samples = 0;

    for s in 0..samples_per_pixel {
        let (jitter_x, jitter_y) = if stratified {
            (((s % strata) as f32 + rng.random::<f32>()) / strata as f32,
             ((s / strata) as f32 + rng.random::<f32>()) / strata as f32)
        } else {
            (rng.random::<f32>(), rng.random::<f32>())
        };

        // NOTE:
        // View coordinates are from upper left corner, but World coordinates
        // are from lower left corner. Need to convert coordinate systems
        let u = (x as f32 + jitter_x) / film_width as f32;
        let v = ((film_height - 1 - y) as f32 + jitter_y) / film_height as f32;

        let lens = random_in_unit_disk(rng);
        let ray = scene.camera().get_ray(u, v, lens);

        let sample = match settings.integrator {
            IntegratorKind::Whitted => cast_ray_whitted(scene, &ray, rng, settings.max_bounces),
            IntegratorKind::Path => cast_ray_path(scene, &ray, rng, settings.max_bounces),
        };

        if sample.is_finite() {
            radiance = radiance + sample;
        } else {
            degenerate_samples += 1;
        }
    }

    PixelSample {
        radiance,
        samples: samples_per_pixel,
        degenerate_samples,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::implementation::{ AcceleratorKind, Camera, Material, Primitive, ScatterRecord, Scene, SceneSky, SurfaceInteraction };
    use crate::lights::PointLight;
    use crate::materials::{ MatEmissive, MatLambertian };
    use crate::shapes::{ Quad, Sphere };
    use crate::transform::Transform;

    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn whitted_settings(max_bounces: u32) -> RenderSettings {
        RenderSettings {
            samples_per_pixel: 1,
            max_bounces,
            integrator: IntegratorKind::Whitted,
        }
    }

    fn single_sphere_scene(sky: SceneSky) -> Scene {
        let camera = Camera::new(V3(0.0, 0.0, 10.0), V3::ZERO, V3::POS_Y, 40.0, 1.0, 0.0, 10.0);
        let mut scene = Scene::new(camera, sky);
        let mat = scene.add_material(MatLambertian::new(V3(0.8, 0.8, 0.8)));
        scene.add_primitive(Primitive::new(Sphere::new(Transform::default(), 1.0), mat)).unwrap();
        scene.add_light(PointLight::new(V3(0.0, 0.0, 5.0), V3::ONE, 20.0));
        scene.init_accelerator(AcceleratorKind::Bvh).unwrap();
        scene
    }

    #[test]
    fn center_pixel_hits_corner_pixel_sees_sky() {
        // Unit sphere at the origin, pinhole camera on the z axis. On a 7x7
        // film every jitter position of the center pixel lands on the sphere
        // and every jitter position of the corner pixel escapes to the sky.
        let scene = single_sphere_scene(SceneSky::Black);
        let settings = whitted_settings(1);
        let mut rng = XorShiftRng::seed_from_u64(9);

        let center = cast_rays_into_scene(&settings, &scene, 7, 7, 3, 3, &mut rng);
        assert!(center.radiance.max_component() > 0.0, "lit sphere should be visible");

        let corner = cast_rays_into_scene(&settings, &scene, 7, 7, 0, 0, &mut rng);
        assert_eq!(corner.radiance, V3::ZERO, "black sky should stay black");
        assert_eq!(corner.degenerate_samples, 0);
    }

    #[test]
    fn empty_scene_returns_sky_radiance() {
        let camera = Camera::new(V3(0.0, 0.0, 10.0), V3::ZERO, V3::POS_Y, 40.0, 1.0, 0.0, 10.0);
        let mut scene = Scene::new(camera, SceneSky::default());
        scene.init_accelerator(AcceleratorKind::Bvh).unwrap();

        let settings = RenderSettings {
            samples_per_pixel: 4,
            max_bounces: 4,
            integrator: IntegratorKind::Path,
        };
        let mut rng = XorShiftRng::seed_from_u64(10);
        let sample = cast_rays_into_scene(&settings, &scene, 5, 5, 2, 2, &mut rng);

        let mean = sample.radiance / sample.samples as f32;
        assert!(mean.is_finite());
        // The gradient sky is bounded by its two endpoint colors
        assert!(mean.0 > 0.0 && mean.0 <= 0.74);
        assert_eq!(sample.degenerate_samples, 0);
    }

    /// Six diffuse walls facing inward with an emissive ceiling panel
    fn enclosed_box_scene() -> Scene {
        let camera = Camera::new(V3(0.0, 0.0, 1.5), V3(0.0, 0.0, -1.0), V3::POS_Y, 60.0, 1.0, 0.0, 2.5);
        let mut scene = Scene::new(camera, SceneSky::Black);
        let wall = scene.add_material(MatLambertian::new(V3(0.8, 0.8, 0.8)));
        let emitter = scene.add_material(MatEmissive::new(V3(4.0, 4.0, 4.0)));

        let identity = Transform::default;
        let span_x = V3(4.0, 0.0, 0.0);
        let span_y = V3(0.0, 4.0, 0.0);
        let span_z = V3(0.0, 0.0, 4.0);
        let low = V3(-2.0, -2.0, -2.0);

        let walls = [
            Quad::new(identity(), low, span_x, span_z),                      // floor
            Quad::new(identity(), V3(-2.0, 2.0, -2.0), span_x, span_z),     // ceiling
            Quad::new(identity(), low, span_x, span_y),                      // back
            Quad::new(identity(), V3(-2.0, -2.0, 2.0), span_x, span_y),     // front
            Quad::new(identity(), low, span_y, span_z),                      // left
            Quad::new(identity(), V3(2.0, -2.0, -2.0), span_y, span_z),     // right
        ];
        for quad in walls {
            scene.add_primitive(Primitive::new(quad, wall)).unwrap();
        }

        // Emissive panel hanging just below the ceiling
        let panel = Quad::new(identity(), V3(-1.0, 1.99, -1.0), V3(2.0, 0.0, 0.0), V3(0.0, 0.0, 2.0));
        scene.add_primitive(Primitive::new(panel, emitter)).unwrap();

        scene.init_accelerator(AcceleratorKind::Bvh).unwrap();
        scene
    }

    #[test]
    fn enclosed_diffuse_box_never_amplifies_energy() {
        // The mean radiance must stay below the emitter radiance for any
        // bounce budget: albedo < 1 only ever removes energy.
        let scene = enclosed_box_scene();
        let mut rng = XorShiftRng::seed_from_u64(11);

        for max_bounces in [4, 16] {
            let settings = RenderSettings {
                samples_per_pixel: 8,
                max_bounces,
                integrator: IntegratorKind::Path,
            };

            let mut total = V3::ZERO;
            let mut count = 0;
            for y in 0..8 {
                for x in 0..8 {
                    let sample = cast_rays_into_scene(&settings, &scene, 8, 8, x, y, &mut rng);
                    assert_eq!(sample.degenerate_samples, 0);
                    total = total + (sample.radiance / sample.samples as f32);
                    count += 1;
                }
            }

            let mean = total / count as f32;
            assert!(mean.max_component() > 0.0, "the emitter should light the box");
            assert!(mean.max_component() <= 4.0, "mean {:?} exceeds the emitter radiance", mean);
        }
    }

    struct NanMaterial;

    impl Material for NanMaterial {
        fn scatter(&self, _ray: &Ray, _hit: &SurfaceInteraction, _rng: &mut dyn RngCore) -> Option<ScatterRecord> {
            None
        }

        fn emitted(&self) -> V3 {
            V3(f32::NAN, 0.0, 0.0)
        }
    }

    #[test]
    fn non_finite_samples_are_counted_not_propagated() {
        let camera = Camera::new(V3(0.0, 0.0, 10.0), V3::ZERO, V3::POS_Y, 40.0, 1.0, 0.0, 10.0);
        let mut scene = Scene::new(camera, SceneSky::Black);
        let mat = scene.add_material(NanMaterial);
        scene.add_primitive(Primitive::new(Sphere::new(Transform::default(), 1.0), mat)).unwrap();
        scene.init_accelerator(AcceleratorKind::Bvh).unwrap();

        let settings = RenderSettings {
            samples_per_pixel: 4,
            max_bounces: 2,
            integrator: IntegratorKind::Whitted,
        };
        let mut rng = XorShiftRng::seed_from_u64(12);
        let sample = cast_rays_into_scene(&settings, &scene, 7, 7, 3, 3, &mut rng);

        assert_eq!(sample.degenerate_samples, 4);
        assert_eq!(sample.radiance, V3::ZERO);
    }
}
