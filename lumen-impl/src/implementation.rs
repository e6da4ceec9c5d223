use std::sync::Arc;

use crate::bvh::{ Bvh, BvhObject };
use crate::types::{ IntoArc, Ray, V2, V3 };
use crate::util::{ deg_to_rad, saturate };

use log::info;
use rand::RngCore;

/// Offset applied along the surface normal when spawning secondary rays,
/// so a ray never re-intersects the surface it originated from.
pub const BIAS: f32 = 0.004;

/// Shadow segments are parameterized on [0, 1]; the endpoint is excluded.
const SHADOW_SEGMENT_MAX: f32 = 1.0 - 1e-3;

/// Spawns a ray from a surface point, offset along the normal to the side
/// the direction leaves through.
pub fn spawn_ray(p: V3, normal: V3, direction: V3) -> Ray {
    let offset = if V3::dot(direction, normal) < 0.0 { -BIAS } else { BIAS };
    Ray::new(p + (normal * offset), direction)
}

// AABB / Bounding Boxes

#[derive(Clone, Debug, Default)]
pub struct AABB {
    pub min: V3,
    pub max: V3,
}

impl AABB {
    /// Creates a bounding box from the given min/max vertices
    pub fn from_min_max(min: V3, max: V3) -> AABB {
        AABB { min, max }
    }

    /// Finds the axis-aligned bounding box which fully contains the given list of vertices
    pub fn from_vertices(vertices: &[V3]) -> AABB {
        AABB::from_vertices_iter(vertices.iter().cloned())
    }

    /// Creates a bounding box which fully contains the given two boxes
    pub fn surrounding(b0: &AABB, b1: &AABB) -> AABB {
        AABB::from_min_max(
            V3::min_components(b0.min, b1.min),
            V3::max_components(b0.max, b1.max))
    }

    /// Finds the axis-aligned bounding box which fully contains the given sequence of vertices
    pub fn from_vertices_iter(vertices: impl IntoIterator<Item=V3>) -> AABB {
        let mut iter = vertices.into_iter();

        let mut min = iter.next().expect("Cannot create AABB from empty vertex list");
        let mut max = min;

        for vert in iter {
            min = V3::min_components(min, vert);
            max = V3::max_components(max, vert);
        }

        AABB::from_min_max(min, max)
    }

    pub fn centroid(&self) -> V3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> V3 {
        self.max - self.min
    }

    /// A degenerate box is inverted, non-finite, or collapsed to a point.
    /// The empty-scene bound (both endpoints at the origin) is degenerate.
    pub fn is_degenerate(&self) -> bool {
        !self.min.is_finite()
            || !self.max.is_finite()
            || self.max.0 < self.min.0
            || self.max.1 < self.min.1
            || self.max.2 < self.min.2
            || self.min == self.max
    }

    /// Grows any axis thinner than {epsilon} so flat geometry (quads) still
    /// gets a box the slab test can intersect.
    pub fn padded(&self, epsilon: f32) -> AABB {
        let mut min = self.min;
        let mut max = self.max;
        if max.0 - min.0 < epsilon { min.0 -= epsilon * 0.5; max.0 += epsilon * 0.5; }
        if max.1 - min.1 < epsilon { min.1 -= epsilon * 0.5; max.1 += epsilon * 0.5; }
        if max.2 - min.2 < epsilon { min.2 -= epsilon * 0.5; max.2 += epsilon * 0.5; }
        AABB::from_min_max(min, max)
    }

    pub fn hit_aabb(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        let d = ray.direction.xyz();
        let inv_dir = [1.0 / d[0], 1.0 / d[1], 1.0 / d[2]];
        self.hit_aabb_inv(&ray.origin.xyz(), &inv_dir, t_min, t_max)
    }

    /// Slab test with a precomputed reciprocal direction, one interval
    /// intersection per axis. Rejects as soon as the interval empties.
    pub fn hit_aabb_inv(&self, origin: &[f32; 3], inv_dir: &[f32; 3], mut t_min: f32, mut t_max: f32) -> bool {
        let min = self.min.xyz();
        let max = self.max.xyz();
        for axis in 0..=2 {
            let mut t0 = (min[axis] - origin[axis]) * inv_dir[axis];
            let mut t1 = (max[axis] - origin[axis]) * inv_dir[axis];
            if inv_dir[axis] < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = if t0 > t_min { t0 } else { t_min };
            t_max = if t1 < t_max { t1 } else { t_max };
            if t_max < t_min {
                return false;
            }
        }

        true
    }

    pub fn corners(&self) -> [V3; 8] {
        [
            self.min,
            V3(self.min.0, self.min.1, self.max.2),
            V3(self.min.0, self.max.1, self.min.2),
            V3(self.max.0, self.min.1, self.min.2),
            self.max,
            V3(self.max.0, self.max.1, self.min.2),
            V3(self.max.0, self.min.1, self.max.2),
            V3(self.min.0, self.max.1, self.max.2),
        ]
    }
}

// Shapes

/// A shape-level hit, before any material is attached.
pub struct ShapeHit {
    pub t: f32,
    pub p: V3,
    pub normal: V3,
}

pub trait Shape: Send + Sync {
    fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<ShapeHit>;

    fn has_intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.intersect(ray, t_min, t_max).is_some()
    }

    /// World-space bounds. The shape's transform carries its placement, so
    /// object-space extents alone are never enough here.
    fn world_bounds(&self) -> AABB;
}

crate::types::derive_into_arc!(Shape);

// Materials

pub struct ScatterRecord {
    pub attenuation: V3,
    pub scattered: Ray,
}

pub trait Material: Send + Sync {
    /// Produces a scattered ray and throughput attenuation, or None when the
    /// ray is absorbed.
    fn scatter(&self, ray: &Ray, hit: &SurfaceInteraction, rng: &mut dyn RngCore) -> Option<ScatterRecord>;

    /// BSDF value for a concrete pair of directions; used for direct light
    /// sampling. Specular materials evaluate to zero.
    fn eval(&self, _hit: &SurfaceInteraction, _wi: V3) -> V3 {
        V3::ZERO
    }

    fn emitted(&self) -> V3 {
        V3::ZERO
    }

    fn is_specular(&self) -> bool {
        false
    }
}

crate::types::derive_into_arc!(Material);

// Surface interactions

#[derive(Clone, Copy)]
pub struct MatId(pub(crate) usize);

/// The record of a ray-surface hit. Valid only after a successful intersect.
pub struct SurfaceInteraction {
    pub t: f32,
    pub p: V3,
    /// Unit outward surface normal
    pub normal: V3,
    /// Unit direction back towards the ray origin
    pub wo: V3,
    pub mat_id: MatId,
}

// Primitives

/// Pairs one shape with a material handle into the scene's material table.
/// World bounds are cached at construction; transformed shapes rebuild their
/// corner set otherwise.
pub struct Primitive {
    shape: Arc<dyn Shape>,
    mat_id: MatId,
    bounds: AABB,
}

impl Primitive {
    pub fn new(shape: impl IntoArc<dyn Shape>, mat_id: MatId) -> Primitive {
        let shape = shape.into_arc();
        let bounds = shape.world_bounds();
        Primitive { shape, mat_id, bounds }
    }

    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<SurfaceInteraction> {
        let hit = self.shape.intersect(ray, t_min, t_max)?;
        Some(SurfaceInteraction {
            t: hit.t,
            p: hit.p,
            normal: hit.normal,
            wo: -ray.direction.unit(),
            mat_id: self.mat_id,
        })
    }

    pub fn has_intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.shape.has_intersect(ray, t_min, t_max)
    }
}

impl BvhObject for Primitive {
    fn aabb(&self) -> AABB {
        self.bounds.clone()
    }

    fn centroid(&self) -> V3 {
        self.bounds.centroid()
    }

    fn hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<SurfaceInteraction> {
        self.intersect(ray, t_min, t_max)
    }

    fn has_hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.has_intersect(ray, t_min, t_max)
    }
}

// Light sources

pub struct LightSample {
    /// Incident radiance arriving at the receiving point
    pub li: V3,
    /// Unit direction from the receiving point towards the light
    pub wi: V3,
    pub pdf: f32,
    pub visibility: VisibilityTester,
}

pub trait Light: Send + Sync {
    fn sample_li(&self, hit: &SurfaceInteraction, rng: &mut dyn RngCore) -> Option<LightSample>;

    /// One-shot hook run at scene finalization. Lights store scalars derived
    /// from the scene bounds; no reference back to the scene is kept.
    fn preprocess(&mut self, _world_bounds: &AABB) {}
}

/// A two-endpoint visibility probe: the receiving surface point (with its
/// normal, for the spawn offset) and a point on the light.
pub struct VisibilityTester {
    pub p0: V3,
    pub n0: V3,
    pub p1: V3,
}

impl VisibilityTester {
    /// Tests the open segment between the two endpoints for occluders.
    /// The segment ray is parameterized on [0, 1] with both endpoints
    /// excluded, so neither surface shadows itself.
    pub fn is_occluded(&self, scene: &Scene) -> bool {
        let origin = self.p0 + (self.n0 * BIAS);
        let segment = self.p1 - origin;
        scene.has_intersect(&Ray::new(origin, segment), 1e-4, SHADOW_SEGMENT_MAX)
    }
}

// Scene

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceleratorKind {
    Bvh,
    /// Recognized but not implemented; selecting it is an error.
    KdTree,
}

#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    #[error("degenerate primitive rejected: {0}")]
    DegeneratePrimitive(&'static str),
    #[error("accelerator kind {0:?} is not implemented")]
    UnsupportedAccelerator(AcceleratorKind),
}

pub enum SceneSky {
    /// Directional gradient evaluated on the unit ray direction
    Gradient { horizon: V3, zenith: V3 },
    Black,
}

impl Default for SceneSky {
    fn default() -> SceneSky {
        SceneSky::Gradient {
            horizon: V3(0.125, 0.05, 0.173),
            zenith: V3(0.733, 0.706, 0.831),
        }
    }
}

pub struct Scene {
    camera: Camera,
    sky: SceneSky,
    primitives: Vec<Primitive>,
    lights: Vec<Box<dyn Light>>,
    materials: Vec<Arc<dyn Material>>,
    // Constructed from scene primitives before rendering begins (see init_accelerator)
    accelerator: Option<Bvh>,
    world_bounds: AABB,
    dirty: bool,
}

impl Scene {
    pub fn new(camera: Camera, sky: SceneSky) -> Scene {
        Scene {
            camera,
            sky,
            primitives: vec![],
            lights: vec![],
            materials: vec![],
            accelerator: None,
            world_bounds: AABB::default(),
            dirty: true,
        }
    }

    /// Adds a primitive to the scene. Primitives with non-finite or
    /// zero-extent bounds are rejected here rather than at render time.
    pub fn add_primitive(&mut self, primitive: Primitive) -> Result<(), SceneError> {
        if primitive.bounds().is_degenerate() {
            return Err(SceneError::DegeneratePrimitive("zero-extent or non-finite bounds"));
        }
        self.primitives.push(primitive);
        self.dirty = true;
        Ok(())
    }

    pub fn add_material(&mut self, material: impl IntoArc<dyn Material>) -> MatId {
        let id = self.materials.len();
        self.materials.push(material.into_arc());
        self.dirty = true;
        MatId(id)
    }

    /// The scene is the single owner of its lights.
    pub fn add_light(&mut self, light: impl Light + 'static) {
        self.lights.push(Box::new(light));
        self.dirty = true;
    }

    /// Builds the spatial accelerator over the current primitive set, runs
    /// each light's preprocess hook against the world bounds, and clears the
    /// dirty flag. Must be re-run after any scene mutation.
    pub fn init_accelerator(&mut self, kind: AcceleratorKind) -> Result<(), SceneError> {
        match kind {
            AcceleratorKind::Bvh => {}
            other => return Err(SceneError::UnsupportedAccelerator(other)),
        }

        let bvh = Bvh::build(&self.primitives);
        self.world_bounds = bvh.aabb().clone();

        for light in self.lights.iter_mut() {
            light.preprocess(&self.world_bounds);
        }

        info!("accelerator ready: {} nodes over {} primitives", bvh.node_count(), self.primitives.len());
        self.accelerator = Some(bvh);
        self.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Nearest hit along the ray, if any.
    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<SurfaceInteraction> {
        let accelerator = self.accelerator.as_ref().expect("Scene accelerator has not been initialized");
        accelerator.hit(&self.primitives, ray, t_min, t_max)
    }

    /// Occlusion query: true as soon as anything lies within the interval.
    pub fn has_intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        let accelerator = self.accelerator.as_ref().expect("Scene accelerator has not been initialized");
        accelerator.has_hit(&self.primitives, ray, t_min, t_max)
    }

    /// Radiance for a ray which escaped all geometry.
    pub fn sample_sky(&self, ray: &Ray) -> V3 {
        match self.sky {
            SceneSky::Black => V3::ZERO,
            SceneSky::Gradient { horizon, zenith } => {
                let direction = ray.direction.unit();
                let t = (direction.y() + 0.5) / 1.2;
                V3::lerp(horizon, zenith, saturate(t))
            }
        }
    }

    pub fn world_bounds(&self) -> &AABB {
        &self.world_bounds
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn get_mat(&self, mat_id: MatId) -> &dyn Material {
        self.materials[mat_id.0].as_ref()
    }

    pub fn lights(&self) -> &[Box<dyn Light>] {
        &self.lights
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }
}

//
// Camera
//

/// A thin-lens camera, held as its orthonormal frame plus the film half
/// extents at unit distance. Rays are evaluated in centered film
/// coordinates against the focus plane; a zero lens radius collapses to a
/// pinhole.
pub struct Camera {
    origin: V3,
    // Orthonormal frame: right and up span the film, back points from the
    // target towards the camera
    right: V3,
    up: V3,
    back: V3,
    half_width: f32,
    half_height: f32,
    focus_dist: f32,
    lens_radius: f32,
}

impl Camera {
    pub fn new(look_from: V3, look_at: V3, v_up: V3, v_fov: f32, aspect_ratio: f32, lens_radius: f32, focus_dist: f32) -> Camera {
        // Film half extents at unit distance, from the vertical field of view
        let half_height = deg_to_rad(v_fov * 0.5).tan();
        let half_width = aspect_ratio * half_height;

        let back = (look_from - look_at).unit();
        let right = V3::cross(v_up, back).unit();
        let up = V3::cross(back, right);

        Camera {
            origin: look_from,
            right,
            up,
            back,
            half_width,
            half_height,
            focus_dist,
            lens_radius,
        }
    }

    /// Generates the ray through film coordinates (s, t) in [0, 1]^2,
    /// jittered by a unit-disk lens sample for depth of field. Every lens
    /// position aims at the same point on the focus plane, which is what
    /// holds that plane in focus.
    pub fn get_ray(&self, s: f32, t: f32, lens: V2) -> Ray {
        // Centered film coordinates, scaled out to the focus plane
        let film_x = (2.0 * s - 1.0) * self.half_width * self.focus_dist;
        let film_y = (2.0 * t - 1.0) * self.half_height * self.focus_dist;
        let focus_point = self.origin - (self.back * self.focus_dist)
            + (self.right * film_x)
            + (self.up * film_y);

        let lens_offset = (self.right * (lens.x() * self.lens_radius))
            + (self.up * (lens.y() * self.lens_radius));
        let origin = self.origin + lens_offset;
        Ray::new(origin, focus_point - origin)
    }
}
