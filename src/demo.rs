use lumen_impl::implementation::{ Camera, Primitive, Scene, SceneError, SceneSky };
use lumen_impl::lights::{ DirectionalLight, PointLight };
use lumen_impl::materials::{ MatDielectric, MatLambertian, MatSpecular };
use lumen_impl::shapes::{ Cuboid, Quad, Sphere };
use lumen_impl::transform::Transform;
use lumen_impl::types::V3;

use crate::options::Options;

fn rgb(r: u8, g: u8, b: u8) -> V3 {
    V3(r as f32 / 255.0,
       g as f32 / 255.0,
       b as f32 / 255.0)
}

/// The built-in demo scene, selected by a scene argument of "-".
///
/// A diffuse unit sphere at the origin under the camera described above it,
/// plus a floor, a rotated box, metal and glass spheres, and two lights, so
/// a demo render exercises every shape and material kind.
pub fn create_demo_scene(options: &Options) -> Result<Scene, SceneError> {
    let position = V3(0.0, 0.0, 10.0);
    let look_at = V3::ZERO;
    let focus_dist = (position - look_at).length();
    let camera = Camera::new(position, look_at, V3::POS_Y, 40.0, options.aspect_ratio(), 0.05, focus_dist);

    let mut scene = Scene::new(camera, SceneSky::default());

    let matte_gray = scene.add_material(MatLambertian::new(rgb(186, 186, 186)));
    let matte_rust = scene.add_material(MatLambertian::new(rgb(176, 76, 56)));
    let floor = scene.add_material(MatLambertian::new(rgb(92, 98, 87)));
    let steel = scene.add_material(MatSpecular::new(rgb(214, 214, 224)).with_fuzz(0.05));
    let glass = scene.add_material(MatDielectric::new(1.5));

    // The hero sphere
    scene.add_primitive(Primitive::new(
        Sphere::new(Transform::default(), 1.0),
        matte_gray))?;

    scene.add_primitive(Primitive::new(
        Sphere::new(Transform::translation(V3(-2.4, 0.0, -1.0)), 1.0),
        steel))?;

    scene.add_primitive(Primitive::new(
        Sphere::new(Transform::translation(V3(2.4, -0.1, 0.8)), 0.9),
        glass))?;

    // A box sitting on the floor behind the spheres
    let box_transform = Transform::rotation_y(30_f32.to_radians())
        .then(Transform::translation(V3(0.4, -0.25, -3.2)));
    scene.add_primitive(Primitive::new(
        Cuboid::new(box_transform, V3(1.5, 1.5, 1.5)),
        matte_rust))?;

    // Floor plane at y = -1
    scene.add_primitive(Primitive::new(
        Quad::new(
            Transform::default(),
            V3(-12.0, -1.0, -12.0),
            V3(24.0, 0.0, 0.0),
            V3(0.0, 0.0, 24.0)),
        floor))?;

    scene.add_light(PointLight::new(V3(4.0, 6.0, 4.0), V3::ONE, 60.0));
    scene.add_light(DirectionalLight::new(V3(-0.3, -1.0, -0.25), rgb(255, 244, 229), 0.35));

    Ok(scene)
}
