
/// Solves `a t^2 + b t + c = 0`, returning the roots in ascending order.
///
/// Uses the numerically stable form which avoids catastrophic cancellation
/// when `b*b >> 4ac`. A tangent hit (discriminant of zero) yields two equal
/// roots rather than NaN.
pub fn solve_quadratic(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    if a == 0.0 {
        return None;
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let q = if b < 0.0 { -0.5 * (b - root) } else { -0.5 * (b + root) };
    let t0 = q / a;
    let t1 = if q == 0.0 { t0 } else { c / q };
    Some(if t0 <= t1 { (t0, t1) } else { (t1, t0) })
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clamps {v} to the range 0.0 to 1.0
pub fn saturate(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

pub fn deg_to_rad(deg: f32) -> f32 {
    deg * std::f32::consts::PI / 180.0
}
