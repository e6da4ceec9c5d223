use arrayvec::ArrayVec;
use log::debug;

use crate::implementation::{ AABB, SurfaceInteraction };
use crate::types::{ Ray, V3 };

/// Anything with bounds and a centroid can be indexed by the tree; the scene
/// instantiates it over its primitive list, tests over bare shapes.
pub trait BvhObject {
    fn aabb(&self) -> AABB;
    fn centroid(&self) -> V3;
    fn hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<SurfaceInteraction>;

    fn has_hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.hit(ray, t_min, t_max).is_some()
    }
}

/// Subdivision stops at this many objects per leaf
const LEAF_SIZE: usize = 2;

/// Centroid spreads below this are treated as coincident
const MIN_CENTROID_EXTENT: f32 = 1e-8;

struct BvhNode {
    aabb: AABB,
    data: BvhNodeData,
}

enum BvhNodeData {
    Branch {
        // Indices of child nodes in the node collection
        left: usize,
        right: usize,
        // Axis the children were partitioned on, for front-to-back traversal
        axis: usize,
    },
    Leaf {
        // Range into the object index map
        first: usize,
        len: usize,
    },
}

/// A binary bounding-volume tree over object indices. The tree never holds
/// the objects themselves; callers pass the same slice the tree was built
/// from to the query functions.
pub struct Bvh {
    object_indices: Vec<usize>,
    nodes: Vec<BvhNode>,
}

// (bounds, centroid) per object, gathered once up front
type BuildRecord = (AABB, V3);

impl Bvh {
    pub fn build<T: BvhObject>(objects: &[T]) -> Bvh {
        let records = objects.iter()
            .map(|o| (o.aabb(), o.centroid()))
            .collect::<Vec<BuildRecord>>();

        let mut object_indices = (0..objects.len()).collect::<Vec<usize>>();
        let mut nodes = Vec::with_capacity(objects.len().saturating_mul(2));

        if !objects.is_empty() {
            let root = create_leaf_node(0, objects.len(), &object_indices, &records);
            nodes.push(root);
            subdivide(&mut nodes, 0, &mut object_indices, &records);
            nodes.shrink_to_fit();
        }

        debug!("generated {}-node tree for {}-object set", nodes.len(), objects.len());

        Bvh {
            object_indices,
            nodes,
        }
    }

    /// Bounds of the whole tree. The empty tree reports a degenerate box
    /// which no query will ever intersect.
    pub fn aabb(&self) -> AABB {
        self.nodes.first().map(|n| n.aabb.clone()).unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nearest hit along the ray. The upper t bound shrinks with every
    /// object hit, culling whole subtrees behind the current nearest.
    pub fn hit<T: BvhObject>(&self, objects: &[T], ray: &Ray, t_min: f32, t_max: f32) -> Option<SurfaceInteraction> {
        if self.nodes.is_empty() {
            return None;
        }

        let origin = ray.origin.xyz();
        let d = ray.direction.xyz();
        let inv_dir = [1.0 / d[0], 1.0 / d[1], 1.0 / d[2]];

        let mut closest_so_far = t_max;
        let mut best: Option<SurfaceInteraction> = None;

        let mut stack = ArrayVec::<usize, 64>::new();
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index];
            if !node.aabb.hit_aabb_inv(&origin, &inv_dir, t_min, closest_so_far) {
                continue;
            }
            match node.data {
                BvhNodeData::Leaf { first, len } => {
                    for &object_index in &self.object_indices[first..first + len] {
                        if let Some(hit) = objects[object_index].hit(ray, t_min, closest_so_far) {
                            closest_so_far = hit.t;
                            best = Some(hit);
                        }
                    }
                }
                BvhNodeData::Branch { left, right, axis } => {
                    // Push the far child first so the near child pops first
                    if inv_dir[axis] >= 0.0 {
                        stack.push(right);
                        stack.push(left);
                    } else {
                        stack.push(left);
                        stack.push(right);
                    }
                }
            }
        }

        best
    }

    /// Occlusion query: returns on the first object-level hit, in any order.
    pub fn has_hit<T: BvhObject>(&self, objects: &[T], ray: &Ray, t_min: f32, t_max: f32) -> bool {
        if self.nodes.is_empty() {
            return false;
        }

        let origin = ray.origin.xyz();
        let d = ray.direction.xyz();
        let inv_dir = [1.0 / d[0], 1.0 / d[1], 1.0 / d[2]];

        let mut stack = ArrayVec::<usize, 64>::new();
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index];
            if !node.aabb.hit_aabb_inv(&origin, &inv_dir, t_min, t_max) {
                continue;
            }
            match node.data {
                BvhNodeData::Leaf { first, len } => {
                    for &object_index in &self.object_indices[first..first + len] {
                        if objects[object_index].has_hit(ray, t_min, t_max) {
                            return true;
                        }
                    }
                }
                BvhNodeData::Branch { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }

        false
    }
}

fn create_leaf_node(first: usize, len: usize, object_indices: &[usize], records: &[BuildRecord]) -> BvhNode {
    let aabb = object_indices[first..first + len].iter()
        .map(|&i| records[i].0.clone())
        .reduce(|a, b| AABB::surrounding(&a, &b))
        .expect("leaf nodes are never empty");

    BvhNode {
        aabb,
        data: BvhNodeData::Leaf { first, len },
    }
}

fn subdivide(nodes: &mut Vec<BvhNode>, node_index: usize, object_indices: &mut [usize], records: &[BuildRecord]) {

    let (first, len) = match nodes[node_index].data {
        BvhNodeData::Leaf { first, len } => (first, len),
        _ => panic!("subdivide visited a branch node"),
    };

    // Stop subdividing nodes when we get to a minimum size
    if len <= LEAF_SIZE {
        return;
    }

    // Split on the axis with the widest centroid spread
    let centroid_bounds = AABB::from_vertices_iter(
        object_indices[first..first + len].iter().map(|&i| records[i].1));
    let spread = centroid_bounds.extent().xyz();

    let mut axis = 0;
    if spread[1] > spread[axis] { axis = 1; }
    if spread[2] > spread[axis] { axis = 2; }

    // All centroids coincident: further splits cannot separate anything
    if spread[axis] <= MIN_CENTROID_EXTENT {
        return;
    }

    // Equal-counts median split: partition the index range so the lower half
    // holds the smaller centroid coordinates along the chosen axis
    let mid = len / 2;
    object_indices[first..first + len].select_nth_unstable_by(mid, |&a, &b| {
        records[a].1.xyz()[axis].total_cmp(&records[b].1.xyz()[axis])
    });

    let left_index = nodes.len();
    nodes.push(create_leaf_node(first, mid, object_indices, records));
    let right_index = nodes.len();
    nodes.push(create_leaf_node(first + mid, len - mid, object_indices, records));

    // Convert current node into a branch
    nodes[node_index].data = BvhNodeData::Branch { left: left_index, right: right_index, axis };

    // Recurse
    subdivide(nodes, left_index, object_indices, records);
    subdivide(nodes, right_index, object_indices, records);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::implementation::{ MatId, Primitive };
    use crate::shapes::Sphere;
    use crate::transform::Transform;

    use rand::{ Rng, SeedableRng };
    use rand_xorshift::XorShiftRng;

    fn sphere_primitive(center: V3, radius: f32) -> Primitive {
        Primitive::new(Sphere::new(Transform::translation(center), radius), MatId(0))
    }

    fn random_sphere_set(rng: &mut XorShiftRng, count: usize) -> Vec<Primitive> {
        (0..count)
            .map(|_| {
                let center = V3(
                    rng.random_range(-50.0..50.0),
                    rng.random_range(-50.0..50.0),
                    rng.random_range(-50.0..50.0));
                let radius = rng.random_range(0.1..2.0);
                sphere_primitive(center, radius)
            })
            .collect()
    }

    fn random_ray(rng: &mut XorShiftRng) -> Ray {
        let origin = V3(
            rng.random_range(-80.0..80.0),
            rng.random_range(-80.0..80.0),
            rng.random_range(-80.0..80.0));
        let direction = V3(
            rng.random_range(-1.0..1.0_f32),
            rng.random_range(-1.0..1.0_f32),
            rng.random_range(-1.0..1.0_f32));
        // Degenerate directions would make the slab test meaningless
        let direction = if direction.length_squared() < 1e-6 { V3::POS_X } else { direction.unit() };
        Ray::new(origin, direction)
    }

    /// Collects every object index reachable beneath a node
    fn subtree_objects(bvh: &Bvh, node_index: usize, out: &mut Vec<usize>) {
        match bvh.nodes[node_index].data {
            BvhNodeData::Leaf { first, len } => {
                out.extend_from_slice(&bvh.object_indices[first..first + len]);
            }
            BvhNodeData::Branch { left, right, .. } => {
                subtree_objects(bvh, left, out);
                subtree_objects(bvh, right, out);
            }
        }
    }

    fn aabb_contains(outer: &AABB, inner: &AABB) -> bool {
        const E: f32 = 1e-4;
        outer.min.0 <= inner.min.0 + E && outer.min.1 <= inner.min.1 + E && outer.min.2 <= inner.min.2 + E &&
        outer.max.0 >= inner.max.0 - E && outer.max.1 >= inner.max.1 - E && outer.max.2 >= inner.max.2 - E
    }

    #[test]
    fn empty_tree_never_hits() {
        let objects: Vec<Primitive> = vec![];
        let bvh = Bvh::build(&objects);
        let ray = Ray::new(V3::ZERO, V3::POS_X);
        assert!(bvh.aabb().is_degenerate());
        assert!(bvh.hit(&objects, &ray, 0.001, f32::MAX).is_none());
        assert!(!bvh.has_hit(&objects, &ray, 0.001, f32::MAX));
    }

    #[test]
    fn node_bounds_contain_subtrees() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let objects = random_sphere_set(&mut rng, 200);
        let bvh = Bvh::build(&objects);

        for node_index in 0..bvh.nodes.len() {
            let mut members = vec![];
            subtree_objects(&bvh, node_index, &mut members);
            assert!(!members.is_empty());
            for object_index in members {
                assert!(
                    aabb_contains(&bvh.nodes[node_index].aabb, &objects[object_index].aabb()),
                    "node {} does not contain object {}", node_index, object_index);
            }
        }
    }

    #[test]
    fn every_object_appears_in_exactly_one_leaf() {
        let mut rng = XorShiftRng::seed_from_u64(11);
        let objects = random_sphere_set(&mut rng, 100);
        let bvh = Bvh::build(&objects);

        let mut members = vec![];
        subtree_objects(&bvh, 0, &mut members);
        members.sort_unstable();
        assert_eq!(members, (0..objects.len()).collect::<Vec<_>>());
    }

    #[test]
    fn rebuild_is_deterministic() {
        let mut rng = XorShiftRng::seed_from_u64(13);
        let objects = random_sphere_set(&mut rng, 150);
        let a = Bvh::build(&objects);
        let b = Bvh::build(&objects);
        assert_eq!(a.object_indices, b.object_indices);
        assert_eq!(a.node_count(), b.node_count());
    }

    #[test]
    fn coincident_centroids_collapse_to_a_leaf() {
        // Concentric spheres share a centroid; the builder must not recurse forever
        let objects = (1..=8)
            .map(|i| sphere_primitive(V3::ZERO, i as f32))
            .collect::<Vec<_>>();
        let bvh = Bvh::build(&objects);
        assert_eq!(bvh.node_count(), 1);

        let ray = Ray::new(V3(0.0, 0.0, 20.0), V3(0.0, 0.0, -1.0));
        let hit = bvh.hit(&objects, &ray, 0.001, f32::MAX).unwrap();
        // Nearest shell is the outermost sphere
        assert!((hit.t - 12.0).abs() < 1e-3);
    }

    #[test]
    fn matches_brute_force() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        let objects = random_sphere_set(&mut rng, 1000);
        let bvh = Bvh::build(&objects);

        for _ in 0..10_000 {
            let ray = random_ray(&mut rng);

            let tree_hit = bvh.hit(&objects, &ray, 0.001, f32::MAX);
            let brute_hit = objects.iter()
                .filter_map(|o| o.hit(&ray, 0.001, f32::MAX))
                .min_by(|a, b| a.t.total_cmp(&b.t));

            match (tree_hit, brute_hit) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    assert!((a.t - b.t).abs() < 1e-4, "t mismatch: {} vs {}", a.t, b.t);
                    assert!(bvh.has_hit(&objects, &ray, 0.001, f32::MAX));
                }
                (a, b) => panic!("hit disagreement: bvh={:?} brute={:?}", a.map(|h| h.t), b.map(|h| h.t)),
            }
        }
    }
}
