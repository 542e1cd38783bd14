//! BVH flattener and single-ray traverser: a depth-first pre-order array
//! layout with explicit second-child offsets, descended with a
//! fixed-capacity explicit stack rather than recursion.

use glam::Vec3;

use crate::bvh::BuildTree;
use crate::config::BVH_STACK_SIZE;
use crate::error::BotError;
use crate::hit::HitBuffer;
use crate::triangle::{intersect, PreppedTriangle, Ray};

#[derive(Debug, Clone, Copy)]
pub enum FlatData {
    Leaf { first_prim_offset: usize },
    Interior { second_child_offset: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct FlatNode {
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub n_primitives: usize,
    pub data: FlatData,
}

impl FlatNode {
    pub fn is_leaf(&self) -> bool {
        self.n_primitives > 0
    }
}

/// Depth-first pre-order serialization of a [`BuildTree`] into a single
/// boxed slice. The first child of an interior node is always the next
/// slot; the second child's offset is stored explicitly.
pub fn flatten(tree: &BuildTree) -> Box<[FlatNode]> {
    let mut flat = Vec::with_capacity(tree.arena.len());
    flatten_node(tree, tree.root, &mut flat);
    flat.into_boxed_slice()
}

fn flatten_node(tree: &BuildTree, node_idx: usize, flat: &mut Vec<FlatNode>) -> usize {
    let my_offset = flat.len();
    let node = &tree.arena[node_idx];
    flat.push(FlatNode {
        bounds_min: node.bounds_min,
        bounds_max: node.bounds_max,
        n_primitives: 0,
        data: FlatData::Leaf { first_prim_offset: 0 },
    });

    if node.is_leaf() {
        flat[my_offset].data = FlatData::Leaf {
            first_prim_offset: node.first_prim_offset,
        };
        flat[my_offset].n_primitives = node.n_primitives;
    } else {
        let [left, right] = node.children.expect("interior node has two children");
        flatten_node(tree, left, flat);
        let second_child_offset = flatten_node(tree, right, flat);
        flat[my_offset].data = FlatData::Interior { second_child_offset };
    }
    my_offset
}

/// Slab test against a node's AABB using precomputed `1/d`. Returns `true`
/// on a hit. Mirrors the original's tolerance of `high_t < -1.0` to admit
/// rays starting just inside a box face.
fn hits_bounds(bounds_min: Vec3, bounds_max: Vec3, ray: &Ray, inv_dir: Vec3) -> bool {
    let lows = (bounds_min - ray.origin) * inv_dir;
    let highs = (bounds_max - ray.origin) * inv_dir;
    let low_ts = lows.min(highs);
    let high_ts = lows.max(highs);
    let high_t = high_ts.x.min(high_ts.y).min(high_ts.z);
    let low_t = low_ts.x.max(low_ts.y).max(low_ts.z);
    !(high_t < -1.0 || low_t > high_t)
}

/// Descend `flat` for a single ray, appending every triangle hit to `hits`.
/// Returns `Err(BotError::StackOverflow)` if the explicit stack (sized
/// [`BVH_STACK_SIZE`]) is exceeded — only reachable with a pathologically
/// deep build, never in well-formed operation.
pub fn traverse(
    flat: &[FlatNode],
    tris: &[PreppedTriangle],
    ray: &Ray,
    tol: f32,
    hits: &mut HitBuffer,
) -> Result<(), BotError> {
    if flat.is_empty() {
        return Ok(());
    }

    let inv_dir = ray.inv_dir();
    let mut stack_node = [0usize; BVH_STACK_SIZE];
    let mut stack_child = [0u8; BVH_STACK_SIZE];
    let mut sp: isize = 0;
    stack_node[0] = 0;
    stack_child[0] = 0;

    while sp >= 0 {
        let idx = sp as usize;
        if idx >= BVH_STACK_SIZE {
            return Err(BotError::StackOverflow {
                capacity: BVH_STACK_SIZE,
            });
        }
        if stack_child[idx] >= 2 {
            sp -= 1;
            continue;
        }
        let node = &flat[stack_node[idx]];

        if stack_child[idx] == 0 && !hits_bounds(node.bounds_min, node.bounds_max, ray, inv_dir) {
            sp -= 1;
            continue;
        }

        if node.is_leaf() {
            let FlatData::Leaf { first_prim_offset } = node.data else {
                unreachable!()
            };
            let end = first_prim_offset + node.n_primitives;
            for tri_index in first_prim_offset..end {
                if let Some(hit) = intersect(&tris[tri_index], tri_index, ray, tol) {
                    hits.push(hit);
                }
            }
            sp -= 1;
            continue;
        }

        let FlatData::Interior { second_child_offset } = node.data else {
            unreachable!()
        };
        let next_node = if stack_child[idx] == 0 {
            stack_node[idx] + 1
        } else {
            second_child_offset
        };
        stack_child[idx] += 1;
        let next = idx + 1;
        stack_node[next] = next_node;
        stack_child[next] = 0;
        sp += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::build;

    fn single_triangle_flat() -> (Box<[FlatNode]>, Vec<PreppedTriangle>) {
        let tri = PreppedTriangle::new(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            0,
            None,
        );
        let (min, max) = tri.bounds();
        let tree = build(&[tri.centroid()], &[(min, max)], 8);
        (flatten(&tree), vec![tri])
    }

    #[test]
    fn traverse_finds_single_triangle_hit() {
        let (flat, tris) = single_triangle_flat();
        let mut hits = HitBuffer::new();
        let ray = Ray::new(Vec3::new(0.0, -0.2, -5.0), Vec3::new(0.0, 0.0, 1.0));
        traverse(&flat, &tris, &ray, 1e-6, &mut hits).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn traverse_misses_when_ray_clears_the_box() {
        let (flat, tris) = single_triangle_flat();
        let mut hits = HitBuffer::new();
        let ray = Ray::new(Vec3::new(10.0, 10.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        traverse(&flat, &tris, &ray, 1e-6, &mut hits).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn flatten_preserves_node_count() {
        let tri = PreppedTriangle::new(Vec3::ZERO, Vec3::X, Vec3::Y, 0, None);
        let tree = build(&[tri.centroid()], &[tri.bounds()], 8);
        let flat = flatten(&tree);
        assert_eq!(flat.len(), tree.arena.len());
    }

    #[test]
    fn many_triangles_all_get_visited() {
        let mut tris = Vec::new();
        let mut centroids = Vec::new();
        let mut bounds = Vec::new();
        for i in 0..64 {
            let x = i as f32 * 3.0;
            let tri = PreppedTriangle::new(
                Vec3::new(x - 1.0, -1.0, 0.0),
                Vec3::new(x + 1.0, -1.0, 0.0),
                Vec3::new(x, 1.0, 0.0),
                i,
                None,
            );
            centroids.push(tri.centroid());
            bounds.push(tri.bounds());
            tris.push(tri);
        }
        let tree = build(&centroids, &bounds, 4);
        let flat = flatten(&tree);
        for i in 0..64u32 {
            let x = i as f32 * 3.0;
            let mut hits = HitBuffer::new();
            let ray = Ray::new(Vec3::new(x, -0.2, -5.0), Vec3::new(0.0, 0.0, 1.0));
            traverse(&flat, &tris, &ray, 1e-6, &mut hits).unwrap();
            assert_eq!(hits.len(), 1, "ray {i} should hit exactly its own triangle");
            assert_eq!(hits.as_slice()[0].surf_id, i);
        }
    }
}
