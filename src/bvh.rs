//! Hierarchical linear BVH builder: Morton-code radix partitioning over
//! triangle centroids, producing a binary tree ready for flattening.
//!
//! The build tree is index-arena-owned rather than built from raw
//! pointers: nodes live in a single `Vec<BuildNode>` and children are
//! referenced by index. The arena is consumed by
//! [`crate::flat_bvh::flatten`] and dropped once flattening is done.

use glam::Vec3;

use crate::morton::morton_code;

#[derive(Debug, Clone, Copy)]
pub struct BuildNode {
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub children: Option<[usize; 2]>,
    pub first_prim_offset: usize,
    pub n_primitives: usize,
    pub split_axis: u8,
}

impl BuildNode {
    fn leaf(bounds_min: Vec3, bounds_max: Vec3, first_prim_offset: usize, n_primitives: usize) -> Self {
        Self {
            bounds_min,
            bounds_max,
            children: None,
            first_prim_offset,
            n_primitives,
            split_axis: 0,
        }
    }

    fn interior(bounds_min: Vec3, bounds_max: Vec3, children: [usize; 2], split_axis: u8) -> Self {
        Self {
            bounds_min,
            bounds_max,
            children: Some(children),
            first_prim_offset: 0,
            n_primitives: 0,
            split_axis,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Arena owning the build tree, plus the triangle permutation the tree's
/// leaves reference.
pub struct BuildTree {
    pub arena: Vec<BuildNode>,
    pub root: usize,
    /// Permutation of `[0, n)` primitive indices such that each leaf
    /// references a contiguous range of this array.
    pub ordered_prims: Vec<usize>,
}

/// Build an HLBVH over `n` primitives given their `centroids` and
/// per-primitive `(min, max)` bounds. `max_prims_in_node` bounds leaf size.
pub fn build(centroids: &[Vec3], bounds: &[(Vec3, Vec3)], max_prims_in_node: usize) -> BuildTree {
    let n = centroids.len();
    debug_assert_eq!(n, bounds.len());

    let mut centroid_min = Vec3::splat(f32::MAX);
    let mut centroid_max = Vec3::splat(f32::MIN);
    for &c in centroids {
        centroid_min = centroid_min.min(c);
        centroid_max = centroid_max.max(c);
    }

    let mut ordered_prims: Vec<usize> = (0..n).collect();
    let morton: Vec<u32> = centroids
        .iter()
        .map(|&c| morton_code(c, centroid_min, centroid_max))
        .collect();
    ordered_prims.sort_by_key(|&i| morton[i]);

    let mut arena = Vec::with_capacity(2 * n.max(1));
    let root = build_range(
        &mut arena,
        &mut ordered_prims,
        &morton,
        bounds,
        0,
        n,
        29,
        max_prims_in_node.max(1),
    );

    BuildTree {
        arena,
        root,
        ordered_prims,
    }
}

fn union_bounds(bounds: &[(Vec3, Vec3)], ordered: &[usize], start: usize, end: usize) -> (Vec3, Vec3) {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for &i in &ordered[start..end] {
        let (bmin, bmax) = bounds[i];
        min = min.min(bmin);
        max = max.max(bmax);
    }
    (min, max)
}

/// Find the first index in `[start, end)` whose bit `bit` is set, assuming
/// the range is already sorted ascending by Morton code. Returns `end` if
/// every code in the range has that bit clear, `start` if every code has it
/// set — both signal "no split at this bit" to the caller.
fn find_split(ordered: &[usize], morton: &[u32], start: usize, end: usize, bit: i32) -> usize {
    let mask = 1u32 << bit;
    let mut lo = start;
    let mut hi = end;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if morton[ordered[mid]] & mask == 0 {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

fn build_range(
    arena: &mut Vec<BuildNode>,
    ordered: &mut [usize],
    morton: &[u32],
    bounds: &[(Vec3, Vec3)],
    start: usize,
    end: usize,
    bit: i32,
    max_prims_in_node: usize,
) -> usize {
    let n = end - start;
    if n <= max_prims_in_node || bit < 0 {
        let (min, max) = union_bounds(bounds, ordered, start, end);
        let idx = arena.len();
        arena.push(BuildNode::leaf(min, max, start, n));
        return idx;
    }

    let split = find_split(ordered, morton, start, end, bit);
    if split == start || split == end {
        // Every code in range agrees on this bit; descend without splitting.
        return build_range(arena, ordered, morton, bounds, start, end, bit - 1, max_prims_in_node);
    }

    let left = build_range(arena, ordered, morton, bounds, start, split, bit - 1, max_prims_in_node);
    let right = build_range(arena, ordered, morton, bounds, split, end, bit - 1, max_prims_in_node);

    let (lmin, lmax) = (arena[left].bounds_min, arena[left].bounds_max);
    let (rmin, rmax) = (arena[right].bounds_min, arena[right].bounds_max);
    let min = lmin.min(rmin);
    let max = lmax.max(rmax);
    let extent = max - min;
    let split_axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };

    let idx = arena.len();
    arena.push(BuildNode::interior(min, max, [left, right], split_axis));
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_primitives(n_per_axis: usize) -> (Vec<Vec3>, Vec<(Vec3, Vec3)>) {
        let mut centroids = Vec::new();
        let mut bounds = Vec::new();
        for x in 0..n_per_axis {
            for y in 0..n_per_axis {
                let c = Vec3::new(x as f32, y as f32, 0.0);
                centroids.push(c);
                bounds.push((c - Vec3::splat(0.1), c + Vec3::splat(0.1)));
            }
        }
        (centroids, bounds)
    }

    #[test]
    fn leaves_respect_max_prims() {
        let (centroids, bounds) = grid_primitives(8);
        let tree = build(&centroids, &bounds, 4);
        for node in &tree.arena {
            if node.is_leaf() {
                assert!(node.n_primitives <= 4);
            }
        }
    }

    #[test]
    fn ordered_prims_is_a_permutation() {
        let (centroids, bounds) = grid_primitives(6);
        let tree = build(&centroids, &bounds, 8);
        let mut sorted = tree.ordered_prims.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..centroids.len()).collect::<Vec<_>>());
    }

    #[test]
    fn root_bounds_contain_all_primitives() {
        let (centroids, bounds) = grid_primitives(5);
        let tree = build(&centroids, &bounds, 8);
        let root = &tree.arena[tree.root];
        for &(bmin, bmax) in &bounds {
            assert!(root.bounds_min.cmple(bmin).all());
            assert!(root.bounds_max.cmpge(bmax).all());
        }
    }

    #[test]
    fn single_primitive_builds_a_single_leaf() {
        let centroids = vec![Vec3::ZERO];
        let bounds = vec![(Vec3::splat(-1.0), Vec3::splat(1.0))];
        let tree = build(&centroids, &bounds, 8);
        assert!(tree.arena[tree.root].is_leaf());
        assert_eq!(tree.arena[tree.root].n_primitives, 1);
    }

    #[test]
    fn leaf_ranges_tile_the_whole_permutation() {
        let (centroids, bounds) = grid_primitives(7);
        let tree = build(&centroids, &bounds, 3);
        let mut covered = vec![false; centroids.len()];
        let mut stack = vec![tree.root];
        while let Some(idx) = stack.pop() {
            let node = &tree.arena[idx];
            if node.is_leaf() {
                for i in node.first_prim_offset..node.first_prim_offset + node.n_primitives {
                    covered[i] = true;
                }
            } else {
                stack.extend(node.children.unwrap());
            }
        }
        assert!(covered.iter().all(|&c| c));
    }
}
