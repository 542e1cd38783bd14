//! Non-query mesh transformations: vertex fuse, condense, face fuse,
//! face reorder, flip, orientation sync, and connected-component split.
//! These run out-of-band, never concurrently with ray queries against
//! the same mesh.

use glam::Vec3;

use crate::edges::EdgeTable;
use crate::mesh::{Face, Mesh, Orientation};

/// Bin count for the spatial partition in [`fuse_vertices`], matching the
/// original's 256-bucket fast path (the O(n^3) naive path is not carried
/// forward — every mesh this crate touches uses the bucketed pass).
const FUSE_BUCKETS: usize = 256;

fn dominant_axis(vertices: &[Vec3]) -> usize {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for &v in vertices {
        min = min.min(v);
        max = max.max(v);
    }
    let extent = max - min;
    if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    }
}

fn bucket_of(value: f32, min: f32, extent: f32) -> usize {
    if extent <= 0.0 {
        return 0;
    }
    let normalized = ((value - min) / extent).clamp(0.0, 1.0);
    ((normalized * (FUSE_BUCKETS - 1) as f32) as usize).min(FUSE_BUCKETS - 1)
}

/// Fuse vertices within `tol` of each other, binned along the dominant
/// spatial axis for `O(n)` comparison rather than `O(n^2)`. Faces are
/// rewritten to reference the surviving vertex and the mesh is condensed
/// afterward.
pub fn fuse_vertices(mesh: &Mesh, tol: f32) -> Mesh {
    let axis = dominant_axis(&mesh.vertices);
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for v in &mesh.vertices {
        min = min.min(v[axis]);
        max = max.max(v[axis]);
    }
    let extent = max - min;

    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); FUSE_BUCKETS];
    for (i, v) in mesh.vertices.iter().enumerate() {
        buckets[bucket_of(v[axis], min, extent)].push(i as u32);
    }

    let mut remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    for bucket in &buckets {
        for (pos, &i) in bucket.iter().enumerate() {
            if remap[i as usize] != i {
                continue; // already fused to an earlier survivor
            }
            for &j in &bucket[pos + 1..] {
                if remap[j as usize] != j {
                    continue;
                }
                if mesh.vertices[i as usize].distance(mesh.vertices[j as usize]) <= tol {
                    remap[j as usize] = i;
                }
            }
        }
    }

    let mut out = mesh.clone();
    for face in &mut out.faces {
        for v in face.iter_mut() {
            *v = remap[*v as usize];
        }
    }
    condense(&out)
}

/// Remove vertices no longer referenced by any face, remapping face
/// indices accordingly.
pub fn condense(mesh: &Mesh) -> Mesh {
    let mut used = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &v in face {
            used[v as usize] = true;
        }
    }

    let mut new_index = vec![0u32; mesh.vertices.len()];
    let mut new_vertices = Vec::new();
    for (old, &is_used) in used.iter().enumerate() {
        if is_used {
            new_index[old] = new_vertices.len() as u32;
            new_vertices.push(mesh.vertices[old]);
        }
    }

    let mut out = mesh.clone();
    out.vertices = new_vertices;
    for face in &mut out.faces {
        for v in face.iter_mut() {
            *v = new_index[*v as usize];
        }
    }
    out
}

fn face_key_unoriented(face: &Face) -> [u32; 3] {
    let mut k = *face;
    k.sort_unstable();
    k
}

/// Remove duplicate faces. Oriented meshes require matching winding;
/// unoriented meshes treat any vertex permutation as the same face; plate
/// meshes additionally require matching thickness and face mode.
pub fn fuse_faces(mesh: &Mesh, orientation: Orientation) -> Mesh {
    let mut seen: Vec<(Face, Option<f32>, Option<crate::mesh::FaceMode>)> = Vec::new();
    let mut keep = Vec::with_capacity(mesh.faces.len());

    for (i, face) in mesh.faces.iter().enumerate() {
        let thickness = mesh.thickness.as_ref().map(|t| t[i]);
        let face_mode = mesh.face_modes.as_ref().map(|f| f[i]);
        let is_dup = seen.iter().any(|(other, other_t, other_m)| {
            let same_geometry = if orientation == Orientation::Unoriented {
                face_key_unoriented(other) == face_key_unoriented(face)
            } else {
                other == face
            };
            same_geometry
                && other_t.map(|t| (t - thickness.unwrap_or(t)).abs() < f32::EPSILON).unwrap_or(true)
                && *other_m == face_mode
        });
        if !is_dup {
            seen.push((*face, thickness, face_mode));
            keep.push(i);
        }
    }

    let mut out = mesh.clone();
    out.faces = keep.iter().map(|&i| mesh.faces[i]).collect();
    out.thickness = mesh.thickness.as_ref().map(|t| keep.iter().map(|&i| t[i]).collect());
    out.face_modes = mesh
        .face_modes
        .as_ref()
        .map(|f| keep.iter().map(|&i| f[i]).collect());
    out.face_normals = mesh
        .face_normals
        .as_ref()
        .map(|fns| keep.iter().map(|&i| fns[i]).collect());
    out
}

/// Swap the 2nd and 3rd vertex of every face (`flip` composed with itself
/// is the identity). Thin wrapper over [`Mesh::flip_faces`] kept so all
/// maintenance operations have a uniform `Mesh -> Mesh` call shape.
pub fn flip(mesh: &Mesh) -> Mesh {
    let mut out = mesh.clone();
    out.flip_faces();
    out
}

/// Greedily grow face "pieces" of target size `k` by repeatedly adding the
/// face sharing the most vertices with the piece's current vertex set,
/// falling back to nearest-centroid when no face shares a vertex. Returns
/// the reordering permutation (old face index per new slot).
pub fn reorder_faces(mesh: &Mesh, k: usize) -> Vec<usize> {
    let n = mesh.faces.len();
    let k = k.max(1);
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let centroids: Vec<Vec3> = mesh
        .faces
        .iter()
        .map(|f| (mesh.vertices[f[0] as usize] + mesh.vertices[f[1] as usize] + mesh.vertices[f[2] as usize]) / 3.0)
        .collect();

    let mut cursor = 0;
    while order.len() < n {
        while cursor < n && placed[cursor] {
            cursor += 1;
        }
        if cursor >= n {
            break;
        }
        let seed = cursor;
        placed[seed] = true;
        order.push(seed);
        let mut piece_vertices: Vec<u32> = mesh.faces[seed].to_vec();

        while order.len() < n {
            // Stop growing this piece once it reaches the target size.
            let in_this_piece = order.len();
            if in_this_piece % k == 0 && in_this_piece > 0 {
                break;
            }

            let mut best: Option<(usize, usize)> = None; // (face, shared_count)
            for (i, face) in mesh.faces.iter().enumerate() {
                if placed[i] {
                    continue;
                }
                let shared = face.iter().filter(|v| piece_vertices.contains(v)).count();
                if shared > 0 && best.map(|(_, b)| shared > b).unwrap_or(true) {
                    best = Some((i, shared));
                }
            }

            let next = match best {
                Some((i, _)) => i,
                None => {
                    let seed_centroid = centroids[seed];
                    (0..n)
                        .filter(|&i| !placed[i])
                        .min_by(|&a, &b| {
                            centroids[a]
                                .distance_squared(seed_centroid)
                                .total_cmp(&centroids[b].distance_squared(seed_centroid))
                        })
                        .unwrap()
                }
            };
            placed[next] = true;
            order.push(next);
            piece_vertices.extend_from_slice(&mesh.faces[next]);
        }
    }
    order
}

/// Breadth-first pass over the edge-sharing graph, flipping any neighbor
/// face whose shared edge is traversed in the *same* direction as the
/// current face's (which indicates inconsistent winding across the shared
/// edge). Covers every connected component, not just the one containing
/// face 0.
pub fn sync(mesh: &Mesh) -> Mesh {
    let table = EdgeTable::build(mesh);
    let mut out = mesh.clone();
    let mut visited = vec![false; mesh.faces.len()];
    let mut queue = std::collections::VecDeque::new();

    for seed in 0..mesh.faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            let face = out.faces[current];
            for k in 0..3 {
                let (v0, v1) = (face[k], face[(k + 1) % 3]);
                let Some(entry) = table.entry(v0, v1) else { continue };
                for &neighbor_idx in &entry.faces {
                    let neighbor_idx = neighbor_idx as usize;
                    if neighbor_idx == current || visited[neighbor_idx] {
                        continue;
                    }
                    let neighbor = out.faces[neighbor_idx];
                    let directed_same = neighbor
                        .iter()
                        .enumerate()
                        .any(|(j, &nv)| nv == v0 && neighbor[(j + 1) % 3] == v1);
                    if directed_same {
                        out.faces[neighbor_idx].swap(1, 2);
                    }
                    visited[neighbor_idx] = true;
                    queue.push_back(neighbor_idx);
                }
            }
        }
    }
    out
}

/// Partition `mesh`'s faces into connected components under shared-edge
/// adjacency, returning one condensed sub-mesh per component.
pub fn split(mesh: &Mesh) -> Vec<Mesh> {
    let table = EdgeTable::build(mesh);
    let n = mesh.faces.len();
    let mut component = vec![usize::MAX; n];
    let mut components = 0;

    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        component[start] = components;
        while let Some(current) = queue.pop_front() {
            let face = mesh.faces[current];
            for k in 0..3 {
                let (v0, v1) = (face[k], face[(k + 1) % 3]);
                if let Some(entry) = table.entry(v0, v1) {
                    for &neighbor in &entry.faces {
                        let neighbor = neighbor as usize;
                        if component[neighbor] == usize::MAX {
                            component[neighbor] = components;
                            queue.push_back(neighbor);
                        }
                    }
                }
            }
        }
        components += 1;
    }

    (0..components)
        .map(|c| {
            let mut sub = mesh.clone();
            let keep: Vec<usize> = (0..n).filter(|&i| component[i] == c).collect();
            sub.faces = keep.iter().map(|&i| mesh.faces[i]).collect();
            sub.thickness = mesh.thickness.as_ref().map(|t| keep.iter().map(|&i| t[i]).collect());
            sub.face_modes = mesh
                .face_modes
                .as_ref()
                .map(|f| keep.iter().map(|&i| f[i]).collect());
            sub.face_normals = mesh
                .face_normals
                .as_ref()
                .map(|fns| keep.iter().map(|&i| fns[i]).collect());
            condense(&sub)
        })
        .collect()
}

/// Result of [`crate::prep::inside_out`]'s interrogation-ray vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsideOutResult {
    /// The mesh's declared orientation matches its geometric outward normals.
    Normal,
    /// The mesh's face winding is inverted relative to its declared orientation.
    Flipped,
    /// No interrogation ray produced an unambiguous closest hit.
    Undecided,
}
