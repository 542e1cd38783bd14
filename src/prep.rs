//! Prep-time orchestration and the public `shot`/`norm`/`curvature`/`uv`
//! entry points.

use glam::Vec3;

use crate::bvh;
use crate::config::{Application, PrepConfig};
use crate::error::{BotError, BotResult};
use crate::flat_bvh::{self, FlatNode};
use crate::hit::with_thread_local_buffer;
use crate::maintenance::InsideOutResult;
use crate::mesh::{Mesh, Orientation};
use crate::normal::{self, Hit};
use crate::segment::{self, SegList};
use crate::triangle::{PreppedTriangle, Ray};

/// The opaque, ray-trace-ready handle produced by [`prep`]. Read-only and
/// `Send + Sync` once built — nothing in `shot` mutates it, so the same
/// `Prepped` can be queried concurrently from many threads.
pub struct Prepped {
    mesh: Mesh,
    tris: Vec<PreppedTriangle>,
    flat: Box<[FlatNode]>,
    tolerance: f32,
    bbox_min: Vec3,
    bbox_max: Vec3,
    bounding_radius: f32,
}

impl Prepped {
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn bbox(&self) -> (Vec3, Vec3) {
        (self.bbox_min, self.bbox_max)
    }

    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn triangle_count(&self) -> usize {
        self.tris.len()
    }
}

/// Build a [`Prepped`] handle from `mesh`: normalize CW orientation to CCW,
/// compute per-triangle precompute, build and flatten the HLBVH, and warn
/// on degenerate triangles.
pub fn prep(mesh: Mesh, config: PrepConfig) -> BotResult<Prepped> {
    mesh.validate()?;

    let mut mesh = mesh;
    if mesh.orientation == Orientation::Cw {
        mesh.flip_faces();
        if let Some(face_normals) = mesh.face_normals.as_mut() {
            for idx in face_normals.iter_mut() {
                idx.swap(1, 2);
            }
        }
        if let Some(face_uvs) = mesh.face_uvs.as_mut() {
            for idx in face_uvs.iter_mut() {
                idx.swap(1, 2);
            }
        }
        mesh.orientation = Orientation::Ccw;
    }

    let mut tris = Vec::with_capacity(mesh.faces.len());
    let mut centroids = Vec::with_capacity(mesh.faces.len());
    let mut bounds = Vec::with_capacity(mesh.faces.len());

    for (face_idx, face) in mesh.faces.iter().enumerate() {
        let a = mesh.vertices[face[0] as usize];
        let b = mesh.vertices[face[1] as usize];
        let c = mesh.vertices[face[2] as usize];

        let vertex_normals = mesh.has_smooth_normals().then(|| {
            let idx = mesh.face_normals.as_ref().unwrap()[face_idx];
            let table = mesh.normals.as_ref().unwrap();
            if idx.iter().all(|&i| (i as usize) < table.len()) {
                Some([table[idx[0] as usize], table[idx[1] as usize], table[idx[2] as usize]])
            } else {
                None
            }
        }).flatten();

        let tri = PreppedTriangle::new(a, b, c, face_idx as u32, vertex_normals);
        if tri.min_degeneracy_metric() < config.tolerance * config.tolerance {
            tracing::warn!(face = face_idx, "degenerate face skipped at prep time");
            continue;
        }
        centroids.push(tri.centroid());
        bounds.push(tri.bounds());
        tris.push(tri);
    }

    if tris.is_empty() {
        return Err(BotError::Empty);
    }

    let tree = bvh::build(&centroids, &bounds, config.max_prims_in_node);
    let reordered: Vec<PreppedTriangle> = tree.ordered_prims.iter().map(|&i| tris[i]).collect();
    let flat = flat_bvh::flatten(&tree);

    let (bbox_min, bbox_max) = mesh.bbox(config.tolerance);
    let bounding_radius = (bbox_max - bbox_min).length() / 2.0;

    Ok(Prepped {
        mesh,
        tris: reordered,
        flat,
        tolerance: config.tolerance,
        bbox_min,
        bbox_max,
        bounding_radius,
    })
}

/// Descend `prepped`'s flat BVH for `ray`, synthesize segments per the
/// mesh's mode/orientation, and append them to `seglist`. Returns the
/// number of segments appended. Uses the calling thread's scratch hit
/// buffer; never blocks, never allocates beyond amortized buffer growth.
pub fn shot(prepped: &Prepped, ray: Ray, seglist: &mut SegList, application: Application) -> BotResult<usize> {
    let segs = with_thread_local_buffer(|hits| {
        flat_bvh::traverse(&prepped.flat, &prepped.tris, &ray, application.tolerance, hits)?;
        hits.sort_by_distance();
        segment::synthesize(
            hits.as_slice(),
            &prepped.tris,
            &prepped.mesh,
            application.tolerance,
            application.reverse_normal_disabled,
        )
    })?;
    let count = segs.len();
    seglist.extend(segs);
    Ok(count)
}

/// Fill in the smoothed normal for a segment endpoint, given the
/// originating triangle and ray direction.
pub fn norm(prepped: &Prepped, tri_index: usize, t: f32, surf_id: u32, beta: f32, gamma: f32, ray: Ray) -> Hit {
    let tri = &prepped.tris[tri_index];
    let raw = crate::triangle::RawHit {
        t,
        surf_id,
        entry_dot: tri.unit_normal.dot(ray.dir),
        beta,
        gamma,
        tri_index,
    };
    let normal = normal::resolve_normal(&raw, tri, ray.dir, prepped.mesh.mode);
    Hit {
        t,
        surf_id,
        point: ray.point_at(t),
        normal,
    }
}

pub fn curvature(normal_at_hit: Vec3) -> normal::Curvature {
    normal::curvature(normal_at_hit)
}

pub fn uv(face_uvs: Option<[(f32, f32); 3]>, beta: f32, gamma: f32) -> normal::Uv {
    normal::uv(face_uvs, beta, gamma)
}

/// Shoot interrogation rays from a point outside the mesh's AABB toward
/// each face centroid in turn until one yields an unambiguous closest hit,
/// then compare the hit normal's sign against the mesh's declared
/// orientation.
pub fn inside_out(prepped: &Prepped) -> InsideOutResult {
    let (bbox_min, _bbox_max) = prepped.bbox();
    let origin = bbox_min - Vec3::splat(prepped.bounding_radius + 1.0);

    for tri in &prepped.tris {
        let target = tri.centroid();
        let dir = (target - origin).normalize_or_zero();
        if dir == Vec3::ZERO {
            continue;
        }
        let ray = Ray::new(origin, dir);

        let mut closest: Option<(f32, Vec3)> = None;
        for candidate in &prepped.tris {
            if let Some(hit) = crate::triangle::intersect(candidate, 0, &ray, prepped.tolerance) {
                if closest.map(|(t, _)| hit.t < t).unwrap_or(true) {
                    closest = Some((hit.t, candidate.unit_normal));
                }
            }
        }

        if let Some((_, hit_normal)) = closest {
            let dot = hit_normal.dot(dir);
            if dot.abs() < 1e-6 {
                continue; // grazing, ambiguous — try the next face
            }
            return if dot < 0.0 {
                InsideOutResult::Normal
            } else {
                InsideOutResult::Flipped
            };
        }
    }
    InsideOutResult::Undecided
}

/// Synthesize a per-vertex smooth normal table from face geometry.
/// Requires the mesh be oriented, or unoriented-and-solid — an orientation
/// that can't decide face adjacency consistently can't average normals
/// across it either.
pub fn smooth(mesh: &Mesh, normal_tol_angle: f32) -> BotResult<Mesh> {
    if mesh.orientation == Orientation::Unoriented && mesh.mode != crate::mesh::Mode::Solid {
        return Err(BotError::Inconsistent(
            "smooth requires an oriented mesh, or an unoriented solid".into(),
        ));
    }

    let cos_threshold = normal_tol_angle.cos();
    let face_normals: Vec<Vec3> = mesh
        .faces
        .iter()
        .map(|face| {
            let a = mesh.vertices[face[0] as usize];
            let b = mesh.vertices[face[1] as usize];
            let c = mesh.vertices[face[2] as usize];
            let n = (b - a).cross(c - a).normalize_or_zero();
            if mesh.orientation == Orientation::Cw {
                -n
            } else {
                n
            }
        })
        .collect();

    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); mesh.vertices.len()];
    for (face_idx, face) in mesh.faces.iter().enumerate() {
        for &v in face {
            incident[v as usize].push(face_idx);
        }
    }

    // One normal slot per (face, corner) so each face gets vertex normals
    // consistent with only its own tolerance-compatible neighborhood,
    // matching the original's per-face-corner averaging.
    let mut normals = Vec::with_capacity(mesh.faces.len() * 3);
    let mut face_normal_idx = vec![[0u32; 3]; mesh.faces.len()];

    for (face_idx, face) in mesh.faces.iter().enumerate() {
        let this_normal = face_normals[face_idx];
        for (corner, &v) in face.iter().enumerate() {
            let mut sum = Vec3::ZERO;
            let mut count = 0;
            for &other_face in &incident[v as usize] {
                if face_normals[other_face].dot(this_normal) >= cos_threshold {
                    sum += face_normals[other_face];
                    count += 1;
                }
            }
            let averaged = if count > 0 { sum.normalize_or_zero() } else { this_normal };
            face_normal_idx[face_idx][corner] = normals.len() as u32;
            normals.push(averaged);
        }
    }

    let mut out = mesh.clone();
    out.normals = Some(normals);
    out.face_normals = Some(face_normal_idx);
    out.use_normals = true;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mode;

    fn unit_cube() -> Mesh {
        let v = vec![
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
        ];
        let f = vec![
            [0, 2, 1], [0, 3, 2], // -Z
            [4, 5, 6], [4, 6, 7], // +Z
            [0, 1, 5], [0, 5, 4], // -Y
            [3, 7, 6], [3, 6, 2], // +Y
            [0, 4, 7], [0, 7, 3], // -X
            [1, 2, 6], [1, 6, 5], // +X
        ];
        Mesh::new(v, f, Orientation::Ccw, Mode::Solid)
    }

    #[test]
    fn unit_cube_ray_along_x_axis_hits_expected_segment() {
        let prepped = prep(unit_cube(), PrepConfig::default()).unwrap();
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut segs = SegList::new();
        let count = shot(&prepped, ray, &mut segs, Application::default()).unwrap();
        assert_eq!(count, 1);
        assert_eq!(segs.len(), 1);
        assert!((segs.as_slice()[0].t_in - 4.0).abs() < 1e-4);
        assert!((segs.as_slice()[0].t_out - 6.0).abs() < 1e-4);
    }

    #[test]
    fn edge_grazing_ray_still_yields_one_segment() {
        let prepped = prep(unit_cube(), PrepConfig::default()).unwrap();
        let ray = Ray::new(Vec3::new(-5.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut segs = SegList::new();
        shot(&prepped, ray, &mut segs, Application::default()).unwrap();
        assert_eq!(segs.len(), 1);
        assert!((segs.as_slice()[0].t_in - 4.0).abs() < 1e-3);
        assert!((segs.as_slice()[0].t_out - 6.0).abs() < 1e-3);
    }

    #[test]
    fn miss_ray_produces_no_segments() {
        let prepped = prep(unit_cube(), PrepConfig::default()).unwrap();
        let ray = Ray::new(Vec3::new(-5.0, 10.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut segs = SegList::new();
        let count = shot(&prepped, ray, &mut segs, Application::default()).unwrap();
        assert_eq!(count, 0);
        assert!(segs.is_empty());
    }

    #[test]
    fn thin_plate_appended_matches_scenario_3() {
        let v = vec![Vec3::new(-2.0, -2.0, 0.0), Vec3::new(2.0, -2.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];
        let mesh = Mesh::new(v, vec![[0, 1, 2]], Orientation::Unoriented, Mode::Plate)
            .with_plate_data(vec![2.0], vec![crate::mesh::FaceMode::Appended]);
        let prepped = prep(mesh, PrepConfig::default()).unwrap();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let mut segs = SegList::new();
        shot(&prepped, ray, &mut segs, Application::default()).unwrap();
        assert_eq!(segs.len(), 1);
        assert!((segs.as_slice()[0].t_in - 5.0).abs() < 1e-4);
        assert!((segs.as_slice()[0].t_out - 7.0).abs() < 1e-4);
    }

    #[test]
    fn plate_no_cos_thickness_is_incidence_independent() {
        let v = vec![Vec3::new(-2.0, -2.0, 0.0), Vec3::new(2.0, -2.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];
        let mesh = Mesh::new(v, vec![[0, 1, 2]], Orientation::Unoriented, Mode::PlateNoCos)
            .with_plate_data(vec![2.0], vec![crate::mesh::FaceMode::Centered]);
        let prepped = prep(mesh, PrepConfig::default()).unwrap();
        // 60 degree incidence: direction tilted off the face normal.
        let dir = Vec3::new(0.0, -0.8660254, -0.5).normalize();
        let ray = Ray::new(Vec3::new(0.0, -3.0, 5.0), dir);
        let mut segs = SegList::new();
        shot(&prepped, ray, &mut segs, Application::default()).unwrap();
        assert_eq!(segs.len(), 1);
        let seg = segs.as_slice()[0];
        assert!((seg.t_out - seg.t_in - 2.0).abs() < 1e-3);
    }

    #[test]
    fn inverted_sphere_like_octahedron_is_flipped() {
        // Octahedron with inward-facing (CW-as-CCW) windings.
        let v = vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        // Correct (outward) winding would be e.g. [0,2,4]; reverse every face.
        let f = vec![
            [0, 4, 2], [2, 4, 1], [1, 4, 3], [3, 4, 0],
            [2, 5, 0], [1, 5, 2], [3, 5, 1], [0, 5, 3],
        ];
        let mesh = Mesh::new(v, f, Orientation::Ccw, Mode::Solid);
        let prepped = prep(mesh, PrepConfig::default()).unwrap();
        assert_eq!(inside_out(&prepped), InsideOutResult::Flipped);
    }

    #[test]
    fn prep_rejects_empty_mesh() {
        let mesh = Mesh::new(vec![], vec![], Orientation::Ccw, Mode::Solid);
        assert_eq!(prep(mesh, PrepConfig::default()).unwrap_err(), BotError::Empty);
    }

    #[test]
    fn smooth_requires_oriented_or_unoriented_solid() {
        let v = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let mesh = Mesh::new(v, vec![[0, 1, 2]], Orientation::Unoriented, Mode::Plate)
            .with_plate_data(vec![1.0], vec![crate::mesh::FaceMode::Appended]);
        assert!(smooth(&mesh, 0.5).is_err());
    }

    #[test]
    fn smooth_produces_usable_normal_table() {
        let mesh = unit_cube();
        let smoothed = smooth(&mesh, 0.1).unwrap();
        assert!(smoothed.has_smooth_normals());
        assert_eq!(smoothed.normals.as_ref().unwrap().len(), smoothed.faces.len() * 3);
    }
}
