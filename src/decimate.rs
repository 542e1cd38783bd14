//! Edge-collapse decimation: collapses an edge by moving one endpoint
//! onto the other, deletes the two faces that degenerate to slivers, and
//! rewrites every other face referencing the moved vertex. Adjacency is
//! tracked through [`crate::edges::EdgeTable`] rather than an intrusive
//! linked list.

use glam::Vec3;

use crate::edges::EdgeTable;
use crate::maintenance::condense;
use crate::mesh::{Face, Mesh};

fn face_normal(mesh: &Mesh, face: Face) -> Vec3 {
    let a = mesh.vertices[face[0] as usize];
    let b = mesh.vertices[face[1] as usize];
    let c = mesh.vertices[face[2] as usize];
    (b - a).cross(c - a).normalize_or_zero()
}

fn is_degenerate(face: Face) -> bool {
    face[0] == face[1] || face[1] == face[2] || face[0] == face[2]
}

/// Find one legal edge collapse, if any exists, without mutating `mesh`.
/// Returns `(v_from, v_to, face_to_delete_a, face_to_delete_b)`.
fn find_collapse(
    mesh: &Mesh,
    table: &EdgeTable,
    max_chord_error: f32,
    cos_threshold: f32,
    min_edge_length_sq: f32,
) -> Option<(u32, u32, u32, u32)> {
    for (v0, v1, faces) in table.iter() {
        if faces.len() != 2 {
            continue; // not an interior manifold edge
        }
        let length_sq = mesh.vertices[v0 as usize].distance_squared(mesh.vertices[v1 as usize]);
        if length_sq >= min_edge_length_sq {
            continue;
        }

        if try_collapse_direction(mesh, v0, v1, faces, max_chord_error, cos_threshold) {
            return Some((v0, v1, faces[0], faces[1]));
        }
        if try_collapse_direction(mesh, v1, v0, faces, max_chord_error, cos_threshold) {
            return Some((v1, v0, faces[0], faces[1]));
        }
    }
    None
}

/// Check whether moving `from` onto `to` keeps every face touching `from`
/// (other than the two being deleted) within the chord-error and
/// normal-change tolerances.
fn try_collapse_direction(
    mesh: &Mesh,
    from: u32,
    to: u32,
    deleted_faces: &[u32],
    max_chord_error: f32,
    cos_threshold: f32,
) -> bool {
    for (i, face) in mesh.faces.iter().enumerate() {
        if deleted_faces.contains(&(i as u32)) || !face.contains(&from) {
            continue;
        }
        let old_normal = face_normal(mesh, *face);
        let mut moved = *face;
        for v in moved.iter_mut() {
            if *v == from {
                *v = to;
            }
        }
        if is_degenerate(moved) {
            return false;
        }
        let new_normal = face_normal(mesh, moved);
        if old_normal.dot(new_normal) < cos_threshold {
            return false;
        }
        let plane_point = mesh.vertices[face[0] as usize];
        let chord_error = (mesh.vertices[to as usize] - plane_point).dot(old_normal).abs();
        if chord_error > max_chord_error {
            return false;
        }
    }
    true
}

fn apply_collapse(mesh: &Mesh, from: u32, to: u32, face_a: u32, face_b: u32) -> Mesh {
    let deleted: rustc_hash::FxHashSet<u32> = [face_a, face_b].into_iter().collect();
    let keep: Vec<usize> = (0..mesh.faces.len()).filter(|&i| !deleted.contains(&(i as u32))).collect();

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

    for face in &mut out.faces {
        for v in face.iter_mut() {
            if *v == from {
                *v = to;
            }
        }
    }
    out
}

/// Collapse edges touching exactly two faces whose endpoints are closer
/// than `min_edge_length`, provided the collapse keeps every affected
/// face's plane within `max_chord_error` of the surviving vertex and every
/// affected face's normal change within `max_normal_error_angle`. Runs
/// until no further legal collapse exists, then condenses.
pub fn decimate(mesh: &Mesh, max_chord_error: f32, max_normal_error_angle: f32, min_edge_length: f32) -> Mesh {
    let cos_threshold = max_normal_error_angle.cos();
    let min_edge_length_sq = min_edge_length * min_edge_length;
    let mut mesh = mesh.clone();

    loop {
        let table = EdgeTable::build(&mesh);
        match find_collapse(&mesh, &table, max_chord_error, cos_threshold, min_edge_length_sq) {
            Some((from, to, face_a, face_b)) => {
                mesh = apply_collapse(&mesh, from, to, face_a, face_b);
            }
            None => break,
        }
    }
    condense(&mesh)
}
