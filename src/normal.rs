//! Smooth normal interpolation, curvature, and UV hooks.

use glam::Vec3;

use crate::triangle::{PreppedTriangle, RawHit};

/// A fully resolved hit: distance, surface id, point, and normal — the
/// output of [`resolve_normal`] layered on top of a raw segment endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub surf_id: u32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Zero curvature with an arbitrary tangent orthogonal to `normal` —
/// triangle meshes carry no analytic second-derivative surface here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Curvature {
    pub principal_dir: Vec3,
    pub c1: f32,
    pub c2: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Uv {
    pub u: f32,
    pub v: f32,
    pub du: f32,
    pub dv: f32,
}

/// Recover barycentrics from the kernel's scratch `(beta, gamma)`, clamped
/// into a valid simplex.
fn barycentrics(beta: f32, gamma: f32) -> (f32, f32, f32) {
    let v = beta.clamp(0.0, 1.0);
    let w = gamma.clamp(0.0, 1.0);
    let u = (1.0 - v - w).max(0.0);
    (u, v, w)
}

/// Is this mesh's mode a plate mode? Plate normals get an extra sign-lock
/// pass after interpolation.
fn is_plate_mode(mode: crate::mesh::Mode) -> bool {
    mode.is_plate()
}

/// Resolve the final normal for a raw hit. If `tri` carries per-vertex
/// normals, interpolate and unitize; clamp to 90 degrees off the ray
/// direction if interpolation crosses that boundary relative to the flat
/// normal. Falls back to the flat normal when smoothing is unavailable.
pub fn resolve_normal(
    hit: &RawHit,
    tri: &PreppedTriangle,
    ray_dir: Vec3,
    mode: crate::mesh::Mode,
) -> Vec3 {
    let flat = tri.unit_normal;
    let Some(vertex_normals) = tri.vertex_normals else {
        return flat;
    };

    let (u, v, w) = barycentrics(hit.gamma, hit.beta);
    let interpolated = vertex_normals[0] * u + vertex_normals[1] * v + vertex_normals[2] * w;
    let len = interpolated.length();
    if len < 1e-12 {
        return flat;
    }
    let mut smoothed = interpolated / len;

    let old_dot = flat.dot(ray_dir);
    let new_dot = smoothed.dot(ray_dir);
    if old_dot.signum() != new_dot.signum() && old_dot != 0.0 && new_dot != 0.0 {
        // Clamp to exactly 90 degrees off the ray direction via a double
        // cross product, keeping the normal in the plane spanned by the
        // flat normal and the ray.
        let tangent = ray_dir.cross(smoothed).cross(ray_dir);
        if tangent.length() > 1e-12 {
            smoothed = tangent.normalize();
            if smoothed.dot(flat) < 0.0 {
                smoothed = -smoothed;
            }
        } else {
            smoothed = flat;
        }
    }

    if is_plate_mode(mode) && smoothed.dot(flat) < 0.0 {
        smoothed = -smoothed;
    }

    smoothed
}

/// Curvature is always zero with an arbitrary orthogonal tangent —
/// triangle mesh surfaces carry no analytic second-derivative information.
pub fn curvature(normal: Vec3) -> Curvature {
    let principal_dir = if normal.x.abs() < 0.9 {
        normal.cross(Vec3::X).normalize_or_zero()
    } else {
        normal.cross(Vec3::Y).normalize_or_zero()
    };
    Curvature {
        principal_dir,
        c1: 0.0,
        c2: 0.0,
    }
}

/// UV is `(0, 0)` with zero derivatives unless a per-vertex UV table is
/// present — the table itself is a hook only, not exercised by the
/// segmenter.
pub fn uv(face_uvs: Option<[(f32, f32); 3]>, beta: f32, gamma: f32) -> Uv {
    let Some(corners) = face_uvs else {
        return Uv::default();
    };
    let (u_bary, v_bary, w_bary) = barycentrics(gamma, beta);
    let u = corners[0].0 * u_bary + corners[1].0 * v_bary + corners[2].0 * w_bary;
    let v = corners[0].1 * u_bary + corners[1].1 * v_bary + corners[2].1 * w_bary;
    Uv { u, v, du: 0.0, dv: 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mode;

    fn flat_triangle_with_normals(normals: [Vec3; 3]) -> PreppedTriangle {
        PreppedTriangle::new(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            0,
            Some(normals),
        )
    }

    #[test]
    fn falls_back_to_flat_normal_without_vertex_normals() {
        let tri = PreppedTriangle::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0), 0, None);
        let hit = RawHit {
            t: 1.0,
            surf_id: 0,
            entry_dot: 1.0,
            beta: 0.3,
            gamma: 0.3,
            tri_index: 0,
        };
        let n = resolve_normal(&hit, &tri, Vec3::new(0.0, 0.0, 1.0), Mode::Solid);
        assert_eq!(n, tri.unit_normal);
    }

    #[test]
    fn interpolates_among_matching_vertex_normals() {
        let n = Vec3::Z;
        let tri = flat_triangle_with_normals([n, n, n]);
        let hit = RawHit {
            t: 1.0,
            surf_id: 0,
            entry_dot: 1.0,
            beta: 0.2,
            gamma: 0.3,
            tri_index: 0,
        };
        let smoothed = resolve_normal(&hit, &tri, Vec3::new(0.0, 0.0, 1.0), Mode::Solid);
        assert!((smoothed - n).length() < 1e-5);
    }

    #[test]
    fn curvature_tangent_is_orthogonal_to_normal() {
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let c = curvature(normal);
        assert!(c.principal_dir.dot(normal).abs() < 1e-5);
        assert_eq!(c.c1, 0.0);
        assert_eq!(c.c2, 0.0);
    }

    #[test]
    fn uv_without_table_is_zero() {
        let result = uv(None, 0.3, 0.4);
        assert_eq!(result, Uv::default());
    }

    #[test]
    fn uv_with_table_interpolates() {
        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];
        let result = uv(Some(corners), 0.0, 0.0);
        assert!((result.u - 1.0).abs() < 1e-5);
        assert!((result.v - 0.0).abs() < 1e-5);
    }
}
