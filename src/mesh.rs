//! The Bag-of-Triangles mesh data model and its invariants.

use glam::Vec3;

use crate::error::{BotError, BotResult};

/// Winding/orientation declaration for a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    #[default]
    Unoriented,
    Ccw,
    Cw,
}

/// Per-face behavior bit for plate modes (`RT_BOT_FACE_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FaceMode {
    /// Thickness is centered about the hit point.
    Centered,
    /// Thickness is appended, starting at the hit point.
    Appended,
}

/// Surface semantics for ray/solid segment synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Each hit becomes a zero-thickness segment.
    Surface,
    /// Raw hits are paired into in/out segments according to orientation.
    #[default]
    Solid,
    /// Each hit becomes a thin slab; thickness divided by cosine of incidence.
    Plate,
    /// Like `Plate`, but thickness is NOT divided by the incidence cosine.
    PlateNoCos,
}

impl Mode {
    pub fn is_plate(self) -> bool {
        matches!(self, Mode::Plate | Mode::PlateNoCos)
    }
}

/// A triangle, as a triple of indices into [`Mesh::vertices`].
pub type Face = [u32; 3];

/// Owned mesh data, indexed vertices + indexed triangles.
///
/// Plate-mode per-face data (`thickness`, `face_modes`) and optional smooth
/// normals are carried as parallel arrays rather than folded into the
/// `mode`/`orientation` tags themselves.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub orientation: Orientation,
    pub mode: Mode,

    /// Present iff `mode` is a plate mode; one entry per face.
    pub thickness: Option<Vec<f32>>,
    /// Present iff `mode` is a plate mode; one entry per face.
    pub face_modes: Option<Vec<FaceMode>>,

    /// Optional per-vertex-normal table.
    pub normals: Option<Vec<Vec3>>,
    /// One triple of indices into `normals` per face, parallel to `faces`.
    pub face_normals: Option<Vec<[u32; 3]>>,
    /// Whether smooth normals should be consulted at all (even if present).
    pub use_normals: bool,

    /// Optional per-vertex UV table (hook only; not exercised by the
    /// segmenter).
    pub uvs: Option<Vec<(f32, f32)>>,
    pub face_uvs: Option<Vec<[u32; 3]>>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Face>, orientation: Orientation, mode: Mode) -> Self {
        Self {
            vertices,
            faces,
            orientation,
            mode,
            thickness: None,
            face_modes: None,
            normals: None,
            face_normals: None,
            use_normals: false,
            uvs: None,
            face_uvs: None,
        }
    }

    pub fn with_plate_data(mut self, thickness: Vec<f32>, face_modes: Vec<FaceMode>) -> Self {
        self.thickness = Some(thickness);
        self.face_modes = Some(face_modes);
        self
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>, face_normals: Vec<[u32; 3]>, use_normals: bool) -> Self {
        self.normals = Some(normals);
        self.face_normals = Some(face_normals);
        self.use_normals = use_normals;
        self
    }

    pub fn has_smooth_normals(&self) -> bool {
        self.use_normals && self.normals.is_some() && self.face_normals.is_some()
    }

    /// Validate basic invariants: every face index in range, plate arrays
    /// sized to match faces when in a plate mode.
    pub fn validate(&self) -> BotResult<()> {
        if self.faces.is_empty() || self.vertices.is_empty() {
            return Err(BotError::Empty);
        }
        for (face_idx, face) in self.faces.iter().enumerate() {
            for &v in face {
                if v as usize >= self.vertices.len() {
                    return Err(BotError::InvalidIndex {
                        face: face_idx,
                        vertex: v as usize,
                        num_vertices: self.vertices.len(),
                    });
                }
            }
        }
        if self.mode.is_plate() {
            let n = self.faces.len();
            let thickness_ok = self.thickness.as_ref().is_some_and(|t| t.len() == n);
            let face_mode_ok = self.face_modes.as_ref().is_some_and(|f| f.len() == n);
            if !thickness_ok || !face_mode_ok {
                return Err(BotError::Inconsistent(format!(
                    "plate mesh with {n} faces requires thickness and face_modes arrays of the same length"
                )));
            }
        }
        Ok(())
    }

    /// Swap the 2nd and 3rd vertex of every face. Used both by CW
    /// normalization at prep time and by the `flip` maintenance operation —
    /// note `flip` applied twice is the identity.
    pub fn flip_faces(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
    }

    /// Axis-aligned bounding box of the raw vertex set, nudged by
    /// `tolerance` on any axis with zero thickness so the solid remains
    /// hittable.
    pub fn bbox(&self, tolerance: f32) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for &v in &self.vertices {
            min = min.min(v);
            max = max.max(v);
        }
        nondegenerate_bbox(min, max, tolerance)
    }
}

/// Widen any axis where `min == max` by `tolerance`, so a flat slab is still
/// hittable (`BBOX_NONDEGEN`).
pub fn nondegenerate_bbox(mut min: Vec3, mut max: Vec3, tolerance: f32) -> (Vec3, Vec3) {
    for axis in 0..3 {
        if (max[axis] - min[axis]).abs() < f32::EPSILON {
            min[axis] -= tolerance;
            max[axis] += tolerance;
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube_faces() -> (Vec<Vec3>, Vec<Face>) {
        let v = [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
        ];
        let f: Vec<Face> = vec![
            [0, 2, 1], [0, 3, 2], // -Z
            [4, 5, 6], [4, 6, 7], // +Z
            [0, 1, 5], [0, 5, 4], // -Y
            [3, 7, 6], [3, 6, 2], // +Y
            [0, 4, 7], [0, 7, 3], // -X
            [1, 2, 6], [1, 6, 5], // +X
        ];
        (v.to_vec(), f)
    }

    #[test]
    fn validate_rejects_empty_mesh() {
        let mesh = Mesh::new(vec![], vec![], Orientation::Ccw, Mode::Solid);
        assert_eq!(mesh.validate(), Err(BotError::Empty));
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let (v, _) = unit_cube_faces();
        let mesh = Mesh::new(v, vec![[0, 1, 99]], Orientation::Ccw, Mode::Solid);
        assert!(matches!(mesh.validate(), Err(BotError::InvalidIndex { .. })));
    }

    #[test]
    fn validate_requires_plate_arrays_sized_to_faces() {
        let (v, f) = unit_cube_faces();
        let mesh = Mesh::new(v, f, Orientation::Ccw, Mode::Plate);
        assert!(matches!(mesh.validate(), Err(BotError::Inconsistent(_))));
    }

    #[test]
    fn flip_is_involutive() {
        let (v, f) = unit_cube_faces();
        let mut mesh = Mesh::new(v, f.clone(), Orientation::Ccw, Mode::Solid);
        mesh.flip_faces();
        mesh.flip_faces();
        assert_eq!(mesh.faces, f);
    }

    #[test]
    fn bbox_matches_cube_extent() {
        let (v, f) = unit_cube_faces();
        let mesh = Mesh::new(v, f, Orientation::Ccw, Mode::Solid);
        let (min, max) = mesh.bbox(1e-6);
        assert_eq!(min, Vec3::splat(-1.0));
        assert_eq!(max, Vec3::splat(1.0));
    }

    #[test]
    fn bbox_nudges_degenerate_axis() {
        let (min, max) = nondegenerate_bbox(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), 0.01);
        assert!(min.z < 0.0);
        assert!(max.z > 0.0);
    }
}
