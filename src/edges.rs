//! Edge adjacency table: `Vec<Vec<EdgeEntry>>` indexed by vertex id,
//! tracking each undirected edge's use count and the faces that touch it.

use crate::mesh::Mesh;

/// One undirected edge's adjacency record, keyed by its lower-indexed
/// endpoint; `neighbor` is the other endpoint.
#[derive(Debug, Clone)]
pub struct EdgeEntry {
    pub neighbor: u32,
    /// Indices of every face incident on this edge, in discovery order.
    pub faces: Vec<u32>,
}

impl EdgeEntry {
    pub fn use_count(&self) -> usize {
        self.faces.len()
    }
}

/// Adjacency table over a mesh's edges, indexed by the lower-indexed vertex
/// of each edge.
#[derive(Debug, Clone)]
pub struct EdgeTable {
    table: Vec<Vec<EdgeEntry>>,
}

impl EdgeTable {
    /// Build the table by walking every face's three edges once.
    pub fn build(mesh: &Mesh) -> Self {
        let mut table: Vec<Vec<EdgeEntry>> = vec![Vec::new(); mesh.vertices.len()];
        for (face_idx, face) in mesh.faces.iter().enumerate() {
            for k in 0..3 {
                let (v0, v1) = (face[k], face[(k + 1) % 3]);
                let (lo, hi) = if v0 < v1 { (v0, v1) } else { (v1, v0) };
                let bucket = &mut table[lo as usize];
                match bucket.iter_mut().find(|e| e.neighbor == hi) {
                    Some(entry) => entry.faces.push(face_idx as u32),
                    None => bucket.push(EdgeEntry {
                        neighbor: hi,
                        faces: vec![face_idx as u32],
                    }),
                }
            }
        }
        Self { table }
    }

    pub fn entry(&self, v0: u32, v1: u32) -> Option<&EdgeEntry> {
        let (lo, hi) = if v0 < v1 { (v0, v1) } else { (v1, v0) };
        self.table[lo as usize].iter().find(|e| e.neighbor == hi)
    }

    pub fn use_count(&self, v0: u32, v1: u32) -> usize {
        self.entry(v0, v1).map_or(0, EdgeEntry::use_count)
    }

    /// `true` for a manifold interior edge shared by exactly two faces —
    /// the precondition for edge-collapse decimation.
    pub fn is_manifold(&self, v0: u32, v1: u32) -> bool {
        self.use_count(v0, v1) == 2
    }

    /// All edges incident on `v`, as `(neighbor, faces)` pairs.
    pub fn edges_of(&self, v: u32) -> Vec<(u32, &[u32])> {
        let mut out: Vec<(u32, &[u32])> = self.table[v as usize]
            .iter()
            .map(|e| (e.neighbor, e.faces.as_slice()))
            .collect();
        for (lo, bucket) in self.table.iter().enumerate() {
            if lo as u32 == v {
                continue;
            }
            for e in bucket {
                if e.neighbor == v {
                    out.push((lo as u32, e.faces.as_slice()));
                }
            }
        }
        out
    }

    /// Iterate every distinct edge as `(v0, v1, faces)`.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &[u32])> {
        self.table.iter().enumerate().flat_map(|(lo, bucket)| {
            bucket
                .iter()
                .map(move |e| (lo as u32, e.neighbor, e.faces.as_slice()))
        })
    }
}
