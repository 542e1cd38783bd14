//! Bag-of-Triangles (BoT) mesh primitive ray-tracing core.
//!
//! A mesh representation (vertices, faces, optional per-vertex normals,
//! plate thicknesses, face modes) together with an HLBVH spatial index and
//! a ray-intersection kernel, producing ordered ray/solid segment lists
//! under strict geometric invariants and multiple surface semantics
//! (solid, surface, plate, plate-no-cosine).
//!
//! The data flow for a single ray query: [`prep::shot`] descends the flat
//! BVH ([`flat_bvh`]), which emits candidate triangles to the
//! [`triangle`] kernel; raw hits accumulate in a thread-local
//! [`hit::HitBuffer`]; the [`segment`] module converts the sorted hits
//! into ordered segments according to the mesh's mode and orientation.
//! [`prep::prep`] builds the BVH ([`bvh`]) and flattens it once, ahead of
//! any ray query. [`maintenance`] and [`decimate`] hold the out-of-band
//! mesh transformations — never run concurrently with ray queries against
//! the same mesh.

pub mod bvh;
pub mod config;
pub mod decimate;
pub mod edges;
pub mod error;
pub mod flat_bvh;
pub mod hit;
pub mod maintenance;
pub mod mesh;
pub mod morton;
pub mod normal;
pub mod prep;
pub mod segment;
pub mod triangle;

pub use config::{Application, PrepConfig};
pub use error::{BotError, BotResult};
pub use maintenance::InsideOutResult;
pub use mesh::{Face, FaceMode, Mesh, Mode, Orientation};
pub use normal::{Curvature, Hit, Uv};
pub use prep::{inside_out, norm, prep, shot, smooth, curvature, uv, Prepped};
pub use segment::{SegList, Segment};
pub use triangle::Ray;
