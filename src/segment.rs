//! Orientation/mode-aware synthesis of ray/solid segments from a sorted
//! list of raw ray/triangle hits.

use glam::Vec3;

use crate::error::BotResult;
use crate::mesh::{FaceMode, Mesh, Mode};
use crate::triangle::{PreppedTriangle, RawHit};

/// A synthesized ray/solid segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub t_in: f32,
    pub t_out: f32,
    pub normal_in: Vec3,
    pub normal_out: Vec3,
    pub surf_in: u32,
    pub surf_out: u32,
}

/// Caller-owned segment list, appended to by [`crate::prep::shot`].
#[derive(Debug, Clone, Default)]
pub struct SegList {
    segments: Vec<Segment>,
}

impl SegList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, seg: Segment) {
        self.segments.push(seg);
    }

    pub fn extend(&mut self, segs: impl IntoIterator<Item = Segment>) {
        self.segments.extend(segs);
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

fn flat_normal(tris: &[PreppedTriangle], hit: &RawHit) -> Vec3 {
    tris[hit.tri_index].unit_normal
}

/// Dispatch on `mesh.mode`/`mesh.orientation` and convert `hits` (assumed
/// already sorted ascending by distance) into segments.
pub fn synthesize(
    hits: &[RawHit],
    tris: &[PreppedTriangle],
    mesh: &Mesh,
    tol: f32,
    reverse_normal_disabled: bool,
) -> BotResult<Vec<Segment>> {
    if hits.is_empty() {
        return Ok(Vec::new());
    }

    match mesh.mode {
        Mode::Surface => Ok(surface_segs(hits, tris)),
        Mode::Plate | Mode::PlateNoCos => plate_segs(hits, tris, mesh, reverse_normal_disabled),
        Mode::Solid => {
            if mesh.orientation == crate::mesh::Orientation::Unoriented {
                Ok(unoriented_segs(hits, tris, tol))
            } else {
                Ok(oriented_segs(hits, tris, reverse_normal_disabled))
            }
        }
    }
}

fn surface_segs(hits: &[RawHit], tris: &[PreppedTriangle]) -> Vec<Segment> {
    hits.iter()
        .map(|h| {
            let n = flat_normal(tris, h);
            Segment {
                t_in: h.t,
                t_out: h.t,
                normal_in: n,
                normal_out: n,
                surf_in: h.surf_id,
                surf_out: h.surf_id,
            }
        })
        .collect()
}

fn plate_segs(
    hits: &[RawHit],
    tris: &[PreppedTriangle],
    mesh: &Mesh,
    reverse_normal_disabled: bool,
) -> BotResult<Vec<Segment>> {
    let thickness = mesh.thickness.as_ref().ok_or_else(|| {
        crate::error::BotError::Inconsistent("plate mesh missing thickness array".into())
    })?;
    let face_modes = mesh.face_modes.as_ref().ok_or_else(|| {
        crate::error::BotError::Inconsistent("plate mesh missing face_modes array".into())
    })?;

    let mut segs = Vec::with_capacity(hits.len());
    for h in hits {
        let face = h.surf_id as usize;
        let raw_thickness = thickness[face];
        let effective = if mesh.mode == Mode::PlateNoCos {
            raw_thickness
        } else {
            let cos_incidence = h.entry_dot.abs().max(1e-6);
            raw_thickness / cos_incidence
        };

        let (t_in, t_out) = match face_modes[face] {
            FaceMode::Appended => (h.t, h.t + effective),
            FaceMode::Centered => (h.t - effective / 2.0, h.t + effective / 2.0),
        };

        let mut normal = flat_normal(tris, h);
        if !reverse_normal_disabled && h.entry_dot > 0.0 {
            normal = -normal;
        }

        segs.push(Segment {
            t_in,
            t_out,
            normal_in: normal,
            normal_out: normal,
            surf_in: h.surf_id,
            surf_out: h.surf_id,
        });
    }
    Ok(segs)
}

fn unoriented_segs(hits: &[RawHit], tris: &[PreppedTriangle], tol: f32) -> Vec<Segment> {
    if hits.len() == 1 {
        let n = flat_normal(tris, &hits[0]);
        return vec![Segment {
            t_in: hits[0].t,
            t_out: hits[0].t,
            normal_in: n,
            normal_out: n,
            surf_in: hits[0].surf_id,
            surf_out: hits[0].surf_id,
        }];
    }

    let mut deduped: Vec<RawHit> = Vec::with_capacity(hits.len());
    let mut last_removed_t: Option<f32> = None;
    let mut i = 0;
    while i < hits.len() {
        let mut j = i + 1;
        while j < hits.len() && (hits[j].t - hits[i].t).abs() <= tol {
            j += 1;
        }
        deduped.push(hits[i]);
        if j - i > 1 {
            last_removed_t = Some(hits[i].t);
        }
        i = j;
    }

    if deduped.len() % 2 == 1 {
        if let Some(t_rm) = last_removed_t {
            if let Some(pos) = deduped.iter().position(|h| (h.t - t_rm).abs() <= tol) {
                deduped.remove(pos);
            }
        }
    }

    if deduped.len() % 2 == 1 {
        tracing::warn!(count = deduped.len(), "unoriented solid produced odd hit count; discarding last");
        deduped.pop();
    }

    deduped
        .chunks_exact(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            Segment {
                t_in: a.t,
                t_out: b.t,
                normal_in: flat_normal(tris, &a),
                normal_out: flat_normal(tris, &b),
                surf_in: a.surf_id,
                surf_out: b.surf_id,
            }
        })
        .collect()
}

fn is_entrance(h: &RawHit) -> bool {
    h.entry_dot < 0.0
}

/// Coalesce hits sharing (nearly) the same distance. Pairs/triples-or-more
/// collapse to at most one entrance and one exit.
fn coalesce_same_distance(hits: &[RawHit], tol: f32) -> Vec<RawHit> {
    let mut out = Vec::with_capacity(hits.len());
    let mut i = 0;
    while i < hits.len() {
        let mut j = i + 1;
        while j < hits.len() && (hits[j].t - hits[i].t).abs() <= tol {
            j += 1;
        }
        let group = &hits[i..j];
        if group.len() == 1 {
            out.push(group[0]);
        } else {
            let entrance = group.iter().find(|h| is_entrance(h)).copied();
            let exit = group.iter().find(|h| !is_entrance(h)).copied();
            match (entrance, exit) {
                (Some(e), Some(x)) => {
                    out.push(e);
                    out.push(x);
                }
                (Some(e), None) => out.push(e),
                (None, Some(x)) => out.push(x),
                (None, None) => unreachable!("group is non-empty"),
            }
        }
        i = j;
    }
    out
}

/// FILO coalescing: a run of consecutive entrances collapses to the first,
/// a run of consecutive exits collapses to the last.
fn coalesce_filo(hits: &[RawHit]) -> Vec<RawHit> {
    let mut out = Vec::with_capacity(hits.len());
    let mut i = 0;
    while i < hits.len() {
        let sign_entrance = is_entrance(&hits[i]);
        let mut j = i + 1;
        while j < hits.len() && is_entrance(&hits[j]) == sign_entrance {
            j += 1;
        }
        if sign_entrance {
            out.push(hits[i]);
        } else {
            out.push(hits[j - 1]);
        }
        i = j;
    }
    out
}

fn strip_leading_exits_and_trailing_entrances(hits: Vec<RawHit>) -> Vec<RawHit> {
    let mut start = 0;
    while start < hits.len() && !is_entrance(&hits[start]) {
        start += 1;
    }
    let mut end = hits.len();
    while end > start && is_entrance(&hits[end - 1]) {
        end -= 1;
    }
    hits[start..end].to_vec()
}

/// Flip the sign of `h`'s classification in place by negating `entry_dot`,
/// used to manufacture a fictitious opposite-sign hit reusing a neighbor's
/// geometry.
fn fictitious_opposite(h: &RawHit, at_t: f32) -> RawHit {
    RawHit {
        t: at_t,
        entry_dot: -h.entry_dot,
        ..*h
    }
}

/// Repair an odd-length alternating sequence by inserting a fictitious
/// opposite-sign hit next to whichever adjacent pair shares a sign, or (if
/// none is found) duplicating the last hit.
fn repair_odd_count(mut hits: Vec<RawHit>) -> Vec<RawHit> {
    if hits.len() % 2 == 0 {
        return hits;
    }
    for i in 0..hits.len().saturating_sub(1) {
        if is_entrance(&hits[i]) == is_entrance(&hits[i + 1]) {
            let fictitious = fictitious_opposite(&hits[i + 1], hits[i + 1].t);
            hits.insert(i + 1, fictitious);
            return hits;
        }
    }
    if let Some(&last) = hits.last() {
        hits.push(fictitious_opposite(&last, last.t));
    }
    hits
}

fn oriented_segs(hits: &[RawHit], tris: &[PreppedTriangle], reverse_normal_disabled: bool) -> Vec<Segment> {
    const COALESCE_TOL: f32 = 1e-5;

    let coalesced = coalesce_same_distance(hits, COALESCE_TOL);
    let filo = coalesce_filo(&coalesced);
    let stripped = strip_leading_exits_and_trailing_entrances(filo);
    let repaired = repair_odd_count(stripped);

    if repaired.len() % 2 != 0 {
        tracing::warn!(count = repaired.len(), "oriented solid produced odd hit count after repair");
    }

    repaired
        .chunks_exact(2)
        .map(|pair| {
            let (enter, exit) = (pair[0], pair[1]);
            let mut normal_in = flat_normal(tris, &enter);
            let mut normal_out = flat_normal(tris, &exit);
            if !reverse_normal_disabled {
                if enter.entry_dot > 0.0 {
                    normal_in = -normal_in;
                }
                if exit.entry_dot < 0.0 {
                    normal_out = -normal_out;
                }
            }
            Segment {
                t_in: enter.t,
                t_out: exit.t,
                normal_in,
                normal_out,
                surf_in: enter.surf_id,
                surf_out: exit.surf_id,
            }
        })
        .collect()
}
