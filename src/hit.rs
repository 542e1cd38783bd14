//! Thread-local hit buffer: a growable scratch array reused across
//! shots on the same thread, kept sorted by distance via insertion sort
//! as hits accumulate.

use std::cell::RefCell;

use crate::config::HIT_BUFFER_INIT_CAPACITY;
use crate::triangle::RawHit;

/// A growable, reusable buffer of raw hits for a single ray. Capacity
/// doubles on growth and is never shrunk between rays — only truncated.
#[derive(Debug, Default)]
pub struct HitBuffer {
    hits: Vec<RawHit>,
}

impl HitBuffer {
    pub fn new() -> Self {
        Self {
            hits: Vec::with_capacity(HIT_BUFFER_INIT_CAPACITY),
        }
    }

    pub fn push(&mut self, hit: RawHit) {
        self.hits.push(hit);
    }

    pub fn clear(&mut self) {
        self.hits.clear();
    }

    pub fn as_slice(&self) -> &[RawHit] {
        &self.hits
    }

    pub fn as_mut_vec(&mut self) -> &mut Vec<RawHit> {
        &mut self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Sort hits ascending by distance with insertion sort — cache-friendly
    /// for the small hit counts a single ray typically produces.
    pub fn sort_by_distance(&mut self) {
        let hits = &mut self.hits;
        for i in 1..hits.len() {
            let key = hits[i];
            let mut j = i;
            while j > 0 && hits[j - 1].t > key.t {
                hits[j] = hits[j - 1];
                j -= 1;
            }
            hits[j] = key;
        }
    }
}

thread_local! {
    /// Per-thread scratch buffer reused across rays, matching the original's
    /// `_Thread_local hit_da hits_per_cpu`.
    static HITS_PER_THREAD: RefCell<HitBuffer> = RefCell::new(HitBuffer::new());
}

/// Run `f` with this thread's scratch hit buffer cleared and ready for a new
/// ray. Never shares the buffer across threads.
pub fn with_thread_local_buffer<R>(f: impl FnOnce(&mut HitBuffer) -> R) -> R {
    HITS_PER_THREAD.with(|cell| {
        let mut buf = cell.borrow_mut();
        buf.clear();
        f(&mut buf)
    })
}
