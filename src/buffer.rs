//! Container-level variable storage: four zero/null-initialized typed
//! buffers (spec.md §3, "Container owns... four typed buffers").
//!
//! These slots serve two roles at once: they're the backing store for
//! container-local variables, *and* the one-step-delay mailbox that the
//! router uses to wire slave outputs into other slaves' inputs (spec.md
//! §4.5). A single `Buffers` value is parameterized by [`crate::VarKind`]
//! rather than duplicated four times (spec.md §9, "Typed parallel tables").

/// A same-shaped value per [`crate::VarKind`], used for buffer sizes, port
/// table lengths, and anything else naturally indexed by primitive type.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerKind<T> {
    pub real: T,
    pub integer: T,
    pub boolean: T,
    pub string: T,
}

impl<T> PerKind<T> {
    pub fn get(&self, kind: crate::VarKind) -> &T {
        match kind {
            crate::VarKind::Real => &self.real,
            crate::VarKind::Integer => &self.integer,
            crate::VarKind::Boolean => &self.boolean,
            crate::VarKind::String => &self.string,
        }
    }

    pub fn get_mut(&mut self, kind: crate::VarKind) -> &mut T {
        match kind {
            crate::VarKind::Real => &mut self.real,
            crate::VarKind::Integer => &mut self.integer,
            crate::VarKind::Boolean => &mut self.boolean,
            crate::VarKind::String => &mut self.string,
        }
    }
}

/// The container's own variable storage, sized by `n_local_*` from
/// `container.txt` (spec.md §6 item 5) but addressed by *port* VR too: a
/// port VR with `slave_index < 0` indexes directly into these slots exactly
/// like a local variable (spec.md §3 invariants).
#[derive(Debug, Default, Clone)]
pub struct Buffers {
    pub real: Vec<f64>,
    pub integer: Vec<i32>,
    pub boolean: Vec<bool>,
    pub string: Vec<Option<String>>,
}

impl Buffers {
    pub fn new(sizes: PerKind<usize>) -> Self {
        Buffers {
            real: vec![0.0; sizes.real],
            integer: vec![0; sizes.integer],
            boolean: vec![false; sizes.boolean],
            string: vec![None; sizes.string],
        }
    }
}

/// Wraps [`Buffers`] for cross-thread sharing without a mutex (spec.md §4.6,
/// "no separate mutex protects the buffers... mutual exclusion is achieved
/// by the rendezvous barrier alone"). The container thread writes inputs
/// before signaling a slave's worker, and reads outputs only after that
/// worker's `done` has fired; the barrier is the sole synchronization, by
/// design, so this type cannot be a plain `Mutex<Buffers>`.
pub struct SharedBuffers(std::cell::UnsafeCell<Buffers>);

// Safety: callers only dereference `get()` while holding the happens-before
// relationship established by a `Rendezvous` pair (crate::rendezvous). There
// is never true concurrent access, only sequenced handoffs.
unsafe impl Sync for SharedBuffers {}
unsafe impl Send for SharedBuffers {}

impl SharedBuffers {
    pub fn new(buffers: Buffers) -> Self {
        SharedBuffers(std::cell::UnsafeCell::new(buffers))
    }

    /// # Safety
    /// The caller must be on the side of a go/done handshake that the
    /// co-simulation scheduling rules (spec.md §4.6) grant exclusive access
    /// to the buffers at this moment.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get(&self) -> &mut Buffers {
        &mut *self.0.get()
    }
}
