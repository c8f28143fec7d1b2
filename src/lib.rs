//! A composite co-simulation slave: several embedded slaves, driven in
//! lock-step behind a single co-simulation v2 ABI.
//!
//! See `SPEC_FULL.md` at the repository root for the full requirements this
//! crate implements; the short version is that [`Container`] is itself a
//! co-simulation slave (it implements [`facade::Common`] and
//! [`facade::CoSimulation`]) whose variables are either container-local or
//! routed through to one of its embedded slaves via the [`router`].

pub mod abi;
pub mod buffer;
pub mod config;
pub mod container;
pub mod error;
pub mod facade;
pub mod logging;
pub mod orchestrator;
pub mod profiler;
pub mod rendezvous;
pub mod router;
pub mod slave;

pub use container::Container;
pub use error::Error;
pub use facade::{CoSimulation, Common};

/// A primitive variable kind, used to parameterize the typed buffers,
/// translation tables, and wiring lists (spec.md §9, "Typed parallel
/// tables").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Real,
    Integer,
    Boolean,
    String,
}
