//! Value-reference translation: the container's flat VR space to
//! `(slave_index, slave_vr)` pairs (spec.md §4.5).
use crate::buffer::PerKind;
use crate::error::Error;
use crate::VarKind;

/// One entry of a typed port-translation table. `slave_index < 0` is the
/// sentinel for "container-local, no routing" (spec.md §3 invariants).
#[derive(Debug, Clone, Copy)]
pub struct PortEntry {
    pub slave_index: isize,
    pub slave_vr: u32,
}

impl PortEntry {
    pub const fn local() -> Self {
        PortEntry {
            slave_index: -1,
            slave_vr: 0,
        }
    }

    pub fn is_local(&self) -> bool {
        self.slave_index < 0
    }
}

/// The four independent typed translation tables `V_T[0..P_T)` (spec.md
/// §4.5).
#[derive(Debug, Default, Clone)]
pub struct PortTables {
    pub tables: PerKind<Vec<PortEntry>>,
}

impl PortTables {
    pub fn entry(&self, kind: VarKind, vr: u32) -> Result<&PortEntry, Error> {
        self.tables
            .get(kind)
            .get(vr as usize)
            .ok_or_else(|| Error::Config {
                line: 0,
                message: format!("value reference {vr:?} out of range for {kind:?} port table"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffers;

    /// Router isomorphism for local ports (spec.md §8): Set(v, x) then
    /// Get(v) returns x when `slave_index < 0`. Local ports address
    /// `Buffers` directly by VR (spec.md §4.5) — the same indexing
    /// `Container::get_typed`/`set_typed` and the slave wiring functions
    /// use, no intermediate reader/writer type needed.
    #[test]
    fn local_port_roundtrips() {
        let mut buffers = Buffers::new(PerKind {
            real: 4,
            integer: 0,
            boolean: 0,
            string: 0,
        });
        buffers.real[2] = 3.5;
        assert_eq!(buffers.real[2], 3.5);
    }

    #[test]
    fn local_sentinel_detection() {
        assert!(PortEntry::local().is_local());
        assert!(!PortEntry {
            slave_index: 0,
            slave_vr: 7
        }
        .is_local());
    }
}
