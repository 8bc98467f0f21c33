//! Request identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use uuid::Uuid;

static GENERATION: OnceLock<u64> = OnceLock::new();
static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one inbound request.
///
/// The `generation` half is drawn once per process from a random UUID, the
/// `sequence` half from a process-wide counter, so two identifiers handed out
/// by the same process never collide and sort in allocation order.
///
/// A root context is assigned a fresh identifier; child contexts inherit the
/// identifier of their root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    generation: u64,
    sequence: u64,
}

impl RequestId {
    /// Allocates the next identifier for this process.
    pub(crate) fn next() -> Self {
        let generation = *GENERATION.get_or_init(|| Uuid::new_v4().as_u64_pair().0);
        Self {
            generation,
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Returns the per-process generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the per-process sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}-{:016x}", self.generation, self.sequence)
    }
}
