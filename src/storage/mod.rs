//! Fixed-block frame storage split across a fast PSRAM tier and a slow file tier.

pub mod arena;
pub mod slots;
pub mod tiers;

use serde::Serialize;
use thiserror::Error;

pub use arena::{Arena, Geometry, SlotReport};
pub use slots::{Backing, FastBlock, SlotTable};
pub use tiers::{DirTier, FastTier, HeapTier, SlowTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Slow,
}

/// How the implicit write cursor moves after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CursorPolicy {
    /// Wrap within the fast tier only; pressure is handled by forced eviction.
    FastRing,
    /// Wrap across every slot and pre-free the fast block the cursor lands on.
    FullRing,
}

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("payload of {len} bytes exceeds the {limit} byte block size")]
    PayloadTooLarge { len: usize, limit: usize },
    #[error("no fast block could be allocated after {attempts} eviction attempts")]
    AllocationExhausted { attempts: usize },
    #[error("slow tier i/o failed: {0}")]
    IoFailure(#[from] std::io::Error),
    #[error("slot {index} is outside the {total} slot table")]
    OutOfRange { index: usize, total: usize },
    #[error("slot {0} is empty")]
    Empty(usize),
}
