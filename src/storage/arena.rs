use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use log::*;
use serde::Serialize;

use super::slots::{Backing, FastBlock, SlotTable};
use super::tiers::{FastTier, SlowTier};
use super::{ArenaError, CursorPolicy, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub block_size: usize,
    pub fast_slots: usize,
    pub slow_slots: usize,
}

impl Geometry {
    pub fn total(&self) -> usize {
        self.fast_slots + self.slow_slots
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub index: usize,
    pub tier: Tier,
    pub location: String,
}

struct State {
    table: SlotTable,
    cursor: usize,
    next_block: u64,
    fast: Box<dyn FastTier>,
}

/// Frame storage shared between the upload handlers and the playback loop.
///
/// Every table mutation and every fast-tier copy happens under one lock.
/// Forced eviction can touch any fast slot during a single write, so the
/// lock covers the whole arena rather than individual slots. Slow-tier
/// files are written and read with that lock released.
///
/// Writers are serialized among themselves. A replaced slow file is only
/// deleted once no reader is loading from the slow tier.
pub struct Arena {
    geometry: Geometry,
    policy: CursorPolicy,
    state: Mutex<State>,
    slow: Box<dyn SlowTier>,
    writes: Mutex<()>,
    files: RwLock<()>,
}

impl Arena {
    pub fn new(
        geometry: Geometry,
        policy: CursorPolicy,
        fast: impl FastTier + 'static,
        slow: impl SlowTier + 'static,
    ) -> Self {
        info!(
            "Arena: {} fast + {} slow slots of {} bytes, {:?}",
            geometry.fast_slots, geometry.slow_slots, geometry.block_size, policy
        );
        Self {
            geometry,
            policy,
            state: Mutex::new(State {
                table: SlotTable::new(geometry.total()),
                cursor: 0,
                next_block: 0,
                fast: Box::new(fast),
            }),
            slow: Box::new(slow),
            writes: Mutex::new(()),
            files: RwLock::new(()),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // every mutation is a single assignment, a panicking holder leaves no torn state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn serialize(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `bytes` in slot `hint`, or at the cursor when no hint is given.
    /// Returns the slot the payload landed in.
    pub fn write(&self, hint: Option<usize>, bytes: &[u8]) -> Result<usize, ArenaError> {
        let limit = self.geometry.block_size;
        if bytes.len() > limit {
            return Err(ArenaError::PayloadTooLarge {
                len: bytes.len(),
                limit,
            });
        }

        let _writer = self.serialize();
        let mut state = self.lock();
        let index = hint.unwrap_or(state.cursor);
        let total = self.geometry.total();
        if index >= total {
            return Err(ArenaError::OutOfRange { index, total });
        }

        if index < self.geometry.fast_slots && state.fast.is_present() {
            let stale = self.write_fast(&mut state, index, bytes)?;
            if hint.is_none() {
                self.advance(&mut state, index);
            }
            drop(state);
            if let Some(path) = stale {
                self.discard(&path);
            }
            debug!("Wrote {} bytes to fast slot {}", bytes.len(), index);
            return Ok(index);
        }
        let replacing = match state.table.resolve(index)? {
            Some(Backing::Slow(path)) => Some(path.clone()),
            _ => None,
        };
        drop(state);

        let mut block = vec![0u8; limit];
        block[..bytes.len()].copy_from_slice(bytes);
        let path = self.slow.store(index, &block, replacing.as_deref())?;

        let mut state = self.lock();
        let stale = match state.table.set(index, Backing::Slow(path.clone()))? {
            Some(Backing::Fast(old)) => {
                state.fast.release(old.into_bytes());
                None
            }
            Some(Backing::Slow(old)) if old != path => Some(old),
            _ => None,
        };
        if hint.is_none() {
            self.advance(&mut state, index);
        }
        drop(state);

        if let Some(old) = stale {
            self.discard(&old);
        }
        debug!("Wrote {} bytes to slow slot {}", bytes.len(), index);
        Ok(index)
    }

    /// Copies the payload into a fast block for `index`, returning a slow
    /// file the slot no longer needs.
    fn write_fast(
        &self,
        state: &mut State,
        index: usize,
        bytes: &[u8],
    ) -> Result<Option<PathBuf>, ArenaError> {
        if let Some(Backing::Fast(block)) = state.table.resolve_mut(index)? {
            fill(&mut block.bytes, bytes);
            return Ok(None);
        }

        let raw = match state.fast.allocate(self.geometry.block_size) {
            Some(raw) => raw,
            None => self.evict_for(state, index)?,
        };
        let mut block = FastBlock {
            id: state.next_block,
            bytes: raw,
        };
        state.next_block += 1;
        fill(&mut block.bytes, bytes);

        match state.table.set(index, Backing::Fast(block))? {
            Some(Backing::Slow(path)) => Ok(Some(path)),
            Some(Backing::Fast(old)) => {
                state.fast.release(old.into_bytes());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Forced eviction: walk the fast range after `target`, releasing each
    /// occupant and retrying the allocation, at most `fast_slots` times.
    fn evict_for(&self, state: &mut State, target: usize) -> Result<Box<[u8]>, ArenaError> {
        let fast_slots = self.geometry.fast_slots;
        for attempt in 1..=fast_slots {
            let candidate = (target + attempt) % fast_slots;
            if matches!(state.table.resolve(candidate)?, Some(Backing::Fast(_))) {
                if let Some(Backing::Fast(victim)) = state.table.clear(candidate)? {
                    warn!(
                        "Evicting fast slot {} (block #{}) to make room for slot {}",
                        candidate,
                        victim.id(),
                        target
                    );
                    state.fast.release(victim.into_bytes());
                }
            }
            if let Some(raw) = state.fast.allocate(self.geometry.block_size) {
                return Ok(raw);
            }
        }
        error!("Fast tier exhausted after {} eviction attempts", fast_slots);
        Err(ArenaError::AllocationExhausted {
            attempts: fast_slots,
        })
    }

    fn advance(&self, state: &mut State, index: usize) {
        let total = self.geometry.total();
        match self.policy {
            CursorPolicy::FastRing => {
                let ring = if self.geometry.fast_slots > 0 {
                    self.geometry.fast_slots
                } else {
                    total
                };
                state.cursor = (index + 1) % ring;
            }
            CursorPolicy::FullRing => {
                state.cursor = (index + 1) % total;
                let landing = state.cursor;
                if matches!(state.table.resolve(landing), Ok(Some(Backing::Fast(_)))) {
                    if let Ok(Some(Backing::Fast(block))) = state.table.clear(landing) {
                        debug!("Pre-freeing fast slot {}", landing);
                        state.fast.release(block.into_bytes());
                    }
                }
            }
        }
    }

    /// Copies slot `index` into `out`, which must be one block long.
    pub fn read_into(&self, index: usize, out: &mut [u8]) -> Result<(), ArenaError> {
        if out.len() != self.geometry.block_size {
            return Err(ArenaError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "read buffer of {} bytes for {} byte blocks",
                    out.len(),
                    self.geometry.block_size
                ),
            )));
        }

        let _files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let state = self.lock();
        let path = match state.table.resolve(index)? {
            None => return Err(ArenaError::Empty(index)),
            Some(Backing::Fast(block)) => {
                out.copy_from_slice(&block.bytes);
                return Ok(());
            }
            Some(Backing::Slow(path)) => path.clone(),
        };
        drop(state);

        self.slow.load(&path, out)?;
        Ok(())
    }

    pub fn read(&self, index: usize) -> Result<Vec<u8>, ArenaError> {
        let mut out = vec![0u8; self.geometry.block_size];
        self.read_into(index, &mut out)?;
        Ok(out)
    }

    /// Releases whatever backs `index`. Freeing an empty slot is not an error.
    pub fn free(&self, index: usize) -> Result<(), ArenaError> {
        let _writer = self.serialize();
        let mut state = self.lock();
        let stale = match state.table.clear(index)? {
            Some(Backing::Fast(block)) => {
                state.fast.release(block.into_bytes());
                None
            }
            Some(Backing::Slow(path)) => Some(path),
            None => None,
        };
        drop(state);

        if let Some(path) = stale {
            self.discard(&path);
        }
        Ok(())
    }

    /// Empties every slot and rewinds the cursor. Returns how many slots held a frame.
    pub fn clear_all(&self) -> usize {
        let _writer = self.serialize();
        let mut state = self.lock();
        let mut cleared = 0;
        let mut stale = Vec::new();
        for index in 0..self.geometry.total() {
            match state.table.clear(index) {
                Ok(Some(Backing::Fast(block))) => {
                    state.fast.release(block.into_bytes());
                    cleared += 1;
                }
                Ok(Some(Backing::Slow(path))) => {
                    stale.push(path);
                    cleared += 1;
                }
                _ => {}
            }
        }
        state.cursor = 0;
        drop(state);

        for path in stale {
            self.discard(&path);
        }
        info!("Cleared {} stored frames", cleared);
        cleared
    }

    fn discard(&self, path: &Path) {
        let _files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.slow.remove(path) {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }

    pub fn populated(&self) -> usize {
        self.lock().table.occupied()
    }

    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    pub fn fast_present(&self) -> bool {
        self.lock().fast.is_present()
    }

    pub fn diagnostics(&self) -> Vec<SlotReport> {
        self.lock()
            .table
            .iter()
            .map(|(index, backing)| SlotReport {
                index,
                tier: backing.tier(),
                location: backing.describe(),
            })
            .collect()
    }
}

fn fill(block: &mut [u8], payload: &[u8]) {
    block[..payload.len()].copy_from_slice(payload);
    block[payload.len()..].fill(0);
}
