use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::*;

/// Bounded store of fixed-size memory blocks.
pub trait FastTier: Send {
    /// Whether the backing memory exists at all; queried on every write.
    fn is_present(&self) -> bool;

    /// A zeroed block of `len` bytes, or `None` when memory is exhausted.
    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>>;

    fn release(&mut self, block: Box<[u8]>);
}

/// Persistent store holding one file per slot.
pub trait SlowTier: Send + Sync {
    /// Writes `block` for slot `index` to a file other than `replacing`,
    /// which stays untouched; the caller removes it once nothing points at it.
    fn store(&self, index: usize, block: &[u8], replacing: Option<&Path>) -> io::Result<PathBuf>;

    /// Fills `out` from the file, which must be exactly `out.len()` bytes.
    fn load(&self, path: &Path, out: &mut [u8]) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Fast tier on the global heap. With `CONFIG_SPIRAM_USE_MALLOC` the large
/// frame blocks are served from PSRAM.
#[derive(Debug)]
pub struct HeapTier {
    present: bool,
    limit: Option<usize>,
    live: usize,
}

impl HeapTier {
    pub fn new(present: bool) -> Self {
        Self {
            present,
            limit: None,
            live: 0,
        }
    }

    /// Caps the number of live blocks, leaving the rest of the heap alone.
    pub fn with_limit(present: bool, limit: usize) -> Self {
        Self {
            present,
            limit: Some(limit),
            live: 0,
        }
    }

    pub fn live(&self) -> usize {
        self.live
    }
}

impl FastTier for HeapTier {
    fn is_present(&self) -> bool {
        self.present
    }

    fn allocate(&mut self, len: usize) -> Option<Box<[u8]>> {
        if !self.present || self.limit.map_or(false, |limit| self.live >= limit) {
            return None;
        }
        let mut bytes = Vec::new();
        if bytes.try_reserve_exact(len).is_err() {
            warn!("Heap refused a {} byte block", len);
            return None;
        }
        bytes.resize(len, 0);
        self.live += 1;
        Some(bytes.into_boxed_slice())
    }

    fn release(&mut self, block: Box<[u8]>) {
        drop(block);
        self.live = self.live.saturating_sub(1);
    }
}

/// Slow tier as plain files in one directory. Each slot alternates between
/// `data_{index}.bin` and `data_{index}.alt` so an overwrite never touches
/// the file a reader may still be loading. SPIFFS cannot rename onto an
/// existing name, which rules out the usual write-then-rename.
#[derive(Debug, Clone)]
pub struct DirTier {
    root: PathBuf,
}

impl DirTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, index: usize) -> PathBuf {
        self.root.join(format!("data_{index}.bin"))
    }

    pub fn alternate_for(&self, index: usize) -> PathBuf {
        self.root.join(format!("data_{index}.alt"))
    }
}

impl SlowTier for DirTier {
    fn store(&self, index: usize, block: &[u8], replacing: Option<&Path>) -> io::Result<PathBuf> {
        let primary = self.path_for(index);
        let path = if replacing == Some(primary.as_path()) {
            self.alternate_for(index)
        } else {
            primary
        };

        let written = fs::File::create(&path).and_then(|mut file| {
            file.write_all(block)?;
            file.flush()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        Ok(path)
    }

    fn load(&self, path: &Path, out: &mut [u8]) -> io::Result<()> {
        let mut file = fs::File::open(path)?;
        let len = file.metadata()?.len();
        if len != out.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} holds {} bytes, expected {}", path.display(), len, out.len()),
            ));
        }
        file.read_exact(out)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_tier_honours_its_limit() {
        let mut tier = HeapTier::with_limit(true, 1);
        let block = tier.allocate(8).unwrap();
        assert!(block.iter().all(|b| *b == 0));
        assert!(tier.allocate(8).is_none());
        tier.release(block);
        assert_eq!(tier.live(), 0);
        assert!(tier.allocate(8).is_some());
    }

    #[test]
    fn absent_heap_tier_never_allocates() {
        let mut tier = HeapTier::new(false);
        assert!(!tier.is_present());
        assert!(tier.allocate(8).is_none());
    }

    #[test]
    fn dir_tier_alternates_and_leaves_the_replaced_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DirTier::new(dir.path());

        let first = tier.store(3, &[1, 2, 3, 4], None).unwrap();
        assert_eq!(first, dir.path().join("data_3.bin"));

        let second = tier.store(3, &[5, 6, 7, 8], Some(first.as_path())).unwrap();
        assert_eq!(second, dir.path().join("data_3.alt"));

        let mut out = [0u8; 4];
        tier.load(&first, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        tier.load(&second, &mut out).unwrap();
        assert_eq!(out, [5, 6, 7, 8]);

        tier.remove(&first).unwrap();
        let third = tier.store(3, &[9; 4], Some(second.as_path())).unwrap();
        assert_eq!(third, first);
        tier.load(&second, &mut out).unwrap();
        assert_eq!(out, [5, 6, 7, 8]);
    }

    #[test]
    fn dir_tier_rejects_wrong_sized_files() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DirTier::new(dir.path());
        let path = tier.store(0, &[1, 2, 3], None).unwrap();

        let mut out = [0u8; 4];
        let err = tier.load(&path, &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn dir_tier_failure_keeps_the_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DirTier::new(dir.path().join("missing"));
        assert!(tier.store(0, &[1], None).is_err());
    }
}
