use std::path::PathBuf;

use super::{ArenaError, Tier};

/// A PSRAM block owned by the arena. The id is the only handle that leaves it.
#[derive(Debug)]
pub struct FastBlock {
    pub(crate) id: u64,
    pub(crate) bytes: Box<[u8]>,
}

impl FastBlock {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Box<[u8]> {
        self.bytes
    }
}

#[derive(Debug)]
pub enum Backing {
    Fast(FastBlock),
    Slow(PathBuf),
}

impl Backing {
    pub fn tier(&self) -> Tier {
        match self {
            Backing::Fast(_) => Tier::Fast,
            Backing::Slow(_) => Tier::Slow,
        }
    }

    /// Diagnostic rendering of the location, never used on the playback path.
    pub fn describe(&self) -> String {
        match self {
            Backing::Fast(block) => format!("psram:block#{}", block.id),
            Backing::Slow(path) => path.display().to_string(),
        }
    }
}

/// Slot index to backing store. Pure bookkeeping: releasing a fast block is
/// up to whoever receives it from `set` or `clear`.
#[derive(Debug)]
pub struct SlotTable {
    entries: Vec<Option<Backing>>,
}

impl SlotTable {
    pub fn new(total: usize) -> Self {
        let mut entries = Vec::with_capacity(total);
        entries.resize_with(total, || None);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self, index: usize) -> Result<(), ArenaError> {
        if index >= self.entries.len() {
            return Err(ArenaError::OutOfRange {
                index,
                total: self.entries.len(),
            });
        }
        Ok(())
    }

    pub fn resolve(&self, index: usize) -> Result<Option<&Backing>, ArenaError> {
        self.check(index)?;
        Ok(self.entries[index].as_ref())
    }

    pub(crate) fn resolve_mut(&mut self, index: usize) -> Result<Option<&mut Backing>, ArenaError> {
        self.check(index)?;
        Ok(self.entries[index].as_mut())
    }

    /// Installs a backing and hands back whatever was there before.
    pub fn set(&mut self, index: usize, backing: Backing) -> Result<Option<Backing>, ArenaError> {
        self.check(index)?;
        Ok(self.entries[index].replace(backing))
    }

    pub fn clear(&mut self, index: usize) -> Result<Option<Backing>, ArenaError> {
        self.check(index)?;
        Ok(self.entries[index].take())
    }

    pub fn occupied(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Backing)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|b| (i, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: u64) -> Backing {
        Backing::Fast(FastBlock {
            id,
            bytes: vec![0u8; 4].into_boxed_slice(),
        })
    }

    #[test]
    fn out_of_range_is_rejected_everywhere() {
        let mut table = SlotTable::new(2);
        assert!(matches!(table.resolve(2), Err(ArenaError::OutOfRange { index: 2, total: 2 })));
        assert!(table.set(5, block(1)).is_err());
        assert!(table.clear(2).is_err());
    }

    #[test]
    fn set_returns_the_previous_backing() {
        let mut table = SlotTable::new(2);
        assert!(table.set(0, block(1)).unwrap().is_none());
        let old = table.set(0, Backing::Slow(PathBuf::from("/spiffs/data_0.bin"))).unwrap();
        match old {
            Some(Backing::Fast(b)) => assert_eq!(b.id(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(table.resolve(0).unwrap().unwrap().tier(), Tier::Slow);
    }

    #[test]
    fn clear_detaches_and_counts() {
        let mut table = SlotTable::new(3);
        table.set(0, block(1)).unwrap();
        table.set(2, block(2)).unwrap();
        assert_eq!(table.occupied(), 2);
        assert!(table.clear(0).unwrap().is_some());
        assert!(table.clear(0).unwrap().is_none());
        assert!(table.resolve(0).unwrap().is_none());
        let indices: Vec<_> = table.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![2]);
    }

    #[test]
    fn describe_never_exposes_an_address() {
        assert_eq!(block(7).describe(), "psram:block#7");
    }
}
