use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::*;
use serde::Serialize;
use thiserror::Error;

use crate::config::PlaybackConfig;
use crate::frame::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Characters,
    Pictures,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("cannot list {dir}: {source}")]
    Listing { dir: PathBuf, source: io::Error },
    #[error("cannot open {name}: {source}")]
    Missing { name: String, source: io::Error },
    #[error("{name} holds {len} bytes, a frame is {expected}")]
    WrongSize {
        name: String,
        len: u64,
        expected: usize,
    },
    #[error("cannot store asset: {0}")]
    Store(#[from] io::Error),
}

/// Where character and picture frames come from.
pub trait AssetLibrary {
    /// Names in display order. Re-queried every time a mode is entered.
    fn list(&self, kind: AssetKind) -> Result<Vec<String>, AssetError>;

    /// Loads `name` into `frame`; the file must be exactly one frame long.
    fn load(&self, kind: AssetKind, name: &str, frame: &mut FrameBuffer) -> Result<(), AssetError>;
}

/// Asset folders on the SPIFFS mount, one raw frame per file.
#[derive(Debug, Clone)]
pub struct DirLibrary {
    root: PathBuf,
    characters: String,
    pictures: String,
}

impl DirLibrary {
    pub fn new(root: impl Into<PathBuf>, config: &PlaybackConfig) -> Self {
        Self {
            root: root.into(),
            characters: config.characters_dir.clone(),
            pictures: config.pictures_dir.clone(),
        }
    }

    pub fn dir(&self, kind: AssetKind) -> PathBuf {
        match kind {
            AssetKind::Characters => self.root.join(&self.characters),
            AssetKind::Pictures => self.root.join(&self.pictures),
        }
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        for kind in [AssetKind::Characters, AssetKind::Pictures] {
            let dir = self.dir(kind);
            if !dir.exists() {
                fs::create_dir_all(&dir)?;
                info!("Created asset directory {}", dir.display());
            }
        }
        Ok(())
    }

    /// Writes a new asset named after the next free number in its folder.
    pub fn store(&self, kind: AssetKind, bytes: &[u8]) -> Result<String, AssetError> {
        let dir = self.dir(kind);
        let next = self
            .list(kind)
            .unwrap_or_default()
            .iter()
            .filter_map(|name| number(name))
            .max()
            .map_or(1, |n| n + 1);

        let name = format!("{next}.bin");
        let mut file = fs::File::create(dir.join(&name))?;
        file.write_all(bytes)?;
        file.flush()?;
        info!("Stored {:?} asset {} ({} bytes)", kind, name, bytes.len());
        Ok(name)
    }
}

fn number(name: &str) -> Option<u32> {
    Path::new(name).file_stem()?.to_str()?.parse().ok()
}

impl AssetLibrary for DirLibrary {
    fn list(&self, kind: AssetKind) -> Result<Vec<String>, AssetError> {
        let dir = self.dir(kind);
        let entries = fs::read_dir(&dir).map_err(|source| AssetError::Listing {
            dir: dir.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        // numbered uploads sort numerically, anything else after them by name
        names.sort_by(|a, b| match (number(a), number(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        });
        Ok(names)
    }

    fn load(&self, kind: AssetKind, name: &str, frame: &mut FrameBuffer) -> Result<(), AssetError> {
        let path = self.dir(kind).join(name);
        let missing = |source| AssetError::Missing {
            name: name.to_string(),
            source,
        };

        let mut file = fs::File::open(&path).map_err(missing)?;
        let len = file.metadata().map_err(missing)?.len();
        if len != frame.byte_len() as u64 {
            return Err(AssetError::WrongSize {
                name: name.to_string(),
                len,
                expected: frame.byte_len(),
            });
        }
        file.read_exact(frame.as_bytes_mut()).map_err(missing)?;
        Ok(())
    }
}
