//! Glue between the upload transport and the frame arena.
//!
//! Nothing here knows about HTTP servers; handlers feed bytes in and send the
//! `Reply` they get back.

use log::*;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::playback::assets::{AssetKind, DirLibrary};
use crate::storage::{Arena, ArenaError, Geometry, SlotReport, Tier};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("slot parameter {0:?} is not a number")]
    InvalidSlot(String),
}

/// Collects an upload body without ever holding more than one block.
#[derive(Debug)]
pub struct Staging {
    limit: usize,
    bytes: Vec<u8>,
}

impl Staging {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            bytes: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ArenaError> {
        let len = self.bytes.len() + chunk.len();
        if len > self.limit {
            return Err(ArenaError::PayloadTooLarge {
                len,
                limit: self.limit,
            });
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Extracts `slot=N` from the query part of `uri`.
pub fn slot_hint(uri: &str) -> Result<Option<usize>, IngestError> {
    let Some((_, query)) = uri.split_once('?') else {
        return Ok(None);
    };
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "slot")
        .map(|(_, value)| {
            value
                .parse()
                .map_err(|_| IngestError::InvalidSlot(value.to_string()))
        })
        .transpose()
}

/// Status code and JSON body for the transport to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "status": "error", "message": message }))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub fn reply_for(geometry: &Geometry, result: &Result<usize, ArenaError>) -> Reply {
    match result {
        Ok(slot) => {
            let tier = if *slot < geometry.fast_slots {
                Tier::Fast
            } else {
                Tier::Slow
            };
            Reply::json(200, json!({ "status": "success", "slot": slot, "tier": tier }))
        }
        Err(ArenaError::PayloadTooLarge { .. }) => Reply::error(400, "Data too large"),
        Err(ArenaError::OutOfRange { .. }) => Reply::error(400, "Invalid slot number"),
        Err(ArenaError::AllocationExhausted { .. }) => Reply::error(500, "Memory allocation failed"),
        Err(ArenaError::IoFailure(_)) => Reply::error(500, "Storage I/O failed"),
        Err(ArenaError::Empty(_)) => Reply::error(500, "Slot unexpectedly empty"),
    }
}

/// Writes one frame into the arena and describes the outcome.
pub fn upload(arena: &Arena, hint: Option<usize>, bytes: &[u8]) -> Reply {
    let result = arena.write(hint, bytes);
    match &result {
        Ok(slot) => info!("Stored {} bytes in slot {}", bytes.len(), slot),
        Err(e) => warn!("Upload of {} bytes rejected: {}", bytes.len(), e),
    }
    reply_for(&arena.geometry(), &result)
}

/// Same as `upload`, starting from the raw request URI.
pub fn upload_to(arena: &Arena, uri: &str, bytes: &[u8]) -> Reply {
    match slot_hint(uri) {
        Ok(hint) => upload(arena, hint, bytes),
        Err(e) => {
            warn!("{}", e);
            Reply::error(400, "Invalid slot parameter")
        }
    }
}

/// Saves a character or picture frame as the next numbered asset.
pub fn store_asset(library: &DirLibrary, kind: AssetKind, bytes: &[u8], frame_len: usize) -> Reply {
    if bytes.len() != frame_len {
        warn!("{:?} upload of {} bytes, expected {}", kind, bytes.len(), frame_len);
        return Reply::error(400, "Asset must be exactly one frame");
    }
    match library.store(kind, bytes) {
        Ok(name) => Reply::json(200, json!({ "status": "success", "kind": kind, "file": name })),
        Err(e) => {
            error!("{}", e);
            Reply::error(500, "Storage I/O failed")
        }
    }
}

#[derive(Serialize)]
struct Status {
    geometry: Geometry,
    cursor: usize,
    populated: usize,
    fast_present: bool,
    slots: Vec<SlotReport>,
}

pub fn status(arena: &Arena) -> Reply {
    let status = Status {
        geometry: arena.geometry(),
        cursor: arena.cursor(),
        populated: arena.populated(),
        fast_present: arena.fast_present(),
        slots: arena.diagnostics(),
    };
    match serde_json::to_string(&status) {
        Ok(body) => Reply { status: 200, body },
        Err(e) => {
            error!("Cannot encode status: {}", e);
            Reply::error(500, "Status unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::config::PlaybackConfig;
    use crate::playback::AssetLibrary;
    use crate::storage::{CursorPolicy, DirTier, HeapTier};

    fn arena(dir: &std::path::Path) -> Arena {
        Arena::new(
            Geometry {
                block_size: 8,
                fast_slots: 2,
                slow_slots: 2,
            },
            CursorPolicy::FastRing,
            HeapTier::new(true),
            DirTier::new(dir),
        )
    }

    fn body(reply: &Reply) -> Value {
        serde_json::from_str(&reply.body).unwrap()
    }

    #[test]
    fn staging_refuses_to_grow_past_one_block() {
        let mut staging = Staging::new(8);
        staging.push(&[1; 5]).unwrap();
        staging.push(&[2; 3]).unwrap();
        assert!(matches!(
            staging.push(&[3]),
            Err(ArenaError::PayloadTooLarge { len: 9, limit: 8 })
        ));
        assert_eq!(staging.len(), 8);
        assert_eq!(staging.as_slice()[4..6], [1, 2]);
    }

    #[test]
    fn slot_hints() {
        assert_eq!(slot_hint("/write").unwrap(), None);
        assert_eq!(slot_hint("/write?slot=7").unwrap(), Some(7));
        assert_eq!(slot_hint("/write?x=1&slot=42").unwrap(), Some(42));
        assert_eq!(slot_hint("/write?x=1").unwrap(), None);
        assert!(matches!(slot_hint("/write?slot=-1"), Err(IngestError::InvalidSlot(v)) if v == "-1"));
        assert!(slot_hint("/write?slot=").is_err());
    }

    #[test]
    fn upload_reports_slot_and_tier() {
        let dir = tempfile::tempdir().unwrap();
        let arena = arena(dir.path());

        let reply = upload_to(&arena, "/write", &[1; 8]);
        assert_eq!(reply.status, 200);
        let json = body(&reply);
        assert_eq!(json["status"], "success");
        assert_eq!(json["slot"], 0);
        assert_eq!(json["tier"], "fast");

        let json = body(&upload_to(&arena, "/write?slot=3", &[2; 4]));
        assert_eq!(json["slot"], 3);
        assert_eq!(json["tier"], "slow");
        assert_eq!(arena.read(3).unwrap(), vec![2, 2, 2, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn upload_errors_map_to_status_codes() {
        let dir = tempfile::tempdir().unwrap();
        let arena = arena(dir.path());

        let too_big = upload_to(&arena, "/write", &[0; 9]);
        assert_eq!(too_big.status, 400);
        assert_eq!(body(&too_big)["message"], "Data too large");

        let out_of_range = upload_to(&arena, "/write?slot=4", &[0; 8]);
        assert_eq!(out_of_range.status, 400);
        assert_eq!(body(&out_of_range)["message"], "Invalid slot number");

        let garbage = upload_to(&arena, "/write?slot=abc", &[0; 8]);
        assert_eq!(garbage.status, 400);
        assert_eq!(body(&garbage)["message"], "Invalid slot parameter");
        assert_eq!(arena.populated(), 0);

        let geometry = arena.geometry();
        let exhausted = reply_for(&geometry, &Err(ArenaError::AllocationExhausted { attempts: 2 }));
        assert_eq!(exhausted.status, 500);
        assert_eq!(body(&exhausted)["message"], "Memory allocation failed");
        assert!(!exhausted.is_success());
    }

    #[test]
    fn assets_must_be_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let library = DirLibrary::new(dir.path(), &PlaybackConfig::default());
        library.ensure_dirs().unwrap();

        assert_eq!(store_asset(&library, AssetKind::Pictures, &[0; 5], 12).status, 400);
        let reply = store_asset(&library, AssetKind::Pictures, &[0; 12], 12);
        assert!(reply.is_success());
        assert_eq!(body(&reply)["file"], "1.bin");
        assert_eq!(body(&reply)["kind"], "pictures");
        assert_eq!(library.list(AssetKind::Pictures).unwrap(), vec!["1.bin"]);
    }

    #[test]
    fn status_lists_occupied_slots() {
        let dir = tempfile::tempdir().unwrap();
        let arena = arena(dir.path());
        arena.write(None, &[1]).unwrap();
        arena.write(Some(2), &[1]).unwrap();

        let json = body(&status(&arena));
        assert_eq!(json["populated"], 2);
        assert_eq!(json["cursor"], 1);
        assert_eq!(json["fast_present"], true);
        assert_eq!(json["geometry"]["block_size"], 8);
        let slots = json["slots"].as_array().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0]["tier"], "fast");
        assert_eq!(slots[1]["index"], 2);
        assert_eq!(slots[1]["tier"], "slow");
    }
}
