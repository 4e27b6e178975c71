//! Snapshot persistence for box state.
//!
//! A snapshot captures the value of every simple tag in a box. Compute caches
//! are never persisted: restoring a snapshot writes the simple values back
//! and leaves every compute slot dirty, so derived values are recomputed from
//! the restored state on the next read.
//!
//! # Format
//!
//! - each simple value is encoded with `bincode`;
//! - the whole [`Snapshot`] (header plus encoded values) is encoded with
//!   `bincode` and compressed with `zstd`.
//!
//! The header carries the format version and the layout fingerprint of the
//! box the snapshot was taken from. Restoring into a box with another layout
//! fails loudly with [`CheckpointError::LayoutMismatch`].

use std::any::Any;
use std::path::Path;
use std::time::SystemTime;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Error;
use crate::registry::{Erased, TagBody};
use crate::storage::{DataBox, Slot};
use crate::types::TagId;

/// Snapshot format version (increment on breaking changes).
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Encoder and decoder for the value type of one simple tag.
#[derive(Clone, Copy)]
pub(crate) struct ValueCodec {
    encode: fn(&(dyn Any + Send)) -> Result<Vec<u8>, String>,
    decode: fn(&[u8]) -> Result<Erased, String>,
}

impl ValueCodec {
    pub(crate) fn of<T>() -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        Self {
            encode: encode_value::<T>,
            decode: decode_value::<T>,
        }
    }
}

fn encode_value<T: Serialize + 'static>(value: &(dyn Any + Send)) -> Result<Vec<u8>, String> {
    let value = value
        .downcast_ref::<T>()
        .ok_or_else(|| format!("value is not a {}", std::any::type_name::<T>()))?;
    bincode::serialize(value).map_err(|e| e.to_string())
}

fn decode_value<T: DeserializeOwned + Send + 'static>(bytes: &[u8]) -> Result<Erased, String> {
    let value: T = bincode::deserialize(bytes).map_err(|e| e.to_string())?;
    Ok(Box::new(value))
}

/// Snapshot file header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Snapshot format version.
    pub version: u32,
    /// Fingerprint of the tag ids and value types of the source box.
    pub layout_fingerprint: u64,
    /// Number of simple values captured.
    pub tag_count: usize,
    pub created_at: SystemTime,
}

/// Encoded simple-tag values of one box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub header: SnapshotHeader,
    /// Tag id to bincode-encoded value, in evaluation order.
    pub values: IndexMap<TagId, Vec<u8>>,
}

impl Snapshot {
    /// Write the snapshot to `path` (bincode + zstd).
    pub fn write(&self, path: &Path, compression_level: i32) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io(e.to_string()))?;
        }

        let serialized =
            bincode::serialize(self).map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        let compressed = zstd::encode_all(&serialized[..], compression_level)
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;

        debug!(
            bytes = serialized.len(),
            compressed_bytes = compressed.len(),
            "snapshot encoded"
        );

        std::fs::write(path, compressed).map_err(|e| CheckpointError::Io(e.to_string()))?;

        info!(path = %path.display(), tags = self.header.tag_count, "snapshot written");
        Ok(())
    }

    /// Load a snapshot from disk (decompress + deserialize).
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let compressed = std::fs::read(path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        let serialized = zstd::decode_all(&compressed[..])
            .map_err(|e| CheckpointError::Decompression(e.to_string()))?;
        let snapshot: Snapshot = bincode::deserialize(&serialized)
            .map_err(|e| CheckpointError::Deserialization(e.to_string()))?;

        info!(
            path = %path.display(),
            tags = snapshot.header.tag_count,
            "snapshot loaded"
        );
        Ok(snapshot)
    }
}

impl DataBox {
    /// Capture every initialized simple tag.
    pub fn snapshot(&self) -> Result<Snapshot, CheckpointError> {
        let mut values = IndexMap::new();

        for &index in self.graph.order() {
            let decl = self.decl_at(index);
            let (Slot::Simple(Some(value)), TagBody::Simple { codec, .. }) =
                (&self.slots[index], &decl.body)
            else {
                continue;
            };
            let bytes = (codec.encode)(&**value).map_err(|message| CheckpointError::Encode {
                tag: decl.id().clone(),
                message,
            })?;
            values.insert(decl.id().clone(), bytes);
        }

        Ok(Snapshot {
            header: SnapshotHeader {
                version: SNAPSHOT_VERSION,
                layout_fingerprint: self.graph.fingerprint(),
                tag_count: values.len(),
                created_at: SystemTime::now(),
            },
            values,
        })
    }

    /// Write a snapshot's values back and mark every compute slot dirty.
    ///
    /// The box is left untouched if any value fails to decode.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), CheckpointError> {
        if snapshot.header.version != SNAPSHOT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                found: snapshot.header.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        if snapshot.header.layout_fingerprint != self.graph.fingerprint() {
            return Err(CheckpointError::LayoutMismatch {
                snapshot: format!("{:016x}", snapshot.header.layout_fingerprint),
                current: format!("{:016x}", self.graph.fingerprint()),
            });
        }

        if snapshot.header.tag_count != snapshot.values.len() {
            return Err(CheckpointError::TagCountMismatch {
                header: snapshot.header.tag_count,
                values: snapshot.values.len(),
            });
        }

        let mut decoded = Vec::with_capacity(snapshot.values.len());
        for (id, bytes) in &snapshot.values {
            let index = self.lookup(id)?;
            let decl = self.decl_at(index);
            let TagBody::Simple { codec, .. } = &decl.body else {
                return Err(Error::NotSimple {
                    tag: id.clone(),
                    kind: decl.kind(),
                    operation: "restore",
                }
                .into());
            };
            let value = (codec.decode)(bytes).map_err(|message| CheckpointError::Decode {
                tag: id.clone(),
                message,
            })?;
            decoded.push((index, value));
        }

        for (index, value) in decoded {
            self.slots[index] = Slot::Simple(Some(value));
        }
        self.invalidate_all();

        debug!(tags = snapshot.values.len(), "snapshot restored");
        Ok(())
    }
}

/// Errors raised while writing, reading or restoring snapshots.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("failed to encode {tag}: {message}")]
    Encode { tag: TagId, message: String },

    #[error("failed to decode {tag}: {message}")]
    Decode { tag: TagId, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("snapshot version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("layout mismatch: snapshot fingerprint = {snapshot}, box fingerprint = {current}")]
    LayoutMismatch { snapshot: String, current: String },

    #[error("snapshot header lists {header} tags but holds {values}")]
    TagCountMismatch { header: usize, values: usize },

    #[error(transparent)]
    DataBox(#[from] Error),
}
