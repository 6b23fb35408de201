//! Checkpoint persistence for the signal store.
//!
//! A checkpoint is the full signal sequence written as pretty-printed JSON so
//! it can be inspected by hand. Sample buffers are stored literally and are
//! never regenerated on load.
//!
//! - **Atomic replace**: writes go to a temporary file in the destination
//!   directory, are synced, then renamed over the target. A crash mid-write
//!   leaves the previous checkpoint untouched.
//! - **Exact round trip**: `f64` values are written in shortest round-trip
//!   form, so load followed by save reproduces the same file.
//! - **Fresh start is normal**: a missing file loads as `None`.
//!
//! # Format
//!
//! ```text
//! { "version": 1, "signals": [ { "length", "frequency", "scale", "depth", "data" } ] }
//! ```
//!
//! The unversioned form, a bare array of signal records, is still accepted
//! on load. A record without `depth` defaults to
//! [`DEFAULT_DEPTH`](crate::types::DEFAULT_DEPTH).

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::store::SignalStore;
use crate::types::{DEFAULT_DEPTH, Signal, SignalParams};

/// Checkpoint format version (increment on breaking changes).
pub const CHECKPOINT_VERSION: u32 = 1;

/// Default checkpoint location, relative to the working directory.
pub const DEFAULT_CHECKPOINT_PATH: &str = "sim_state.json";

// ============================================================================
// Checkpoint Format
// ============================================================================

/// Serialized form of one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub length: usize,
    pub frequency: usize,
    pub scale: f64,
    #[serde(default = "default_depth")]
    pub depth: u32,
    pub data: Vec<f64>,
}

fn default_depth() -> u32 {
    DEFAULT_DEPTH
}

impl From<&Signal> for SignalRecord {
    fn from(signal: &Signal) -> Self {
        Self {
            length: signal.length(),
            frequency: signal.frequency(),
            scale: signal.scale(),
            depth: signal.depth(),
            data: signal.data().to_vec(),
        }
    }
}

impl TryFrom<SignalRecord> for Signal {
    type Error = crate::error::Error;

    fn try_from(record: SignalRecord) -> Result<Self, Self::Error> {
        let params = SignalParams::new(record.length, record.frequency, record.scale, record.depth);
        Signal::from_parts(params, record.data)
    }
}

/// Complete on-disk checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub signals: Vec<SignalRecord>,
}

impl Checkpoint {
    pub fn from_signals(signals: &[Signal]) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            signals: signals.iter().map(SignalRecord::from).collect(),
        }
    }

    /// Validate every record and rebuild the signals.
    pub fn into_signals(self) -> Result<Vec<Signal>, CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(self.version));
        }
        self.signals
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                Signal::try_from(record).map_err(|source| CheckpointError::InvalidRecord {
                    index,
                    message: source.to_string(),
                })
            })
            .collect()
    }

    /// Parse checkpoint JSON, accepting both the versioned and bare-array forms.
    pub fn from_json(text: &str) -> Result<Self, CheckpointError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| CheckpointError::Deserialization(e.to_string()))?;

        if value.is_array() {
            let signals: Vec<SignalRecord> = serde_json::from_value(value)
                .map_err(|e| CheckpointError::Deserialization(e.to_string()))?;
            return Ok(Self {
                version: CHECKPOINT_VERSION,
                signals,
            });
        }

        serde_json::from_value(value).map_err(|e| CheckpointError::Deserialization(e.to_string()))
    }
}

// ============================================================================
// Save / Load
// ============================================================================

/// Write a checkpoint of `store` to `path`, replacing any existing file.
///
/// Returns the number of signals written. Failures leave both the store and
/// any previous checkpoint file untouched.
pub fn save(store: &SignalStore, path: &Path) -> Result<usize, CheckpointError> {
    let checkpoint = store.with_signals(Checkpoint::from_signals);
    write_checkpoint(path, &checkpoint)?;

    info!(
        path = %path.display(),
        signals = checkpoint.signals.len(),
        "Checkpoint saved"
    );
    Ok(checkpoint.signals.len())
}

/// Read the signals stored at `path`.
///
/// `Ok(None)` means there is no checkpoint yet.
pub fn load(path: &Path) -> Result<Option<Vec<Signal>>, CheckpointError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No checkpoint file");
            return Ok(None);
        }
        Err(err) => return Err(CheckpointError::Io(err.to_string())),
    };

    debug!(path = %path.display(), bytes = text.len(), "Checkpoint file read");

    let signals = Checkpoint::from_json(&text)?.into_signals()?;
    info!(
        path = %path.display(),
        signals = signals.len(),
        "Checkpoint loaded"
    );
    Ok(Some(signals))
}

/// Result of [`restore`].
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// No checkpoint existed; the store was left as-is.
    Fresh,
    /// The store was replaced with this many restored signals.
    Restored(usize),
    /// The checkpoint was unreadable; the store was emptied.
    Degraded(String),
}

/// Load `path` into `store`, degrading to an empty store on bad input.
pub fn restore(store: &SignalStore, path: &Path) -> RestoreOutcome {
    match load(path) {
        Ok(None) => {
            info!(path = %path.display(), "No checkpoint to load, starting fresh");
            RestoreOutcome::Fresh
        }
        Ok(Some(signals)) => {
            let count = signals.len();
            store.replace(signals);
            RestoreOutcome::Restored(count)
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Checkpoint load failed, starting with an empty store"
            );
            store.clear();
            RestoreOutcome::Degraded(err.to_string())
        }
    }
}

/// Serialize to a sibling temporary file, then atomically rename into place.
///
/// JSON has no encoding for NaN or infinities, so a record holding one is
/// refused before the existing file is touched.
fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
    for (index, record) in checkpoint.signals.iter().enumerate() {
        if !record.scale.is_finite() || record.data.iter().any(|v| !v.is_finite()) {
            return Err(CheckpointError::Serialization(format!(
                "signal record #{index} holds a non-finite value"
            )));
        }
    }

    let dir = parent_dir(path);
    fs::create_dir_all(&dir).map_err(|e| CheckpointError::Io(e.to_string()))?;

    let tmp = NamedTempFile::new_in(&dir).map_err(|e| CheckpointError::Io(e.to_string()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, checkpoint)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|e| CheckpointError::Io(e.to_string()))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| CheckpointError::Io(e.to_string()))?;

    tmp.persist(path)
        .map_err(|e| CheckpointError::Io(e.error.to_string()))?;

    debug!(path = %path.display(), "Checkpoint renamed into place");
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Unsupported checkpoint version {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid signal record #{index}: {message}")]
    InvalidRecord { index: usize, message: String },
}
