//! In-memory coverage snapshot and the on-disk capture codec.
//!
//! A capture file is a magic header followed by a postcard-encoded payload:
//! session metadata plus per-class probe records. The pipeline relies on a
//! single structural operation, `merge`: a commutative, associative,
//! idempotent union of probe data. The rest is treated as opaque.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::{CollectorError, Result};

const CAPTURE_MAGIC: &[u8; 4] = b"DCAP";
const CAPTURE_VERSION: u16 = 1;

/// One collection event on one agent: who dumped, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    /// Millis since epoch when the session started.
    pub start: i64,
    /// Millis since epoch when the probes were dumped.
    pub dump: i64,
}

/// Probe data for one instrumented class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub class_id: u64,
    pub name: String,
    pub probes: Vec<bool>,
}

impl ClassRecord {
    pub fn hit_count(&self) -> usize {
        self.probes.iter().filter(|p| **p).count()
    }
}

/// Merged view over one or more capture files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionData {
    sessions: BTreeMap<String, SessionInfo>,
    classes: BTreeMap<u64, ClassRecord>,
}

impl ExecutionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionInfo> {
        self.sessions.values()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassRecord> {
        self.classes.values()
    }

    pub fn class(&self, class_id: u64) -> Option<&ClassRecord> {
        self.classes.get(&class_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn add_session(&mut self, session: SessionInfo) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// Fold one class record into the snapshot, OR-ing probes for a class id
    /// already present. Records for the same class id must agree on name and
    /// probe count.
    pub fn add_class(&mut self, record: ClassRecord) -> Result<()> {
        match self.classes.get_mut(&record.class_id) {
            None => {
                self.classes.insert(record.class_id, record);
            }
            Some(existing) => {
                if existing.name != record.name {
                    return Err(CollectorError::parse(format!(
                        "class id {:#x} maps to both '{}' and '{}'",
                        record.class_id, existing.name, record.name
                    )));
                }
                if existing.probes.len() != record.probes.len() {
                    return Err(CollectorError::parse(format!(
                        "probe count mismatch for class '{}': {} vs {}",
                        existing.name,
                        existing.probes.len(),
                        record.probes.len()
                    )));
                }
                for (slot, probe) in existing.probes.iter_mut().zip(record.probes) {
                    *slot |= probe;
                }
            }
        }
        Ok(())
    }

    /// Union another snapshot into this one. Probe data ORs elementwise;
    /// sessions deduplicate by id. Order-independent and idempotent.
    pub fn merge(&mut self, other: &ExecutionData) -> Result<()> {
        for session in other.sessions.values() {
            self.add_session(session.clone());
        }
        for record in other.classes.values() {
            self.add_class(record.clone())?;
        }
        Ok(())
    }

    /// Total probes hit across all classes.
    pub fn total_hits(&self) -> usize {
        self.classes.values().map(ClassRecord::hit_count).sum()
    }
}

/// Read a capture file into a snapshot.
pub fn read_capture(path: &Path) -> Result<ExecutionData> {
    let bytes = fs::read(path)?;
    decode_capture(&bytes).map_err(|e| match e {
        CollectorError::Parse { message, .. } => {
            CollectorError::parse_with_path(message, path)
        }
        other => other,
    })
}

/// Persist a snapshot as a capture file.
pub fn write_capture(path: &Path, data: &ExecutionData) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, encode_capture(data)?)?;
    Ok(())
}

pub fn encode_capture(data: &ExecutionData) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(CAPTURE_MAGIC);
    bytes.extend_from_slice(&CAPTURE_VERSION.to_le_bytes());
    let payload = postcard::to_allocvec(data)
        .map_err(|e| CollectorError::parse(format!("capture encode failed: {e}")))?;
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_capture(bytes: &[u8]) -> Result<ExecutionData> {
    if bytes.len() < 6 || &bytes[..4] != CAPTURE_MAGIC {
        return Err(CollectorError::parse("bad capture magic"));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != CAPTURE_VERSION {
        return Err(CollectorError::parse(format!(
            "unsupported capture version {version}"
        )));
    }
    postcard::from_bytes(&bytes[6..])
        .map_err(|e| CollectorError::parse(format!("capture decode failed: {e}")))
}
