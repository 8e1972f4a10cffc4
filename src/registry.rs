//! In-memory VM registry and the search-term matcher.
//!
//! The snapshot is replaced wholesale on every refresh: the new list is built
//! completely, then swapped in under the write lock, so a concurrent query
//! sees either the old list or the new one, never a mix.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::SourceError;
use crate::record::VmRecord;
use crate::source::{SourceKind, SourceReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Constructed, never refreshed.
    Empty,
    /// At least one refresh applied (possibly yielding zero records).
    Loaded,
}

pub struct VmRegistry {
    kind: SourceKind,
    inner: RwLock<Snapshot>,
}

struct Snapshot {
    records: Arc<[VmRecord]>,
    state: RegistryState,
}

impl VmRegistry {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            inner: RwLock::new(Snapshot {
                records: Arc::from(Vec::new()),
                state: RegistryState::Empty,
            }),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Reparse `raw` with the active parser and replace the snapshot.
    pub fn refresh(&self, raw: &str) {
        let records = dedup_last_wins(self.kind.parse_records(raw));
        self.install(records);
    }

    /// Read the source now and replace the snapshot with what it holds.
    ///
    /// An absent source empties the registry. A read failure also empties it
    /// and is returned so the caller can decide whether to surface it.
    pub fn refresh_from(&self, reader: &dyn SourceReader) -> Result<usize, SourceError> {
        match reader.read() {
            Ok(Some(raw)) => {
                self.refresh(&raw);
                Ok(self.len())
            }
            Ok(None) => {
                tracing::debug!("registry source absent");
                self.clear();
                Ok(0)
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    /// Replace the snapshot with an empty list.
    pub fn clear(&self) {
        self.install(Vec::new());
    }

    fn install(&self, records: Vec<VmRecord>) {
        let records: Arc<[VmRecord]> = Arc::from(records);
        tracing::debug!(kind = %self.kind, count = records.len(), "registry refreshed");
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.records = records;
        inner.state = RegistryState::Loaded;
    }

    pub fn state(&self) -> RegistryState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    /// The current snapshot, in registry order.
    pub fn snapshot(&self) -> Arc<[VmRecord]> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, identifier: &str) -> Option<VmRecord> {
        self.snapshot()
            .iter()
            .find(|r| r.identifier == identifier)
            .cloned()
    }

    /// Records whose search target contains any of `terms`, ignoring case.
    ///
    /// Results keep registry order and list each record once. Blank terms are
    /// skipped; no usable terms means no results.
    pub fn query<S: AsRef<str>>(&self, terms: &[S]) -> Vec<VmRecord> {
        let needles: Vec<String> = terms
            .iter()
            .filter_map(|t| {
                let t = t.as_ref();
                if t.trim().is_empty() {
                    tracing::debug!(term = t, "skipping blank search term");
                    None
                } else {
                    Some(t.to_lowercase())
                }
            })
            .collect();
        if needles.is_empty() {
            return Vec::new();
        }

        let snapshot = self.snapshot();
        let mut seen = HashSet::new();
        snapshot
            .iter()
            .filter(|r| needles.iter().any(|n| r.matches_lowercase(n)))
            .filter(|r| seen.insert(r.identifier.as_str()))
            .cloned()
            .collect()
    }
}

/// Keep one record per identifier: the last occurrence's data, placed at the
/// first occurrence's position.
fn dedup_last_wins(records: Vec<VmRecord>) -> Vec<VmRecord> {
    let mut out: Vec<VmRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        match index.get(&record.identifier) {
            Some(&i) => out[i] = record,
            None => {
                index.insert(record.identifier.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}
