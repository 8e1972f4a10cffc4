//! `VirtualBox.xml` machine registry parsing using facet-xml struct deserialization.

use std::sync::LazyLock;

use facet::Facet;
use facet_xml as xml;
use regex::Regex;

use crate::error::RegistryError;
use crate::record::VmRecord;

// ── XML model structs ──────────────────────────────────────

#[derive(Debug, Default, Facet)]
#[facet(rename = "VirtualBox")]
#[facet(default)]
struct VirtualBoxDoc {
    #[facet(rename = "Global")]
    #[facet(default)]
    global: Option<Global>,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct Global {
    #[facet(rename = "MachineRegistry")]
    #[facet(default)]
    machine_registry: Option<MachineRegistry>,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct MachineRegistry {
    #[facet(xml::elements)]
    #[facet(rename = "MachineEntry")]
    #[facet(default)]
    entries: Vec<MachineEntry>,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct MachineEntry {
    #[facet(xml::attribute)]
    #[facet(default)]
    src: Option<String>,
    #[facet(xml::attribute)]
    #[facet(default)]
    uuid: Option<String>,
}

// VirtualBox opens the file with a DO-NOT-EDIT comment, which the
// deserializer rejects ahead of the root element.
static MARKUP_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<\?.*?\?>").expect("valid markup regex"));

// ── public API ─────────────────────────────────────────────

/// Extract one record per `MachineEntry`, in document order.
///
/// Entries without a usable `src` attribute are skipped. A document missing
/// the `Global` or `MachineRegistry` sections has no machines.
pub fn parse_registry(text: &str) -> Result<Vec<VmRecord>, RegistryError> {
    let cleaned = MARKUP_NOISE.replace_all(text, "");
    let doc: VirtualBoxDoc = facet_xml::from_str(&cleaned).map_err(|e| RegistryError {
        message: e.to_string(),
    })?;

    let entries = doc
        .global
        .and_then(|g| g.machine_registry)
        .map(|r| r.entries)
        .unwrap_or_default();

    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let Some(src) = entry.src.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            tracing::debug!(index, "skipping MachineEntry without src");
            continue;
        };
        match VmRecord::from_registry_path(src) {
            Some(record) => records.push(record.with_uuid(entry.uuid)),
            None => tracing::debug!(index, src, "skipping MachineEntry with empty name"),
        }
    }
    Ok(records)
}
