use facet::Facet;

/// Decoration appended to a VM name before matching search terms against it.
pub const SEARCH_SUFFIX: &str = " (VirtualBox VM)";

/// One installed virtual machine as seen by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct VmRecord {
    /// Human-readable name shown in results. Never empty.
    pub display_name: String,
    /// Token passed to `vboxmanage startvm`.
    pub identifier: String,
    /// Descriptor path from the machine registry (file variant only).
    pub source_path: Option<String>,
    /// Machine uuid from the registry entry, when present.
    pub uuid: Option<String>,
}

impl VmRecord {
    /// Build a record from a `MachineEntry` `src` path.
    ///
    /// The name is the last path segment cut at its first `.`, so
    /// `/vms/My.Box/My.Box.vbox` becomes `My`. The identifier is the name,
    /// since this variant starts machines by name. Returns `None` when the
    /// derived name is empty.
    pub fn from_registry_path(path: &str) -> Option<Self> {
        let name = name_from_path(path);
        if name.is_empty() {
            return None;
        }
        Some(Self {
            display_name: name.to_string(),
            identifier: name.to_string(),
            source_path: Some(path.to_string()),
            uuid: None,
        })
    }

    /// Build a record from one `vboxmanage list vms` line.
    pub fn from_listing(name: &str, id: &str) -> Option<Self> {
        if name.is_empty() || id.is_empty() {
            return None;
        }
        Some(Self {
            display_name: name.to_string(),
            identifier: id.to_string(),
            source_path: None,
            uuid: None,
        })
    }

    pub fn with_uuid(mut self, uuid: Option<String>) -> Self {
        self.uuid = uuid;
        self
    }

    /// The string search terms are matched against.
    pub fn search_target(&self) -> String {
        format!("{}{SEARCH_SUFFIX}", self.display_name)
    }

    /// Case-insensitive substring test against [`search_target`](Self::search_target).
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.search_target().to_lowercase().contains(needle)
    }
}

// Both separators: registries written on Windows hosts use backslashes.
fn name_from_path(path: &str) -> &str {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    base.split('.').next().unwrap_or(base)
}
