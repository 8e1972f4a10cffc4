//! Raw registry sources: the `VirtualBox.xml` file or `vboxmanage list vms`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{SearchError, SourceError};
use crate::record::VmRecord;
use crate::{list_output, registry_xml};

/// Which registry source, and therefore which parser, is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Read and watch the machine registry file.
    #[default]
    File,
    /// Ask the VirtualBox command-line tool on every search.
    Command,
}

impl SourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "command" => Some(Self::Command),
            _ => None,
        }
    }

    /// Parse raw source text into records with this variant's parser.
    ///
    /// A registry file that is not well-formed yields no records.
    pub fn parse_records(self, raw: &str) -> Vec<VmRecord> {
        match self {
            Self::File => registry_xml::parse_registry(raw).unwrap_or_else(|e| {
                tracing::warn!("{e}");
                Vec::new()
            }),
            Self::Command => list_output::parse_list_vms(raw),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Command => "command",
        })
    }
}

pub trait SourceReader: Send + Sync {
    /// Read the full current source text. `Ok(None)` means the source does not
    /// exist, which is the normal "no VMs configured yet" state.
    fn read(&self) -> Result<Option<String>, SourceError>;
}

/// The machine registry file, read synchronously in full.
#[derive(Debug, Clone)]
pub struct RegistryFile {
    path: PathBuf,
}

impl RegistryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceReader for RegistryFile {
    fn read(&self) -> Result<Option<String>, SourceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SourceError::Read {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

/// `<program> list vms`, stdout captured.
#[derive(Debug, Clone)]
pub struct InventoryCommand {
    program: String,
}

impl InventoryCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SourceReader for InventoryCommand {
    fn read(&self) -> Result<Option<String>, SourceError> {
        tracing::debug!(program = %self.program, "listing VMs");
        let output = Command::new(&self.program)
            .args(["list", "vms"])
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

/// Check that the VirtualBox tool can be spawned at all.
///
/// Only the spawn matters: `vboxmanage` without arguments prints usage and
/// its exit status varies between releases.
pub fn probe_tool(program: &str) -> Result<(), SearchError> {
    Command::new(program)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
        .map_err(|e| SearchError::SourceUnavailable {
            program: program.to_string(),
            message: e.to_string(),
        })
}
