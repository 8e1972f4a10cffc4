use std::process::{Command, Stdio};

use crate::error::LaunchError;

/// Starts a VM by its identifier. Fire-and-forget: `Ok` means the start
/// command was spawned, not that the VM booted.
pub trait Launcher: Send + Sync {
    fn start(&self, identifier: &str) -> Result<(), LaunchError>;
}

/// `<program> startvm <identifier>`, detached from our stdio.
#[derive(Debug, Clone)]
pub struct VBoxManageLauncher {
    program: String,
}

impl VBoxManageLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Launcher for VBoxManageLauncher {
    fn start(&self, identifier: &str) -> Result<(), LaunchError> {
        let mut child = Command::new(&self.program)
            .args(["startvm", identifier])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError {
                program: self.program.clone(),
                identifier: identifier.to_string(),
                source,
            })?;

        tracing::info!(identifier, pid = child.id(), "startvm spawned");

        // Reap the child so long-running hosts don't collect zombies.
        let identifier = identifier.to_string();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if status.success() => {
                tracing::debug!(identifier, "startvm finished");
            }
            Ok(status) => tracing::warn!(identifier, %status, "startvm exited unsuccessfully"),
            Err(e) => tracing::warn!(identifier, "failed to wait for startvm: {e}"),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_is_reported() {
        let launcher = VBoxManageLauncher::new("/nonexistent/vboxmanage");
        let err = launcher.start("Alpha").unwrap_err();
        assert_eq!(err.identifier, "Alpha");
        assert!(err.to_string().contains("Alpha"));
    }

    #[cfg(unix)]
    #[test]
    fn passes_startvm_and_identifier() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("args");
        let script = dir.path().join("vboxmanage");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" > '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        VBoxManageLauncher::new(script.to_str().unwrap())
            .start("{1111}")
            .unwrap();

        // The child runs detached; give it a moment to write its arguments.
        for _ in 0..50 {
            if let Ok(args) = std::fs::read_to_string(&log)
                && !args.is_empty()
            {
                assert_eq!(args.trim(), "startvm {1111}");
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        panic!("startvm was never invoked");
    }
}
