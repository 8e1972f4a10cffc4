use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SearchError;
use crate::registry::VmRegistry;
use crate::source::RegistryFile;

/// Called after every refresh the watcher applies.
pub type RefreshObserver = Arc<dyn Fn(&VmRegistry) + Send + Sync>;

/// A live registry-file subscription.
///
/// [`cancel`](Self::cancel) releases it exactly once; later calls, and calls
/// on a handle that never started, do nothing. Dropping the handle cancels.
pub struct WatchHandle {
    active: Option<ActiveWatch>,
}

struct ActiveWatch {
    watcher: Arc<Mutex<RecommendedWatcher>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// A handle with nothing to release.
    pub fn inactive() -> Self {
        Self { active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Stop the refresh task and drop the file watcher. Returns whether
    /// anything was released.
    pub fn cancel(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.task.abort();
        drop(active.watcher);
        tracing::debug!("registry watch cancelled");
        true
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Watch the registry file and refresh `registry` whenever it changes.
///
/// The parent directory is watched rather than the file, because VirtualBox
/// replaces `VirtualBox.xml` by rename and the file may not exist yet. When
/// the directory itself is missing (VirtualBox never ran), its nearest
/// existing ancestor is watched until the directory shows up. Each burst of
/// events is debounced, then the file is re-read at refresh time.
///
/// Must be called from within a tokio runtime.
pub fn watch_registry(
    file: RegistryFile,
    registry: Arc<VmRegistry>,
    debounce: Duration,
    on_refresh: Option<RefreshObserver>,
) -> Result<WatchHandle, SearchError> {
    let path = file.path().to_path_buf();
    let watch_err = |message: String| SearchError::Watch {
        path: path.display().to_string(),
        message,
    };

    let file_name = path
        .file_name()
        .map(OsString::from)
        .ok_or_else(|| watch_err("registry path has no file name".into()))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let armed = nearest_existing(&dir)
        .ok_or_else(|| watch_err("no existing directory to watch".into()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |event| {
            let _ = tx.send(event);
        },
        notify::Config::default(),
    )
    .map_err(|e| watch_err(e.to_string()))?;

    watcher
        .watch(&armed, RecursiveMode::NonRecursive)
        .map_err(|e| watch_err(e.to_string()))?;
    if armed == dir {
        tracing::info!(path = %path.display(), "watching machine registry");
    } else {
        tracing::info!(
            path = %path.display(),
            waiting_in = %armed.display(),
            "registry directory missing, waiting for it"
        );
    }

    let watcher = Arc::new(Mutex::new(watcher));
    let target = WatchTarget {
        file,
        file_name,
        dir,
        armed,
    };
    let task = tokio::spawn(refresh_loop(
        rx,
        Arc::downgrade(&watcher),
        target,
        registry,
        debounce,
        on_refresh,
    ));

    Ok(WatchHandle {
        active: Some(ActiveWatch { watcher, task }),
    })
}

/// The closest directory at or above `dir` that exists right now.
fn nearest_existing(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.is_dir())
        .map(Path::to_path_buf)
}

struct WatchTarget {
    file: RegistryFile,
    file_name: OsString,
    /// Directory holding the registry file.
    dir: PathBuf,
    /// Directory currently watched: `dir`, or an ancestor while `dir` is missing.
    armed: PathBuf,
}

impl WatchTarget {
    fn waiting(&self) -> bool {
        self.armed != self.dir
    }

    /// Move the watch as far down towards `dir` as currently exists. Returns
    /// true once `dir` itself is watched.
    fn rearm(&mut self, watcher: &Weak<Mutex<RecommendedWatcher>>) -> bool {
        let Some(next) = nearest_existing(&self.dir) else {
            return false;
        };
        if next == self.armed {
            return false;
        }
        let Some(shared) = watcher.upgrade() else {
            return false;
        };
        let mut watcher = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = watcher.unwatch(&self.armed);
        if let Err(e) = watcher.watch(&next, RecursiveMode::NonRecursive) {
            tracing::warn!(dir = %next.display(), "failed to move registry watch: {e}");
            let _ = watcher.watch(&self.armed, RecursiveMode::NonRecursive);
            return false;
        }
        tracing::debug!(dir = %next.display(), "registry watch moved");
        self.armed = next;
        !self.waiting()
    }
}

/// Whether an event on the registry file means its content may have changed:
/// creation, writes, renames onto it, removal, or a write-close.
fn should_refresh(kind: &notify::EventKind) -> bool {
    use notify::event::*;
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}

fn concerns_registry(event: &notify::Event, file_name: &OsString) -> bool {
    should_refresh(&event.kind)
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

async fn refresh_loop(
    mut rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    watcher: Weak<Mutex<RecommendedWatcher>>,
    mut target: WatchTarget,
    registry: Arc<VmRegistry>,
    debounce: Duration,
    on_refresh: Option<RefreshObserver>,
) {
    loop {
        let Some(first) = rx.recv().await else {
            tracing::debug!("watcher channel closed, stopping registry refresh");
            return;
        };

        tokio::time::sleep(debounce).await;

        let mut relevant = false;
        let mut pending = vec![first];
        while let Ok(event) = rx.try_recv() {
            pending.push(event);
        }
        let waiting = target.waiting();
        for event in pending {
            match event {
                Ok(event) => {
                    tracing::trace!(kind = ?event.kind, paths = ?event.paths, "registry dir event");
                    if !waiting {
                        relevant |= concerns_registry(&event, &target.file_name);
                    }
                }
                Err(e) => tracing::warn!("registry watch error: {e}"),
            }
        }
        // The file may have been written before the directory watch existed.
        if waiting && target.rearm(&watcher) {
            relevant = true;
        }
        if !relevant {
            continue;
        }

        match registry.refresh_from(&target.file) {
            Ok(count) => tracing::info!(count, "machine registry reloaded"),
            Err(e) => tracing::warn!("failed to reload machine registry: {e}"),
        }
        if let Some(observer) = &on_refresh {
            observer(&registry);
        }
    }
}
