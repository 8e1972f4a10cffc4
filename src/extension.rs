//! Host-integration lifecycle: enable builds the provider and its refresh
//! machinery, disable tears it down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SearchError;
use crate::launch::{Launcher, VBoxManageLauncher};
use crate::notifier::Notifier;
use crate::provider::VmSearchProvider;
use crate::registry::VmRegistry;
use crate::source::{self, InventoryCommand, RegistryFile, SourceKind};
use crate::watch::{self, RefreshObserver, WatchHandle};

/// Everything `enable` needs to know about where machines come from.
#[derive(Debug, Clone)]
pub struct ExtensionSettings {
    pub source: SourceKind,
    pub registry_path: PathBuf,
    pub vboxmanage: String,
    pub debounce: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    Uninitialized,
    Active,
}

struct Active {
    provider: Arc<VmSearchProvider>,
    watch: WatchHandle,
}

pub struct Extension {
    settings: ExtensionSettings,
    notifier: Arc<dyn Notifier>,
    launcher: Arc<dyn Launcher>,
    on_refresh: Option<RefreshObserver>,
    active: Option<Active>,
}

impl Extension {
    pub fn new(settings: ExtensionSettings, notifier: Arc<dyn Notifier>) -> Self {
        let launcher = Arc::new(VBoxManageLauncher::new(settings.vboxmanage.clone()));
        Self {
            settings,
            notifier,
            launcher,
            on_refresh: None,
            active: None,
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Observe refreshes applied by the file watcher.
    pub fn on_refresh(mut self, observer: RefreshObserver) -> Self {
        self.on_refresh = Some(observer);
        self
    }

    pub fn state(&self) -> ExtensionState {
        if self.active.is_some() {
            ExtensionState::Active
        } else {
            ExtensionState::Uninitialized
        }
    }

    pub fn provider(&self) -> Option<&Arc<VmSearchProvider>> {
        self.active.as_ref().map(|a| &a.provider)
    }

    /// Build the provider. Does nothing when already active.
    ///
    /// The command variant probes the VirtualBox tool first; if it cannot be
    /// run the user is notified and the extension stays disabled. The file
    /// variant loads the registry and starts watching it, which needs a tokio
    /// runtime.
    pub fn enable(&mut self) -> Result<Arc<VmSearchProvider>, SearchError> {
        if let Some(active) = &self.active {
            tracing::debug!("extension already active");
            return Ok(active.provider.clone());
        }

        let settings = &self.settings;
        let registry = Arc::new(VmRegistry::new(settings.source));
        let provider = VmSearchProvider::new(
            registry.clone(),
            self.launcher.clone(),
            self.notifier.clone(),
        );

        let (provider, watch) = match settings.source {
            SourceKind::Command => {
                if let Err(e) = source::probe_tool(&settings.vboxmanage) {
                    self.notifier.notify_error(&e.to_string());
                    return Err(e);
                }
                let inventory = Arc::new(InventoryCommand::new(settings.vboxmanage.clone()));
                (provider.with_live_source(inventory), WatchHandle::inactive())
            }
            SourceKind::File => {
                let file = RegistryFile::new(&settings.registry_path);
                if let Err(e) = registry.refresh_from(&file) {
                    tracing::warn!("failed to read machine registry: {e}");
                }
                let watch = match watch::watch_registry(
                    file,
                    registry.clone(),
                    settings.debounce,
                    self.on_refresh.clone(),
                ) {
                    Ok(handle) => handle,
                    Err(e) => {
                        tracing::warn!("{e}; registry changes will not be picked up");
                        WatchHandle::inactive()
                    }
                };
                (provider, watch)
            }
        };

        tracing::info!(source = %settings.source, machines = registry.len(), "extension enabled");
        let provider = Arc::new(provider);
        self.active = Some(Active {
            provider: provider.clone(),
            watch,
        });
        Ok(provider)
    }

    /// Release the watcher and drop the provider. Does nothing when inactive.
    pub fn disable(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.watch.cancel();
        tracing::info!("extension disabled");
    }
}

impl Drop for Extension {
    fn drop(&mut self) {
        self.disable();
    }
}
