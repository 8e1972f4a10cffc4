//! The search-provider facade a host consumes.
//!
//! Hosts see a narrow capability interface ([`SearchProvider`]) built on top
//! of [`VmRegistry::query`]. Result ids are VM identifiers.

use std::sync::Arc;

use facet::Facet;

use crate::launch::Launcher;
use crate::notifier::Notifier;
use crate::record::VmRecord;
use crate::registry::VmRegistry;
use crate::source::{SourceKind, SourceReader};

/// Icon handed to the host's renderer, untouched by the core.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct IconFactory {
    pub icon_name: String,
}

impl Default for IconFactory {
    fn default() -> Self {
        Self {
            icon_name: "virtualbox".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct ResultMeta {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: IconFactory,
}

/// How result metas reach the host: returned, or also pushed to a callback.
pub enum MetaDelivery {
    Return,
    Callback(Box<dyn FnOnce(&[ResultMeta]) + Send>),
}

pub trait SearchProvider {
    fn initial_result_set(&self, terms: &[String]) -> Vec<String>;

    /// Narrowed search. `previous` is accepted for protocol compatibility; the
    /// result is recomputed from the full term list.
    fn subsearch_result_set(&self, previous: &[String], terms: &[String]) -> Vec<String>;

    /// One meta per id, in input order.
    fn result_metas(&self, ids: &[String]) -> Vec<ResultMeta>;

    fn activate_result(&self, id: &str);

    fn filter_results(&self, ids: Vec<String>, _max_results: usize) -> Vec<String> {
        ids
    }
}

pub struct VmSearchProvider {
    registry: Arc<VmRegistry>,
    /// Re-read before every query (command variant).
    live_source: Option<Arc<dyn SourceReader>>,
    launcher: Arc<dyn Launcher>,
    notifier: Arc<dyn Notifier>,
    icon: IconFactory,
}

impl VmSearchProvider {
    pub fn new(
        registry: Arc<VmRegistry>,
        launcher: Arc<dyn Launcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            live_source: None,
            launcher,
            notifier,
            icon: IconFactory::default(),
        }
    }

    /// Query `source` afresh on every search instead of relying on a watcher.
    pub fn with_live_source(mut self, source: Arc<dyn SourceReader>) -> Self {
        self.live_source = Some(source);
        self
    }

    pub fn registry(&self) -> &Arc<VmRegistry> {
        &self.registry
    }

    /// Re-read the live source, if any. Returns false (after notifying the
    /// user and emptying the registry) when it could not be read.
    fn refresh_live(&self) -> bool {
        let Some(source) = &self.live_source else {
            return true;
        };
        match self.registry.refresh_from(source.as_ref()) {
            Ok(_) => true,
            Err(e) => {
                self.notifier
                    .notify_error(&format!("VirtualBox machines launcher: {e}"));
                false
            }
        }
    }

    /// Every known VM, in registry order.
    pub fn records(&self) -> Vec<VmRecord> {
        self.refresh_live();
        self.registry.snapshot().to_vec()
    }

    fn result_set(&self, terms: &[String]) -> Vec<String> {
        if !self.refresh_live() {
            return Vec::new();
        }
        let ids: Vec<String> = self
            .registry
            .query(terms)
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        tracing::debug!(?terms, count = ids.len(), "search");
        ids
    }

    fn meta_for(&self, id: &str) -> ResultMeta {
        match self.registry.get(id) {
            Some(record) => {
                let description = match self.registry.kind() {
                    SourceKind::File => record.source_path,
                    SourceKind::Command => Some(record.identifier),
                };
                ResultMeta {
                    id: id.to_string(),
                    name: record.display_name,
                    description,
                    icon: self.icon.clone(),
                }
            }
            None => ResultMeta {
                id: id.to_string(),
                name: id.to_string(),
                description: None,
                icon: self.icon.clone(),
            },
        }
    }

    /// Compute metas once and deliver them the way the host asked.
    pub fn deliver_result_metas(&self, ids: &[String], delivery: MetaDelivery) -> Vec<ResultMeta> {
        let metas = self.result_metas(ids);
        if let MetaDelivery::Callback(callback) = delivery {
            callback(&metas);
        }
        metas
    }
}

impl SearchProvider for VmSearchProvider {
    fn initial_result_set(&self, terms: &[String]) -> Vec<String> {
        self.result_set(terms)
    }

    fn subsearch_result_set(&self, _previous: &[String], terms: &[String]) -> Vec<String> {
        self.result_set(terms)
    }

    fn result_metas(&self, ids: &[String]) -> Vec<ResultMeta> {
        ids.iter().map(|id| self.meta_for(id)).collect()
    }

    fn activate_result(&self, id: &str) {
        let identifier = self
            .registry
            .get(id)
            .map(|r| r.identifier)
            .unwrap_or_else(|| id.to_string());
        if let Err(e) = self.launcher.start(&identifier) {
            tracing::warn!("{e}: {}", e.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{LaunchError, SourceError};
    use crate::notifier::tests::RecordingNotifier;

    #[derive(Default)]
    struct RecordingLauncher {
        started: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Launcher for RecordingLauncher {
        fn start(&self, identifier: &str) -> Result<(), LaunchError> {
            self.started.lock().unwrap().push(identifier.to_string());
            if self.fail {
                return Err(LaunchError {
                    program: "vboxmanage".into(),
                    identifier: identifier.into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(())
        }
    }

    struct FixedSource(Mutex<Result<Option<String>, ()>>);

    impl SourceReader for FixedSource {
        fn read(&self) -> Result<Option<String>, SourceError> {
            self.0.lock().unwrap().clone().map_err(|()| SourceError::Spawn {
                program: "vboxmanage".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    fn terms(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    fn command_provider(
        listing: &str,
    ) -> (VmSearchProvider, Arc<RecordingLauncher>, Arc<RecordingNotifier>) {
        let registry = Arc::new(VmRegistry::new(SourceKind::Command));
        registry.refresh(listing);
        let launcher = Arc::new(RecordingLauncher::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let provider = VmSearchProvider::new(registry, launcher.clone(), notifier.clone());
        (provider, launcher, notifier)
    }

    const LISTING: &str = "\"Windows10\" {w-1}\n\"Linux-Box\" {l-2}\n\"MacOS\" {m-3}\n";

    #[test]
    fn initial_results_are_identifiers() {
        let (provider, _, _) = command_provider(LISTING);
        assert_eq!(provider.initial_result_set(&terms(&["win", "lin"])), ["w-1", "l-2"]);
    }

    #[test]
    fn subsearch_ignores_previous_results() {
        let (provider, _, _) = command_provider(LISTING);
        let previous = terms(&["w-1"]);
        assert_eq!(provider.subsearch_result_set(&previous, &terms(&["mac"])), ["m-3"]);
    }

    #[test]
    fn metas_follow_input_order() {
        let (provider, _, _) = command_provider(LISTING);
        let metas = provider.result_metas(&terms(&["m-3", "w-1", "unknown"]));
        let names: Vec<_> = metas.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["MacOS", "Windows10", "unknown"]);
        assert_eq!(metas[0].description.as_deref(), Some("m-3"));
        assert_eq!(metas[0].icon.icon_name, "virtualbox");
        assert!(metas[2].description.is_none());
    }

    #[test]
    fn callback_and_return_see_the_same_metas() {
        let (provider, _, _) = command_provider(LISTING);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let returned = provider.deliver_result_metas(
            &terms(&["l-2"]),
            MetaDelivery::Callback(Box::new(move |metas| {
                sink.lock().unwrap().extend_from_slice(metas)
            })),
        );
        assert_eq!(*seen.lock().unwrap(), returned);

        let returned = provider.deliver_result_metas(&terms(&["l-2"]), MetaDelivery::Return);
        assert_eq!(returned[0].name, "Linux-Box");
    }

    #[test]
    fn filter_results_passes_through() {
        let (provider, _, _) = command_provider(LISTING);
        let ids = terms(&["a", "b", "c"]);
        assert_eq!(provider.filter_results(ids.clone(), 1), ids);
    }

    #[test]
    fn activate_starts_by_identifier() {
        let (provider, launcher, _) = command_provider(LISTING);
        provider.activate_result("l-2");
        assert_eq!(*launcher.started.lock().unwrap(), ["l-2"]);
    }

    #[test]
    fn launch_failure_does_not_escape() {
        let registry = Arc::new(VmRegistry::new(SourceKind::Command));
        let launcher = Arc::new(RecordingLauncher {
            fail: true,
            ..Default::default()
        });
        let provider =
            VmSearchProvider::new(registry, launcher.clone(), Arc::new(RecordingNotifier::default()));
        provider.activate_result("whatever");
        assert_eq!(launcher.started.lock().unwrap().len(), 1);
    }

    #[test]
    fn file_variant_meta_describes_source_path() {
        let registry = Arc::new(VmRegistry::new(SourceKind::File));
        registry.refresh(
            r#"<VirtualBox><Global><MachineRegistry>
<MachineEntry src="/vms/Dev/Dev.vbox"/>
</MachineRegistry></Global></VirtualBox>"#,
        );
        let provider = VmSearchProvider::new(
            registry,
            Arc::new(RecordingLauncher::default()),
            Arc::new(RecordingNotifier::default()),
        );
        let ids = provider.initial_result_set(&terms(&["dev"]));
        assert_eq!(ids, ["Dev"]);
        let metas = provider.result_metas(&ids);
        assert_eq!(metas[0].description.as_deref(), Some("/vms/Dev/Dev.vbox"));
    }

    #[test]
    fn live_source_is_reread_per_query() {
        let (provider, _, notifier) = command_provider("");
        let source = Arc::new(FixedSource(Mutex::new(Ok(Some("\"Alpha\" {a}\n".into())))));
        let provider = provider.with_live_source(source.clone());

        assert_eq!(provider.initial_result_set(&terms(&["alp"])), ["a"]);

        *source.0.lock().unwrap() = Ok(Some("\"Beta\" {b}\n".into()));
        assert!(provider.initial_result_set(&terms(&["alp"])).is_empty());
        assert_eq!(provider.initial_result_set(&terms(&["bet"])), ["b"]);
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn records_refresh_live_source() {
        let (provider, _, _) = command_provider(LISTING);
        let source = Arc::new(FixedSource(Mutex::new(Ok(Some("\"Only\" {o}\n".into())))));
        let provider = provider.with_live_source(source);
        let records = provider.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name, "Only");
    }

    #[test]
    fn live_source_failure_notifies_and_empties() {
        let (provider, _, notifier) = command_provider(LISTING);
        let provider = provider.with_live_source(Arc::new(FixedSource(Mutex::new(Err(())))));

        assert!(provider.initial_result_set(&terms(&["win"])).is_empty());
        assert!(provider.registry().is_empty());
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("VirtualBox machines launcher"));
    }
}
