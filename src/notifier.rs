/// User-visible error reporting, the one escalation path out of the core.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Logs through tracing and echoes the message on stderr, where the user of
/// the command-line host will see it whatever the log filter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        tracing::error!("{message}");
        eprintln!("{message}");
    }
}
