use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("VirtualBox machines launcher: {program} is not available: {message}")]
    #[diagnostic(help("install VirtualBox or set `vboxmanage` in the config file"))]
    SourceUnavailable { program: String, message: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to watch {path}: {message}")]
    Watch { path: String, message: String },

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("prompt error: {message}")]
    Prompt { message: String },

    #[error("cancelled")]
    Cancelled,
}

/// Failures obtaining raw registry text.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program} list vms` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// The registry document could not be parsed at all.
#[derive(Debug, Error)]
#[error("malformed machine registry: {message}")]
pub struct RegistryError {
    pub message: String,
}

#[derive(Debug, Error)]
#[error("failed to start VM '{identifier}' with {program}")]
pub struct LaunchError {
    pub program: String,
    pub identifier: String,
    #[source]
    pub source: std::io::Error,
}
