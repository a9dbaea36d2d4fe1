// Error taxonomy: one enum per component boundary. Most scan- and
// run-level problems degrade in place (logged, partial results); these
// types cover the hard stops, so the host decides what to surface
// instead of the library printing to a console it doesn't own.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems. These fail fast: an invalid user-supplied
/// pattern must never silently fall back to a default.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {setting} pattern `{pattern}`: {source}")]
    InvalidPattern {
        setting: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{setting} pattern `{pattern}` is missing the named capture group `{group}`")]
    MissingCaptureGroup {
        setting: &'static str,
        pattern: String,
        group: &'static str,
    },

    #[error("invalid test file glob `{glob}`: {source}")]
    InvalidGlob {
        glob: String,
        #[source]
        source: globset::Error,
    },
}

/// Errors raised while building the test tree. Unreadable files and
/// group-lookup misses are logged and skipped, not raised; these
/// variants are the hard stops.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("workspace folder {0} does not exist")]
    NoWorkspace(PathBuf),

    #[error("failed to walk workspace {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by run, debug-launch and cancellation requests.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no test tree loaded; run discovery first")]
    TreeNotLoaded,

    #[error("node `{0}` not found in the test tree")]
    NodeNotFound(String),

    #[error("node `{0}` has no source file")]
    NodeWithoutFile(String),

    #[error("file {0} is outside the workspace folder")]
    FileOutsideWorkspace(PathBuf),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cancellation of an in-flight run is not supported")]
    CancelUnsupported,
}

/// Errors from installing the JSON output plugin into the luatest tree.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("luatest install directory {0} does not exist")]
    NoLuatestDir(PathBuf),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} does not contain the expected fragment to patch")]
    FragmentNotFound { path: PathBuf },
}
