//! Unified error taxonomy for the installation engine.
//!
//! Each component still raises its own narrow error where that reads more
//! naturally (see `io::fetch::FetchError`, `io::extract::ExtractError`); this
//! enum is what every one of them ultimately converts into, and what the
//! executor and callers match on. `DependencyMissing` is the one variant a
//! caller is expected to inspect rather than just propagate — see its doc
//! comment.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("bad parameter: {0}")]
    BadParam(String),

    #[error("insecure scheme: {0} (https required)")]
    InsecureScheme(String),

    #[error("blocked IP address: {0}")]
    BlockedIp(String),

    #[error("server returned a compressed response despite Accept-Encoding: identity")]
    CompressedResponse,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("archive entry escapes extraction root: {0}")]
    ArchiveTraversal(String),

    #[error("path escapes its allowed root: {path} (root: {root})")]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("unsupported binary format: {0}")]
    UnsupportedBinary(String),

    #[error("required external tool not found: {0}")]
    ExternalToolMissing(String),

    /// Soft/sentinel error: a system package manager reported the listed
    /// packages as absent. Never execute a privileged command in response;
    /// aggregate across a preflight pass and present one copy-pasteable
    /// install command per `family`.
    #[error("missing system dependencies for {family}: {packages:?} (run: {install_command})")]
    DependencyMissing {
        packages: Vec<String>,
        install_command: String,
        family: String,
    },

    #[error("lockfile drift detected: {0}")]
    LockfileDriftDetected(String),

    #[error("subprocess failed: {command} exited with {status}: {stderr}")]
    SubprocessFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("recipe verify command failed: {0}")]
    VerifyFailed(String),

    #[error("install cancelled")]
    Cancelled,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CoreError {
    /// True for every kind the spec marks fatal; `DependencyMissing` is the
    /// sole soft kind and callers may choose to keep going after collecting it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CoreError::DependencyMissing { .. })
    }
}
