//! Agent-specific errors

use flotilla_spec::ContainerId;
use std::path::PathBuf;
use thiserror::Error;

/// Container supervisor errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// A record for the container already exists
    #[error("Container '{0}' already started")]
    AlreadyStarted(ContainerId),

    /// No record for the container
    #[error("Unknown container: {0}")]
    UnknownContainer(ContainerId),

    /// The container is mid-destroy
    #[error("Container is being removed: {0}")]
    BeingRemoved(ContainerId),

    /// The container exists but has no running root process
    #[error("Container '{0}' is not running")]
    NotRunning(ContainerId),

    /// Launch workflow failed after the record was installed
    #[error("Failed to launch container '{id}': {reason}")]
    LaunchFailed { id: ContainerId, reason: String },

    /// Could not persist the forked pid
    #[error("Failed to checkpoint executor's forked pid to '{path}': {reason}")]
    CheckpointFailed { path: PathBuf, reason: String },

    /// `docker rm -f` failed during a destroy; the record is retained
    #[error("Failed to destroy container: {0}")]
    DestroyFailed(String),

    /// A cgroup control file could not be updated
    #[error("Failed to update container '{id}': {reason}")]
    UpdateFailed { id: ContainerId, reason: String },

    /// Startup recovery aborted (missing run state, duplicate pid, ...)
    #[error("Recovery failed: {0}")]
    RecoveryFailed(String),

    /// Failed to connect to the Docker daemon
    #[error("Failed to connect to Docker: {0}")]
    Connection(String),

    /// Failed to pull an image
    #[error("Failed to pull image '{image}': {reason}")]
    PullFailed { image: String, reason: String },

    /// `docker run` (create + start) failed
    #[error("Failed to run container '{name}': {reason}")]
    RunFailed { name: String, reason: String },

    /// `docker rm -f` failed
    #[error("Failed to kill container '{name}': {reason}")]
    KillFailed { name: String, reason: String },

    /// `docker inspect` failed
    #[error("Failed to inspect container '{name}': {reason}")]
    InspectFailed { name: String, reason: String },

    /// `docker ps` failed
    #[error("Failed to list containers: {0}")]
    ListFailed(String),

    /// cgroup discovery or control-file access failed
    #[error("cgroup error: {0}")]
    Cgroup(String),

    /// The operation has no implementation on this platform
    #[error("{operation} is not supported on this platform")]
    Unsupported { operation: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;
