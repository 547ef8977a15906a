//! Durable pid checkpoints
//!
//! Each checkpointed run records the forked pid of its (stub) executor under
//! a path derived from the run's coordinates, so a restarted agent can
//! reattach its reaper before the runtime is even consulted. The path scheme
//! must stay stable across releases; recovery re-derives it from the same
//! inputs.

use crate::error::{AgentError, Result};
use flotilla_spec::{ContainerId, ExecutorId, FrameworkId, NodeId};
use std::path::{Path, PathBuf};

/// Location of the forked-pid checkpoint for one run.
pub fn forked_pid_path(
    meta_root: &Path,
    node_id: &NodeId,
    framework_id: &FrameworkId,
    executor_id: &ExecutorId,
    container_id: &ContainerId,
) -> PathBuf {
    meta_root
        .join("nodes")
        .join(node_id.to_string())
        .join("frameworks")
        .join(framework_id.to_string())
        .join("executors")
        .join(executor_id.to_string())
        .join("runs")
        .join(container_id.to_string())
        .join("pids")
        .join("forked.pid")
}

/// Atomically persist `contents` at `path`, creating parent directories.
///
/// The write goes to a temporary sibling first and is moved into place with
/// a rename, so a crash mid-write never leaves a torn checkpoint behind.
pub async fn checkpoint(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| AgentError::CheckpointFailed {
        path: path.to_path_buf(),
        reason: "path has no parent directory".to_string(),
    })?;

    let failed = |reason: std::io::Error| AgentError::CheckpointFailed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    tokio::fs::create_dir_all(parent).await.map_err(failed)?;

    let staging = path.with_extension("tmp");
    tokio::fs::write(&staging, contents).await.map_err(failed)?;
    tokio::fs::rename(&staging, path).await.map_err(failed)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn coordinates() -> (NodeId, FrameworkId, ExecutorId, ContainerId) {
        (
            NodeId::from("node-1"),
            FrameworkId::from("fw-1"),
            ExecutorId::from("exec-1"),
            ContainerId::from("run-1"),
        )
    }

    #[test]
    fn path_scheme_is_stable() {
        let (node, framework, executor, container) = coordinates();
        let path = forked_pid_path(Path::new("/meta"), &node, &framework, &executor, &container);
        assert_eq!(
            path,
            Path::new(
                "/meta/nodes/node-1/frameworks/fw-1/executors/exec-1/runs/run-1/pids/forked.pid"
            )
        );
    }

    #[tokio::test]
    async fn checkpoint_creates_parents_and_writes_contents() {
        let dir = tempdir().unwrap();
        let (node, framework, executor, container) = coordinates();
        let path = forked_pid_path(dir.path(), &node, &framework, &executor, &container);

        checkpoint(&path, "4242").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "4242");
    }

    #[tokio::test]
    async fn checkpoint_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pids").join("forked.pid");

        checkpoint(&path, "100").await.unwrap();
        checkpoint(&path, "200").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "200");
        // The staging file must not survive the rename.
        assert!(!path.with_extension("tmp").exists());
    }
}
