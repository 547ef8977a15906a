//! Stub executor processes
//!
//! A task-mode container is fronted by a locally forked executor whose exit
//! status mirrors the container's: through its `--override` flag the
//! executor execs `sh -c 'exit `docker wait <name>`'` instead of a real
//! task. Before that, the stub detaches into its own session (signals aimed
//! at the agent's process group must not reach it) and blocks on its start
//! gate, a single byte on stdin, so the agent can finish checkpointing the
//! stub's pid before `docker wait` begins. Closing stdin instead trips the
//! gate and aborts the stub.

use crate::error::{AgentError, Result};
use std::collections::HashMap;
use std::path::Path;
#[cfg(unix)]
use std::process::Stdio;
#[cfg(unix)]
use tokio::io::AsyncWriteExt;
use tokio::process::Child;

/// The byte written to release a stub past its start gate.
#[cfg(unix)]
const GATE_RELEASE: &[u8] = b"\n";

/// Full command line of a stub executor fronting `container`.
///
/// The gate (`read`) comes first; a closed stdin makes it fail and the stub
/// exits without ever touching the runtime. The backquoted `docker wait`
/// survives the outer shell unexpanded inside single quotes and is evaluated
/// by the inner shell the executor spawns for `--override`.
fn stub_command_line(executor_command: &str, docker_cmd: &str, container: &str) -> String {
    format!(
        "read _ || exit 1; \
         exec {executor_command} --override /bin/sh -c 'exit `{docker_cmd} wait {container}`'"
    )
}

/// Fork the stub executor for `container`.
///
/// stdout/stderr are captured to files in `directory` (the container's own
/// output streams are not propagated through the stub). The caller must
/// [`release`] the returned child past its start gate, or [`abort`] it.
#[cfg(unix)]
pub fn spawn(
    executor_command: &str,
    docker_cmd: &str,
    container: &str,
    directory: &Path,
    env: &HashMap<String, String>,
) -> Result<Child> {
    let stdout = std::fs::File::create(directory.join("stdout"))?;
    let stderr = std::fs::File::create(directory.join("stderr"))?;

    let mut command = tokio::process::Command::new("/bin/sh");
    command
        .arg("-c")
        .arg(stub_command_line(executor_command, docker_cmd, container))
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    let sandbox = directory.to_path_buf();
    unsafe {
        command.pre_exec(move || {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            nix::unistd::chdir(&sandbox).map_err(std::io::Error::from)?;
            Ok(())
        });
    }

    command
        .spawn()
        .map_err(|e| AgentError::Internal(format!("Failed to fork executor: {e}")))
}

#[cfg(not(unix))]
pub fn spawn(
    _executor_command: &str,
    _docker_cmd: &str,
    _container: &str,
    _directory: &Path,
    _env: &HashMap<String, String>,
) -> Result<Child> {
    Err(AgentError::Unsupported {
        operation: "stub executor launch",
    })
}

/// Release `child` past its start gate.
#[cfg(unix)]
pub async fn release(child: &mut Child) -> Result<()> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| AgentError::Internal("stub executor has no stdin pipe".to_string()))?;
    stdin
        .write_all(GATE_RELEASE)
        .await
        .map_err(|e| AgentError::Internal(format!("Failed to synchronize with executor: {e}")))
}

#[cfg(not(unix))]
pub async fn release(_child: &mut Child) -> Result<()> {
    Err(AgentError::Unsupported {
        operation: "stub executor launch",
    })
}

/// Abort a gated stub by closing its stdin, and reap it in the background.
pub fn abort(mut child: Child) {
    drop(child.stdin.take());
    tokio::spawn(async move {
        let _ = child.wait().await;
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn command_line_keeps_the_wait_backquotes_quoted() {
        let line = stub_command_line("/usr/libexec/flotilla-executor", "docker", "flotilla-c1");
        assert_eq!(
            line,
            "read _ || exit 1; exec /usr/libexec/flotilla-executor --override \
             /bin/sh -c 'exit `docker wait flotilla-c1`'"
        );
    }

    #[tokio::test]
    async fn released_stub_runs_the_override() {
        let dir = tempdir().unwrap();
        // `/bin/echo` stands in for the executor: it prints the override
        // arguments to the captured stdout file and exits 0.
        let mut child = spawn("/bin/echo", "/bin/echo", "flotilla-t", dir.path(), &HashMap::new())
            .unwrap();

        release(&mut child).await.unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.code(), Some(0));

        let captured = std::fs::read_to_string(dir.path().join("stdout")).unwrap();
        assert!(captured.contains("--override"));
    }

    #[tokio::test]
    async fn aborted_stub_exits_nonzero_without_running_the_override() {
        let dir = tempdir().unwrap();
        let mut child = spawn("/bin/echo", "/bin/echo", "flotilla-t", dir.path(), &HashMap::new())
            .unwrap();

        drop(child.stdin.take());
        let status = child.wait().await.unwrap();
        assert_eq!(status.code(), Some(1));

        let captured = std::fs::read_to_string(dir.path().join("stdout")).unwrap();
        assert!(captured.is_empty());
    }
}
