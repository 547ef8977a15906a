//! Executor environment construction
//!
//! Variables the agent injects into every executor it launches: into the
//! container itself in executor-mode, into the stub process in task-mode.
//! Executors use these to register back with the agent and to decide how
//! long to keep retrying when the agent is away restarting.

use flotilla_spec::{ExecutorDescriptor, NodeId};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Environment the executor contract requires.
///
/// `agent_pid` is the agent's message-transport address (the executor dials
/// it to register). The recovery timeout is only advertised when the run is
/// checkpointed; an uncheckpointed executor has nothing to reconnect to.
pub fn executor_environment(
    executor: &ExecutorDescriptor,
    directory: &Path,
    node_id: &NodeId,
    agent_pid: &str,
    checkpoint: bool,
    recovery_timeout: Duration,
) -> HashMap<String, String> {
    let mut env = HashMap::from([
        (
            "FLOTILLA_FRAMEWORK_ID".to_string(),
            executor.framework_id.to_string(),
        ),
        (
            "FLOTILLA_EXECUTOR_ID".to_string(),
            executor.executor_id.to_string(),
        ),
        ("FLOTILLA_NODE_ID".to_string(), node_id.to_string()),
        ("FLOTILLA_AGENT_PID".to_string(), agent_pid.to_string()),
        (
            "FLOTILLA_DIRECTORY".to_string(),
            directory.display().to_string(),
        ),
        (
            "FLOTILLA_CHECKPOINT".to_string(),
            if checkpoint { "1" } else { "0" }.to_string(),
        ),
    ]);

    if checkpoint {
        env.insert(
            "FLOTILLA_RECOVERY_TIMEOUT_SECS".to_string(),
            recovery_timeout.as_secs().to_string(),
        );
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_spec::{CommandSpec, ExecutorId, FrameworkId};

    fn executor() -> ExecutorDescriptor {
        ExecutorDescriptor {
            executor_id: ExecutorId::from("exec-1"),
            framework_id: FrameworkId::from("fw-1"),
            command: CommandSpec::default(),
            resources: Default::default(),
        }
    }

    #[test]
    fn environment_carries_the_run_coordinates() {
        let env = executor_environment(
            &executor(),
            Path::new("/var/lib/flotilla/sandbox"),
            &NodeId::from("node-1"),
            "agent@10.0.0.1:5051",
            false,
            Duration::from_secs(900),
        );

        assert_eq!(env["FLOTILLA_FRAMEWORK_ID"], "fw-1");
        assert_eq!(env["FLOTILLA_EXECUTOR_ID"], "exec-1");
        assert_eq!(env["FLOTILLA_NODE_ID"], "node-1");
        assert_eq!(env["FLOTILLA_AGENT_PID"], "agent@10.0.0.1:5051");
        assert_eq!(env["FLOTILLA_DIRECTORY"], "/var/lib/flotilla/sandbox");
        assert_eq!(env["FLOTILLA_CHECKPOINT"], "0");
        assert!(!env.contains_key("FLOTILLA_RECOVERY_TIMEOUT_SECS"));
    }

    #[test]
    fn recovery_timeout_is_advertised_only_when_checkpointing() {
        let env = executor_environment(
            &executor(),
            Path::new("/sandbox"),
            &NodeId::from("node-1"),
            "agent@host",
            true,
            Duration::from_secs(900),
        );

        assert_eq!(env["FLOTILLA_CHECKPOINT"], "1");
        assert_eq!(env["FLOTILLA_RECOVERY_TIMEOUT_SECS"], "900");
    }
}
