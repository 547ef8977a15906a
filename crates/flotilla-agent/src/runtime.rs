//! Abstract container runtime client
//!
//! The supervisor drives the Docker daemon through this thin asynchronous
//! interface so tests can substitute a scripted in-memory double.

use crate::error::{AgentError, Result};
use flotilla_spec::Resources;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// What the runtime reports about a single container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Runtime-assigned container id (distinct from the supervisor's
    /// [`ContainerId`](flotilla_spec::ContainerId)).
    pub id: String,
    /// Container name, possibly with the runtime's leading slash.
    pub name: String,
    /// Root pid, present while the container is running.
    pub pid: Option<i32>,
}

/// Abstract container runtime client
///
/// Four operations are enough for the supervisor: start a container, remove
/// it by force, inspect one, and list everything carrying the agent's name
/// prefix.
#[async_trait::async_trait]
pub trait Runtime: Send + Sync {
    /// Start a container named `name` running `command` inside `image`.
    ///
    /// `resources` seeds the initial cpu-share/memory limits and `env` is
    /// injected into the container's process.
    async fn run(
        &self,
        image: &str,
        command: &str,
        name: &str,
        resources: &Resources,
        env: &HashMap<String, String>,
    ) -> Result<()>;

    /// Force-remove a container by name or runtime id (`docker rm -f`).
    async fn kill(&self, name: &str, force: bool) -> Result<()>;

    /// Inspect a container by name.
    async fn inspect(&self, name: &str) -> Result<ContainerInfo>;

    /// List containers whose names carry `name_prefix`; `all` includes
    /// stopped ones.
    async fn ps(&self, all: bool, name_prefix: &str) -> Result<Vec<ContainerInfo>>;
}

/// One recorded `run` invocation on [`MockRuntime`].
#[derive(Debug, Clone)]
pub struct RunCall {
    pub image: String,
    pub command: String,
    pub name: String,
    pub resources: Resources,
    pub env: HashMap<String, String>,
}

#[derive(Default)]
struct MockRuntimeState {
    /// Live containers keyed by bare (slash-less) name.
    containers: HashMap<String, ContainerInfo>,
    /// Containers seeded by tests to appear in `ps` listings only.
    listed: Vec<ContainerInfo>,
    /// Scripted root pids consulted by `inspect`, keyed by bare name.
    pids: HashMap<String, Option<i32>>,
    run_calls: Vec<RunCall>,
    kill_calls: Vec<String>,
    fail_run: Option<String>,
    fail_kill: Option<String>,
    fail_inspect: Option<String>,
    next_pid: i32,
    next_id: u32,
}

/// In-memory runtime double for tests and development.
///
/// `run` registers the container and assigns a synthetic root pid (unless a
/// pid was scripted for the name), `inspect` reports it back, `ps` returns
/// everything registered or seeded. Unlike the real daemon, `kill` of an
/// unknown name succeeds: the supervisor force-removes containers whose
/// launch may have failed before anything was created.
pub struct MockRuntime {
    state: Mutex<MockRuntimeState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockRuntimeState {
                next_pid: 1000,
                ..Default::default()
            }),
        }
    }

    /// Script the root pid `inspect` reports for `name`.
    pub async fn script_pid(&self, name: &str, pid: Option<i32>) {
        self.state.lock().await.pids.insert(name.to_string(), pid);
    }

    /// Seed a container that only shows up in `ps` listings.
    pub async fn add_listed(&self, id: &str, name: &str) {
        self.state.lock().await.listed.push(ContainerInfo {
            id: id.to_string(),
            name: name.to_string(),
            pid: None,
        });
    }

    /// Make every subsequent `run` fail with `reason`.
    pub async fn fail_runs(&self, reason: &str) {
        self.state.lock().await.fail_run = Some(reason.to_string());
    }

    /// Make every subsequent `kill` fail with `reason`.
    pub async fn fail_kills(&self, reason: &str) {
        self.state.lock().await.fail_kill = Some(reason.to_string());
    }

    /// Make every subsequent `inspect` fail with `reason`.
    pub async fn fail_inspects(&self, reason: &str) {
        self.state.lock().await.fail_inspect = Some(reason.to_string());
    }

    pub async fn run_calls(&self) -> Vec<RunCall> {
        self.state.lock().await.run_calls.clone()
    }

    pub async fn kill_calls(&self) -> Vec<String> {
        self.state.lock().await.kill_calls.clone()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.state.lock().await.containers.contains_key(name)
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Runtime for MockRuntime {
    async fn run(
        &self,
        image: &str,
        command: &str,
        name: &str,
        resources: &Resources,
        env: &HashMap<String, String>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.fail_run.clone() {
            return Err(AgentError::RunFailed {
                name: name.to_string(),
                reason,
            });
        }
        state.run_calls.push(RunCall {
            image: image.to_string(),
            command: command.to_string(),
            name: name.to_string(),
            resources: *resources,
            env: env.clone(),
        });
        let pid = match state.pids.get(name) {
            Some(pid) => *pid,
            None => {
                state.next_pid += 1;
                Some(state.next_pid)
            }
        };
        state.next_id += 1;
        let info = ContainerInfo {
            id: format!("mock-{}", state.next_id),
            name: format!("/{name}"),
            pid,
        };
        state.containers.insert(name.to_string(), info);
        Ok(())
    }

    async fn kill(&self, name: &str, _force: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        state.kill_calls.push(name.to_string());
        if let Some(reason) = state.fail_kill.clone() {
            return Err(AgentError::KillFailed {
                name: name.to_string(),
                reason,
            });
        }
        state
            .containers
            .retain(|bare, info| bare != name && info.id != name);
        state
            .listed
            .retain(|info| info.id != name && info.name.trim_start_matches('/') != name);
        Ok(())
    }

    async fn inspect(&self, name: &str) -> Result<ContainerInfo> {
        let state = self.state.lock().await;
        if let Some(reason) = state.fail_inspect.clone() {
            return Err(AgentError::InspectFailed {
                name: name.to_string(),
                reason,
            });
        }
        let mut info = state
            .containers
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::InspectFailed {
                name: name.to_string(),
                reason: "no such container".to_string(),
            })?;
        if let Some(pid) = state.pids.get(name) {
            info.pid = *pid;
        }
        Ok(info)
    }

    async fn ps(&self, _all: bool, name_prefix: &str) -> Result<Vec<ContainerInfo>> {
        let state = self.state.lock().await;
        Ok(state
            .containers
            .values()
            .chain(state.listed.iter())
            .filter(|info| info.name.trim_start_matches('/').starts_with(name_prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_then_inspect_reports_a_pid() {
        let runtime = MockRuntime::new();
        runtime
            .run("busybox", "sleep 1", "flotilla-a", &Resources::default(), &HashMap::new())
            .await
            .unwrap();

        let info = runtime.inspect("flotilla-a").await.unwrap();
        assert_eq!(info.name, "/flotilla-a");
        assert!(info.pid.is_some());
    }

    #[tokio::test]
    async fn scripted_pid_overrides_the_assigned_one() {
        let runtime = MockRuntime::new();
        runtime.script_pid("flotilla-a", Some(4242)).await;
        runtime
            .run("busybox", "sleep 1", "flotilla-a", &Resources::default(), &HashMap::new())
            .await
            .unwrap();

        assert_eq!(runtime.inspect("flotilla-a").await.unwrap().pid, Some(4242));
    }

    #[tokio::test]
    async fn kill_is_tolerant_of_unknown_names() {
        let runtime = MockRuntime::new();
        runtime.kill("flotilla-gone", true).await.unwrap();
        assert_eq!(runtime.kill_calls().await, vec!["flotilla-gone"]);
    }

    #[tokio::test]
    async fn ps_filters_on_the_name_prefix() {
        let runtime = MockRuntime::new();
        runtime
            .run("busybox", "sleep 1", "flotilla-a", &Resources::default(), &HashMap::new())
            .await
            .unwrap();
        runtime.add_listed("rt-1", "/user-thing").await;

        let listed = runtime.ps(true, "flotilla-").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "/flotilla-a");
    }
}
