//! Docker container supervisor
//!
//! The node agent's containerizer: launches framework executors and plain
//! tasks inside Docker containers, tracks every container it owns, applies
//! dynamic resource updates, samples live usage, and guarantees that each
//! container it ever acknowledged publishes exactly one [`Termination`].
//!
//! All bookkeeping sits behind one async mutex that is never held across a
//! suspension point. Every continuation re-validates the record it is about
//! to touch after each await, so a `destroy` landing mid-launch is observed
//! by the launch continuation instead of being clobbered by it.

use crate::checkpoint;
use crate::env::executor_environment;
use crate::error::{AgentError, Result};
use crate::naming::{container_name, parse_container_name, CONTAINER_NAME_PREFIX};
use crate::reaper::{Reaper, SystemReaper};
use crate::runtime::Runtime;
use crate::stub;
use flotilla_spec::{
    CommandSpec, ContainerId, ExecutorDescriptor, NodeId, NodeState, Resources,
    ResourceStatistics, TaskDescriptor, Termination,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

/// Image URI scheme that selects this supervisor.
const DOCKER_IMAGE_SCHEME: &str = "docker:///";

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Docker CLI binary, used by stub executors for `docker wait`.
    pub docker_cmd: String,
    /// Agent work directory; checkpoints live under its meta root.
    pub work_dir: PathBuf,
    /// Grace period advertised to checkpointed executors for agent
    /// reconnection.
    pub recovery_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            docker_cmd: "docker".to_string(),
            work_dir: PathBuf::from("/var/lib/flotilla"),
            recovery_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl SupervisorConfig {
    /// Root of the agent's durable metadata tree.
    pub fn meta_root(&self) -> PathBuf {
        self.work_dir.join("meta")
    }
}

/// Per-container bookkeeping.
///
/// One record exists exactly while the supervisor acknowledges the
/// container: installed by launch/recovery, erased when the termination is
/// published (or retained with `failed` set when a destroy could not remove
/// the container).
#[derive(Default)]
struct ContainerRecord {
    /// Pending `wait` calls, drained exactly once.
    waiters: Vec<oneshot::Sender<Result<Termination>>>,
    /// Cause of a failed destroy; the record sticks around for diagnosis.
    failed: Option<String>,
    /// Last-known allocation, merged into usage snapshots.
    resources: Option<Resources>,
    /// A reap watch is armed for this container's tracked pid.
    reaping: bool,
    /// The watch's result once it fired (`Some(None)` = exit code
    /// unobservable).
    exit_status: Option<Option<i32>>,
    /// Destroy has begun; launch/update effects and further destroys are
    /// shut out.
    destroying: bool,
    /// `docker rm -f` completed during the current destroy.
    kill_done: bool,
    /// Whether the current destroy was caller-initiated.
    killed: bool,
}

/// What a completed reap watch should do next.
enum AfterReap {
    /// A destroy was only waiting for the exit status; publish now.
    Finish,
    /// No destroy in progress; the process exiting starts one.
    Destroy,
    /// A destroy is in flight but `docker rm -f` has not returned yet.
    Nothing,
}

/// Docker container supervisor.
///
/// Cheap to clone; all clones share state. Reap watches run on background
/// tasks and feed back into the shared records through their own clone.
#[derive(Clone)]
pub struct DockerSupervisor {
    runtime: Arc<dyn Runtime>,
    reaper: Arc<dyn Reaper>,
    config: Arc<SupervisorConfig>,
    records: Arc<Mutex<HashMap<ContainerId, ContainerRecord>>>,
}

/// Image reference of a command that should run under this supervisor.
fn docker_image(command: &CommandSpec) -> Option<&str> {
    command
        .container
        .as_ref()?
        .image
        .strip_prefix(DOCKER_IMAGE_SCHEME)
}

impl DockerSupervisor {
    pub fn new(runtime: Arc<dyn Runtime>, config: SupervisorConfig) -> Self {
        Self::with_reaper(runtime, Arc::new(SystemReaper::new()), config)
    }

    pub fn with_reaper(
        runtime: Arc<dyn Runtime>,
        reaper: Arc<dyn Reaper>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            runtime,
            reaper,
            config: Arc::new(config),
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Launch a container holding a framework-supplied executor.
    ///
    /// Resolves `false` when the executor's command carries no
    /// `docker:///` container block; the caller should hand the launch to
    /// a different containerizer. Once `true` is returned the container is
    /// acknowledged and [`wait`](Self::wait) will produce its termination.
    #[allow(clippy::too_many_arguments)]
    pub async fn launch_executor(
        &self,
        id: &ContainerId,
        executor: &ExecutorDescriptor,
        directory: &Path,
        _user: Option<&str>,
        node_id: &NodeId,
        agent_pid: &str,
        checkpoint: bool,
    ) -> Result<bool> {
        let command = &executor.command;
        let image = {
            let mut records = self.records.lock().await;
            if records.contains_key(id) {
                return Err(AgentError::AlreadyStarted(id.clone()));
            }
            let Some(image) = docker_image(command) else {
                tracing::info!(container = %id, "No Docker container image found, skipping launch");
                return Ok(false);
            };
            records.insert(id.clone(), ContainerRecord::default());
            image
        };

        tracing::info!(
            container = %id,
            executor = %executor.executor_id,
            framework = %executor.framework_id,
            "Starting container for executor"
        );

        let mut env = executor_environment(
            executor,
            directory,
            node_id,
            agent_pid,
            checkpoint,
            self.config.recovery_timeout,
        );
        env.extend(command.environment.clone());

        match self
            .launch_executor_container(id, executor, image, &env, node_id, checkpoint)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) => {
                self.destroy(id, false).await;
                Err(e)
            }
        }
    }

    /// Continuation of [`launch_executor`](Self::launch_executor) past the
    /// record installation; any error here triggers the destroy in the
    /// caller.
    async fn launch_executor_container(
        &self,
        id: &ContainerId,
        executor: &ExecutorDescriptor,
        image: &str,
        env: &HashMap<String, String>,
        node_id: &NodeId,
        checkpoint: bool,
    ) -> Result<()> {
        let name = container_name(id);

        self.runtime
            .run(image, &executor.command.value, &name, &executor.resources, env)
            .await?;

        let info = self.runtime.inspect(&name).await?;
        let pid = info.pid.ok_or_else(|| AgentError::LaunchFailed {
            id: id.clone(),
            reason: "unable to get executor pid after launch".to_string(),
        })?;

        if checkpoint {
            self.checkpoint_forked_pid(id, executor, node_id, pid).await?;
        }

        self.watch_foreign_pid(id, pid).await;
        Ok(())
    }

    /// Launch a container for a plain task, fronted by a stub executor.
    ///
    /// The stub is forked locally and mirrors the container's exit status
    /// by waiting on it through the Docker CLI; its pid (not the
    /// container's root pid) is what gets checkpointed and reaped.
    #[allow(clippy::too_many_arguments)]
    pub async fn launch_task(
        &self,
        id: &ContainerId,
        task: &TaskDescriptor,
        executor: &ExecutorDescriptor,
        directory: &Path,
        _user: Option<&str>,
        node_id: &NodeId,
        agent_pid: &str,
        checkpoint: bool,
    ) -> Result<bool> {
        let (command, image) = {
            let mut records = self.records.lock().await;
            if records.contains_key(id) {
                return Err(AgentError::AlreadyStarted(id.clone()));
            }
            let Some(command) = &task.command else {
                tracing::warn!(container = %id, "Not expecting task launch without command info");
                return Ok(false);
            };
            let Some(image) = docker_image(command) else {
                tracing::info!(
                    container = %id,
                    "No container info or container image is not a Docker image, skipping launch"
                );
                return Ok(false);
            };
            records.insert(
                id.clone(),
                ContainerRecord {
                    resources: Some(task.resources),
                    ..Default::default()
                },
            );
            (command, image)
        };

        tracing::info!(
            container = %id,
            task = %task.task_id,
            executor = %executor.executor_id,
            framework = %executor.framework_id,
            "Starting container for task"
        );

        match self
            .launch_task_container(
                id, command, image, task, executor, directory, node_id, agent_pid, checkpoint,
            )
            .await
        {
            Ok(()) => Ok(true),
            Err(e) => {
                self.destroy(id, false).await;
                Err(e)
            }
        }
    }

    /// Continuation of [`launch_task`](Self::launch_task) past the record
    /// installation.
    #[allow(clippy::too_many_arguments)]
    async fn launch_task_container(
        &self,
        id: &ContainerId,
        command: &CommandSpec,
        image: &str,
        task: &TaskDescriptor,
        executor: &ExecutorDescriptor,
        directory: &Path,
        node_id: &NodeId,
        agent_pid: &str,
        checkpoint: bool,
    ) -> Result<()> {
        let name = container_name(id);

        // No env merge here: the task environment reaches the container via
        // the stub executor, not `docker run`.
        self.runtime
            .run(image, &command.value, &name, &task.resources, &HashMap::new())
            .await?;

        let mut env = executor_environment(
            executor,
            directory,
            node_id,
            agent_pid,
            checkpoint,
            self.config.recovery_timeout,
        );
        env.extend(executor.command.environment.clone());

        let mut child = stub::spawn(
            &executor.command.value,
            &self.config.docker_cmd,
            &name,
            directory,
            &env,
        )?;
        let pid = child.id().map(|pid| pid as i32).ok_or_else(|| {
            AgentError::LaunchFailed {
                id: id.clone(),
                reason: "stub executor exited before it could be tracked".to_string(),
            }
        })?;

        if checkpoint {
            if let Err(e) = self.checkpoint_forked_pid(id, executor, node_id, pid).await {
                // The stub is still parked on its start gate; closing stdin
                // aborts it before it ever touches the runtime.
                stub::abort(child);
                return Err(e);
            }
        }

        // Checkpoint complete; release the start gate.
        if let Err(e) = stub::release(&mut child).await {
            stub::abort(child);
            return Err(e);
        }

        self.watch_child(id, child).await;
        Ok(())
    }

    async fn checkpoint_forked_pid(
        &self,
        id: &ContainerId,
        executor: &ExecutorDescriptor,
        node_id: &NodeId,
        pid: i32,
    ) -> Result<()> {
        let path = checkpoint::forked_pid_path(
            &self.config.meta_root(),
            node_id,
            &executor.framework_id,
            &executor.executor_id,
            id,
        );
        tracing::info!(
            container = %id,
            pid,
            path = %path.display(),
            "Checkpointing executor's forked pid"
        );
        checkpoint::checkpoint(&path, &pid.to_string()).await
    }

    /// Update the resource allocation of a running container.
    ///
    /// Unknown ids are a warning, not an error: the agent may race a
    /// termination with a coordinator-driven update. On platforms without
    /// cgroups this records the allocation and does nothing else.
    pub async fn update(&self, id: &ContainerId, resources: &Resources) -> Result<()> {
        {
            let mut records = self.records.lock().await;
            let Some(record) = records.get_mut(id) else {
                tracing::warn!(container = %id, "Ignoring update of unknown container");
                return Ok(());
            };
            record.resources = Some(*resources);
        }

        self.apply_limits(id, resources).await
    }

    #[cfg(not(target_os = "linux"))]
    async fn apply_limits(&self, _id: &ContainerId, _resources: &Resources) -> Result<()> {
        Ok(())
    }

    #[cfg(target_os = "linux")]
    async fn apply_limits(&self, id: &ContainerId, resources: &Resources) -> Result<()> {
        use crate::cgroups;

        if resources.is_empty() {
            tracing::warn!(container = %id, "Ignoring update as no supported resources are present");
            return Ok(());
        }

        let info = self.runtime.inspect(&container_name(id)).await?;
        let Some(pid) = info.pid else {
            // The container is no longer running; nothing to write.
            return Ok(());
        };

        let update_failed = |reason: String| AgentError::UpdateFailed {
            id: id.clone(),
            reason,
        };

        if let Some(cpus) = resources.cpus {
            let hierarchy = cgroups::hierarchy("cpu").map_err(|e| {
                update_failed(format!(
                    "failed to determine the hierarchy where the 'cpu' subsystem is mounted: {e}"
                ))
            })?;
            let cgroup = cgroups::cpu_cgroup(pid).map_err(|e| {
                update_failed(format!("failed to determine the 'cpu' cgroup: {e}"))
            })?;
            if cgroup.is_none() {
                tracing::warn!(
                    container = %id,
                    "Container does not appear to be a member of a cgroup where the 'cpu' \
                     subsystem is mounted"
                );
            }
            if let (Some(hierarchy), Some(cgroup)) = (hierarchy.as_deref(), cgroup.as_deref()) {
                let shares = cgroups::cpu_shares(cpus);
                cgroups::cpu::write_shares(hierarchy, cgroup, shares)
                    .map_err(|e| update_failed(format!("failed to update 'cpu.shares': {e}")))?;
                tracing::info!(container = %id, shares, "Updated 'cpu.shares'");
            }
        }

        if let Some(mem) = resources.mem_bytes {
            let hierarchy = cgroups::hierarchy("memory").map_err(|e| {
                update_failed(format!(
                    "failed to determine the hierarchy where the 'memory' subsystem is mounted: {e}"
                ))
            })?;
            let cgroup = cgroups::memory_cgroup(pid).map_err(|e| {
                update_failed(format!("failed to determine the 'memory' cgroup: {e}"))
            })?;
            if cgroup.is_none() {
                tracing::warn!(
                    container = %id,
                    "Container does not appear to be a member of a cgroup where the 'memory' \
                     subsystem is mounted"
                );
            }
            if let (Some(hierarchy), Some(cgroup)) = (hierarchy.as_deref(), cgroup.as_deref()) {
                let limit = mem.max(cgroups::MIN_MEMORY_BYTES);

                // The soft limit always follows the allocation.
                cgroups::memory::write_soft_limit(hierarchy, cgroup, limit).map_err(|e| {
                    update_failed(format!("failed to set 'memory.soft_limit_in_bytes': {e}"))
                })?;
                tracing::info!(container = %id, limit, "Updated 'memory.soft_limit_in_bytes'");

                let current = cgroups::memory::read_hard_limit(hierarchy, cgroup).map_err(|e| {
                    update_failed(format!("failed to read 'memory.limit_in_bytes': {e}"))
                })?;

                // Never shrink the hard limit: shrinking can OOM the
                // container, and OOM handling is not wired up yet.
                if limit > current {
                    cgroups::memory::write_hard_limit(hierarchy, cgroup, limit).map_err(|e| {
                        update_failed(format!("failed to set 'memory.limit_in_bytes': {e}"))
                    })?;
                    tracing::info!(container = %id, limit, "Updated 'memory.limit_in_bytes'");
                }
            }
        }

        Ok(())
    }

    /// Sample live resource usage for a container.
    #[cfg(not(target_os = "linux"))]
    pub async fn usage(&self, _id: &ContainerId) -> Result<ResourceStatistics> {
        Err(AgentError::Unsupported { operation: "usage" })
    }

    /// Sample live resource usage for a container.
    #[cfg(target_os = "linux")]
    pub async fn usage(&self, id: &ContainerId) -> Result<ResourceStatistics> {
        let resources = {
            let records = self.records.lock().await;
            let record = records
                .get(id)
                .ok_or_else(|| AgentError::UnknownContainer(id.clone()))?;
            if record.destroying {
                return Err(AgentError::BeingRemoved(id.clone()));
            }
            record.resources
        };

        let info = self.runtime.inspect(&container_name(id)).await?;
        let pid = info.pid.ok_or_else(|| AgentError::NotRunning(id.clone()))?;

        // The root pid is enough: it is the container's init, so no child
        // escapes the recursive walk below it.
        let mut statistics = crate::usage::sample(pid, true)?;

        if let Some(resources) = resources {
            if resources.cpus.is_some() {
                statistics.cpus_limit = resources.cpus;
            }
            if resources.mem_bytes.is_some() {
                statistics.mem_limit_bytes = resources.mem_bytes;
            }
        }

        Ok(statistics)
    }

    /// Wait for the container's termination record.
    ///
    /// Resolves exactly once per acknowledged container; after the record is
    /// erased this fails with unknown container.
    pub async fn wait(&self, id: &ContainerId) -> Result<Termination> {
        let rx = {
            let mut records = self.records.lock().await;
            let Some(record) = records.get_mut(id) else {
                return Err(AgentError::UnknownContainer(id.clone()));
            };
            if let Some(cause) = &record.failed {
                return Err(AgentError::DestroyFailed(cause.clone()));
            }
            let (tx, rx) = oneshot::channel();
            record.waiters.push(tx);
            rx
        };

        rx.await.map_err(|_| {
            AgentError::Internal("supervisor dropped before the termination was published".into())
        })?
    }

    /// Destroy a container.
    ///
    /// Idempotent; `killed` marks whether the caller asked for it (as
    /// opposed to the supervisor reacting to the tracked process exiting).
    /// Callers observe the outcome through [`wait`](Self::wait).
    pub async fn destroy(&self, id: &ContainerId, killed: bool) {
        {
            let mut records = self.records.lock().await;
            let Some(record) = records.get_mut(id) else {
                tracing::warn!(container = %id, "Ignoring destroy of unknown container");
                return;
            };
            if record.destroying {
                return;
            }
            record.destroying = true;
            record.kill_done = false;
            record.killed = killed;
        }

        tracing::info!(container = %id, killed, "Destroying container");

        // `docker rm -f` both stops and removes; the reap watch notices the
        // tracked process disappearing. The container may not actually exist
        // (a destroy can follow a launch that failed before `run`); removal
        // is attempted regardless.
        let kill_result = self.runtime.kill(&container_name(id), true).await;

        let finish = {
            let mut records = self.records.lock().await;
            let Some(record) = records.get_mut(id) else {
                return;
            };
            match kill_result {
                Err(e) => {
                    tracing::error!(container = %id, error = %e, "Failed to remove container during destroy");
                    let cause = e.to_string();
                    for tx in record.waiters.drain(..) {
                        let _ = tx.send(Err(AgentError::DestroyFailed(cause.clone())));
                    }
                    record.failed = Some(cause);
                    record.destroying = false;
                    return;
                }
                Ok(()) => {
                    record.kill_done = true;
                    if !record.reaping {
                        // Launch failed before any pid was tracked; an
                        // absent status lets the workflow complete.
                        record.exit_status = Some(None);
                    }
                    record.exit_status.is_some()
                }
            }
        };

        if finish {
            self.finish_termination(id).await;
        }
    }

    /// Publish the termination and erase the record.
    async fn finish_termination(&self, id: &ContainerId) {
        let mut records = self.records.lock().await;
        let Some(record) = records.remove(id) else {
            return;
        };

        let termination = Termination {
            killed: record.killed,
            status: record.exit_status.flatten(),
            message: if record.killed {
                "Docker task killed"
            } else {
                "Docker process terminated"
            }
            .to_string(),
        };

        tracing::info!(
            container = %id,
            killed = termination.killed,
            status = ?termination.status,
            "Container terminated"
        );

        for tx in record.waiters {
            let _ = tx.send(Ok(termination.clone()));
        }
    }

    /// Reconstruct supervisor state after an agent restart.
    ///
    /// Reattaches a reap watch to every recovered run with a checkpointed
    /// pid, then sweeps the runtime for orphans: containers carrying the
    /// agent's name prefix that no recovered run accounts for.
    pub async fn recover(&self, state: Option<&NodeState>) -> Result<()> {
        tracing::info!("Recovering Docker containers");

        if let Some(state) = state {
            // Pids already being reaped, to catch the (pathological) case
            // of two recovered runs sharing one.
            let mut reaped: HashMap<i32, ContainerId> = HashMap::new();

            for (framework_id, framework) in &state.frameworks {
                for (executor_id, executor) in &framework.executors {
                    if executor.info.is_none() {
                        tracing::warn!(
                            executor = %executor_id,
                            framework = %framework_id,
                            "Skipping recovery of executor because its info could not be recovered"
                        );
                        continue;
                    }
                    let Some(container_id) = &executor.latest else {
                        tracing::warn!(
                            executor = %executor_id,
                            framework = %framework_id,
                            "Skipping recovery of executor because its latest run could not be \
                             recovered"
                        );
                        continue;
                    };

                    let run = executor.runs.get(container_id).ok_or_else(|| {
                        AgentError::RecoveryFailed(format!(
                            "no run state recovered for container '{container_id}'"
                        ))
                    })?;
                    if run.id.as_ref() != Some(container_id) {
                        return Err(AgentError::RecoveryFailed(format!(
                            "run state of container '{container_id}' carries a mismatched id"
                        )));
                    }

                    // Without a checkpointed pid there is nothing to
                    // reattach: no record is installed, a later wait()
                    // reports unknown container, and the sweep below removes
                    // whatever the runtime still holds for this run.
                    let Some(pid) = run.forked_pid else {
                        continue;
                    };

                    if run.completed {
                        tracing::debug!(
                            container = %container_id,
                            "Skipping recovery of completed run"
                        );
                        continue;
                    }

                    tracing::info!(
                        container = %container_id,
                        executor = %executor_id,
                        framework = %framework_id,
                        pid,
                        "Recovering container"
                    );

                    {
                        let mut records = self.records.lock().await;
                        records.insert(container_id.clone(), ContainerRecord::default());
                    }
                    self.watch_foreign_pid(container_id, pid).await;

                    if let Some(previous) = reaped.insert(pid, container_id.clone()) {
                        return Err(AgentError::RecoveryFailed(format!(
                            "detected duplicate pid {pid} for containers '{previous}' and \
                             '{container_id}'"
                        )));
                    }
                }
            }
        }

        // Remove orphans. Containers named with our prefix but not tracked
        // were started by a previous agent life and lost their executor.
        let listed = self.runtime.ps(true, CONTAINER_NAME_PREFIX).await?;
        let tracked = self.containers().await;
        for container in listed {
            let Some(id) = parse_container_name(&container.name) else {
                continue;
            };
            if tracked.contains(&id) {
                continue;
            }

            tracing::info!(
                container = %id,
                runtime_id = %container.id,
                "Removing orphaned container"
            );
            let runtime = Arc::clone(&self.runtime);
            tokio::spawn(async move {
                if let Err(e) = runtime.kill(&container.id, true).await {
                    tracing::warn!(
                        runtime_id = %container.id,
                        error = %e,
                        "Failed to remove orphaned container"
                    );
                }
            });
        }

        Ok(())
    }

    /// Ids of every container the supervisor currently acknowledges.
    pub async fn containers(&self) -> HashSet<ContainerId> {
        self.records.lock().await.keys().cloned().collect()
    }

    /// Arm a reap watch on a pid the agent did not fork (a container root
    /// or a recovered executor).
    async fn watch_foreign_pid(&self, id: &ContainerId, pid: i32) {
        {
            let mut records = self.records.lock().await;
            let Some(record) = records.get_mut(id) else {
                // Destroyed while the launch was still in flight.
                return;
            };
            record.reaping = true;
        }

        let supervisor = self.clone();
        let reaper = Arc::clone(&self.reaper);
        let id = id.clone();
        tokio::spawn(async move {
            let status = reaper.reap(pid).await;
            supervisor.reaped(&id, status).await;
        });
    }

    /// Arm a reap watch on a stub executor the supervisor forked itself;
    /// its exit code is observable through the child handle.
    async fn watch_child(&self, id: &ContainerId, mut child: tokio::process::Child) {
        {
            let mut records = self.records.lock().await;
            let Some(record) = records.get_mut(id) else {
                // Destroyed while the launch was still in flight; the stub
                // still has to be reaped.
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
                return;
            };
            record.reaping = true;
        }

        let supervisor = self.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(container = %id, error = %e, "Failed to wait on stub executor");
                    None
                }
            };
            supervisor.reaped(&id, status).await;
        });
    }

    /// A reap watch fired: record the exit status and either finish an
    /// in-flight destroy or start one.
    async fn reaped(&self, id: &ContainerId, status: Option<i32>) {
        let next = {
            let mut records = self.records.lock().await;
            let Some(record) = records.get_mut(id) else {
                return;
            };
            record.exit_status = Some(status);
            if !record.destroying {
                AfterReap::Destroy
            } else if record.kill_done {
                AfterReap::Finish
            } else {
                AfterReap::Nothing
            }
        };

        match next {
            AfterReap::Finish => self.finish_termination(id).await,
            AfterReap::Destroy => {
                tracing::info!(container = %id, "Executor for container has exited");
                self.destroy(id, false).await;
            }
            AfterReap::Nothing => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flotilla_spec::ContainerBlock;

    fn command(image: Option<&str>) -> CommandSpec {
        CommandSpec {
            value: "./executor".to_string(),
            environment: HashMap::new(),
            container: image.map(|image| ContainerBlock {
                image: image.to_string(),
            }),
        }
    }

    #[test]
    fn docker_image_requires_the_scheme() {
        assert_eq!(
            docker_image(&command(Some("docker:///busybox"))),
            Some("busybox")
        );
        assert_eq!(docker_image(&command(Some("file:///x"))), None);
        assert_eq!(docker_image(&command(None)), None);
    }

    #[test]
    fn docker_image_keeps_registry_and_tag() {
        assert_eq!(
            docker_image(&command(Some("docker:///quay.io/org/app:v2"))),
            Some("quay.io/org/app:v2")
        );
    }

    #[test]
    fn config_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.docker_cmd, "docker");
        assert_eq!(config.meta_root(), PathBuf::from("/var/lib/flotilla/meta"));
    }
}
