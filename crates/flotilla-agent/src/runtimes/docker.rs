//! Docker-backed runtime client using bollard
//!
//! Talks to the local Docker daemon over its platform-default socket. The
//! supervisor's `run` maps onto an (optional) image pull plus
//! create + start; `kill` is a forced remove, which both stops the container
//! and releases its name for reuse.

use crate::cgroups::{cpu_shares, MIN_MEMORY_BYTES};
use crate::error::{AgentError, Result};
use crate::runtime::{ContainerInfo, Runtime};
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::Docker;
use flotilla_spec::Resources;
use futures_util::StreamExt;
use std::collections::HashMap;
use tracing::instrument;

/// Docker daemon client.
pub struct DockerRuntime {
    docker: Docker,
}

impl std::fmt::Debug for DockerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerRuntime").finish_non_exhaustive()
    }
}

impl DockerRuntime {
    /// Connect to the local Docker daemon and verify it answers a ping.
    pub async fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| AgentError::Connection(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| AgentError::Connection(format!("ping failed: {e}")))?;

        tracing::info!("Connected to Docker daemon");
        Ok(Self { docker })
    }

    /// Wrap a pre-configured bollard client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// Pull `image` unless it is already in local storage.
    async fn pull_if_absent(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            tracing::debug!(image = %image, "image already present, skipping pull");
            return Ok(());
        }

        tracing::info!(image = %image, "pulling image");

        let options = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            match progress {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::debug!(status = %status, "pull progress");
                    }
                }
                Err(e) => {
                    return Err(AgentError::PullFailed {
                        image: image.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(image = %image, "image pulled successfully");
        Ok(())
    }
}

/// Initial resource limits for `docker run`, mirroring what `update` later
/// writes through the cgroup layer.
fn host_config(resources: &Resources) -> HostConfig {
    HostConfig {
        cpu_shares: resources.cpus.map(|cpus| cpu_shares(cpus) as i64),
        memory: resources
            .mem_bytes
            .map(|mem| mem.max(MIN_MEMORY_BYTES) as i64),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl Runtime for DockerRuntime {
    #[instrument(skip(self, command, env), fields(container = %name, image = %image))]
    async fn run(
        &self,
        image: &str,
        command: &str,
        name: &str,
        resources: &Resources,
        env: &HashMap<String, String>,
    ) -> Result<()> {
        self.pull_if_absent(image).await?;

        let env: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let body = ContainerCreateBody {
            image: Some(image.to_string()),
            cmd: if command.is_empty() {
                None
            } else {
                Some(vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    command.to_string(),
                ])
            },
            env: if env.is_empty() { None } else { Some(env) },
            host_config: Some(host_config(resources)),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: Some(name.to_string()),
            platform: String::new(),
        };

        tracing::info!(container = %name, image = %image, "creating container");

        self.docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| AgentError::RunFailed {
                name: name.to_string(),
                reason: format!("create failed: {e}"),
            })?;

        self.docker
            .start_container(name, None::<StartContainerOptions>)
            .await
            .map_err(|e| AgentError::RunFailed {
                name: name.to_string(),
                reason: format!("start failed: {e}"),
            })?;

        tracing::info!(container = %name, "container started");
        Ok(())
    }

    #[instrument(skip(self), fields(container = %name))]
    async fn kill(&self, name: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(|e| AgentError::KillFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(container = %name, "container removed");
        Ok(())
    }

    #[instrument(skip(self), fields(container = %name))]
    async fn inspect(&self, name: &str) -> Result<ContainerInfo> {
        let inspected = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(|e| AgentError::InspectFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        // A pid of 0 means the container is not running.
        let pid = inspected
            .state
            .and_then(|state| state.pid)
            .and_then(|pid| if pid > 0 { Some(pid as i32) } else { None });

        let info = ContainerInfo {
            id: inspected.id.unwrap_or_default(),
            name: inspected.name.unwrap_or_else(|| name.to_string()),
            pid,
        };

        tracing::debug!(container = %name, pid = ?info.pid, "inspected container");
        Ok(info)
    }

    #[instrument(skip(self))]
    async fn ps(&self, all: bool, name_prefix: &str) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions {
            all,
            ..Default::default()
        };

        let listed = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| AgentError::ListFailed(e.to_string()))?;

        let mut containers = Vec::new();
        for summary in listed {
            let Some(name) = summary
                .names
                .as_ref()
                .and_then(|names| names.first())
                .cloned()
            else {
                continue;
            };
            if !name.trim_start_matches('/').starts_with(name_prefix) {
                continue;
            }
            containers.push(ContainerInfo {
                id: summary.id.unwrap_or_default(),
                name,
                pid: None,
            });
        }

        tracing::debug!(count = containers.len(), "listed containers");
        Ok(containers)
    }
}
