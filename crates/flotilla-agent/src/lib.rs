//! Flotilla Agent - Docker container supervisor
//!
//! Launches, tracks, resource-limits, and tears down the containers a
//! cluster node runs on behalf of frameworks. The supervisor survives agent
//! restarts by replaying checkpointed pids and sweeping the Docker daemon
//! for containers it no longer accounts for.

pub mod cgroups;
pub mod checkpoint;
pub mod env;
pub mod error;
pub mod naming;
pub mod reaper;
pub mod runtime;
pub mod runtimes;
pub mod stub;
pub mod supervisor;

#[cfg(target_os = "linux")]
pub mod usage;

pub use error::*;
pub use naming::{container_name, parse_container_name, CONTAINER_NAME_PREFIX};
pub use reaper::{MockReaper, Reaper, SystemReaper};
pub use runtime::{ContainerInfo, MockRuntime, RunCall, Runtime};
pub use runtimes::DockerRuntime;
pub use supervisor::{DockerSupervisor, SupervisorConfig};
