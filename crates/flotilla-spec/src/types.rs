//! Core descriptor types
//!
//! Identifiers are opaque strings assigned by the coordinator; the agent
//! never interprets them beyond equality and display.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Identity of a container for the lifetime of the node agent.
    ///
    /// Assigned by the caller when a task or executor is launched; the agent
    /// keys all of its container bookkeeping on this value.
    ContainerId
}

string_id! {
    /// Identity of a framework registered with the coordinator.
    FrameworkId
}

string_id! {
    /// Identity of an executor within a framework.
    ExecutorId
}

string_id! {
    /// Identity of a single task.
    TaskId
}

string_id! {
    /// Identity of a cluster node (one agent per node).
    NodeId
}

/// Container placement of a command: the image it wants to run in.
///
/// Images carrying the `docker:///` scheme are handled by the Docker
/// supervisor; any other scheme belongs to a different containerizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerBlock {
    pub image: String,
}

/// Shell command a task or executor runs, with optional container placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The command line, interpreted by `/bin/sh -c`.
    pub value: String,
    /// Extra environment handed to the command.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,
    /// Container block, when the command should run inside one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerBlock>,
}

/// Executor descriptor supplied by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorDescriptor {
    pub executor_id: ExecutorId,
    pub framework_id: FrameworkId,
    pub command: CommandSpec,
    #[serde(default)]
    pub resources: Resources,
}

/// A single unit of work scheduled onto a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub name: String,
    /// Command to run; tasks without one are launched through their
    /// executor instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
    #[serde(default)]
    pub resources: Resources,
}

/// Requested cpu/memory allocation for a container.
///
/// Only the dimensions the supervisor enforces; both are optional because
/// updates may adjust one without restating the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// Fractional cpus (1.0 equals one core's worth of shares).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    /// Memory allocation in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_bytes: Option<u64>,
}

impl Resources {
    pub fn new(cpus: Option<f64>, mem_bytes: Option<u64>) -> Self {
        Self { cpus, mem_bytes }
    }

    /// True when no enforceable dimension is present.
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.mem_bytes.is_none()
    }
}

/// Final record of a container's life, published exactly once via `wait`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    /// True when destruction was caller-initiated; false when the agent
    /// observed the tracked process exit on its own.
    pub killed: bool,
    /// Exit code of the tracked pid, when observable.
    pub status: Option<i32>,
    /// Human-readable cause.
    pub message: String,
}

/// Point-in-time resource usage snapshot for one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatistics {
    /// Wall-clock sample time, seconds since the Unix epoch.
    pub timestamp_secs: f64,
    pub cpus_user_time_secs: f64,
    pub cpus_system_time_secs: f64,
    /// Configured cpu allocation, merged in from the last launch/update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus_limit: Option<f64>,
    pub mem_rss_bytes: u64,
    /// Configured memory allocation, merged in from the last launch/update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem_limit_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_id_display_is_raw_value() {
        let id = ContainerId::from("c-123");
        assert_eq!(id.to_string(), "c-123");
    }

    #[test]
    fn resources_is_empty() {
        assert!(Resources::default().is_empty());
        assert!(!Resources::new(Some(1.0), None).is_empty());
        assert!(!Resources::new(None, Some(1024)).is_empty());
    }

    #[test]
    fn command_spec_round_trips() {
        let command = CommandSpec {
            value: "./executor --port=5050".to_string(),
            environment: HashMap::from([("LIBPROCESS_PORT".to_string(), "0".to_string())]),
            container: Some(ContainerBlock {
                image: "docker:///busybox".to_string(),
            }),
        };
        let json = serde_json::to_string(&command).unwrap();
        let parsed: CommandSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, command);
    }

    #[test]
    fn command_spec_defaults_are_optional_in_wire_form() {
        let parsed: CommandSpec = serde_json::from_str(r#"{"value": "sleep 1"}"#).unwrap();
        assert_eq!(parsed.value, "sleep 1");
        assert!(parsed.environment.is_empty());
        assert!(parsed.container.is_none());
    }

    #[test]
    fn termination_round_trips() {
        let termination = Termination {
            killed: true,
            status: Some(137),
            message: "Docker task killed".to_string(),
        };
        let json = serde_json::to_string(&termination).unwrap();
        assert_eq!(
            serde_json::from_str::<Termination>(&json).unwrap(),
            termination
        );
    }
}
