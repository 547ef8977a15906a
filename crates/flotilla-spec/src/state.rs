//! Recovered node-agent state
//!
//! After a restart the agent's state reader replays the bookkeeping it
//! checkpointed to disk into this snapshot. The container supervisor only
//! consumes the slice it needs to reattach to live containers: which
//! executors were recovered, the latest run of each, and the forked pid that
//! run checkpointed.

use crate::{ContainerId, ExecutorDescriptor, ExecutorId, FrameworkId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything the agent knew before it restarted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub frameworks: HashMap<FrameworkId, FrameworkState>,
}

/// Per-framework slice of the recovered state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworkState {
    #[serde(default)]
    pub executors: HashMap<ExecutorId, ExecutorState>,
}

/// Recovered bookkeeping for one executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorState {
    /// The executor's descriptor; `None` when its checkpoint was missing or
    /// unreadable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ExecutorDescriptor>,
    /// Container id of the executor's most recent run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<ContainerId>,
    #[serde(default)]
    pub runs: HashMap<ContainerId, RunState>,
}

/// Recovered bookkeeping for a single run of an executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ContainerId>,
    /// Pid checkpointed at launch, absent when the agent died before the
    /// checkpoint landed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_pid: Option<i32>,
    /// True once the run's termination was acknowledged upstream.
    #[serde(default)]
    pub completed: bool,
}
