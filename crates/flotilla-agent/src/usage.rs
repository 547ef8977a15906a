//! Resource usage sampling
//!
//! Builds a [`ResourceStatistics`] snapshot from `/proc`, keyed by a
//! container's root pid. Docker's root process acts as the container's init,
//! so recursive accounting below it covers every process in the container.

use crate::error::{AgentError, Result};
use flotilla_spec::ResourceStatistics;
use procfs::process::{all_processes, Process, Stat};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sample cpu time and resident memory for `root_pid`.
///
/// With `recursive` set, every live descendant of the root is folded into
/// the totals.
pub fn sample(root_pid: i32, recursive: bool) -> Result<ResourceStatistics> {
    let sample_failed = |reason: String| AgentError::Internal(format!(
        "failed to sample usage for pid {root_pid}: {reason}"
    ));

    let root = Process::new(root_pid).map_err(|e| sample_failed(e.to_string()))?;
    let root_stat = root.stat().map_err(|e| sample_failed(e.to_string()))?;

    let mut stats = vec![root_stat];
    if recursive {
        stats.extend(descendants(root_pid));
    }

    let ticks_per_second = procfs::ticks_per_second() as f64;
    let page_size = procfs::page_size();

    let mut user_ticks: u64 = 0;
    let mut system_ticks: u64 = 0;
    let mut rss_pages: u64 = 0;
    for stat in &stats {
        user_ticks += stat.utime;
        system_ticks += stat.stime;
        rss_pages += stat.rss;
    }

    let timestamp_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0);

    Ok(ResourceStatistics {
        timestamp_secs,
        cpus_user_time_secs: user_ticks as f64 / ticks_per_second,
        cpus_system_time_secs: system_ticks as f64 / ticks_per_second,
        mem_rss_bytes: rss_pages * page_size,
        ..Default::default()
    })
}

/// Stats of every live descendant of `root`, found by closing over the ppid
/// relation in a single `/proc` pass. Processes that vanish mid-walk are
/// skipped.
fn descendants(root: i32) -> Vec<Stat> {
    let Ok(processes) = all_processes() else {
        return Vec::new();
    };

    let mut children: HashMap<i32, Vec<Stat>> = HashMap::new();
    for process in processes.flatten() {
        if let Ok(stat) = process.stat() {
            if stat.pid != root {
                children.entry(stat.ppid).or_default().push(stat);
            }
        }
    }

    let mut found = Vec::new();
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        if let Some(stats) = children.remove(&parent) {
            frontier.extend(stats.iter().map(|stat| stat.pid));
            found.extend(stats);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_of_our_own_process_is_nonzero() {
        let pid = std::process::id() as i32;
        let statistics = sample(pid, false).unwrap();

        assert!(statistics.timestamp_secs > 0.0);
        assert!(statistics.mem_rss_bytes > 0);
        assert!(statistics.cpus_limit.is_none());
        assert!(statistics.mem_limit_bytes.is_none());
    }

    #[test]
    fn recursive_sample_includes_a_live_child() {
        let pid = std::process::id() as i32;
        let mut child = std::process::Command::new("sleep")
            .arg("10")
            .spawn()
            .unwrap();

        let flat = sample(pid, false).unwrap();
        let recursive = sample(pid, true).unwrap();
        assert!(recursive.mem_rss_bytes >= flat.mem_rss_bytes);

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn sample_of_a_dead_pid_fails() {
        // Fork and reap a child so its pid is known-dead.
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();

        assert!(sample(pid, true).is_err());
    }
}
