//! cgroup v1 resource control
//!
//! The supervisor adjusts a running container's cpu and memory allocation by
//! writing the v1 control files of whatever cgroup Docker placed the
//! container's root process in. Hierarchy discovery goes through
//! `/proc/mounts`; the pid-to-cgroup mapping through `/proc/<pid>/cgroup`.
//! Control files may also be written by other tools on the host; every write
//! here is best-effort and no lock is held across a read/write pair.

use crate::error::{AgentError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// cpu.shares granted per whole cpu of allocation.
pub const CPU_SHARES_PER_CPU: u64 = 1024;

/// Kernel floor for cpu.shares.
pub const MIN_CPU_SHARES: u64 = 2;

/// Floor for the memory limits written by the supervisor.
pub const MIN_MEMORY_BYTES: u64 = 32 * 1024 * 1024;

/// cpu.shares for a fractional cpu allocation.
pub fn cpu_shares(cpus: f64) -> u64 {
    ((CPU_SHARES_PER_CPU as f64 * cpus) as u64).max(MIN_CPU_SHARES)
}

fn hierarchy_cache() -> &'static Mutex<HashMap<String, Option<PathBuf>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Option<PathBuf>>>> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

/// Mount point of the v1 hierarchy carrying `subsystem`, if any.
///
/// Successful lookups are cached for the process lifetime; errors are not,
/// so a transient read failure does not pin the answer.
#[cfg(target_os = "linux")]
pub fn hierarchy(subsystem: &str) -> Result<Option<PathBuf>> {
    if let Some(found) = hierarchy_cache().lock().unwrap().get(subsystem) {
        return Ok(found.clone());
    }

    let mounts = std::fs::read_to_string("/proc/mounts")
        .map_err(|e| AgentError::Cgroup(format!("failed to read /proc/mounts: {e}")))?;
    let found = parse_hierarchy(&mounts, subsystem);

    hierarchy_cache()
        .lock()
        .unwrap()
        .insert(subsystem.to_string(), found.clone());
    Ok(found)
}

#[cfg(not(target_os = "linux"))]
pub fn hierarchy(_subsystem: &str) -> Result<Option<PathBuf>> {
    let _ = hierarchy_cache();
    Ok(None)
}

/// Pick the mount point of the `cgroup` filesystem whose options name
/// `subsystem`.
fn parse_hierarchy(mounts: &str, subsystem: &str) -> Option<PathBuf> {
    for line in mounts.lines() {
        // <device> <mountpoint> <fstype> <options> <dump> <pass>
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[2] != "cgroup" {
            continue;
        }
        if fields[3].split(',').any(|option| option == subsystem) {
            return Some(PathBuf::from(fields[1]));
        }
    }
    None
}

/// Relative cgroup of `pid` in the hierarchy carrying `subsystem`.
#[cfg(target_os = "linux")]
fn cgroup_of(pid: i32, subsystem: &str) -> Result<Option<String>> {
    let contents = std::fs::read_to_string(format!("/proc/{pid}/cgroup"))
        .map_err(|e| AgentError::Cgroup(format!("failed to read /proc/{pid}/cgroup: {e}")))?;
    Ok(parse_cgroup(&contents, subsystem))
}

/// cgroup of `pid` for the `cpu` subsystem.
#[cfg(target_os = "linux")]
pub fn cpu_cgroup(pid: i32) -> Result<Option<String>> {
    cgroup_of(pid, "cpu")
}

/// cgroup of `pid` for the `memory` subsystem.
#[cfg(target_os = "linux")]
pub fn memory_cgroup(pid: i32) -> Result<Option<String>> {
    cgroup_of(pid, "memory")
}

/// Pick the relative cgroup path out of `/proc/<pid>/cgroup` contents.
fn parse_cgroup(contents: &str, subsystem: &str) -> Option<String> {
    for line in contents.lines() {
        // <hierarchy-id>:<subsystems>:<path>
        let mut parts = line.splitn(3, ':');
        let (_id, subsystems, path) = (parts.next()?, parts.next()?, parts.next()?);
        if subsystems.split(',').any(|s| s == subsystem) {
            return Some(path.trim_start_matches('/').to_string());
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn control_path(hierarchy: &Path, cgroup: &str, control: &str) -> PathBuf {
    hierarchy.join(cgroup).join(control)
}

#[cfg(target_os = "linux")]
fn write_control(hierarchy: &Path, cgroup: &str, control: &str, value: &str) -> Result<()> {
    let path = control_path(hierarchy, cgroup, control);
    std::fs::write(&path, value)
        .map_err(|e| AgentError::Cgroup(format!("failed to write '{}': {e}", path.display())))
}

#[cfg(target_os = "linux")]
fn read_control(hierarchy: &Path, cgroup: &str, control: &str) -> Result<String> {
    let path = control_path(hierarchy, cgroup, control);
    std::fs::read_to_string(&path)
        .map_err(|e| AgentError::Cgroup(format!("failed to read '{}': {e}", path.display())))
}

/// cpu subsystem control files.
#[cfg(target_os = "linux")]
pub mod cpu {
    use super::*;

    pub fn write_shares(hierarchy: &Path, cgroup: &str, shares: u64) -> Result<()> {
        write_control(hierarchy, cgroup, "cpu.shares", &shares.to_string())
    }
}

/// memory subsystem control files.
#[cfg(target_os = "linux")]
pub mod memory {
    use super::*;

    pub fn write_soft_limit(hierarchy: &Path, cgroup: &str, bytes: u64) -> Result<()> {
        write_control(
            hierarchy,
            cgroup,
            "memory.soft_limit_in_bytes",
            &bytes.to_string(),
        )
    }

    pub fn read_hard_limit(hierarchy: &Path, cgroup: &str) -> Result<u64> {
        let contents = read_control(hierarchy, cgroup, "memory.limit_in_bytes")?;
        contents.trim().parse().map_err(|_| {
            AgentError::Cgroup(format!(
                "unparseable 'memory.limit_in_bytes' value '{}'",
                contents.trim()
            ))
        })
    }

    pub fn write_hard_limit(hierarchy: &Path, cgroup: &str, bytes: u64) -> Result<()> {
        write_control(
            hierarchy,
            cgroup,
            "memory.limit_in_bytes",
            &bytes.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_shares_scales_per_cpu() {
        assert_eq!(cpu_shares(4.0), 4096);
        assert_eq!(cpu_shares(1.0), 1024);
        assert_eq!(cpu_shares(0.5), 512);
    }

    #[test]
    fn cpu_shares_has_a_kernel_floor() {
        assert_eq!(cpu_shares(0.0), MIN_CPU_SHARES);
        assert_eq!(cpu_shares(0.001), MIN_CPU_SHARES);
    }

    #[test]
    fn parse_hierarchy_matches_the_subsystem_option() {
        let mounts = "\
sysfs /sys sysfs rw,nosuid 0 0
cgroup /sys/fs/cgroup/cpu,cpuacct cgroup rw,nosuid,cpu,cpuacct 0 0
cgroup /sys/fs/cgroup/memory cgroup rw,nosuid,memory 0 0
cgroup2 /sys/fs/cgroup/unified cgroup2 rw,nosuid 0 0
";
        assert_eq!(
            parse_hierarchy(mounts, "cpu"),
            Some(PathBuf::from("/sys/fs/cgroup/cpu,cpuacct"))
        );
        assert_eq!(
            parse_hierarchy(mounts, "memory"),
            Some(PathBuf::from("/sys/fs/cgroup/memory"))
        );
        assert_eq!(parse_hierarchy(mounts, "freezer"), None);
    }

    #[test]
    fn parse_hierarchy_ignores_cgroup2_mounts() {
        let mounts = "cgroup2 /sys/fs/cgroup cgroup2 rw,nosuid,cpu 0 0\n";
        assert_eq!(parse_hierarchy(mounts, "cpu"), None);
    }

    #[test]
    fn parse_cgroup_returns_the_relative_path() {
        let contents = "\
11:memory:/docker/0123abcd
4:cpu,cpuacct:/docker/0123abcd
1:name=systemd:/init.scope
";
        assert_eq!(
            parse_cgroup(contents, "cpu"),
            Some("docker/0123abcd".to_string())
        );
        assert_eq!(
            parse_cgroup(contents, "memory"),
            Some("docker/0123abcd".to_string())
        );
        assert_eq!(parse_cgroup(contents, "blkio"), None);
    }

    #[test]
    fn parse_cgroup_of_root_cgroup_is_empty() {
        assert_eq!(parse_cgroup("4:cpu:/\n", "cpu"), Some(String::new()));
    }
}
