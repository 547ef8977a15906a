//! Process reaping
//!
//! A reap observes a pid's termination exactly once. Processes the agent did
//! not fork (Docker container roots, executors recovered after a restart)
//! cannot surface an exit code, so their reap resolves with `None` once the
//! pid is gone. Stub executors forked by the supervisor itself are awaited
//! through their [`tokio::process::Child`] handle instead, which does carry
//! the real exit code.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

/// Interval between liveness probes of a foreign pid.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Observe a pid's termination exactly once.
#[async_trait::async_trait]
pub trait Reaper: Send + Sync {
    /// Resolve once `pid` has terminated, with its exit code when
    /// observable.
    async fn reap(&self, pid: i32) -> Option<i32>;
}

/// Polls the kernel for pid liveness with signal 0.
pub struct SystemReaper {
    poll_interval: Duration,
}

impl SystemReaper {
    pub fn new() -> Self {
        Self {
            poll_interval: REAP_POLL_INTERVAL,
        }
    }

    pub fn with_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for SystemReaper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Reaper for SystemReaper {
    async fn reap(&self, pid: i32) -> Option<i32> {
        loop {
            if !pid_is_alive(pid) {
                return None;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Probe `pid` with signal 0. EPERM still means the process exists.
#[cfg(unix)]
fn pid_is_alive(pid: i32) -> bool {
    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: i32) -> bool {
    false
}

#[derive(Default)]
struct MockReaperState {
    /// Already-resolved pids; later reaps return immediately.
    ready: HashMap<i32, Option<i32>>,
    pending: HashMap<i32, Vec<oneshot::Sender<Option<i32>>>>,
}

/// Scripted reaper for tests: a pid resolves when the test says so.
#[derive(Default)]
pub struct MockReaper {
    state: Mutex<MockReaperState>,
}

impl MockReaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every current and future reap of `pid` with `status`.
    pub fn resolve(&self, pid: i32, status: Option<i32>) {
        let senders = {
            let mut state = self.state.lock().unwrap();
            state.ready.insert(pid, status);
            state.pending.remove(&pid)
        };
        for tx in senders.into_iter().flatten() {
            let _ = tx.send(status);
        }
    }
}

#[async_trait::async_trait]
impl Reaper for MockReaper {
    async fn reap(&self, pid: i32) -> Option<i32> {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if let Some(status) = state.ready.get(&pid) {
                return *status;
            }
            let (tx, rx) = oneshot::channel();
            state.pending.entry(pid).or_default().push(tx);
            rx
        };
        rx.await.unwrap_or(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn mock_reaper_resolves_pending_reaps() {
        let reaper = Arc::new(MockReaper::new());
        let pending = {
            let reaper = Arc::clone(&reaper);
            tokio::spawn(async move { reaper.reap(7).await })
        };
        // Give the reap a chance to register before resolving.
        tokio::task::yield_now().await;
        reaper.resolve(7, Some(0));
        assert_eq!(pending.await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn mock_reaper_resolves_later_reaps_immediately() {
        let reaper = MockReaper::new();
        reaper.resolve(9, Some(137));
        assert_eq!(reaper.reap(9).await, Some(137));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_reaper_notices_an_exited_process() {
        // Fork a short-lived child, wait it out of the process table, then
        // confirm the reaper sees the pid as gone.
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();

        let reaper = SystemReaper::with_interval(Duration::from_millis(5));
        let status = tokio::time::timeout(Duration::from_secs(5), reaper.reap(pid))
            .await
            .expect("reap did not resolve");
        assert_eq!(status, None);
    }
}
