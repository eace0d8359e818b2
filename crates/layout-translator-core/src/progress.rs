//! Per-task progress registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Opaque handle for a translation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// A fresh random id (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a translation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Started,
    Extracting,
    Translating,
    Reassembling,
    Completed,
    Failed,
}

impl TaskState {
    /// Status string reported to pollers.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Extracting => "extracting",
            Self::Translating => "translating",
            Self::Reassembling => "reassembling",
            Self::Completed => "completed",
            Self::Failed => "error",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a poller sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub status: String,
}

impl ProgressSnapshot {
    pub fn pending() -> Self {
        Self {
            percent: 0,
            status: "pending".to_string(),
        }
    }
}

/// Registry entry for one task.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub task_id: TaskId,
    pub percent: u8,
    pub state: TaskState,
    pub label: String,
    pub created_at: Instant,
    pub finished_at: Option<Instant>,
}

impl TaskProgress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            percent: self.percent,
            status: self.label.clone(),
        }
    }
}

/// Thread-safe task registry.
///
/// One mutex guards the whole map. Percent never goes down while a task
/// runs; once a task is completed or failed, further updates are ignored.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    tasks: Arc<Mutex<HashMap<TaskId, TaskProgress>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, TaskProgress>> {
        // A panicking writer cannot leave an entry half-updated
        self.tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a task at 0% in the `Started` state.
    pub fn start(&self, task_id: &TaskId) {
        let now = Instant::now();
        self.lock().insert(
            task_id.clone(),
            TaskProgress {
                task_id: task_id.clone(),
                percent: 0,
                state: TaskState::Started,
                label: TaskState::Started.label().to_string(),
                created_at: now,
                finished_at: None,
            },
        );
    }

    /// Record progress. Percent is clamped to 100 and never lowered.
    pub fn update(&self, task_id: &TaskId, percent: u8, state: TaskState) {
        let now = Instant::now();
        let mut tasks = self.lock();
        let entry = tasks.entry(task_id.clone()).or_insert_with(|| TaskProgress {
            task_id: task_id.clone(),
            percent: 0,
            state: TaskState::Started,
            label: TaskState::Started.label().to_string(),
            created_at: now,
            finished_at: None,
        });

        if entry.state.is_terminal() {
            return;
        }

        entry.percent = entry.percent.max(percent.min(100));
        entry.state = state;
        entry.label = state.label().to_string();
        if state.is_terminal() {
            entry.finished_at = Some(now);
        }
    }

    /// Mark a task failed: percent back to 0, status `label`.
    pub fn fail(&self, task_id: &TaskId, label: &str) {
        let now = Instant::now();
        let mut tasks = self.lock();
        let entry = tasks.entry(task_id.clone()).or_insert_with(|| TaskProgress {
            task_id: task_id.clone(),
            percent: 0,
            state: TaskState::Failed,
            label: String::new(),
            created_at: now,
            finished_at: None,
        });

        if entry.state == TaskState::Completed {
            return;
        }

        entry.percent = 0;
        entry.state = TaskState::Failed;
        entry.label = label.to_string();
        entry.finished_at = Some(now);
    }

    /// Current progress, `{0, "pending"}` for unknown ids.
    pub fn read(&self, task_id: &TaskId) -> ProgressSnapshot {
        self.lock()
            .get(task_id)
            .map_or_else(ProgressSnapshot::pending, TaskProgress::snapshot)
    }

    pub fn get(&self, task_id: &TaskId) -> Option<TaskProgress> {
        self.lock().get(task_id).cloned()
    }

    pub fn remove(&self, task_id: &TaskId) -> Option<TaskProgress> {
        self.lock().remove(task_id)
    }

    /// Drop finished tasks older than `max_age`, returning their ids.
    pub fn evict_finished(&self, max_age: Duration) -> Vec<TaskId> {
        let now = Instant::now();
        let mut evicted = Vec::new();

        self.lock().retain(|id, task| {
            let keep = task
                .finished_at
                .is_none_or(|finished| now.duration_since(finished) < max_age);
            if !keep {
                evicted.push(id.clone());
            }
            keep
        });

        if !evicted.is_empty() {
            debug!("Evicted {} finished tasks", evicted.len());
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_task_reads_pending() {
        let tracker = ProgressTracker::new();
        let id = TaskId::from("nope");
        assert_eq!(tracker.read(&id), ProgressSnapshot::pending());
        assert!(tracker.get(&id).is_none());
    }

    #[test]
    fn test_task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_eq!(TaskId::new().as_str().len(), 36);
    }

    #[test]
    fn test_percent_never_decreases() {
        let tracker = ProgressTracker::new();
        let id = TaskId::new();
        tracker.start(&id);

        tracker.update(&id, 66, TaskState::Translating);
        tracker.update(&id, 33, TaskState::Translating);
        assert_eq!(tracker.read(&id).percent, 66);

        tracker.update(&id, 250, TaskState::Translating);
        assert_eq!(tracker.read(&id).percent, 100);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let tracker = ProgressTracker::new();
        let id = TaskId::new();
        tracker.start(&id);
        tracker.update(&id, 100, TaskState::Completed);
        tracker.update(&id, 10, TaskState::Translating);
        tracker.fail(&id, "error");

        let snap = tracker.read(&id);
        assert_eq!(snap.percent, 100);
        assert_eq!(snap.status, "completed");
    }

    #[test]
    fn test_fail_resets_percent() {
        let tracker = ProgressTracker::new();
        let id = TaskId::new();
        tracker.start(&id);
        tracker.update(&id, 66, TaskState::Translating);
        tracker.fail(&id, TaskState::Failed.label());

        assert_eq!(
            tracker.read(&id),
            ProgressSnapshot {
                percent: 0,
                status: "error".to_string()
            }
        );
        tracker.update(&id, 100, TaskState::Completed);
        assert_eq!(tracker.read(&id).percent, 0);
    }

    #[test]
    fn test_evict_finished_keeps_running_tasks() {
        let tracker = ProgressTracker::new();
        let running = TaskId::new();
        let done = TaskId::new();
        tracker.start(&running);
        tracker.start(&done);
        tracker.update(&done, 100, TaskState::Completed);

        assert!(tracker.evict_finished(Duration::from_secs(3600)).is_empty());
        let evicted = tracker.evict_finished(Duration::ZERO);
        assert_eq!(evicted, vec![done]);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.get(&running).is_some());
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = ProgressTracker::new();
        let id = TaskId::new();
        tracker.start(&id);

        std::thread::scope(|s| {
            for p in 1..=8u8 {
                let tracker = tracker.clone();
                let id = id.clone();
                s.spawn(move || tracker.update(&id, p * 10, TaskState::Translating));
            }
        });

        assert_eq!(tracker.read(&id).percent, 80);
    }
}
