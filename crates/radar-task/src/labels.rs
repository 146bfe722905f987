//! Labels attached to a process or a task for structured logging.

/// Labels identifying the process this binary is running as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLabels {
    /// A short identifier for this process instance.
    pub process_id: String,
}

impl Default for ProcessLabels {
    fn default() -> Self {
        Self {
            process_id: "radar-ingest".to_string(),
        }
    }
}

impl ProcessLabels {
    /// Creates a new `ProcessLabels`.
    pub fn new(process_id: &str) -> Self {
        Self {
            process_id: process_id.into(),
        }
    }
}

/// Labels identifying a single tracked task (here: an OS thread).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLabels {
    /// The category of the task, e.g. `"reactor"` or `"console"`.
    pub task_cat: String,
    /// The id of the task, e.g. the endpoint name it serves.
    pub task_id: String,
    /// Where the task was spawned from.
    pub task_source: String,
}

impl TaskLabels {
    /// Creates a new `TaskLabels`.
    pub fn new(task_cat: &str, task_id: &str, task_source: &str) -> Self {
        Self {
            task_cat: task_cat.into(),
            task_id: task_id.into(),
            task_source: task_source.into(),
        }
    }

    /// A unique string identifying this task.
    pub fn unique_id(&self) -> String {
        format!("{}:{}:{}", self.task_cat, self.task_id, self.task_source)
    }
}
