#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! A small registry of the OS threads the driver spawns (spec section 4.G:
//! "spawns one thread to run the reactor"), so that shutdown can join every
//! tracked thread instead of leaking them.

pub mod labels;

use std::thread::JoinHandle;

use labels::{ProcessLabels, TaskLabels};

/// Errors that can occur while joining tracked tasks.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A tracked thread panicked instead of returning normally.
    #[error("task '{task}' panicked")]
    Panicked {
        /// The unique id of the task that panicked.
        task: String,
    },
}

struct Tracked {
    labels: TaskLabels,
    handle: JoinHandle<()>,
}

/// Registers, logs, and joins the OS threads spawned by the driver.
#[derive(Default)]
#[must_use]
pub struct TaskManager {
    process_labels: ProcessLabels,
    tracked: Vec<Tracked>,
}

impl TaskManager {
    /// Creates a new, empty task manager under the given process labels.
    pub fn new(process_labels: ProcessLabels) -> Self {
        Self {
            process_labels,
            tracked: Vec::new(),
        }
    }

    /// Registers a spawned thread so it will be joined by [`TaskManager::join_all`].
    pub fn register(&mut self, handle: JoinHandle<()>, labels: TaskLabels) {
        tracing::info!(
            task_id = %labels.task_id,
            task_cat = %labels.task_cat,
            task_source = %labels.task_source,
            process_id = %self.process_labels.process_id,
            "task registered and started"
        );
        self.tracked.push(Tracked { labels, handle });
    }

    /// Joins every registered thread, in registration order, logging any
    /// panic without aborting the join of the remaining threads.
    pub fn join_all(self) -> Result<(), Error> {
        let mut first_error = None;

        for task in self.tracked {
            let unique_id = task.labels.unique_id();
            match task.handle.join() {
                Ok(()) => {
                    tracing::trace!(task = %unique_id, "task joined cleanly");
                }
                Err(_) => {
                    tracing::error!(task = %unique_id, "task panicked");
                    if first_error.is_none() {
                        first_error = Some(Error::Panicked { task: unique_id });
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn joins_registered_threads() {
        let mut manager = TaskManager::new(ProcessLabels::new("test"));
        let handle = std::thread::spawn(|| {});
        manager.register(handle, TaskLabels::new("test", "t1", "unit-test"));
        assert!(manager.join_all().is_ok());
    }

    #[test]
    fn reports_panics_without_losing_other_joins() {
        let mut manager = TaskManager::new(ProcessLabels::new("test"));
        let panics = std::thread::spawn(|| panic!("boom"));
        let clean = std::thread::spawn(|| {});
        manager.register(panics, TaskLabels::new("test", "panics", "unit-test"));
        manager.register(clean, TaskLabels::new("test", "clean", "unit-test"));
        assert!(manager.join_all().is_err());
    }
}
