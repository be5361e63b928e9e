// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Bounded pool of background waits.
//!
//! Submissions never block or fail: tasks queue on a semaphore sized by the
//! worker budget. Each submission returns a [`TaskHandle`] that can be
//! polled without blocking; [`WorkerPool::drain`] joins everything at
//! shutdown.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use diagnostics::*;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Semaphore;

use crate::Result;

/// Lifecycle of a submitted task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed(String),
}

fn record(state: &Mutex<TaskState>, next: TaskState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Non-blocking view of a submitted task
#[derive(Clone)]
pub struct TaskHandle {
    state: Arc<Mutex<TaskState>>,
    done: Shared<BoxFuture<'static, ()>>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TaskHandle {
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True from submission until the outcome is recorded
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state(), TaskState::Queued | TaskState::Running)
    }

    /// The failure message once the task has failed
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match self.state() {
            TaskState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Wait until the task has recorded its outcome.
    ///
    /// Any number of callers may wait at once.
    pub async fn join(&self) {
        self.done.clone().await;
    }
}

#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    handles: Mutex<Vec<TaskHandle>>,
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "background task panicked".to_string()
    }
}

impl WorkerPool {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Queue a task; its error or panic is captured on the handle
    pub fn submit<F>(&self, label: &str, task: F) -> TaskHandle
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(TaskState::Queued));

        let permits = self.permits.clone();
        let task_state = state.clone();
        let label = label.to_string();
        let join = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                record(&task_state, TaskState::Failed("worker pool closed".to_string()));
                return;
            };
            record(&task_state, TaskState::Running);
            debug!("Background task {label} started", label: label.clone());

            let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => TaskState::Succeeded,
                Ok(Err(e)) => TaskState::Failed(e.to_string()),
                Err(panic) => TaskState::Failed(panic_message(panic.as_ref())),
            };
            if let TaskState::Failed(message) = &outcome {
                debug!("Background task {label} failed: {message}", label: label.clone(), message: message.clone());
            }
            record(&task_state, outcome);
        });

        let joined_state = state.clone();
        let done = async move {
            if let Err(e) = join.await {
                // The body catches panics, so only cancellation lands here
                record(&joined_state, TaskState::Failed(e.to_string()));
            }
        }
        .boxed()
        .shared();

        let handle = TaskHandle { state, done };
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle.clone());
        handle
    }

    /// Number of tasks queued or running
    #[must_use]
    pub fn running(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| h.is_running())
            .count()
    }

    /// Wait for every submitted task to record an outcome
    pub async fn drain(&self) {
        let handles: Vec<TaskHandle> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        debug!("Draining {count} background tasks", count: handles.len());
        for handle in handles {
            handle.join().await;
        }
    }
}
