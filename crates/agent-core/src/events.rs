//! Task lifecycle events for persistence and reporting layers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use wayfinder_core_types::TaskId;

use crate::agent_loop::types::{Step, TaskFailure, TaskStatus};

/// Immutable snapshot emitted by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    StatusChanged {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<TaskFailure>,
        at: DateTime<Utc>,
    },
    StepRecorded {
        task_id: TaskId,
        step: Step,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskEvent::StatusChanged { task_id, .. } | TaskEvent::StepRecorded { task_id, .. } => {
                task_id
            }
        }
    }
}

#[async_trait]
pub trait TaskObserver: Send + Sync {
    async fn on_event(&self, event: TaskEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl TaskObserver for NoopObserver {
    async fn on_event(&self, _event: TaskEvent) {}
}

/// Forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TaskEvent>,
}

impl ChannelObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TaskObserver for ChannelObserver {
    async fn on_event(&self, event: TaskEvent) {
        if self.tx.send(event).is_err() {
            debug!("task event receiver dropped");
        }
    }
}
