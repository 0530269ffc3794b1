//! Realtime change events
//!
//! Row changes that clients subscribe to (job progress, phase and batch
//! status changes) are published on the [`EventBus`] and forwarded to SSE
//! clients filtered by project or job id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::status::{BatchStatus, JobStatus, JobType, PhaseStatus};

/// Change event published after a row was written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LitrevEvent {
    /// AI job row changed (status, progress or details)
    JobUpdated {
        job_id: Uuid,
        project_id: Uuid,
        batch_id: Uuid,
        job_type: JobType,
        status: JobStatus,
        /// Percentage complete (0.0 - 100.0)
        progress: f64,
        details: serde_json::Value,
        error_message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    PhaseStatusChanged {
        project_id: Uuid,
        phase_id: Uuid,
        old_status: PhaseStatus,
        new_status: PhaseStatus,
        timestamp: DateTime<Utc>,
    },

    BatchStatusChanged {
        project_id: Uuid,
        phase_id: Uuid,
        batch_id: Uuid,
        old_status: BatchStatus,
        new_status: BatchStatus,
        timestamp: DateTime<Utc>,
    },
}

impl LitrevEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            LitrevEvent::JobUpdated { .. } => "JobUpdated",
            LitrevEvent::PhaseStatusChanged { .. } => "PhaseStatusChanged",
            LitrevEvent::BatchStatusChanged { .. } => "BatchStatusChanged",
        }
    }

    pub fn project_id(&self) -> Uuid {
        match self {
            LitrevEvent::JobUpdated { project_id, .. }
            | LitrevEvent::PhaseStatusChanged { project_id, .. }
            | LitrevEvent::BatchStatusChanged { project_id, .. } => *project_id,
        }
    }

    /// Job id for job events, `None` otherwise
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            LitrevEvent::JobUpdated { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// True for a job event carrying a terminal status
    pub fn is_terminal_job_update(&self) -> bool {
        matches!(self, LitrevEvent::JobUpdated { status, .. } if status.is_terminal())
    }
}

/// Broadcast bus for [`LitrevEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LitrevEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers that fall more than `capacity` events behind miss
    /// the oldest events (`RecvError::Lagged`).
    ///
    /// # Examples
    ///
    /// ```
    /// use litrev_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(1000);
    /// assert_eq!(event_bus.capacity(), 1000);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LitrevEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LitrevEvent,
    ) -> Result<usize, broadcast::error::SendError<LitrevEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LitrevEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_event(status: JobStatus) -> LitrevEvent {
        LitrevEvent::JobUpdated {
            job_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            job_type: JobType::Translation,
            status,
            progress: 50.0,
            details: serde_json::json!({"processed": 1, "total": 2}),
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = job_event(JobStatus::Running);
        let job_id = event.job_id();
        assert_eq!(bus.emit(event).unwrap(), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id(), job_id);
        assert_eq!(received.event_type(), "JobUpdated");
    }

    #[test]
    fn test_emit_without_subscribers_fails_but_lossy_does_not() {
        let bus = EventBus::new(4);
        assert!(bus.emit(job_event(JobStatus::Queued)).is_err());
        bus.emit_lossy(job_event(JobStatus::Queued));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_terminal_job_update_detection() {
        assert!(job_event(JobStatus::Completed).is_terminal_job_update());
        assert!(job_event(JobStatus::Failed).is_terminal_job_update());
        assert!(!job_event(JobStatus::Running).is_terminal_job_update());

        let phase_event = LitrevEvent::PhaseStatusChanged {
            project_id: Uuid::new_v4(),
            phase_id: Uuid::new_v4(),
            old_status: PhaseStatus::Inactive,
            new_status: PhaseStatus::Active,
            timestamp: Utc::now(),
        };
        assert!(!phase_event.is_terminal_job_update());
        assert_eq!(phase_event.job_id(), None);
    }

    #[test]
    fn test_serialization_is_tagged() {
        let json = serde_json::to_value(job_event(JobStatus::Running)).unwrap();
        assert_eq!(json["type"], "JobUpdated");
        assert_eq!(json["status"], "running");
        assert_eq!(json["job_type"], "translation");
    }
}
