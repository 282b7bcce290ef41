//! Event types and broadcast bus
//!
//! Background jobs publish progress through the [`EventBus`]; the admin SSE
//! endpoint forwards every event to connected consoles.

use crate::db::{GeocodeStatus, JobKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// Background job accepted and running
    JobStarted {
        job_id: String,
        kind: JobKind,
        total: i64,
        timestamp: DateTime<Utc>,
    },

    /// Periodic progress of a running job
    JobProgress {
        job_id: String,
        kind: JobKind,
        processed: i64,
        total: i64,
        succeeded: i64,
        failed: i64,
        timestamp: DateTime<Utc>,
    },

    /// Job processed every item
    JobCompleted {
        job_id: String,
        kind: JobKind,
        succeeded: i64,
        failed: i64,
        timestamp: DateTime<Utc>,
    },

    /// Job stopped on an error
    JobFailed {
        job_id: String,
        kind: JobKind,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Job stopped on request
    JobCancelled {
        job_id: String,
        kind: JobKind,
        processed: i64,
        timestamp: DateTime<Utc>,
    },

    /// A profile's geocode status changed
    ProfileGeocoded {
        profile_id: String,
        status: GeocodeStatus,
        latitude: Option<f64>,
        longitude: Option<f64>,
        timestamp: DateTime<Utc>,
    },
}

impl AppEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            AppEvent::JobStarted { .. } => "JobStarted",
            AppEvent::JobProgress { .. } => "JobProgress",
            AppEvent::JobCompleted { .. } => "JobCompleted",
            AppEvent::JobFailed { .. } => "JobFailed",
            AppEvent::JobCancelled { .. } => "JobCancelled",
            AppEvent::ProfileGeocoded { .. } => "ProfileGeocoded",
        }
    }

    /// Job id for job lifecycle events
    pub fn job_id(&self) -> Option<&str> {
        match self {
            AppEvent::JobStarted { job_id, .. }
            | AppEvent::JobProgress { job_id, .. }
            | AppEvent::JobCompleted { job_id, .. }
            | AppEvent::JobFailed { job_id, .. }
            | AppEvent::JobCancelled { job_id, .. } => Some(job_id),
            AppEvent::ProfileGeocoded { .. } => None,
        }
    }
}

/// Broadcast channel for [`AppEvent`]s
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` when nobody is listening
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: AppEvent) -> Result<usize, broadcast::error::SendError<AppEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the absence of subscribers
    pub fn emit_lossy(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
