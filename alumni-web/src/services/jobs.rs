//! Background job registry
//!
//! Tracks the cancellation token of every running admin job. At most one job
//! of each [`JobKind`] runs at a time; the row in `jobs` is created, updated
//! and finished through the [`JobHandle`] returned by [`JobRegistry::start`].
//!
//! Job bodies run under [`JobRegistry::spawn`]: a supervising task awaits the
//! body and finishes the job even when the body panics, and shutdown waits
//! for supervisors so cancelled jobs are recorded as cancelled.

use alumni_common::db::{Job, JobKind, JobState};
use alumni_common::events::{AppEvent, EventBus};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::jobs as job_db;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("A {0} job is already running")]
    AlreadyRunning(&'static str),

    #[error(transparent)]
    Database(#[from] alumni_common::Error),
}

struct RunningJob {
    job_id: String,
    token: CancellationToken,
}

/// Cancellation tokens of running jobs, keyed by kind
#[derive(Clone, Default)]
pub struct JobRegistry {
    running: Arc<RwLock<HashMap<JobKind, RunningJob>>>,
    supervisors: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register and persist a new running job
    pub async fn start(
        &self,
        pool: &SqlitePool,
        event_bus: &EventBus,
        kind: JobKind,
        total: i64,
        requested_by: Option<String>,
    ) -> Result<JobHandle, JobError> {
        let mut running = self.running.write().await;
        if running.contains_key(&kind) {
            return Err(JobError::AlreadyRunning(kind.as_str()));
        }

        let job = Job {
            id: Uuid::new_v4().to_string(),
            kind,
            state: JobState::Running,
            total,
            processed: 0,
            succeeded: 0,
            failed: 0,
            error: None,
            requested_by,
            started_at: Utc::now(),
            ended_at: None,
        };
        job_db::insert_job(pool, &job).await?;

        let token = CancellationToken::new();
        running.insert(
            kind,
            RunningJob {
                job_id: job.id.clone(),
                token: token.clone(),
            },
        );
        drop(running);

        info!(job_id = %job.id, kind = kind.as_str(), total, "Job started");
        event_bus.emit_lossy(AppEvent::JobStarted {
            job_id: job.id.clone(),
            kind,
            total,
            timestamp: job.started_at,
        });

        Ok(JobHandle {
            job,
            token,
            pool: pool.clone(),
            event_bus: event_bus.clone(),
            registry: self.clone(),
        })
    }

    /// Request cancellation; false when no running job has this id
    pub async fn cancel(&self, job_id: &str) -> bool {
        let running = self.running.read().await;
        match running.values().find(|r| r.job_id == job_id) {
            Some(r) => {
                info!(job_id = %job_id, "Cancellation requested");
                r.token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, kind: JobKind) -> bool {
        self.running.read().await.contains_key(&kind)
    }

    /// Cancel every running job (shutdown)
    pub async fn cancel_all(&self) {
        for r in self.running.read().await.values() {
            r.token.cancel();
        }
    }

    /// Run a job body in the background and finish the job with its outcome
    ///
    /// The body gets the handle back to report progress and returns it with
    /// the outcome. If the body panics the job is finished as failed from its
    /// last persisted progress.
    pub async fn spawn<F, Fut>(&self, handle: JobHandle, body: F)
    where
        F: FnOnce(JobHandle) -> Fut + Send + 'static,
        Fut: Future<Output = (JobHandle, anyhow::Result<()>)> + Send + 'static,
    {
        let registry = self.clone();
        let job_id = handle.job.id.clone();
        let kind = handle.job.kind;
        let token = handle.token.clone();
        let pool = handle.pool.clone();
        let event_bus = handle.event_bus.clone();

        let supervisor = tokio::spawn(async move {
            match tokio::spawn(body(handle)).await {
                Ok((handle, outcome)) => {
                    handle.finish(outcome).await;
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Job task aborted");
                    let reason = if e.is_panic() {
                        "Job task panicked"
                    } else {
                        "Job task aborted"
                    };
                    registry
                        .abandon(pool, event_bus, &job_id, kind, token, reason)
                        .await;
                }
            }
        });

        let mut supervisors = self.supervisors.lock().await;
        supervisors.retain(|task| !task.is_finished());
        supervisors.push(supervisor);
    }

    /// Cancel every running job and wait up to `timeout` for each to finish
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel_all().await;

        let supervisors = std::mem::take(&mut *self.supervisors.lock().await);
        if supervisors.is_empty() {
            return;
        }
        info!(count = supervisors.len(), "Waiting for running jobs to stop");
        if tokio::time::timeout(timeout, futures::future::join_all(supervisors))
            .await
            .is_err()
        {
            warn!("Jobs still running at shutdown will be marked interrupted on next start");
        }
    }

    /// Finish a job whose body never returned its handle
    async fn abandon(
        &self,
        pool: SqlitePool,
        event_bus: EventBus,
        job_id: &str,
        kind: JobKind,
        token: CancellationToken,
        reason: &str,
    ) {
        match job_db::get_job(&pool, job_id).await {
            Ok(Some(job)) => {
                let handle = JobHandle {
                    job,
                    token,
                    pool,
                    event_bus,
                    registry: self.clone(),
                };
                handle.finish(Err(anyhow::anyhow!("{}", reason))).await;
            }
            Ok(None) => self.release(kind, job_id).await,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to load abandoned job");
                self.release(kind, job_id).await;
            }
        }
    }

    async fn release(&self, kind: JobKind, job_id: &str) {
        let mut running = self.running.write().await;
        if running.get(&kind).is_some_and(|r| r.job_id == job_id) {
            running.remove(&kind);
        }
    }
}

/// Progress reporting and completion for one running job
pub struct JobHandle {
    job: Job,
    token: CancellationToken,
    pool: SqlitePool,
    event_bus: EventBus,
    registry: JobRegistry,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.job.id
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Count one processed item, persist counters and emit progress
    pub async fn record(&mut self, succeeded: bool) -> alumni_common::Result<()> {
        self.job.processed += 1;
        if succeeded {
            self.job.succeeded += 1;
        } else {
            self.job.failed += 1;
        }

        job_db::save_progress(&self.pool, &self.job).await?;

        self.event_bus.emit_lossy(AppEvent::JobProgress {
            job_id: self.job.id.clone(),
            kind: self.job.kind,
            processed: self.job.processed,
            total: self.job.total,
            succeeded: self.job.succeeded,
            failed: self.job.failed,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Persist the terminal state and release the kind for new jobs
    ///
    /// A cancelled token wins over the outcome; `Err` marks the job failed.
    pub async fn finish(mut self, outcome: anyhow::Result<()>) -> Job {
        let now = Utc::now();
        self.job.ended_at = Some(now);

        let event = if self.token.is_cancelled() {
            self.job.state = JobState::Cancelled;
            info!(job_id = %self.job.id, processed = self.job.processed, "Job cancelled");
            AppEvent::JobCancelled {
                job_id: self.job.id.clone(),
                kind: self.job.kind,
                processed: self.job.processed,
                timestamp: now,
            }
        } else {
            match outcome {
                Ok(()) => {
                    self.job.state = JobState::Completed;
                    info!(
                        job_id = %self.job.id,
                        succeeded = self.job.succeeded,
                        failed = self.job.failed,
                        "Job completed"
                    );
                    AppEvent::JobCompleted {
                        job_id: self.job.id.clone(),
                        kind: self.job.kind,
                        succeeded: self.job.succeeded,
                        failed: self.job.failed,
                        timestamp: now,
                    }
                }
                Err(e) => {
                    self.job.state = JobState::Failed;
                    self.job.error = Some(e.to_string());
                    error!(job_id = %self.job.id, error = %e, "Job failed");
                    AppEvent::JobFailed {
                        job_id: self.job.id.clone(),
                        kind: self.job.kind,
                        error: e.to_string(),
                        timestamp: now,
                    }
                }
            }
        };

        if let Err(e) = job_db::finish_job(&self.pool, &self.job).await {
            warn!(job_id = %self.job.id, error = %e, "Failed to persist job result");
        }
        self.registry.release(self.job.kind, &self.job.id).await;
        self.event_bus.emit_lossy(event);

        self.job
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alumni_common::db::connect_in_memory;

    #[tokio::test]
    async fn test_second_job_of_same_kind_is_refused() {
        let pool = connect_in_memory().await.unwrap();
        let bus = EventBus::new(16);
        let registry = JobRegistry::new();

        let handle = registry
            .start(&pool, &bus, JobKind::Regeocode, 3, None)
            .await
            .unwrap();
        assert!(matches!(
            registry.start(&pool, &bus, JobKind::Regeocode, 3, None).await,
            Err(JobError::AlreadyRunning("regeocode"))
        ));

        // Other kinds are independent
        let email = registry
            .start(&pool, &bus, JobKind::BulkEmail, 1, None)
            .await
            .unwrap();

        handle.finish(Ok(())).await;
        email.finish(Ok(())).await;
        assert!(!registry.is_running(JobKind::Regeocode).await);
        assert!(registry
            .start(&pool, &bus, JobKind::Regeocode, 0, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_progress_and_completion_are_persisted() {
        let pool = connect_in_memory().await.unwrap();
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let registry = JobRegistry::new();

        let mut handle = registry
            .start(&pool, &bus, JobKind::Regeocode, 2, Some("admin-1".to_string()))
            .await
            .unwrap();
        handle.record(true).await.unwrap();
        handle.record(false).await.unwrap();
        let job = handle.finish(Ok(())).await;

        assert_eq!(job.state, JobState::Completed);
        let stored = job_db::get_job(&pool, &job.id).await.unwrap().unwrap();
        assert_eq!((stored.processed, stored.succeeded, stored.failed), (2, 1, 1));
        assert_eq!(stored.state, JobState::Completed);

        let types: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type())
            .collect();
        assert_eq!(
            types,
            vec!["JobStarted", "JobProgress", "JobProgress", "JobCompleted"]
        );
    }

    #[tokio::test]
    async fn test_cancel_marks_job_cancelled() {
        let pool = connect_in_memory().await.unwrap();
        let bus = EventBus::new(16);
        let registry = JobRegistry::new();

        let handle = registry
            .start(&pool, &bus, JobKind::BulkEmail, 5, None)
            .await
            .unwrap();
        assert!(registry.cancel(handle.id()).await);
        assert!(!registry.cancel("unknown").await);
        assert!(handle.is_cancelled());

        let job = handle.finish(Ok(())).await;
        assert_eq!(job.state, JobState::Cancelled);
    }

    async fn wait_until_idle(registry: &JobRegistry, kind: JobKind) {
        for _ in 0..200 {
            if !registry.is_running(kind).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} job never finished", kind.as_str());
    }

    #[tokio::test]
    async fn test_panicking_job_is_failed_and_released() {
        let pool = connect_in_memory().await.unwrap();
        let bus = EventBus::new(16);
        let registry = JobRegistry::new();

        let handle = registry
            .start(&pool, &bus, JobKind::Regeocode, 2, None)
            .await
            .unwrap();
        let job_id = handle.id().to_string();
        registry
            .spawn(handle, |mut handle| async move {
                handle.record(true).await.unwrap();
                if handle.job().processed > 0 {
                    panic!("geocoder exploded");
                }
                (handle, Ok(()))
            })
            .await;

        wait_until_idle(&registry, JobKind::Regeocode).await;
        let stored = job_db::get_job(&pool, &job_id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.error.as_deref(), Some("Job task panicked"));
        assert_eq!(stored.processed, 1);

        // The kind is free again
        assert!(registry
            .start(&pool, &bus, JobKind::Regeocode, 0, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_cancelled_jobs() {
        let pool = connect_in_memory().await.unwrap();
        let bus = EventBus::new(16);
        let registry = JobRegistry::new();

        let handle = registry
            .start(&pool, &bus, JobKind::BulkEmail, 10, None)
            .await
            .unwrap();
        let job_id = handle.id().to_string();
        registry
            .spawn(handle, |handle| async move {
                handle.token().cancelled().await;
                // Recording the outcome takes a moment
                tokio::time::sleep(Duration::from_millis(20)).await;
                (handle, Ok(()))
            })
            .await;

        registry.shutdown(Duration::from_secs(5)).await;

        let stored = job_db::get_job(&pool, &job_id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Cancelled);
        assert!(!registry.is_running(JobKind::BulkEmail).await);
    }

    #[tokio::test]
    async fn test_error_marks_job_failed() {
        let pool = connect_in_memory().await.unwrap();
        let bus = EventBus::new(16);
        let registry = JobRegistry::new();

        let handle = registry
            .start(&pool, &bus, JobKind::Regeocode, 5, None)
            .await
            .unwrap();
        let job = handle.finish(Err(anyhow::anyhow!("token rejected"))).await;
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("token rejected"));
    }
}
