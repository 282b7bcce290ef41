//! Background job persistence
//!
//! Jobs are persisted so progress survives page reloads and the job history
//! can be listed. Rows left `running` by a crashed process are failed on the
//! next startup.

use alumni_common::db::{Job, JobKind, JobState};
use alumni_common::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;

const JOB_COLUMNS: &str =
    "id, kind, state, total, processed, succeeded, failed, error, requested_by, started_at, ended_at";

pub async fn insert_job(pool: &SqlitePool, job: &Job) -> Result<()> {
    sqlx::query(
        "INSERT INTO jobs (id, kind, state, total, processed, succeeded, failed, error,
             requested_by, started_at, ended_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&job.id)
    .bind(job.kind)
    .bind(job.state)
    .bind(job.total)
    .bind(job.processed)
    .bind(job.succeeded)
    .bind(job.failed)
    .bind(&job.error)
    .bind(&job.requested_by)
    .bind(job.started_at)
    .bind(job.ended_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Persist counters of a running job
pub async fn save_progress(pool: &SqlitePool, job: &Job) -> Result<()> {
    sqlx::query("UPDATE jobs SET processed = ?, succeeded = ?, failed = ? WHERE id = ?")
        .bind(job.processed)
        .bind(job.succeeded)
        .bind(job.failed)
        .bind(&job.id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Persist the terminal state, final counters and error of a job
pub async fn finish_job(pool: &SqlitePool, job: &Job) -> Result<()> {
    sqlx::query(
        "UPDATE jobs SET state = ?, processed = ?, succeeded = ?, failed = ?, error = ?,
             ended_at = ?
         WHERE id = ?",
    )
    .bind(job.state)
    .bind(job.processed)
    .bind(job.succeeded)
    .bind(job.failed)
    .bind(&job.error)
    .bind(job.ended_at.unwrap_or_else(Utc::now))
    .bind(&job.id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_job(pool: &SqlitePool, id: &str) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// Most recent jobs first, optionally restricted to one kind
pub async fn list_jobs(pool: &SqlitePool, kind: Option<JobKind>, limit: i64) -> Result<Vec<Job>> {
    let jobs = match kind {
        Some(kind) => {
            sqlx::query_as::<_, Job>(&format!(
                "SELECT {} FROM jobs WHERE kind = ? ORDER BY started_at DESC LIMIT ?",
                JOB_COLUMNS
            ))
            .bind(kind)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Job>(&format!(
                "SELECT {} FROM jobs ORDER BY started_at DESC LIMIT ?",
                JOB_COLUMNS
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(jobs)
}

/// Fail every job still marked running (call once at startup)
pub async fn fail_interrupted_jobs(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE jobs SET state = ?, error = 'Interrupted by server restart', ended_at = ?
         WHERE state = ?",
    )
    .bind(JobState::Failed)
    .bind(Utc::now())
    .bind(JobState::Running)
    .execute(pool)
    .await?;

    let count = result.rows_affected();
    if count > 0 {
        warn!("Marked {} interrupted job(s) as failed", count);
    }
    Ok(count)
}
