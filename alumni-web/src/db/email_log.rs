//! Per-recipient delivery log for bulk email jobs

use alumni_common::db::EmailLogEntry;
use alumni_common::Result;
use sqlx::SqlitePool;

pub async fn insert_entry(pool: &SqlitePool, entry: &EmailLogEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO email_log (id, job_id, profile_id, recipient, subject, status,
             provider_message_id, error, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.job_id)
    .bind(&entry.profile_id)
    .bind(&entry.recipient)
    .bind(&entry.subject)
    .bind(entry.status)
    .bind(&entry.provider_message_id)
    .bind(&entry.error)
    .bind(entry.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Newest entries first
pub async fn list_entries(
    pool: &SqlitePool,
    job_id: Option<&str>,
    limit: i64,
) -> Result<Vec<EmailLogEntry>> {
    let entries = sqlx::query_as::<_, EmailLogEntry>(
        "SELECT id, job_id, profile_id, recipient, subject, status, provider_message_id, error,
             created_at
         FROM email_log
         WHERE (? IS NULL OR job_id = ?)
         ORDER BY created_at DESC, id DESC
         LIMIT ?",
    )
    .bind(job_id)
    .bind(job_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}
