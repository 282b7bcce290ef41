//! Bulk email job

use alumni_common::db::{AlumniProfile, DeliveryStatus, EmailLogEntry};
use chrono::Utc;
use governor::{Quota, RateLimiter};
use serde::Serialize;
use sqlx::SqlitePool;
use std::num::NonZeroU32;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::email_log;
use crate::email::{EmailError, EmailProvider, EmailTemplate, OutgoingEmail};
use crate::services::jobs::JobHandle;

/// Profiles that may receive bulk email: non-empty email, not opted out,
/// first occurrence of each address (case-insensitive)
pub fn select_recipients(profiles: Vec<AlumniProfile>) -> Vec<AlumniProfile> {
    let mut seen = std::collections::HashSet::new();
    profiles
        .into_iter()
        .filter(|p| !p.email_opt_out && !p.email.trim().is_empty())
        .filter(|p| seen.insert(p.email.trim().to_lowercase()))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub sent: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Send `template` to every recipient at no more than `per_second` messages
///
/// Per-recipient failures are logged and counted; a rejected API key stops
/// the job since every further attempt would fail the same way.
pub async fn send_bulk(
    pool: &SqlitePool,
    provider: &dyn EmailProvider,
    template: &EmailTemplate,
    from: &str,
    per_second: u32,
    recipients: &[AlumniProfile],
    job: &mut JobHandle,
) -> anyhow::Result<BulkSummary> {
    let quota = Quota::per_second(NonZeroU32::new(per_second.max(1)).unwrap_or(NonZeroU32::MIN));
    let limiter = RateLimiter::direct(quota);
    let token = job.token().clone();
    let mut summary = BulkSummary::default();

    for profile in recipients {
        tokio::select! {
            _ = token.cancelled() => {
                summary.cancelled = true;
                break;
            }
            _ = limiter.until_ready() => {}
        }

        let rendered = template.render_for(profile)?;
        let email = OutgoingEmail {
            from: from.to_string(),
            to: vec![profile.email.trim().to_string()],
            subject: rendered.subject.clone(),
            text: rendered.text,
            html: rendered.html,
        };

        let result = provider.send(&email).await;
        let (status, message_id, error) = match &result {
            Ok(id) => (DeliveryStatus::Sent, Some(id.clone()), None),
            Err(e) => (DeliveryStatus::Failed, None, Some(e.to_string())),
        };

        email_log::insert_entry(
            pool,
            &EmailLogEntry {
                id: Uuid::new_v4().to_string(),
                job_id: job.id().to_string(),
                profile_id: Some(profile.id.clone()),
                recipient: email.to[0].clone(),
                subject: rendered.subject,
                status,
                provider_message_id: message_id,
                error,
                created_at: Utc::now(),
            },
        )
        .await?;

        match result {
            Ok(id) => {
                debug!(profile_id = %profile.id, message_id = %id, "Email sent");
                summary.sent += 1;
                job.record(true).await?;
            }
            Err(EmailError::Unauthorized) => {
                job.record(false).await?;
                anyhow::bail!(EmailError::Unauthorized);
            }
            Err(e) => {
                warn!(profile_id = %profile.id, error = %e, "Email delivery failed");
                summary.failed += 1;
                job.record(false).await?;
            }
        }
    }

    Ok(summary)
}
