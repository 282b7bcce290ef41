//! Geocoding of stored profiles
//!
//! One routine serves profile saves, the admin re-geocoding job and the
//! `backfill-geocodes` binary.

use alumni_common::db::{AlumniProfile, GeocodeStatus};
use alumni_common::events::{AppEvent, EventBus};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::profiles as profile_db;
use crate::geocode::{geocode_with_fallback, AddressParts, GeocodeError, GeocodeMatch, Geocoder};
use crate::services::jobs::JobHandle;

/// Result of geocoding one profile
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileGeocode {
    /// Status stored (or that would be stored on a dry run)
    pub status: GeocodeStatus,
    pub matched: Option<GeocodeMatch>,
    pub error: Option<GeocodeError>,
    /// The address changed during the lookup; nothing was stored
    pub stale: bool,
}

impl ProfileGeocode {
    /// Provider errors that make further attempts pointless
    pub fn aborts_batch(&self) -> bool {
        self.error.as_ref().is_some_and(GeocodeError::aborts_fallback)
    }
}

/// Map a fallback outcome onto the status stored for the profile
///
/// `Unauthorized` and `Disabled` leave the stored status untouched.
fn classify(result: Result<GeocodeMatch, GeocodeError>) -> ProfileGeocode {
    match result {
        Ok(matched) => ProfileGeocode {
            status: GeocodeStatus::Ok,
            matched: Some(matched),
            error: None,
            stale: false,
        },
        Err(GeocodeError::NoCandidates) => ProfileGeocode {
            status: GeocodeStatus::Skipped,
            matched: None,
            error: Some(GeocodeError::NoCandidates),
            stale: false,
        },
        Err(e) if e.aborts_fallback() => ProfileGeocode {
            status: GeocodeStatus::Pending,
            matched: None,
            error: Some(e),
            stale: false,
        },
        Err(e) => ProfileGeocode {
            status: GeocodeStatus::Failed,
            matched: None,
            error: Some(e),
            stale: false,
        },
    }
}

/// Geocode one profile and store the outcome unless `dry_run`
pub async fn geocode_profile(
    pool: &SqlitePool,
    geocoder: &dyn Geocoder,
    event_bus: Option<&EventBus>,
    profile: &AlumniProfile,
    dry_run: bool,
) -> alumni_common::Result<ProfileGeocode> {
    let address = AddressParts::from_profile(profile);
    let mut outcome = classify(geocode_with_fallback(geocoder, &address).await);

    if let Some(e) = &outcome.error {
        debug!(profile_id = %profile.id, error = %e, "Profile not geocoded");
    }

    if dry_run || outcome.aborts_batch() {
        return Ok(outcome);
    }

    let coordinates = outcome.matched.as_ref().map(|m| m.coordinates);
    let query = outcome.matched.as_ref().map(|m| m.query.as_str());
    if !profile_db::record_geocode(pool, profile, outcome.status, coordinates, query).await? {
        debug!(profile_id = %profile.id, "Address changed during lookup, result discarded");
        outcome.stale = true;
        return Ok(outcome);
    }

    if let Some(bus) = event_bus {
        bus.emit_lossy(AppEvent::ProfileGeocoded {
            profile_id: profile.id.clone(),
            status: outcome.status,
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
            timestamp: Utc::now(),
        });
    }

    Ok(outcome)
}

/// Counters of a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub located: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

/// Geocode a list of profiles in order
///
/// Each profile is reloaded before its lookup so edits made while the batch
/// runs are geocoded at their current address; deleted profiles count as
/// skipped. Stops early on cancellation. A provider error that would repeat
/// for every profile (rejected token, geocoding disabled) fails the whole
/// batch.
pub async fn geocode_profiles(
    pool: &SqlitePool,
    geocoder: &dyn Geocoder,
    event_bus: Option<&EventBus>,
    profiles: &[AlumniProfile],
    cancel: &CancellationToken,
    mut job: Option<&mut JobHandle>,
    dry_run: bool,
) -> anyhow::Result<BatchSummary> {
    let mut summary = BatchSummary {
        total: profiles.len(),
        ..Default::default()
    };

    for profile in profiles {
        if cancel.is_cancelled() {
            info!(processed = summary.processed, "Geocoding batch cancelled");
            summary.cancelled = true;
            break;
        }

        let current = profile_db::get_profile(pool, &profile.id)
            .await
            .with_context(|| format!("Loading profile {}", profile.id))?;
        let Some(profile) = current else {
            debug!(profile_id = %profile.id, "Profile deleted before geocoding");
            summary.processed += 1;
            summary.skipped += 1;
            if let Some(job) = job.as_deref_mut() {
                job.record(false).await?;
            }
            continue;
        };

        let outcome = geocode_profile(pool, geocoder, event_bus, &profile, dry_run)
            .await
            .with_context(|| format!("Storing geocode for profile {}", profile.id))?;

        if outcome.aborts_batch() {
            let error = outcome
                .error
                .map(|e| e.to_string())
                .unwrap_or_default();
            warn!(profile_id = %profile.id, %error, "Geocoding batch aborted");
            anyhow::bail!("Geocoding aborted: {}", error);
        }

        summary.processed += 1;
        match outcome.status {
            _ if outcome.stale => summary.skipped += 1,
            GeocodeStatus::Ok => summary.located += 1,
            GeocodeStatus::Skipped => summary.skipped += 1,
            _ => summary.failed += 1,
        }

        if let Some(job) = job.as_deref_mut() {
            job.record(outcome.status == GeocodeStatus::Ok && !outcome.stale)
                .await?;
        }
    }

    info!(
        total = summary.total,
        located = summary.located,
        failed = summary.failed,
        skipped = summary.skipped,
        "Geocoding batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{Coordinates, GeocodeHit};
    use alumni_common::db::connect_in_memory;
    use async_trait::async_trait;

    /// Finds every query mentioning "Paris"
    struct ParisOnly;

    #[async_trait]
    impl Geocoder for ParisOnly {
        async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
            Ok(query.contains("Paris").then(|| GeocodeHit {
                coordinates: Coordinates {
                    latitude: 48.8566,
                    longitude: 2.3522,
                },
                place_name: Some("Paris, France".to_string()),
            }))
        }
    }

    /// Finds Paris and Berlin, recording every query
    #[derive(Default)]
    struct Cities {
        queries: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for Cities {
        async fn lookup(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
            self.queries.lock().unwrap().push(query.to_string());
            let coordinates = match query {
                "Paris, France" => Coordinates {
                    latitude: 48.8566,
                    longitude: 2.3522,
                },
                "Berlin, Germany" => Coordinates {
                    latitude: 52.52,
                    longitude: 13.405,
                },
                _ => return Ok(None),
            };
            Ok(Some(GeocodeHit {
                coordinates,
                place_name: Some(query.to_string()),
            }))
        }
    }

    /// Answers Paris, but moves the profile to Berlin while the lookup runs
    struct MovesDuringLookup {
        pool: SqlitePool,
    }

    #[async_trait]
    impl Geocoder for MovesDuringLookup {
        async fn lookup(&self, _query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
            sqlx::query("UPDATE profiles SET city = 'Berlin', country = 'Germany' WHERE id = 'a'")
                .execute(&self.pool)
                .await
                .unwrap();
            Ok(Some(GeocodeHit {
                coordinates: Coordinates {
                    latitude: 48.8566,
                    longitude: 2.3522,
                },
                place_name: None,
            }))
        }
    }

    struct Rejecting;

    #[async_trait]
    impl Geocoder for Rejecting {
        async fn lookup(&self, _query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
            Err(GeocodeError::Unauthorized)
        }
    }

    fn profile(id: &str, city: Option<&str>, country: Option<&str>) -> AlumniProfile {
        let now = Utc::now();
        AlumniProfile {
            id: id.to_string(),
            user_id: None,
            first_name: "Test".to_string(),
            last_name: id.to_string(),
            email: format!("{}@example.org", id),
            graduation_year: None,
            degree: None,
            major: None,
            company: None,
            job_title: None,
            industry: None,
            city: city.map(str::to_string),
            state: None,
            country: country.map(str::to_string),
            bio: None,
            linkedin_url: None,
            website_url: None,
            is_public: true,
            email_opt_out: false,
            latitude: None,
            longitude: None,
            geocode_status: GeocodeStatus::Pending,
            geocode_query: None,
            geocoded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded(profiles: &[AlumniProfile]) -> SqlitePool {
        let pool = connect_in_memory().await.unwrap();
        for p in profiles {
            profile_db::insert_profile(&pool, p).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_batch_records_each_status() {
        let profiles = vec![
            profile("a", Some("Paris"), Some("France")),
            profile("b", Some("Atlantis"), None),
            profile("c", None, Some("France")),
        ];
        let pool = seeded(&profiles).await;

        let summary = geocode_profiles(
            &pool,
            &ParisOnly,
            None,
            &profiles,
            &CancellationToken::new(),
            None,
            false,
        )
        .await
        .unwrap();

        assert_eq!(summary.located, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);

        let a = profile_db::get_profile(&pool, "a").await.unwrap().unwrap();
        assert_eq!(a.geocode_status, GeocodeStatus::Ok);
        assert_eq!(a.geocode_query.as_deref(), Some("Paris, France"));
        assert!(a.coordinates().is_some());

        let b = profile_db::get_profile(&pool, "b").await.unwrap().unwrap();
        assert_eq!(b.geocode_status, GeocodeStatus::Failed);
        let c = profile_db::get_profile(&pool, "c").await.unwrap().unwrap();
        assert_eq!(c.geocode_status, GeocodeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let profiles = vec![profile("a", Some("Paris"), None)];
        let pool = seeded(&profiles).await;

        let summary = geocode_profiles(
            &pool,
            &ParisOnly,
            None,
            &profiles,
            &CancellationToken::new(),
            None,
            true,
        )
        .await
        .unwrap();
        assert_eq!(summary.located, 1);

        let a = profile_db::get_profile(&pool, "a").await.unwrap().unwrap();
        assert_eq!(a.geocode_status, GeocodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_rejected_token_fails_batch_without_touching_profiles() {
        let profiles = vec![profile("a", Some("Paris"), None)];
        let pool = seeded(&profiles).await;

        let result = geocode_profiles(
            &pool,
            &Rejecting,
            None,
            &profiles,
            &CancellationToken::new(),
            None,
            false,
        )
        .await;
        assert!(result.is_err());

        let a = profile_db::get_profile(&pool, "a").await.unwrap().unwrap();
        assert_eq!(a.geocode_status, GeocodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_batch_uses_address_edited_after_selection() {
        let selected = vec![profile("a", Some("Paris"), Some("France"))];
        let pool = seeded(&selected).await;
        sqlx::query("UPDATE profiles SET city = 'Berlin', country = 'Germany' WHERE id = 'a'")
            .execute(&pool)
            .await
            .unwrap();

        let geocoder = Cities::default();
        let summary = geocode_profiles(
            &pool,
            &geocoder,
            None,
            &selected,
            &CancellationToken::new(),
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!(summary.located, 1);
        assert_eq!(*geocoder.queries.lock().unwrap(), vec!["Berlin, Germany"]);

        let a = profile_db::get_profile(&pool, "a").await.unwrap().unwrap();
        assert_eq!(a.geocode_query.as_deref(), Some("Berlin, Germany"));
        assert_eq!(a.latitude, Some(52.52));
    }

    #[tokio::test]
    async fn test_result_for_old_address_is_discarded() {
        let paris = profile("a", Some("Paris"), Some("France"));
        let pool = seeded(std::slice::from_ref(&paris)).await;
        let geocoder = MovesDuringLookup { pool: pool.clone() };

        let outcome = geocode_profile(&pool, &geocoder, None, &paris, false)
            .await
            .unwrap();
        assert!(outcome.stale);

        let a = profile_db::get_profile(&pool, "a").await.unwrap().unwrap();
        assert_eq!(a.city.as_deref(), Some("Berlin"));
        assert_eq!(a.geocode_status, GeocodeStatus::Pending);
        assert!(a.latitude.is_none());
    }

    #[tokio::test]
    async fn test_deleted_profile_is_skipped() {
        let selected = vec![profile("a", Some("Paris"), None)];
        let pool = connect_in_memory().await.unwrap();

        let summary = geocode_profiles(
            &pool,
            &ParisOnly,
            None,
            &selected,
            &CancellationToken::new(),
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!((summary.processed, summary.skipped, summary.located), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_cancelled_batch_stops_before_next_profile() {
        let profiles = vec![
            profile("a", Some("Paris"), None),
            profile("b", Some("Paris"), None),
        ];
        let pool = seeded(&profiles).await;
        let token = CancellationToken::new();
        token.cancel();

        let summary = geocode_profiles(&pool, &ParisOnly, None, &profiles, &token, None, false)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.processed, 0);
    }
}
