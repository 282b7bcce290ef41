//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the last geocoding attempt for a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum GeocodeStatus {
    /// Not attempted since the address last changed
    Pending,
    /// Coordinates stored
    Ok,
    /// Every candidate query came back empty or errored
    Failed,
    /// Address too sparse to build any query
    Skipped,
}

impl GeocodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeStatus::Pending => "pending",
            GeocodeStatus::Ok => "ok",
            GeocodeStatus::Failed => "failed",
            GeocodeStatus::Skipped => "skipped",
        }
    }
}

/// Alumni profile record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlumniProfile {
    pub id: String,
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub graduation_year: Option<i64>,
    pub degree: Option<String>,
    pub major: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    pub is_public: bool,
    pub email_opt_out: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocode_status: GeocodeStatus,
    /// Candidate query that produced the stored coordinates
    pub geocode_query: Option<String>,
    pub geocoded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlumniProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "City, Country" style label built from the present address parts
    pub fn location_label(&self) -> String {
        [&self.city, &self.state, &self.country]
            .iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Access role of a signed-in user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

/// User known to the directory (identity owned by the auth provider)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Subject id issued by the auth provider
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Kind of background admin job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum JobKind {
    Regeocode,
    BulkEmail,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Regeocode => "regeocode",
            JobKind::BulkEmail => "bulk_email",
        }
    }
}

/// Lifecycle state of a background job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// Persisted background job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub state: JobState,
    pub total: i64,
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub error: Option<String>,
    pub requested_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Delivery status of one bulk email message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

/// One attempted delivery of a bulk email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailLogEntry {
    pub id: String,
    pub job_id: String,
    pub profile_id: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub status: DeliveryStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
