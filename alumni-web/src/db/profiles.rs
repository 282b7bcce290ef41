//! Profile queries
//!
//! Directory filters are assembled with `QueryBuilder` so every user-supplied
//! value is bound, never interpolated. Sort columns come from a fixed list.

use alumni_common::db::{AlumniProfile, GeocodeStatus};
use alumni_common::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::geocode::Coordinates;

const PROFILE_COLUMNS: &str = "id, user_id, first_name, last_name, email, graduation_year, \
     degree, major, company, job_title, industry, city, state, country, bio, linkedin_url, \
     website_url, is_public, email_opt_out, latitude, longitude, geocode_status, geocode_query, \
     geocoded_at, created_at, updated_at";

/// Columns matched by the free-text `q` filter
const SEARCH_COLUMNS: &[&str] = &[
    "(first_name || ' ' || last_name)",
    "company",
    "job_title",
    "major",
    "city",
];

/// Directory filters shared by listing, map markers and email recipients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFilter {
    /// Case-insensitive substring over name, company, title, major, city
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<i64>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Which profiles the caller may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Admins and internal jobs
    All,
    /// Public profiles plus the caller's own
    PublicOr(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileSort {
    #[default]
    LastName,
    FirstName,
    GraduationYear,
    Company,
    CreatedAt,
    UpdatedAt,
}

impl ProfileSort {
    pub fn parse(value: Option<&str>) -> std::result::Result<Self, String> {
        match value.map(str::trim) {
            None | Some("") | Some("last_name") => Ok(ProfileSort::LastName),
            Some("first_name") => Ok(ProfileSort::FirstName),
            Some("graduation_year") => Ok(ProfileSort::GraduationYear),
            Some("company") => Ok(ProfileSort::Company),
            Some("created_at") => Ok(ProfileSort::CreatedAt),
            Some("updated_at") => Ok(ProfileSort::UpdatedAt),
            Some(other) => Err(format!("Invalid sort column: {}", other)),
        }
    }

    fn column(&self) -> &'static str {
        match self {
            ProfileSort::LastName => "last_name COLLATE NOCASE",
            ProfileSort::FirstName => "first_name COLLATE NOCASE",
            ProfileSort::GraduationYear => "graduation_year",
            ProfileSort::Company => "company COLLATE NOCASE",
            ProfileSort::CreatedAt => "created_at",
            ProfileSort::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Profiles selected for (re-)geocoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeScope {
    /// Never attempted since the address last changed
    Pending,
    /// Every profile without coordinates
    #[default]
    Missing,
    /// Profiles whose last attempt failed
    Failed,
    /// Every profile
    All,
}

impl std::str::FromStr for GeocodeScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(GeocodeScope::Pending),
            "missing" => Ok(GeocodeScope::Missing),
            "failed" => Ok(GeocodeScope::Failed),
            "all" => Ok(GeocodeScope::All),
            other => Err(format!(
                "Invalid scope '{}' (expected pending, missing, failed or all)",
                other
            )),
        }
    }
}

/// Escape LIKE wildcards; pair with `ESCAPE '\'`
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProfileFilter, visibility: &Visibility) {
    qb.push(" WHERE 1 = 1");

    if let Visibility::PublicOr(user_id) = visibility {
        qb.push(" AND (is_public = 1 OR user_id = ");
        qb.push_bind(user_id.clone());
        qb.push(")");
    }

    if let Some(q) = non_empty(&filter.q) {
        let pattern = format!("%{}%", escape_like(&q));
        qb.push(" AND (");
        for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column);
            qb.push(" LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\'");
        }
        qb.push(")");
    }

    if let Some(year) = filter.graduation_year {
        qb.push(" AND graduation_year = ");
        qb.push_bind(year);
    }

    for (column, value) in [
        ("industry", &filter.industry),
        ("city", &filter.city),
        ("country", &filter.country),
    ] {
        if let Some(value) = non_empty(value) {
            qb.push(format!(" AND {} = ", column));
            qb.push_bind(value);
            qb.push(" COLLATE NOCASE");
        }
    }
}

/// Number of profiles matching the filter
pub async fn count_profiles(
    pool: &SqlitePool,
    filter: &ProfileFilter,
    visibility: &Visibility,
) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM profiles");
    push_filters(&mut qb, filter, visibility);
    let count = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

/// Profiles matching the filter, sorted; `page` is `(limit, offset)` or all rows
pub async fn list_profiles(
    pool: &SqlitePool,
    filter: &ProfileFilter,
    visibility: &Visibility,
    sort: ProfileSort,
    order: SortOrder,
    page: Option<(i64, i64)>,
) -> Result<Vec<AlumniProfile>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM profiles", PROFILE_COLUMNS));
    push_filters(&mut qb, filter, visibility);

    qb.push(format!(
        " ORDER BY {} {}, last_name COLLATE NOCASE ASC, first_name COLLATE NOCASE ASC, id ASC",
        sort.column(),
        order.sql()
    ));

    if let Some((limit, offset)) = page {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);
    }

    let profiles = qb.build_query_as::<AlumniProfile>().fetch_all(pool).await?;
    Ok(profiles)
}

pub async fn get_profile(pool: &SqlitePool, id: &str) -> Result<Option<AlumniProfile>> {
    let profile = sqlx::query_as::<_, AlumniProfile>(&format!(
        "SELECT {} FROM profiles WHERE id = ?",
        PROFILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

pub async fn get_profile_by_user(pool: &SqlitePool, user_id: &str) -> Result<Option<AlumniProfile>> {
    let profile = sqlx::query_as::<_, AlumniProfile>(&format!(
        "SELECT {} FROM profiles WHERE user_id = ? ORDER BY created_at LIMIT 1",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(profile)
}

/// Case-insensitive email lookup
pub async fn get_profile_by_email<'e, E>(executor: E, email: &str) -> Result<Option<AlumniProfile>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let profile = sqlx::query_as::<_, AlumniProfile>(&format!(
        "SELECT {} FROM profiles WHERE email = ? COLLATE NOCASE",
        PROFILE_COLUMNS
    ))
    .bind(email.trim())
    .fetch_optional(executor)
    .await?;
    Ok(profile)
}

pub async fn insert_profile<'e, E>(executor: E, profile: &AlumniProfile) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO profiles (
            id, user_id, first_name, last_name, email, graduation_year, degree, major,
            company, job_title, industry, city, state, country, bio, linkedin_url,
            website_url, is_public, email_opt_out, latitude, longitude, geocode_status,
            geocode_query, geocoded_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&profile.id)
    .bind(&profile.user_id)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(profile.graduation_year)
    .bind(&profile.degree)
    .bind(&profile.major)
    .bind(&profile.company)
    .bind(&profile.job_title)
    .bind(&profile.industry)
    .bind(&profile.city)
    .bind(&profile.state)
    .bind(&profile.country)
    .bind(&profile.bio)
    .bind(&profile.linkedin_url)
    .bind(&profile.website_url)
    .bind(profile.is_public)
    .bind(profile.email_opt_out)
    .bind(profile.latitude)
    .bind(profile.longitude)
    .bind(profile.geocode_status)
    .bind(&profile.geocode_query)
    .bind(profile.geocoded_at)
    .bind(profile.created_at)
    .bind(profile.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Overwrite every mutable column of an existing profile
pub async fn update_profile<'e, E>(executor: E, profile: &AlumniProfile) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE profiles SET
            user_id = ?, first_name = ?, last_name = ?, email = ?, graduation_year = ?,
            degree = ?, major = ?, company = ?, job_title = ?, industry = ?, city = ?,
            state = ?, country = ?, bio = ?, linkedin_url = ?, website_url = ?,
            is_public = ?, email_opt_out = ?, latitude = ?, longitude = ?,
            geocode_status = ?, geocode_query = ?, geocoded_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&profile.user_id)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(profile.graduation_year)
    .bind(&profile.degree)
    .bind(&profile.major)
    .bind(&profile.company)
    .bind(&profile.job_title)
    .bind(&profile.industry)
    .bind(&profile.city)
    .bind(&profile.state)
    .bind(&profile.country)
    .bind(&profile.bio)
    .bind(&profile.linkedin_url)
    .bind(&profile.website_url)
    .bind(profile.is_public)
    .bind(profile.email_opt_out)
    .bind(profile.latitude)
    .bind(profile.longitude)
    .bind(profile.geocode_status)
    .bind(&profile.geocode_query)
    .bind(profile.geocoded_at)
    .bind(profile.updated_at)
    .bind(&profile.id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_profile(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Store the outcome of a geocoding attempt
///
/// Anything but `Ok` clears the coordinates so stale pins disappear.
/// Nothing is written (false) when the profile is gone or its city, state or
/// country no longer match `profile`.
pub async fn record_geocode(
    pool: &SqlitePool,
    profile: &AlumniProfile,
    status: GeocodeStatus,
    coordinates: Option<Coordinates>,
    query: Option<&str>,
) -> Result<bool> {
    let (latitude, longitude) = match (status, coordinates) {
        (GeocodeStatus::Ok, Some(c)) => (Some(c.latitude), Some(c.longitude)),
        _ => (None, None),
    };

    let result = sqlx::query(
        "UPDATE profiles SET latitude = ?, longitude = ?, geocode_status = ?, geocode_query = ?,
             geocoded_at = ?
         WHERE id = ? AND city IS ? AND state IS ? AND country IS ?",
    )
    .bind(latitude)
    .bind(longitude)
    .bind(status)
    .bind(query)
    .bind(Utc::now())
    .bind(&profile.id)
    .bind(&profile.city)
    .bind(&profile.state)
    .bind(&profile.country)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Profiles to geocode for a scope, oldest first
pub async fn select_for_geocoding(
    pool: &SqlitePool,
    scope: GeocodeScope,
    limit: Option<i64>,
) -> Result<Vec<AlumniProfile>> {
    let condition = match scope {
        GeocodeScope::Pending => "geocode_status = 'pending'",
        GeocodeScope::Missing => "(latitude IS NULL OR longitude IS NULL)",
        GeocodeScope::Failed => "geocode_status = 'failed'",
        GeocodeScope::All => "1 = 1",
    };

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM profiles WHERE {} ORDER BY created_at ASC, id ASC",
        PROFILE_COLUMNS, condition
    ));
    if let Some(limit) = limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit.max(0));
    }

    let profiles = qb.build_query_as::<AlumniProfile>().fetch_all(pool).await?;
    Ok(profiles)
}

/// Distinct filter values among visible profiles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub graduation_years: Vec<i64>,
    pub industries: Vec<String>,
    pub countries: Vec<String>,
}

pub async fn facets(pool: &SqlitePool, visibility: &Visibility) -> Result<Facets> {
    let no_filter = ProfileFilter::default();

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT DISTINCT graduation_year FROM profiles");
    push_filters(&mut qb, &no_filter, visibility);
    qb.push(" AND graduation_year IS NOT NULL ORDER BY graduation_year DESC");
    let graduation_years = qb.build_query_scalar::<i64>().fetch_all(pool).await?;

    let text_facet = |column: &'static str| {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT DISTINCT TRIM({0}) FROM profiles",
            column
        ));
        push_filters(&mut qb, &no_filter, visibility);
        qb.push(format!(
            " AND {0} IS NOT NULL AND TRIM({0}) != '' ORDER BY TRIM({0}) COLLATE NOCASE",
            column
        ));
        qb
    };

    let industries = text_facet("industry")
        .build_query_scalar::<String>()
        .fetch_all(pool)
        .await?;
    let countries = text_facet("country")
        .build_query_scalar::<String>()
        .fetch_all(pool)
        .await?;

    Ok(Facets {
        graduation_years,
        industries: dedupe_case_insensitive(industries),
        countries: dedupe_case_insensitive(countries),
    })
}

fn dedupe_case_insensitive(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
            out.push(value);
        }
    }
    out
}
