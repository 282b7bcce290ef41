//! Profile import and export
//!
//! Imports accept CSV or a JSON array of objects. Column names are
//! normalized (case, spaces, hyphens, camelCase, common aliases) before rows
//! are validated. An import is all-or-nothing: if any row is invalid nothing
//! is written; otherwise every row is upserted by email in one transaction.
//! Updates only touch the columns a row supplies; a supplied but blank cell
//! (or JSON `null`) clears the field.

use alumni_common::db::AlumniProfile;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::profiles as profile_db;
use crate::services::profiles::ProfileInput;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Could not parse {format} content: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("Required column '{0}' is missing")]
    MissingColumn(&'static str),

    #[error("Import contains no rows")]
    Empty,

    #[error(transparent)]
    Database(#[from] alumni_common::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    #[default]
    Csv,
    Json,
}

/// One problem found in the input; `row` is the 1-based data row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub dry_run: bool,
    pub errors: Vec<RowError>,
}

const KNOWN_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "graduation_year",
    "degree",
    "major",
    "company",
    "job_title",
    "industry",
    "city",
    "state",
    "country",
    "bio",
    "linkedin_url",
    "website_url",
    "is_public",
    "email_opt_out",
];

const ALIASES: &[(&str, &str)] = &[
    ("first", "first_name"),
    ("firstname", "first_name"),
    ("given_name", "first_name"),
    ("last", "last_name"),
    ("lastname", "last_name"),
    ("surname", "last_name"),
    ("family_name", "last_name"),
    ("email_address", "email"),
    ("e_mail", "email"),
    ("mail", "email"),
    ("grad_year", "graduation_year"),
    ("class_year", "graduation_year"),
    ("class_of", "graduation_year"),
    ("year", "graduation_year"),
    ("employer", "company"),
    ("organization", "company"),
    ("title", "job_title"),
    ("position", "job_title"),
    ("province", "state"),
    ("region", "state"),
    ("linkedin", "linkedin_url"),
    ("website", "website_url"),
    ("url", "website_url"),
    ("public", "is_public"),
    ("opt_out", "email_opt_out"),
    ("unsubscribed", "email_opt_out"),
];

/// Canonical field name for a column header, if it maps to one
pub fn normalize_header(header: &str) -> Option<&'static str> {
    let mut snake = String::with_capacity(header.len() + 4);
    let mut prev_lower = false;
    for c in header.trim().chars() {
        if c.is_uppercase() && prev_lower {
            snake.push('_');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        match c {
            ' ' | '-' | '.' | '_' => {
                if !snake.ends_with('_') && !snake.is_empty() {
                    snake.push('_');
                }
                prev_lower = false;
            }
            _ => snake.extend(c.to_lowercase()),
        }
    }
    let snake = snake.trim_end_matches('_');

    KNOWN_FIELDS
        .iter()
        .find(|f| **f == snake)
        .copied()
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == snake)
                .map(|(_, field)| *field)
        })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

type RawRow = HashMap<&'static str, String>;

/// A parsed row and the canonical columns it supplied
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub input: ProfileInput,
    pub columns: HashSet<&'static str>,
}

impl ImportRow {
    /// `base` with the supplied columns replaced by this row's values
    pub fn overlay(&self, mut base: ProfileInput) -> ProfileInput {
        let row = &self.input;
        let has = |column: &str| self.columns.contains(column);

        if has("first_name") {
            base.first_name = row.first_name.clone();
        }
        if has("last_name") {
            base.last_name = row.last_name.clone();
        }
        base.email = row.email.clone();
        if has("graduation_year") {
            base.graduation_year = row.graduation_year;
        }
        for (column, target, value) in [
            ("degree", &mut base.degree, &row.degree),
            ("major", &mut base.major, &row.major),
            ("company", &mut base.company, &row.company),
            ("job_title", &mut base.job_title, &row.job_title),
            ("industry", &mut base.industry, &row.industry),
            ("city", &mut base.city, &row.city),
            ("state", &mut base.state, &row.state),
            ("country", &mut base.country, &row.country),
            ("bio", &mut base.bio, &row.bio),
            ("linkedin_url", &mut base.linkedin_url, &row.linkedin_url),
            ("website_url", &mut base.website_url, &row.website_url),
        ] {
            if has(column) {
                *target = value.clone();
            }
        }
        if row.is_public.is_some() {
            base.is_public = row.is_public;
        }
        if row.email_opt_out.is_some() {
            base.email_opt_out = row.email_opt_out;
        }
        base
    }
}

fn parse_csv(content: &str) -> Result<(Vec<RawRow>, Vec<RowError>), ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Parse {
            format: "CSV",
            message: e.to_string(),
        })?
        .clone();

    let columns: Vec<Option<&'static str>> = headers.iter().map(normalize_header).collect();
    for (header, column) in headers.iter().zip(&columns) {
        if column.is_none() {
            warn!(header = %header, "Ignoring unknown import column");
        }
    }
    if !columns.contains(&Some("email")) {
        return Err(ImportError::MissingColumn("email"));
    }

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let row = columns
                    .iter()
                    .zip(record.iter())
                    .filter_map(|(column, value)| column.map(|c| (c, value.to_string())))
                    .collect();
                rows.push(row);
            }
            Err(e) => {
                errors.push(RowError {
                    row: index + 1,
                    field: "row".to_string(),
                    message: e.to_string(),
                });
                rows.push(RawRow::new());
            }
        }
    }
    Ok((rows, errors))
}

fn parse_json(content: &str) -> Result<(Vec<RawRow>, Vec<RowError>), ImportError> {
    let parse_error = |message: String| ImportError::Parse {
        format: "JSON",
        message,
    };
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| parse_error("expected an array of objects".to_string()))?;

    let mut rows = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            errors.push(RowError {
                row: index + 1,
                field: "row".to_string(),
                message: "expected an object".to_string(),
            });
            rows.push(RawRow::new());
            continue;
        };

        let mut row = RawRow::new();
        for (key, value) in object {
            let Some(column) = normalize_header(key) else {
                continue;
            };
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            row.insert(column, text);
        }
        rows.push(row);
    }

    if !rows.iter().any(|r| r.contains_key("email")) && errors.is_empty() && !rows.is_empty() {
        return Err(ImportError::MissingColumn("email"));
    }
    Ok((rows, errors))
}

fn row_to_input(row: &RawRow, row_number: usize, errors: &mut Vec<RowError>) -> ProfileInput {
    let text = |key: &str| row.get(key).cloned().filter(|v| !v.trim().is_empty());
    let mut push = |field: &str, message: String| {
        errors.push(RowError {
            row: row_number,
            field: field.to_string(),
            message,
        })
    };

    let graduation_year = text("graduation_year").and_then(|v| match v.trim().parse::<i64>() {
        Ok(year) => Some(year),
        Err(_) => {
            push("graduation_year", format!("'{}' is not a year", v.trim()));
            None
        }
    });

    let mut flag = |field: &str| {
        text(field).and_then(|v| {
            let parsed = parse_bool(&v);
            if parsed.is_none() {
                push(field, format!("'{}' is not a yes/no value", v.trim()));
            }
            parsed
        })
    };
    let is_public = flag("is_public");
    let email_opt_out = flag("email_opt_out");

    ProfileInput {
        first_name: text("first_name").unwrap_or_default(),
        last_name: text("last_name").unwrap_or_default(),
        email: text("email").unwrap_or_default(),
        graduation_year,
        degree: text("degree"),
        major: text("major"),
        company: text("company"),
        job_title: text("job_title"),
        industry: text("industry"),
        city: text("city"),
        state: text("state"),
        country: text("country"),
        bio: text("bio"),
        linkedin_url: text("linkedin_url"),
        website_url: text("website_url"),
        is_public,
        email_opt_out,
    }
    .normalized()
}

/// Parse and validate every row without touching the database
pub fn prepare_import(
    format: ImportFormat,
    content: &str,
) -> Result<(Vec<ImportRow>, ImportReport), ImportError> {
    let (rows, mut errors) = match format {
        ImportFormat::Csv => parse_csv(content)?,
        ImportFormat::Json => parse_json(content)?,
    };
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }

    let mut inputs = Vec::with_capacity(rows.len());
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut invalid_rows = std::collections::HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let before = errors.len();
        let input = row_to_input(row, row_number, &mut errors);
        let columns: HashSet<&'static str> = row.keys().copied().collect();

        if let Err(field_errors) = input.validate() {
            errors.extend(field_errors.into_iter().map(|e| RowError {
                row: row_number,
                field: e.field,
                message: e.message,
            }));
        }

        if !input.email.is_empty() {
            let key = input.email.to_lowercase();
            match first_seen.get(&key) {
                Some(first) => errors.push(RowError {
                    row: row_number,
                    field: "email".to_string(),
                    message: format!("duplicate of row {}", first),
                }),
                None => {
                    first_seen.insert(key, row_number);
                }
            }
        }

        if errors.len() > before || errors.iter().any(|e| e.row == row_number) {
            invalid_rows.insert(row_number);
        }
        inputs.push(ImportRow { input, columns });
    }

    errors.sort_by_key(|e| e.row);
    let report = ImportReport {
        total_rows: rows.len(),
        valid_rows: rows.len() - invalid_rows.len(),
        errors,
        ..Default::default()
    };
    Ok((inputs, report))
}

/// Validate and, when every row is valid, upsert all rows by email
///
/// With `dry_run` the upsert runs inside a transaction that is rolled back,
/// so the report still shows how many rows would be inserted or updated.
pub async fn import_profiles(
    pool: &SqlitePool,
    format: ImportFormat,
    content: &str,
    dry_run: bool,
) -> Result<ImportReport, ImportError> {
    let (rows, mut report) = prepare_import(format, content)?;
    report.dry_run = dry_run;

    if !report.errors.is_empty() {
        info!(
            rows = report.total_rows,
            errors = report.errors.len(),
            "Import rejected, nothing written"
        );
        return Ok(report);
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for row in rows {
        match profile_db::get_profile_by_email(&mut *tx, &row.input.email).await? {
            Some(mut existing) => {
                let merged = row.overlay(ProfileInput::from(&existing));
                merged.apply_to(&mut existing, now);
                profile_db::update_profile(&mut *tx, &existing).await?;
                report.updated += 1;
            }
            None => {
                let profile = row.input.into_profile(None, now);
                profile_db::insert_profile(&mut *tx, &profile).await?;
                report.inserted += 1;
            }
        }
    }

    if dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }

    info!(
        inserted = report.inserted,
        updated = report.updated,
        dry_run,
        "Import finished"
    );
    Ok(report)
}

/// All profiles as CSV; the header row re-imports cleanly
pub fn export_csv(profiles: &[AlumniProfile]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for profile in profiles {
        writer.serialize(profile)?;
    }
    if profiles.is_empty() {
        writer.write_record(
            ["id", "user_id"]
                .iter()
                .chain(KNOWN_FIELDS.iter())
                .copied(),
        )?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
