//! Profile input validation and construction

use alumni_common::db::{AlumniProfile, GeocodeStatus};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldError;
use crate::geocode::AddressParts;

const MAX_NAME_LEN: usize = 100;
const MAX_BIO_LEN: usize = 2000;
const MAX_FIELD_LEN: usize = 200;
const MIN_GRADUATION_YEAR: i64 = 1900;
const FUTURE_GRADUATION_YEARS: i64 = 10;

/// Editable profile fields as submitted by forms, API clients and imports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileInput {
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
    pub is_public: Option<bool>,
    pub email_opt_out: Option<bool>,
}

fn tidy(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `local@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    (lower.starts_with("http://") && lower.len() > "http://".len())
        || (lower.starts_with("https://") && lower.len() > "https://".len())
}

impl ProfileInput {
    /// Trim every text field and turn blanks into `None`
    pub fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            graduation_year: self.graduation_year,
            degree: tidy(self.degree),
            major: tidy(self.major),
            company: tidy(self.company),
            job_title: tidy(self.job_title),
            industry: tidy(self.industry),
            city: tidy(self.city),
            state: tidy(self.state),
            country: tidy(self.country),
            bio: tidy(self.bio),
            linkedin_url: tidy(self.linkedin_url),
            website_url: tidy(self.website_url),
            is_public: self.is_public,
            email_opt_out: self.email_opt_out,
        }
    }

    /// Check every rule and report all failures at once
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        self.validate_for_year(Utc::now().year() as i64)
    }

    pub fn validate_for_year(&self, current_year: i64) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            let value = value.trim();
            if value.is_empty() {
                errors.push(FieldError::new(field, "is required"));
            } else if value.chars().count() > MAX_NAME_LEN {
                errors.push(FieldError::new(
                    field,
                    format!("must be at most {} characters", MAX_NAME_LEN),
                ));
            }
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push(FieldError::new("email", "is required"));
        } else if !is_valid_email(email) {
            errors.push(FieldError::new("email", "must look like name@example.org"));
        }

        if let Some(year) = self.graduation_year {
            let max_year = current_year + FUTURE_GRADUATION_YEARS;
            if !(MIN_GRADUATION_YEAR..=max_year).contains(&year) {
                errors.push(FieldError::new(
                    "graduation_year",
                    format!("must be between {} and {}", MIN_GRADUATION_YEAR, max_year),
                ));
            }
        }

        for (field, value) in [
            ("linkedin_url", &self.linkedin_url),
            ("website_url", &self.website_url),
        ] {
            if let Some(url) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                if !is_http_url(url) {
                    errors.push(FieldError::new(field, "must start with http:// or https://"));
                }
            }
        }

        if let Some(bio) = &self.bio {
            if bio.chars().count() > MAX_BIO_LEN {
                errors.push(FieldError::new(
                    "bio",
                    format!("must be at most {} characters", MAX_BIO_LEN),
                ));
            }
        }

        for (field, value) in [
            ("degree", &self.degree),
            ("major", &self.major),
            ("company", &self.company),
            ("job_title", &self.job_title),
            ("industry", &self.industry),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
        ] {
            if value.as_ref().is_some_and(|v| v.chars().count() > MAX_FIELD_LEN) {
                errors.push(FieldError::new(
                    field,
                    format!("must be at most {} characters", MAX_FIELD_LEN),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn address(&self) -> AddressParts {
        AddressParts {
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
        }
    }

    /// Build a new, not yet geocoded profile
    pub fn into_profile(self, user_id: Option<String>, now: DateTime<Utc>) -> AlumniProfile {
        let input = self.normalized();
        AlumniProfile {
            id: Uuid::new_v4().to_string(),
            user_id,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            graduation_year: input.graduation_year,
            degree: input.degree,
            major: input.major,
            company: input.company,
            job_title: input.job_title,
            industry: input.industry,
            city: input.city,
            state: input.state,
            country: input.country,
            bio: input.bio,
            linkedin_url: input.linkedin_url,
            website_url: input.website_url,
            is_public: input.is_public.unwrap_or(true),
            email_opt_out: input.email_opt_out.unwrap_or(false),
            latitude: None,
            longitude: None,
            geocode_status: GeocodeStatus::Pending,
            geocode_query: None,
            geocoded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the editable fields of `profile`
    ///
    /// Returns true when the address changed; the geocode is then reset to
    /// pending and the stale coordinates dropped. Omitted flags keep their
    /// stored values.
    pub fn apply_to(self, profile: &mut AlumniProfile, now: DateTime<Utc>) -> bool {
        let input = self.normalized();
        let address_changed = !input.address().same_as(&AddressParts::from_profile(profile));

        profile.first_name = input.first_name;
        profile.last_name = input.last_name;
        profile.email = input.email;
        profile.graduation_year = input.graduation_year;
        profile.degree = input.degree;
        profile.major = input.major;
        profile.company = input.company;
        profile.job_title = input.job_title;
        profile.industry = input.industry;
        profile.city = input.city;
        profile.state = input.state;
        profile.country = input.country;
        profile.bio = input.bio;
        profile.linkedin_url = input.linkedin_url;
        profile.website_url = input.website_url;
        if let Some(is_public) = input.is_public {
            profile.is_public = is_public;
        }
        if let Some(opt_out) = input.email_opt_out {
            profile.email_opt_out = opt_out;
        }
        profile.updated_at = now;

        if address_changed {
            profile.latitude = None;
            profile.longitude = None;
            profile.geocode_status = GeocodeStatus::Pending;
            profile.geocode_query = None;
            profile.geocoded_at = None;
        }
        address_changed
    }
}

impl From<&AlumniProfile> for ProfileInput {
    fn from(p: &AlumniProfile) -> Self {
        Self {
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            email: p.email.clone(),
            graduation_year: p.graduation_year,
            degree: p.degree.clone(),
            major: p.major.clone(),
            company: p.company.clone(),
            job_title: p.job_title.clone(),
            industry: p.industry.clone(),
            city: p.city.clone(),
            state: p.state.clone(),
            country: p.country.clone(),
            bio: p.bio.clone(),
            linkedin_url: p.linkedin_url.clone(),
            website_url: p.website_url.clone(),
            is_public: Some(p.is_public),
            email_opt_out: Some(p.email_opt_out),
        }
    }
}
