//! Templated email
//!
//! Templates use `{{ variable }}` placeholders filled from a profile. The
//! set of variables is fixed so a typo is caught before a bulk send starts.

mod provider;

pub use provider::{EmailError, EmailProvider, HttpEmailProvider, LogEmailProvider, OutgoingEmail};

use alumni_common::db::AlumniProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Variables available to templates
pub const TEMPLATE_VARIABLES: &[&str] = &[
    "first_name",
    "last_name",
    "full_name",
    "email",
    "graduation_year",
    "company",
    "job_title",
    "city",
    "country",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Unknown template variable '{name}' at offset {offset}")]
    UnknownVariable { name: String, offset: usize },

    #[error("Unterminated '{{{{' at offset {offset}")]
    Unterminated { offset: usize },

    #[error("Template {0} is empty")]
    Empty(&'static str),
}

enum Segment<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            return Err(TemplateError::Unterminated {
                offset: offset + start,
            });
        };

        let name = after_open[..end].trim();
        if !TEMPLATE_VARIABLES.contains(&name) {
            return Err(TemplateError::UnknownVariable {
                name: name.to_string(),
                offset: offset + start,
            });
        }
        segments.push(Segment::Var(name));

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

/// Check syntax and variable names without rendering
pub fn validate_template(template: &str) -> Result<(), TemplateError> {
    parse(template).map(|_| ())
}

/// Substitute variables; missing values render as empty strings
pub fn render_template(
    template: &str,
    vars: &HashMap<&'static str, String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Var(name) => {
                if let Some(value) = vars.get(name) {
                    out.push_str(value);
                }
            }
        }
    }
    Ok(out)
}

/// Template variables for one profile
pub fn profile_variables(profile: &AlumniProfile) -> HashMap<&'static str, String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    HashMap::from([
        ("first_name", profile.first_name.clone()),
        ("last_name", profile.last_name.clone()),
        ("full_name", profile.full_name()),
        ("email", profile.email.clone()),
        (
            "graduation_year",
            profile
                .graduation_year
                .map(|y| y.to_string())
                .unwrap_or_default(),
        ),
        ("company", opt(&profile.company)),
        ("job_title", opt(&profile.job_title)),
        ("city", opt(&profile.city)),
        ("country", opt(&profile.country)),
    ])
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Subject and body templates of a bulk message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

/// A message rendered for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl EmailTemplate {
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.subject.trim().is_empty() {
            return Err(TemplateError::Empty("subject"));
        }
        if self.body.trim().is_empty() {
            return Err(TemplateError::Empty("body"));
        }
        validate_template(&self.subject)?;
        validate_template(&self.body)
    }

    pub fn render_for(&self, profile: &AlumniProfile) -> Result<RenderedEmail, TemplateError> {
        let vars = profile_variables(profile);

        // Header injection guard: subjects are single-line
        let subject = render_template(&self.subject, &vars)?
            .replace(['\r', '\n'], " ")
            .trim()
            .to_string();
        let text = render_template(&self.body, &vars)?;
        let html = escape_html(&text)
            .replace("\r\n", "\n")
            .replace('\n', "<br>\n");

        Ok(RenderedEmail { subject, text, html })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alumni_common::db::GeocodeStatus;
    use chrono::Utc;

    fn ada() -> AlumniProfile {
        let now = Utc::now();
        AlumniProfile {
            id: "p1".to_string(),
            user_id: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.org".to_string(),
            graduation_year: Some(1833),
            degree: None,
            major: None,
            company: Some("Analytical & Co".to_string()),
            job_title: None,
            industry: None,
            city: Some("London".to_string()),
            state: None,
            country: None,
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

    #[test]
    fn test_render_substitutes_and_blanks_missing_values() {
        let vars = profile_variables(&ada());
        let out = render_template("Hi {{first_name}}, class of {{ graduation_year }} in {{country}}!", &vars)
            .unwrap();
        assert_eq!(out, "Hi Ada, class of 1833 in !");
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            validate_template("Hello {{ nickname }}"),
            Err(TemplateError::UnknownVariable {
                name: "nickname".to_string(),
                offset: 6
            })
        );
    }

    #[test]
    fn test_unterminated_placeholder() {
        assert_eq!(
            validate_template("Hi {{first_name}} and {{ last_name"),
            Err(TemplateError::Unterminated { offset: 22 })
        );
    }

    #[test]
    fn test_single_braces_are_literal() {
        let vars = profile_variables(&ada());
        assert_eq!(render_template("{ok} }}", &vars).unwrap(), "{ok} }}");
    }

    #[test]
    fn test_render_for_profile_escapes_html() {
        let template = EmailTemplate {
            subject: "News for {{full_name}}\n".to_string(),
            body: "Dear {{first_name}},\n<b>{{company}}</b>".to_string(),
        };
        template.validate().unwrap();

        let email = template.render_for(&ada()).unwrap();
        assert_eq!(email.subject, "News for Ada Lovelace");
        assert_eq!(email.text, "Dear Ada,\n<b>Analytical & Co</b>");
        assert_eq!(
            email.html,
            "Dear Ada,<br>\n&lt;b&gt;Analytical &amp; Co&lt;/b&gt;"
        );
    }

    #[test]
    fn test_empty_template_rejected() {
        let template = EmailTemplate {
            subject: " ".to_string(),
            body: "x".to_string(),
        };
        assert_eq!(template.validate(), Err(TemplateError::Empty("subject")));
    }
}
