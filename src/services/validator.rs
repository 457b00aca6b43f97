//! Step completion validation.
//!
//! Gates `mark_step_complete` on required-field presence plus a small set
//! of semantic rules. Ordinary edits and auto-save are never blocked by
//! validation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{FieldValue, FormData};
use crate::interface::Clock;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));

const MIN_AGE_YEARS: u32 = 18;

/// Field name → user-facing error message.
pub type ValidationErrors = BTreeMap<String, String>;

pub struct StepValidator;

impl StepValidator {
    /// Validate the form against the active step's required fields.
    ///
    /// Returns an error for every missing or empty required field
    /// (absent, null, empty string, and empty array all count as
    /// missing), plus the semantic rules for `birth_date` and `email`.
    /// An empty map means the step may be marked complete.
    pub fn validate(form: &FormData, required: &[&str], clock: &dyn Clock) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        for &name in required {
            match form.get(name) {
                Some(value) if !Self::is_empty(value) => {
                    if let Some(message) = Self::semantic_error(name, value, clock) {
                        errors.insert(name.to_string(), message);
                    }
                }
                _ => {
                    errors.insert(name.to_string(), "This field is required".to_string());
                }
            }
        }

        errors
    }

    fn is_empty(value: &FieldValue) -> bool {
        match value {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            FieldValue::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    fn semantic_error(name: &str, value: &FieldValue, clock: &dyn Clock) -> Option<String> {
        match name {
            "birth_date" => Self::check_age(value, clock),
            "email" => Self::check_email(value),
            _ => None,
        }
    }

    fn check_age(value: &FieldValue, clock: &dyn Clock) -> Option<String> {
        let raw = value.as_str()?;
        let birth_date = match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => return Some("Please enter a valid date (YYYY-MM-DD)".to_string()),
        };
        let today = DateTime::<Utc>::from_timestamp_millis(clock.now_ms())
            .unwrap_or_else(Utc::now)
            .date_naive();
        let age = today.years_since(birth_date).unwrap_or(0);
        if age < MIN_AGE_YEARS {
            return Some(format!("You must be at least {} years old", MIN_AGE_YEARS));
        }
        None
    }

    fn check_email(value: &FieldValue) -> Option<String> {
        let raw = value.as_str()?;
        if !EMAIL_RE.is_match(raw) {
            return Some("Please enter a valid email address".to_string());
        }
        None
    }
}
