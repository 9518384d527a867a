//! Input validation for form and JSON payloads.
//! Errors are collected per field so forms can show them next to their inputs.

use std::collections::BTreeMap;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

lazy_static::lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[0-9+]{6,20}$").unwrap();
}

pub const MAX_STRING_LEN: usize = 255;

/// Field name -> messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub fn validate_email_opt(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn sanitize_phone(phone: &str) -> Option<String> {
    let digits: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if PHONE_RE.is_match(&digits) {
        Some(digits)
    } else {
        None
    }
}

/// Length in characters, not bytes.
pub fn ensure_max_len(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims and drops empty optional strings.
pub fn clean_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn require_string(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, format!("The {} field is required.", field));
    } else if !ensure_max_len(value, MAX_STRING_LEN) {
        errors.add(
            field,
            format!(
                "The {} field must not be greater than {} characters.",
                field, MAX_STRING_LEN
            ),
        );
    }
}

pub fn optional_string(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !ensure_max_len(value, MAX_STRING_LEN) {
            errors.add(
                field,
                format!(
                    "The {} field must not be greater than {} characters.",
                    field, MAX_STRING_LEN
                ),
            );
        }
    }
}

pub fn require_email(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.is_empty() {
        errors.add(field, format!("The {} field is required.", field));
    } else if !ensure_max_len(value, MAX_STRING_LEN) {
        errors.add(
            field,
            format!(
                "The {} field must not be greater than {} characters.",
                field, MAX_STRING_LEN
            ),
        );
    } else if !validate_email_opt(value) {
        errors.add(
            field,
            format!("The {} field must be a valid email address.", field),
        );
    }
}

pub fn optional_email(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if !validate_email_opt(value) {
            errors.add(
                field,
                format!("The {} field must be a valid email address.", field),
            );
        }
    }
}

/// Returns the sanitized phone, recording an error when it doesn't look like one.
pub fn optional_phone(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    let value = clean_opt(value)?;
    match sanitize_phone(&value) {
        Some(phone) => Some(phone),
        None => {
            errors.add(field, format!("The {} field must be a valid phone number.", field));
            None
        }
    }
}

pub fn non_negative(errors: &mut FieldErrors, field: &str, value: Decimal) {
    if value.is_sign_negative() && !value.is_zero() {
        errors.add(field, format!("The {} field must be at least 0.", field));
    }
}

pub fn password_rules(errors: &mut FieldErrors, field: &str, password: &str, confirmation: &str) {
    if password.is_empty() {
        errors.add(field, format!("The {} field is required.", field));
        return;
    }
    if password.chars().count() < 8 {
        errors.add(field, format!("The {} field must be at least 8 characters.", field));
    }
    if password != confirmation {
        errors.add(field, format!("The {} field confirmation does not match.", field));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email_opt("test@example.com"));
        assert!(validate_email_opt("a.b+c@taller.com.co"));
        assert!(!validate_email_opt("not-an-email"));
        assert!(!validate_email_opt("missing@tld"));
        assert!(!validate_email_opt(""));
    }

    #[test]
    fn normalizes_email_case_and_whitespace() {
        assert_eq!(normalize_email("  TEST@Example.COM "), "test@example.com");
    }

    #[test]
    fn length_is_counted_in_characters() {
        let accented = "á".repeat(255);
        assert!(ensure_max_len(&accented, 255));
        assert!(!ensure_max_len(&"a".repeat(256), 255));
    }

    #[test]
    fn require_string_reports_empty_and_too_long() {
        let mut errors = FieldErrors::new();
        require_string(&mut errors, "name", "   ");
        require_string(&mut errors, "brand", &"x".repeat(256));
        require_string(&mut errors, "model", "Corolla");
        assert!(errors.has("name"));
        assert!(errors.has("brand"));
        assert!(!errors.has("model"));
        assert_eq!(errors.first("name"), Some("The name field is required."));
    }

    #[test]
    fn phone_is_sanitized() {
        assert_eq!(sanitize_phone("+57 (300) 123-4567"), Some("+573001234567".to_string()));
        assert_eq!(sanitize_phone("12"), None);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let mut errors = FieldErrors::new();
        non_negative(&mut errors, "price", Decimal::new(-1, 2));
        non_negative(&mut errors, "salary", Decimal::ZERO);
        assert!(errors.has("price"));
        assert!(!errors.has("salary"));
    }

    #[test]
    fn password_requires_length_and_confirmation() {
        let mut errors = FieldErrors::new();
        password_rules(&mut errors, "password", "short", "other");
        assert_eq!(errors.0["password"].len(), 2);
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
