//! Stateless input checks.
//!
//! Email and password checks are plain functions so they can be exercised
//! without the web layer. Task and project payloads derive `Validate` (see
//! [`crate::models`]) and point at the custom field checks defined here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

use crate::models::{TaskPriority, TaskStatus};
use crate::response::FieldErrors;

/// Longest title or project name accepted.
pub const MAX_NAME_LEN: usize = 100;

/// Width of the `users.email` column.
pub const MAX_EMAIL_LEN: usize = 120;

const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    // RFC 5322 dot-atom local part.
    static ref LOCAL_PART_RE: Regex =
        Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*$")
            .unwrap();
    static ref DOMAIN_LABEL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"\d").unwrap();
    static ref UPPERCASE_RE: Regex = Regex::new(r"[A-Z]").unwrap();
}

fn error(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Message carried by a validation error, falling back to its code.
pub fn message_of(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string())
}

/// Flattens `validator` output into one message per failing field.
pub fn field_messages(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| errs.first().map(|e| (field.to_string(), message_of(e))))
        .collect()
}

fn is_ip_literal(domain: &str) -> bool {
    let parts: Vec<&str> = domain.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 3 && p.chars().all(|c| c.is_ascii_digit()))
}

fn check_domain(domain: &str) -> Result<(), ValidationError> {
    if !domain.contains('.') {
        return Err(error(
            "email",
            format!("The domain name {} is not valid. It should have a period.", domain),
        ));
    }
    let labels: Vec<&str> = domain.split('.').collect();
    let tld = labels.last().copied().unwrap_or_default();
    let labels_ok = labels.iter().all(|label| DOMAIN_LABEL_RE.is_match(label));
    let tld_ok = tld.len() >= 2 && !tld.chars().all(|c| c.is_ascii_digit());
    if domain.len() > 253 || !labels_ok || !tld_ok {
        return Err(error(
            "email",
            format!("The domain name {} is not valid.", domain),
        ));
    }
    Ok(())
}

/// Checks an email address and returns it normalized (trimmed, domain
/// lowercased).
///
/// `user@localhost` and dotted-quad domains such as `user@127.0.0.1` are
/// accepted even though they would fail a deliverability check.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(error("email", "Email must be at most 120 characters"));
    }
    let (local, domain) = match email.rsplit_once('@') {
        Some(parts) => parts,
        None => {
            return Err(error(
                "email",
                "The email address is not valid. It must have exactly one @-sign.",
            ))
        }
    };
    if local.is_empty() {
        return Err(error("email", "There must be something before the @-sign."));
    }
    if domain.is_empty() {
        return Err(error("email", "There must be something after the @-sign."));
    }
    if local.len() > 64 || !LOCAL_PART_RE.is_match(local) {
        return Err(error(
            "email",
            "The email address contains invalid characters before the @-sign.",
        ));
    }

    let domain = domain.to_ascii_lowercase();
    if domain != "localhost" && !is_ip_literal(&domain) {
        check_domain(&domain)?;
    }
    Ok(format!("{}@{}", local, domain))
}

/// Requires at least 8 characters, one digit and one uppercase letter.
/// The first unmet rule is reported.
pub fn validate_password(password: &str) -> Result<String, ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(error(
            "length",
            "Password must be at least 8 characters long",
        ));
    }
    if !DIGIT_RE.is_match(password) {
        return Err(error("digit", "Password must contain at least one digit"));
    }
    if !UPPERCASE_RE.is_match(password) {
        return Err(error(
            "uppercase",
            "Password must contain at least one uppercase letter",
        ));
    }
    Ok(password.to_string())
}

/// Parses the ISO-8601 shapes clients send: RFC 3339 with `Z` or an offset,
/// naive date-times (taken as UTC) and plain dates (midnight UTC).
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub(crate) fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        Err(error("required", "Title is required"))
    } else if title.chars().count() > MAX_NAME_LEN {
        Err(error("length", "Title must be less than 100 characters"))
    } else {
        Ok(())
    }
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        Err(error("required", "Name is required"))
    } else if name.chars().count() > MAX_NAME_LEN {
        Err(error("length", "Name must be less than 100 characters"))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_priority(priority: &str) -> Result<(), ValidationError> {
    if priority.is_empty() || priority.parse::<TaskPriority>().is_ok() {
        Ok(())
    } else {
        Err(error(
            "priority",
            "Priority must be one of: high, medium, low",
        ))
    }
}

pub(crate) fn validate_status(status: &str) -> Result<(), ValidationError> {
    if status.is_empty() || status.parse::<TaskStatus>().is_ok() {
        Ok(())
    } else {
        Err(error(
            "status",
            "Status must be one of: todo, in-progress, completed",
        ))
    }
}

pub(crate) fn validate_due_date(due_date: &str) -> Result<(), ValidationError> {
    // An empty string means "no due date".
    if due_date.is_empty() || parse_iso8601(due_date).is_some() {
        Ok(())
    } else {
        Err(error("due_date", "Due date must be a valid ISO format date"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_emails() {
        for email in [
            "user@example.com",
            "user.name@example.com",
            "user+tag@example.com",
            "user@subdomain.example.com",
            "very.long.email.address.with.many.parts@example.com",
            "user@very-long-domain-name-that-is-valid-but-unusual.com",
            "user@localhost",
            "user@127.0.0.1",
        ] {
            assert!(validate_email(email).is_ok(), "{} should be valid", email);
        }
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "",
            "user",
            "user@",
            "@example.com",
            "user@.com",
            "user@example",
            "user@example.",
            "user@exam ple.com",
            "us er@example.com",
            "user@-example.com",
        ] {
            let result = validate_email(email);
            assert!(result.is_err(), "{} should be invalid", email);
            assert!(!message_of(&result.unwrap_err()).is_empty());
        }
    }

    #[test]
    fn test_email_length_is_capped() {
        let domain = format!("{}.example.com", "b".repeat(50));
        let fits = format!("{}@{}", "a".repeat(MAX_EMAIL_LEN - domain.len() - 1), domain);
        assert_eq!(fits.len(), MAX_EMAIL_LEN);
        assert!(validate_email(&fits).is_ok());

        let too_long = format!("a{}", fits);
        let err = validate_email(&too_long).unwrap_err();
        assert_eq!(message_of(&err), "Email must be at most 120 characters");

        // Surrounding whitespace is trimmed before measuring.
        assert!(validate_email(&format!("  {}  ", fits)).is_ok());
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(
            validate_email("  Jane.Doe@Example.COM ").unwrap(),
            "Jane.Doe@example.com"
        );
    }

    #[test]
    fn test_password_rules_report_specific_deficiency() {
        let short = validate_password("Ab1").unwrap_err();
        assert_eq!(
            message_of(&short),
            "Password must be at least 8 characters long"
        );

        let no_digit = validate_password("Abcdefgh").unwrap_err();
        assert_eq!(message_of(&no_digit), "Password must contain at least one digit");

        let no_upper = validate_password("abcdefg1").unwrap_err();
        assert_eq!(
            message_of(&no_upper),
            "Password must contain at least one uppercase letter"
        );

        assert_eq!(validate_password("Abcdefg1").unwrap(), "Abcdefg1");
        // No special character requirement.
        assert!(validate_password("Password123").is_ok());
    }

    #[test]
    fn test_parse_iso8601_variants() {
        let z = parse_iso8601("2024-05-01T12:30:00Z").unwrap();
        assert_eq!((z.day(), z.hour(), z.minute()), (1, 12, 30));

        let offset = parse_iso8601("2024-05-01T12:30:00+02:00").unwrap();
        assert_eq!(offset.hour(), 10);

        let naive = parse_iso8601("2024-05-01T12:30:00.250").unwrap();
        assert_eq!(naive.hour(), 12);

        let minutes = parse_iso8601("2024-05-01T08:15").unwrap();
        assert_eq!(minutes.minute(), 15);

        let date = parse_iso8601("2024-05-01").unwrap();
        assert_eq!((date.month(), date.day(), date.hour()), (5, 1, 0));

        assert!(parse_iso8601("next tuesday").is_none());
        assert!(parse_iso8601("2024-13-01").is_none());
    }

    #[test]
    fn test_enum_field_checks() {
        assert!(validate_priority("high").is_ok());
        assert!(validate_priority("urgent").is_err());
        assert!(validate_status("in-progress").is_ok());
        assert!(validate_status("done").is_err());
        assert!(validate_due_date("").is_ok());
        assert!(validate_due_date("tomorrow").is_err());
    }
}
