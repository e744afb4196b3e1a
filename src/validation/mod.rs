use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate};
use std::fmt;
use uuid::Uuid;

pub const CURRENCY_CODE_LEN: usize = 3;
pub const NOTES_MAX_LEN: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Non-empty, well-formed document identifier.
pub fn parse_document_id(field: &'static str, value: &str) -> Result<Uuid, ValidationError> {
    let value = value.trim();
    validate_required(field, value)?;

    Uuid::parse_str(value).map_err(|_| ValidationError::new(field, "must be a valid document id"))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its calendar date is kept).
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    let value = sanitize_string(value);
    validate_required(field, &value)?;

    if let Ok(date) = NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.date_naive())
        .map_err(|_| ValidationError::new(field, "must be a valid date (YYYY-MM-DD or RFC 3339)"))
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    let currency = sanitize_string(currency);
    validate_required("currency", &currency)?;

    if currency.len() != CURRENCY_CODE_LEN || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            "must be a three-letter uppercase ISO 4217 code",
        ));
    }

    Ok(())
}

/// Present and different from zero.
pub fn validate_nonzero_amount(
    field: &'static str,
    amount: Option<&BigDecimal>,
) -> ValidationResult {
    match amount {
        Some(value) if value != &BigDecimal::from(0) => Ok(()),
        Some(_) => Err(ValidationError::new(field, "must not be zero")),
        None => Err(ValidationError::new(field, "is missing")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn validates_enum_values() {
        assert!(validate_enum("status", "validated", &["validated", "signed"]).is_ok());
        assert!(validate_enum("status", "draft", &["validated", "signed"]).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn parses_document_ids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_document_id("source_id", &format!(" {} ", id)).unwrap(), id);
        assert_eq!(parse_document_id("source_id", "").unwrap_err().message, "must not be empty");
        assert!(parse_document_id("source_id", "not-a-uuid").is_err());
    }

    #[test]
    fn parses_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(parse_date("issued_on", "2024-01-01").unwrap(), expected);
        assert_eq!(parse_date("issued_on", "2024-01-01T09:15:00Z").unwrap(), expected);
        assert!(parse_date("issued_on", "2024-02-30").is_err());
        assert!(parse_date("issued_on", "tomorrow").is_err());
    }

    #[test]
    fn validates_currency() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency(" EUR ").is_ok());
        assert!(validate_currency("eur").is_err());
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("").is_err());
    }

    #[test]
    fn validates_nonzero_amount() {
        let amount = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from_str("0.00").expect("valid decimal");

        assert!(validate_nonzero_amount("total", Some(&amount)).is_ok());
        assert!(validate_nonzero_amount("total", Some(&zero)).is_err());
        assert!(validate_nonzero_amount("total", None).is_err());
    }
}
