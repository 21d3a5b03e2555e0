use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 200;

/// A domain rule was broken by client-supplied data. Surfaces as HTTP 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type Validated = Result<(), ValidationError>;

pub fn validate_latitude(value: f64) -> Validated {
    if !(-90.0..=90.0).contains(&value) {
        return Err(ValidationError(format!("{value} is not a valid latitude")));
    }
    Ok(())
}

pub fn validate_longitude(value: f64) -> Validated {
    if !(-180.0..=180.0).contains(&value) {
        return Err(ValidationError(format!("{value} is not a valid longitude")));
    }
    Ok(())
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Validated {
    validate_latitude(latitude)?;
    validate_longitude(longitude)
}

pub fn validate_name(name: &str) -> Validated {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("name may not be blank"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError(format!(
            "name may not be longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// At least one way in; otherwise the site is inaccessible.
pub fn validate_entry(boat_entry: bool, shore_entry: bool) -> Validated {
    if !(boat_entry || shore_entry) {
        return Err(ValidationError::new(
            "either boat_entry or shore_entry must be true",
        ));
    }
    Ok(())
}

pub fn validate_duration(seconds: i64) -> Validated {
    if seconds <= 0 {
        return Err(ValidationError::new("Duration must be greater than 0."));
    }
    Ok(())
}

pub fn validate_depth(depth: f64) -> Validated {
    if !depth.is_finite() || depth < 0.0 {
        return Err(ValidationError(format!("{depth} is not a valid depth")));
    }
    Ok(())
}

/// The dive must already be over at `now`.
pub fn validate_dive_in_past(start_time: DateTime<Utc>, seconds: i64, now: DateTime<Utc>) -> Validated {
    validate_duration(seconds)?;
    let end = Duration::try_seconds(seconds).and_then(|d| start_time.checked_add_signed(d));
    match end {
        Some(end) if end < now => Ok(()),
        _ => Err(ValidationError::new("Dive must have taken place in the past")),
    }
}

pub fn validate_text(field: &str, text: &str) -> Validated {
    if text.trim().is_empty() {
        return Err(ValidationError(format!("{field} may not be blank")));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Validated {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("Enter a valid email address."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_bounds_are_inclusive() {
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(-90.01).is_err());
        assert!(validate_latitude(200.0).is_err());
        assert!(validate_latitude(f64::NAN).is_err());
    }

    #[test]
    fn longitude_bounds_are_inclusive() {
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-181.0).is_err());
        assert!(validate_longitude(181.0).is_err());
    }

    #[test]
    fn dive_must_end_before_now() {
        let now = Utc::now();
        let start = now - Duration::hours(2);
        assert!(validate_dive_in_past(start, 3600, now).is_ok());
        assert!(validate_dive_in_past(start, 7200, now).is_err());
        assert!(validate_dive_in_past(now + Duration::days(1), 60, now).is_err());
    }

    #[test]
    fn absurd_durations_fail_validation() {
        let now = Utc::now();
        let start = now - Duration::hours(2);
        for seconds in [i64::MAX, 9_000_000_000_000] {
            assert_eq!(
                validate_dive_in_past(start, seconds, now).unwrap_err().to_string(),
                "Dive must have taken place in the past"
            );
        }
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        let now = Utc::now();
        let start = now - Duration::days(1);
        assert_eq!(
            validate_dive_in_past(start, 0, now).unwrap_err().to_string(),
            "Duration must be greater than 0."
        );
        assert!(validate_duration(-5).is_err());
    }

    #[test]
    fn divesite_needs_an_entry() {
        assert!(validate_entry(false, false).is_err());
        assert!(validate_entry(true, false).is_ok());
        assert!(validate_entry(false, true).is_ok());
    }

    #[test]
    fn names_and_emails() {
        assert!(validate_name("  ").is_err());
        assert!(validate_name(&"x".repeat(201)).is_err());
        assert!(validate_name("Porthkerris").is_ok());
        assert!(validate_email("diver@example.com").is_ok());
        assert!(validate_email("diver@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }
}
