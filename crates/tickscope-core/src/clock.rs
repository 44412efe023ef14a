use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, Result};

static DATE_ARG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Parse a `--date` style argument; only strict `YYYY-MM-DD` is accepted.
pub fn parse_date_arg(text: &str) -> Result<NaiveDate> {
    if !DATE_ARG_REGEX.is_match(text) {
        return Err(CoreError::InvalidDate(text.to_string()));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| CoreError::InvalidDate(text.to_string()))
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CoreError::UnknownTimeZone(name.to_string()))
}

/// Current calendar date as seen in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}
