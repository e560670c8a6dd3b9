//! Serde utils

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::{self, Visitor};
use serde::Deserializer;
use std::fmt;

/// Datetime format accepted in query parameters
pub const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SOURCE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const SOURCE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a source timestamp, trying the naive formats first then RFC 3339.
///
/// Timezone aware values are normalised to UTC, bare dates map to midnight.
pub fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    SOURCE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(s, SOURCE_DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Parse a query parameter in the strict `YYYY-MM-DD HH:MM:SS` format
pub fn parse_query_datetime(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, QUERY_DATETIME_FORMAT)
}

struct NaiveDateTimeInQuotes;

impl<'de> Visitor<'de> for NaiveDateTimeInQuotes {
    type Value = NaiveDateTime;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a datetime as `YYYY-MM-DD HH:MM:SS`, RFC 3339 or `YYYY-MM-DD`")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        parse_naive_datetime(s)
            .ok_or_else(|| de::Error::custom(format!("invalid datetime {:?}", s)))
    }
}

pub fn naive_datetime_from_string<'de, D>(d: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    d.deserialize_str(NaiveDateTimeInQuotes)
}
