//! Conversion of host values into typed wire parameters.

use crate::error::{ConnectionError, ParameterError};
use crate::types::{Classification, SqlParameter, TypeClassifier, Value, WireKind, WireValue};
use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use std::fmt;
use std::str::FromStr;

/// How date/time columns are returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatetimeConversion {
    /// Return the wire string unmodified
    KeepRaw,
    /// Return a [`Value::Timestamp`]
    ToDate,
    /// Return an ISO-8601 string in the configured timezone
    #[default]
    ToIsoString,
}

/// Timezone that naive wire timestamps are interpreted in, and that host
/// timestamps are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneMode {
    #[default]
    Utc,
    /// Wall clock of the host
    Local,
    Fixed(FixedOffset),
}

impl TimeZoneMode {
    /// Interpret a naive date/time in this zone.
    pub fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            TimeZoneMode::Utc => Some(Utc.from_utc_datetime(naive).into()),
            TimeZoneMode::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(DateTime::<FixedOffset>::from),
            TimeZoneMode::Fixed(offset) => offset.from_local_datetime(naive).single(),
        }
    }

    /// Express an instant in this zone.
    pub fn convert(&self, instant: &DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            TimeZoneMode::Utc => (*instant).into(),
            TimeZoneMode::Local => instant.with_timezone(&Local).into(),
            TimeZoneMode::Fixed(offset) => instant.with_timezone(offset),
        }
    }

    /// Parse a SQL-style date/time string (`YYYY-MM-DD[ HH:MM:SS[.fff]][offset]`).
    ///
    /// Strings without an offset are read as wall-clock time in this zone;
    /// strings with one are converted into this zone.
    pub fn parse_sql(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let text = text.trim();

        for pattern in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
            if let Ok(dt) = DateTime::parse_from_str(text, pattern) {
                return Some(self.convert(&dt.with_timezone(&Utc)));
            }
        }

        for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
                return self.localize(&naive);
            }
        }

        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .and_then(|naive| self.localize(&naive))
    }
}

impl FromStr for TimeZoneMode {
    type Err = ConnectionError;

    /// Accepts `utc`, `local`, or a fixed offset such as `+02:00` or `-0530`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "utc" | "z" => return Ok(TimeZoneMode::Utc),
            "local" => return Ok(TimeZoneMode::Local),
            _ => {}
        }

        let invalid = || ConnectionError::InvalidParameter {
            parameter: "treat_as_time_zone".to_string(),
            message: format!("'{}' is not utc, local or a +HH:MM offset", s),
        };

        let (sign, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
            (1, rest)
        } else if let Some(rest) = trimmed.strip_prefix('-') {
            (-1, rest)
        } else {
            return Err(invalid());
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(TimeZoneMode::Fixed)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for TimeZoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeZoneMode::Utc => f.write_str("utc"),
            TimeZoneMode::Local => f.write_str("local"),
            TimeZoneMode::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Options applied when formatting parameters and decoding results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatOptions {
    pub datetime_conversion: DatetimeConversion,
    pub treat_as_time_zone: TimeZoneMode,
    /// Return array columns as JSON text
    pub stringify_arrays: bool,
}

/// Builds wire parameters from host values.
pub struct ParameterFormatter;

impl ParameterFormatter {
    /// Format one named value into a wire parameter.
    pub fn format(
        name: &str,
        value: &Value,
        options: &FormatOptions,
    ) -> Result<SqlParameter, ParameterError> {
        let (kind, type_hint) = match TypeClassifier::classify(value) {
            Classification::Kind(kind, hint) => (kind, hint),
            Classification::PassThrough => {
                return match value {
                    Value::Wire(wire) => Ok(SqlParameter {
                        name: name.to_string(),
                        type_hint: None,
                        value: wire.clone(),
                    }),
                    _ => Err(Self::invalid(name, "unexpected pass-through value")),
                };
            }
            Classification::Unsupported(reason) => return Err(Self::invalid(name, reason)),
        };

        let wire = match (kind, value) {
            (WireKind::Null, _) => WireValue::null(),
            (_, Value::String(s)) => WireValue::String(s.clone()),
            (_, Value::Timestamp(ts)) => {
                WireValue::String(format_timestamp(ts, &options.treat_as_time_zone))
            }
            (_, Value::Bool(b)) => WireValue::Boolean(*b),
            (_, Value::Int(i)) => WireValue::Long(*i),
            (WireKind::Long, Value::Float(f)) => WireValue::Long(*f as i64),
            (_, Value::Float(f)) => WireValue::Double(*f),
            (_, Value::Bytes(b)) => WireValue::Blob(b.clone()),
            _ => return Err(Self::invalid(name, "value kind has no wire encoding")),
        };

        Ok(SqlParameter {
            name: name.to_string(),
            type_hint,
            value: wire,
        })
    }

    fn invalid(name: &str, reason: &str) -> ParameterError {
        ParameterError::InvalidType {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS[.fff]` in the given zone.
/// The fraction is omitted when the millisecond part is zero.
pub fn format_timestamp(ts: &DateTime<Utc>, zone: &TimeZoneMode) -> String {
    let local = zone.convert(ts);
    let millis = local.nanosecond() / 1_000_000 % 1000;

    if millis == 0 {
        local.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        format!("{}.{:03}", local.format("%Y-%m-%d %H:%M:%S"), millis)
    }
}
