//! ISO 8601 values: datetimes, dates, times and durations.
//!
//! Both extended (`2024-01-01T09:30:00`) and basic (`20240101T093000`)
//! forms are accepted. The DSL uses `:` to separate keys from values, so
//! specs written inline have to use the basic form.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::sections::Amount;
use crate::sizing::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoKind {
    DateTime,
    Date,
    Time,
    Duration,
}

impl IsoKind {
    pub const NAMES: [&'static str; 4] = ["datetime", "date", "time", "duration"];

    pub fn from_name(name: &str) -> Option<IsoKind> {
        match name {
            "datetime" => Some(IsoKind::DateTime),
            "date" => Some(IsoKind::Date),
            "time" => Some(IsoKind::Time),
            "duration" => Some(IsoKind::Duration),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IsoKind::DateTime => "datetime",
            IsoKind::Date => "date",
            IsoKind::Time => "time",
            IsoKind::Duration => "duration",
        }
    }
}

impl fmt::Display for IsoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed ISO 8601 point value. Datetimes without an offset are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoValue {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl IsoValue {
    pub fn kind(&self) -> IsoKind {
        match self {
            IsoValue::DateTime(_) => IsoKind::DateTime,
            IsoValue::Date(_) => IsoKind::Date,
            IsoValue::Time(_) => IsoKind::Time,
        }
    }

    /// Render in basic format so the text survives the DSL lexer.
    pub fn to_basic(&self) -> String {
        match self {
            IsoValue::DateTime(dt) => dt.format("%Y%m%dT%H%M%S%.f").to_string(),
            IsoValue::Date(d) => d.format("%Y%m%d").to_string(),
            IsoValue::Time(t) => t.format("T%H%M%S%.f").to_string(),
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];
const TIME_FORMATS: [&str; 4] = ["%H:%M:%S%.f", "%H:%M", "%H%M%S%.f", "%H%M"];

/// Parse `text` as the given point kind. Durations go through [`parse_duration`].
pub fn parse_value(kind: IsoKind, text: &str) -> Option<IsoValue> {
    let text = text.trim();
    match kind {
        IsoKind::DateTime => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(IsoValue::DateTime(dt.naive_utc()));
            }
            let bare = text.strip_suffix('Z').unwrap_or(text);
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(bare, f).ok())
                .map(IsoValue::DateTime)
        }
        IsoKind::Date => DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
            .map(IsoValue::Date),
        IsoKind::Time => {
            let bare = text.strip_prefix('T').unwrap_or(text);
            let bare = bare.strip_suffix('Z').unwrap_or(bare);
            TIME_FORMATS
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(bare, f).ok())
                .map(IsoValue::Time)
        }
        IsoKind::Duration => None,
    }
}

/// Components of a `PnYnMnWnDTnHnMnS` duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsoDuration {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Parse an ISO 8601 duration such as `P1D`, `PT15M` or `P2W`.
pub fn parse_duration(text: &str) -> Option<IsoDuration> {
    let rest = text.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut dur = IsoDuration::default();
    let mut in_time = false;
    let mut num_buf = String::new();
    let mut found_any = false;

    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
            continue;
        }
        if ch == 'T' {
            if in_time || !num_buf.is_empty() {
                return None;
            }
            in_time = true;
            continue;
        }
        if num_buf.is_empty() {
            return None;
        }
        let n: i64 = num_buf.parse().ok()?;
        num_buf.clear();
        found_any = true;

        match (ch, in_time) {
            ('Y', false) => dur.years += n,
            ('M', false) => dur.months += n,
            ('W', false) => dur.weeks += n,
            ('D', false) => dur.days += n,
            ('H', true) => dur.hours += n,
            ('M', true) => dur.minutes += n,
            ('S', true) => dur.seconds += n,
            _ => return None,
        }
    }

    if !num_buf.is_empty() || !found_any {
        return None;
    }
    Some(dur)
}

impl IsoDuration {
    /// Collapse into a single [`Amount`] in the smallest unit present.
    ///
    /// Calendar units (years, months) cannot be mixed with fixed units, and
    /// a zero-length duration has no amount.
    pub fn to_amount(&self) -> Option<Amount> {
        let calendar = self.years.checked_mul(12)?.checked_add(self.months)?;
        let fixed = self
            .weeks
            .checked_mul(604_800)?
            .checked_add(self.days.checked_mul(86_400)?)?
            .checked_add(self.hours.checked_mul(3_600)?)?
            .checked_add(self.minutes.checked_mul(60)?)?
            .checked_add(self.seconds)?;

        match (calendar > 0, fixed > 0) {
            (true, true) | (false, false) => None,
            (true, false) if self.months == 0 => Some(Amount::new(self.years, Size::Year)),
            (true, false) => Some(Amount::new(calendar, Size::Month)),
            (false, true) => {
                let size = if self.seconds > 0 {
                    Size::Second
                } else if self.minutes > 0 {
                    Size::Minute
                } else if self.hours > 0 {
                    Size::Hour
                } else if self.days > 0 {
                    Size::Day
                } else {
                    Size::Week
                };
                let per = size.fixed_seconds()?;
                Some(Amount::new(fixed / per, size))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_extended_and_basic() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        for text in [
            "2024-01-01T09:30:00",
            "2024-01-01T09:30",
            "20240101T093000",
            "20240101T093000Z",
            "2024-01-01T09:30:00Z",
            "2024-01-01T10:30:00+01:00",
        ] {
            assert_eq!(
                parse_value(IsoKind::DateTime, text),
                Some(IsoValue::DateTime(expected)),
                "failed on {text}"
            );
        }
    }

    #[test]
    fn test_parse_date_and_time() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_value(IsoKind::Date, "2024-03-15"), Some(IsoValue::Date(date)));
        assert_eq!(parse_value(IsoKind::Date, "20240315"), Some(IsoValue::Date(date)));

        let time = NaiveTime::from_hms_opt(9, 5, 0).unwrap();
        assert_eq!(parse_value(IsoKind::Time, "09:05"), Some(IsoValue::Time(time)));
        assert_eq!(parse_value(IsoKind::Time, "T090500"), Some(IsoValue::Time(time)));
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        assert_eq!(parse_value(IsoKind::Date, "yesterday"), None);
        assert_eq!(parse_value(IsoKind::Time, "25:00"), None);
        assert_eq!(parse_value(IsoKind::Duration, "P1D"), None);
    }

    #[test]
    fn test_basic_rendering_parses_back() {
        let value = parse_value(IsoKind::DateTime, "2024-06-01T12:00:00").unwrap();
        assert_eq!(value.to_basic(), "20240601T120000");
        assert_eq!(parse_value(IsoKind::DateTime, &value.to_basic()), Some(value));

        let time = parse_value(IsoKind::Time, "07:45:00").unwrap();
        assert_eq!(parse_value(IsoKind::Time, &time.to_basic()), Some(time));
    }

    #[test]
    fn test_parse_duration_components() {
        let d = parse_duration("P1DT2H30M").unwrap();
        assert_eq!(d.days, 1);
        assert_eq!(d.hours, 2);
        assert_eq!(d.minutes, 30);
        assert_eq!(parse_duration("P2W").unwrap().weeks, 2);
        // M means months before T and minutes after it.
        let d = parse_duration("P1MT1M").unwrap();
        assert_eq!((d.months, d.minutes), (1, 1));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("1D"), None);
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("P1H"), None);
        assert_eq!(parse_duration("P5"), None);
    }

    #[test]
    fn test_duration_to_amount() {
        assert_eq!(
            parse_duration("PT15M").unwrap().to_amount(),
            Some(Amount::new(15, Size::Minute))
        );
        assert_eq!(
            parse_duration("P1DT2H").unwrap().to_amount(),
            Some(Amount::new(26, Size::Hour))
        );
        assert_eq!(
            parse_duration("P1Y6M").unwrap().to_amount(),
            Some(Amount::new(18, Size::Month))
        );
        assert_eq!(
            parse_duration("P2Y").unwrap().to_amount(),
            Some(Amount::new(2, Size::Year))
        );
        assert_eq!(parse_duration("P1M2D").unwrap().to_amount(), None);
        assert_eq!(parse_duration("PT0S").unwrap().to_amount(), None);
    }
}
