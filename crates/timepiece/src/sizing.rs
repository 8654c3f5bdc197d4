//! Units of time and calendar-correct arithmetic over them.
//!
//! Seconds through weeks are fixed-length strides. Months and years are
//! calendar strides: adding one month to January 31st lands on the last day
//! of February, not 30 days later. Converting between the two families is
//! therefore approximate and depends on the reference instant.

use std::fmt;

use chrono::{DateTime, Datelike, Months, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Size {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Size {
    /// Every unit, smallest first.
    pub const ALL: [Size; 7] = [
        Size::Second,
        Size::Minute,
        Size::Hour,
        Size::Day,
        Size::Week,
        Size::Month,
        Size::Year,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Size::Second => "second",
            Size::Minute => "minute",
            Size::Hour => "hour",
            Size::Day => "day",
            Size::Week => "week",
            Size::Month => "month",
            Size::Year => "year",
        }
    }

    /// Look a unit up by its DSL name.
    pub fn from_name(name: &str) -> Option<Size> {
        Size::ALL.into_iter().find(|s| s.as_str() == name)
    }

    pub fn names() -> Vec<&'static str> {
        Size::ALL.iter().map(|s| s.as_str()).collect()
    }

    /// Length in seconds for fixed-length units; `None` for months and years.
    pub fn fixed_seconds(self) -> Option<i64> {
        match self {
            Size::Second => Some(1),
            Size::Minute => Some(60),
            Size::Hour => Some(3_600),
            Size::Day => Some(86_400),
            Size::Week => Some(604_800),
            Size::Month | Size::Year => None,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The smaller of two units.
pub fn common_size(a: Size, b: Size) -> Size {
    a.min(b)
}

/// Move `dt` by `n` units, using calendar arithmetic for months and years.
///
/// Returns `None` on overflow.
pub fn shift(dt: DateTime<Utc>, size: Size, n: i64) -> Option<DateTime<Utc>> {
    match size.fixed_seconds() {
        Some(secs) => {
            let delta = chrono::Duration::try_seconds(n.checked_mul(secs)?)?;
            dt.checked_add_signed(delta)
        }
        None => {
            let months = if size == Size::Year {
                n.checked_mul(12)?
            } else {
                n
            };
            let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
            if months >= 0 {
                dt.checked_add_months(magnitude)
            } else {
                dt.checked_sub_months(magnitude)
            }
        }
    }
}

/// Whole calendar months from `from` up to `to` (`from <= to`).
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + to.month() as i64 - from.month() as i64;
    while months > 0 && shift(from, Size::Month, months).is_none_or(|dt| dt > to) {
        months -= 1;
    }
    months.max(0)
}

/// Express `num` units of `from` in `to` units, measured from `reference`.
///
/// Month and year targets count whole calendar periods; fixed targets floor
/// the elapsed seconds. Returns `None` on overflow.
pub fn convert_amount(from: Size, to: Size, num: i64, reference: DateTime<Utc>) -> Option<i64> {
    if from == to {
        return Some(num);
    }
    let target = shift(reference, from, num)?;
    match to {
        Size::Month => Some(months_between(reference, target)),
        Size::Year => Some(months_between(reference, target) / 12),
        fixed => {
            let secs = fixed.fixed_seconds()?;
            Some((target - reference).num_seconds().div_euclid(secs))
        }
    }
}
