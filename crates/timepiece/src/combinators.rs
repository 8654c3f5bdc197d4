//! Terminal specs and the composite shapes built by `&` and `|`.
//!
//! After simplification every spec is one of these (or an interval/amount
//! waiting to be joined to a start):
//!
//! - [`DateTimeSpec`]: a single instant
//! - [`Repeat`]: a start, optional intervals, optional end
//! - [`Filter`]: a predicate over minute/hour/week/month/day
//! - [`RepeatAndFilters`]: a repeat whose occurrences must pass every filter
//! - [`ManyRepeatAndFilters`]: a union of the above
//! - [`Intervals`]: a set of periodic strides merged round by round

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, SubsecRound, Timelike, Utc, Weekday};

use crate::capability::{Capability, Specifies};
use crate::iso8601::IsoValue;
use crate::sections::Interval;

/// How long after an instant [`DateTimeSpec::is_filtered`] still accepts,
/// absorbing scheduler jitter.
pub const FILTER_TOLERANCE_SECONDS: i64 = 30;

/// Upper bound on the rounds [`Intervals::following`] pulls before giving up.
pub const MAX_ROUNDS: usize = 100;

/// Weekday names accepted by `day_name(...)` and `filter(day_names:...)`.
pub const WEEKDAY_NAMES: [&str; 7] = ["mon", "tues", "wed", "thur", "fri", "sat", "sun"];

pub(crate) fn weekday_from_name(name: &str) -> Option<Weekday> {
    WEEKDAY_NAMES
        .iter()
        .position(|n| *n == name)
        .and_then(|i| Weekday::try_from(i as u8).ok())
}

pub(crate) fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAY_NAMES[day.num_days_from_monday() as usize]
}

pub(crate) fn render_instant(dt: &DateTime<Utc>) -> String {
    format!(
        "iso8601(type:datetime,specification:{})",
        IsoValue::DateTime(dt.naive_utc()).to_basic()
    )
}

// ── DateTimeSpec ────────────────────────────────────────────────────────────

/// A single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeSpec {
    pub datetime: DateTime<Utc>,
}

impl DateTimeSpec {
    pub fn new(datetime: DateTime<Utc>) -> Self {
        DateTimeSpec { datetime }
    }

    /// The instant itself, unless `at` (to the second) is already past it.
    pub fn following(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if at.trunc_subsecs(0) > self.datetime {
            None
        } else {
            Some(self.datetime)
        }
    }

    /// True from the instant until [`FILTER_TOLERANCE_SECONDS`] after it.
    pub fn is_filtered(&self, at: DateTime<Utc>) -> bool {
        if at < self.datetime {
            return false;
        }
        at - self.datetime < chrono::Duration::seconds(FILTER_TOLERANCE_SECONDS)
    }
}

impl fmt::Display for DateTimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_instant(&self.datetime))
    }
}

// ── Repeat ──────────────────────────────────────────────────────────────────

/// A start instant, optionally repeating on a set of intervals until an end.
#[derive(Debug, Clone, PartialEq)]
pub struct Repeat {
    pub start: DateTime<Utc>,
    pub every: Option<Intervals>,
    pub end: Option<DateTime<Utc>>,
}

impl Repeat {
    pub fn once(start: DateTime<Utc>) -> Self {
        Repeat {
            start,
            every: None,
            end: None,
        }
    }

    pub fn specifies(&self) -> Specifies {
        let mut caps = Specifies::none();
        if self.every.is_some() {
            caps.insert(Capability::Repeat);
        }
        if self.end.is_some() {
            caps.insert(Capability::Duration);
        }
        if caps.is_empty() {
            caps.insert(Capability::Once);
        }
        caps
    }

    /// The next occurrence at or after `at`.
    pub fn following(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.end.is_some_and(|end| at > end) {
            return None;
        }
        if at < self.start {
            return Some(self.start);
        }
        match &self.every {
            Some(every) => every.following(at, self.start, self.end),
            None => DateTimeSpec::new(self.start).following(at),
        }
    }

    pub fn is_filtered(&self, at: DateTime<Utc>) -> bool {
        if self.end.is_some_and(|end| at > end) || at < self.start {
            return false;
        }
        match &self.every {
            Some(every) => every.is_filtered(at),
            None => DateTimeSpec::new(self.start).is_filtered(at),
        }
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = match self.end {
            Some(end) => format!(
                "between(start:{},end:{})",
                render_instant(&self.start),
                render_instant(&end)
            ),
            None => render_instant(&self.start),
        };
        match &self.every {
            Some(every) => write!(f, "({start}&{every})"),
            None => f.write_str(&start),
        }
    }
}

// ── Filter ──────────────────────────────────────────────────────────────────

/// A predicate over calendar fields of a candidate instant.
///
/// `None` means "not filtered on this field". Combining two filters with
/// `&` unions each field's accepted values (kept sorted). Each field is
/// then checked independently, so the predicate is the intersection across
/// fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub minutes: Option<Vec<u32>>,
    pub hours: Option<Vec<u32>>,
    pub weeks: Option<Vec<u32>>,
    pub months: Option<Vec<u32>>,
    pub day_names: Option<Vec<Weekday>>,
    pub day_numbers: Option<Vec<u32>>,
}

fn union_field<T, K>(
    a: &Option<Vec<T>>,
    b: &Option<Vec<T>>,
    key: impl Fn(&T) -> K,
) -> Option<Vec<T>>
where
    T: Clone + PartialEq,
    K: Ord,
{
    let mut merged: Vec<T> = match (a, b) {
        (None, None) => return None,
        (Some(x), None) | (None, Some(x)) => x.clone(),
        (Some(x), Some(y)) => x.iter().chain(y).cloned().collect(),
    };
    merged.sort_by_key(|v| key(v));
    merged.dedup();
    Some(merged)
}

fn accepts<T: PartialEq>(field: &Option<Vec<T>>, value: T) -> bool {
    field.as_ref().is_none_or(|allowed| allowed.contains(&value))
}

/// Week of the year with Monday as the first day, as `%W` counts it: days
/// before the year's first Monday are week 0.
pub fn gregorian_week(date: NaiveDate) -> u32 {
    (date.ordinal0() + 7 - date.weekday().num_days_from_monday()) / 7
}

impl Filter {
    pub fn merge(&self, other: &Filter) -> Filter {
        Filter {
            minutes: union_field(&self.minutes, &other.minutes, |v| *v),
            hours: union_field(&self.hours, &other.hours, |v| *v),
            weeks: union_field(&self.weeks, &other.weeks, |v| *v),
            months: union_field(&self.months, &other.months, |v| *v),
            day_names: union_field(&self.day_names, &other.day_names, |d| {
                d.num_days_from_monday()
            }),
            day_numbers: union_field(&self.day_numbers, &other.day_numbers, |v| *v),
        }
    }

    pub fn is_filtered(&self, at: DateTime<Utc>) -> bool {
        let date = at.date_naive();
        accepts(&self.minutes, at.minute())
            && accepts(&self.hours, at.hour())
            && accepts(&self.weeks, gregorian_week(date))
            && accepts(&self.months, at.month())
            && accepts(&self.day_names, at.weekday())
            && accepts(&self.day_numbers, at.ordinal())
    }
}

fn join_numbers(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(v) = &self.day_names {
            let names: Vec<&str> = v.iter().map(|d| weekday_name(*d)).collect();
            parts.push(format!("day_names:{}", names.join(";")));
        }
        if let Some(v) = &self.day_numbers {
            parts.push(format!("day_numbers:{}", join_numbers(v)));
        }
        if let Some(v) = &self.hours {
            parts.push(format!("hours:{}", join_numbers(v)));
        }
        if let Some(v) = &self.minutes {
            parts.push(format!("minutes:{}", join_numbers(v)));
        }
        if let Some(v) = &self.months {
            parts.push(format!("months:{}", join_numbers(v)));
        }
        if let Some(v) = &self.weeks {
            parts.push(format!("weeks:{}", join_numbers(v)));
        }
        write!(f, "filter({})", parts.join(","))
    }
}

// ── RepeatAndFilters ────────────────────────────────────────────────────────

/// A repeat whose occurrences only qualify when every filter accepts them.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatAndFilters {
    pub repeat: Repeat,
    pub filters: Vec<Filter>,
}

impl RepeatAndFilters {
    pub fn new(repeat: Repeat, filters: Vec<Filter>) -> Self {
        RepeatAndFilters { repeat, filters }
    }

    pub fn specifies(&self) -> Specifies {
        let mut caps = self.repeat.specifies();
        if !self.filters.is_empty() {
            caps.insert(Capability::Filter);
        }
        caps
    }

    pub fn with_filter(&self, filter: &Filter) -> Self {
        let mut filters = self.filters.clone();
        filters.push(filter.clone());
        RepeatAndFilters::new(self.repeat.clone(), filters)
    }

    /// Filters play no part in picking the candidate; they only accept or
    /// reject it afterwards.
    pub fn following(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.repeat.following(at)
    }

    pub fn is_filtered(&self, at: DateTime<Utc>) -> bool {
        self.filters.iter().all(|f| f.is_filtered(at))
    }
}

impl fmt::Display for RepeatAndFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Left-nested so each filter is appended rather than merged on re-parse.
        let mut out = self.repeat.to_string();
        for filter in &self.filters {
            out = format!("({out}&{filter})");
        }
        f.write_str(&out)
    }
}

// ── ManyRepeatAndFilters ────────────────────────────────────────────────────

/// A union of [`RepeatAndFilters`]: qualifies if any branch does.
#[derive(Debug, Clone, PartialEq)]
pub struct ManyRepeatAndFilters {
    pub specs: Vec<RepeatAndFilters>,
}

impl ManyRepeatAndFilters {
    pub fn new(specs: Vec<RepeatAndFilters>) -> Self {
        ManyRepeatAndFilters { specs }
    }

    pub fn specifies(&self) -> Specifies {
        self.specs
            .iter()
            .fold(Specifies::none(), |acc, s| acc.union(&s.specifies()))
    }

    /// The earliest next occurrence across all branches.
    pub fn following(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.specs.iter().filter_map(|s| s.following(at)).min()
    }

    pub fn is_filtered(&self, at: DateTime<Utc>) -> bool {
        self.specs.iter().any(|s| s.is_filtered(at))
    }
}

impl fmt::Display for ManyRepeatAndFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.specs.iter().map(|s| s.to_string()).collect();
        f.write_str(&parts.join("|"))
    }
}

// ── Intervals ───────────────────────────────────────────────────────────────

/// A set of periodic strides anchored to a common start.
#[derive(Debug, Clone, PartialEq)]
pub struct Intervals {
    pub intervals: Vec<Interval>,
}

impl Intervals {
    pub fn new(intervals: Vec<Interval>) -> Self {
        Intervals { intervals }
    }

    pub fn single(interval: Interval) -> Self {
        Intervals::new(vec![interval])
    }

    pub fn concat(&self, other: &Intervals) -> Intervals {
        let mut intervals = self.intervals.clone();
        intervals.extend(other.intervals.iter().cloned());
        Intervals::new(intervals)
    }

    /// Occurrences come from [`Intervals::following`], so anything asked
    /// about here already lines up with a stride.
    pub fn is_filtered(&self, _at: DateTime<Utc>) -> bool {
        true
    }

    /// The soonest instant after `at` on any stride, within `(start, end]`.
    pub fn following(
        &self,
        at: DateTime<Utc>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let cursors = self
            .intervals
            .iter()
            .map(|i| i.every.occurrences(start, at, end))
            .collect();
        merge_following(cursors, at, start, end)
    }
}

impl fmt::Display for Intervals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.intervals.iter().map(|i| i.to_string()).collect();
        if parts.len() == 1 {
            f.write_str(&parts[0])
        } else {
            write!(f, "({})", parts.join("|"))
        }
    }
}

/// Merge several lazy occurrence streams into the next instant after `at`.
///
/// Each round pulls one candidate from every live stream. A stream that
/// yields nothing, or a value past `end`, is dropped. Candidates before
/// `start` or `at` are discarded. The first round whose earliest candidate
/// is strictly after `at` wins. After [`MAX_ROUNDS`] the best candidate seen
/// so far is returned.
pub fn merge_following<I>(
    mut streams: Vec<I>,
    at: DateTime<Utc>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>>
where
    I: Iterator<Item = DateTime<Utc>>,
{
    let mut best: Option<DateTime<Utc>> = None;

    for round in 0..=MAX_ROUNDS {
        let mut next_round = Vec::new();
        streams.retain_mut(|stream| match stream.next() {
            Some(nxt) if end.is_none_or(|e| nxt.trunc_subsecs(0) <= e) => {
                if nxt >= start && nxt >= at {
                    next_round.push(nxt);
                }
                true
            }
            _ => false,
        });

        if streams.is_empty() && next_round.is_empty() {
            return best;
        }

        if let Some(mn) = next_round.into_iter().min() {
            if mn > at {
                return Some(mn);
            }
            best = Some(best.map_or(mn, |b| b.min(mn)));
        }

        if streams.is_empty() {
            return best;
        }

        if round == MAX_ROUNDS {
            tracing::warn!(
                rounds = MAX_ROUNDS,
                at = %at,
                best = ?best,
                "interval merge hit its round limit, returning best candidate"
            );
        }
    }

    best
}
