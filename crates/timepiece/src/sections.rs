//! Built-in section kinds and their builders.
//!
//! Each `build_*` function reads a section's fields through a
//! [`FieldReader`] and returns the unsimplified [`Spec`]. Simplification to
//! terminal forms happens in [`Spec::simplify`].

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc, Weekday};

use crate::combinators::{render_instant, weekday_from_name, weekday_name, Filter, WEEKDAY_NAMES};
use crate::error::{Result, TimepieceError};
use crate::iso8601::{self, IsoKind, IsoValue};
use crate::registry::{Context, FieldReader, Registry};
use crate::sizing::{common_size, convert_amount, months_between, shift, Size};
use crate::spec::Spec;
use crate::value::Provenance;

/// Register every built-in section kind.
pub fn register_defaults(registry: &mut Registry) {
    registry.register("now", |_r: &mut FieldReader<'_>| Ok(Spec::Now));
    registry.register("forever", |_r: &mut FieldReader<'_>| Ok(Spec::Forever));
    registry.register("sunrise", |_r: &mut FieldReader<'_>| Ok(Spec::SunRise));
    registry.register("sunset", |_r: &mut FieldReader<'_>| Ok(Spec::SunSet));
    registry.register("amount", build_amount);
    registry.register("interval", build_interval);
    registry.register("range", build_range);
    registry.register("between", build_between);
    registry.register("day_name", build_day_name);
    registry.register("day_number", build_day_number);
    registry.register("time", build_time);
    registry.register("epoch", build_epoch);
    registry.register("date", build_date);
    registry.register("iso8601", build_iso8601);
    registry.register("filter", build_filter);
}

// ── Amount ──────────────────────────────────────────────────────────────────

/// `num` units of `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    pub num: i64,
    pub size: Size,
}

impl Amount {
    pub fn new(num: i64, size: Size) -> Self {
        Amount { num, size }
    }

    /// The same span expressed in `size` units, measured from `reference`.
    pub fn sized(&self, size: Size, reference: DateTime<Utc>) -> Option<Amount> {
        if size == self.size {
            return Some(*self);
        }
        convert_amount(self.size, size, self.num, reference).map(|num| Amount::new(num, size))
    }

    /// `start` moved by `k` strides of this amount.
    pub fn nth(&self, start: DateTime<Utc>, k: i64) -> Option<DateTime<Utc>> {
        shift(start, self.size, k.checked_mul(self.num)?)
    }

    /// Strides of this amount after `at`, anchored on `start` and bounded by
    /// `end`.
    pub fn occurrences(
        &self,
        start: DateTime<Utc>,
        at: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> IntervalCursor {
        IntervalCursor::new(*self, start, at, end)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amount(num:{},size:{})", self.num, self.size)
    }
}

/// Lazy, fused stream of `start + k * amount` for the `k` past `at`.
///
/// Every instant is computed from `start` rather than the previous one, so
/// month strides from the 31st keep landing on month ends.
#[derive(Debug, Clone)]
pub struct IntervalCursor {
    amount: Amount,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    k: i64,
    done: bool,
}

impl IntervalCursor {
    fn new(amount: Amount, start: DateTime<Utc>, at: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        let mut cursor = IntervalCursor {
            amount,
            start,
            end,
            k: 0,
            done: amount.num <= 0,
        };
        if cursor.done {
            return cursor;
        }

        if at > start {
            let units = match amount.size.fixed_seconds() {
                Some(secs) => (at - start).num_seconds() / secs,
                None if amount.size == Size::Year => months_between(start, at) / 12,
                None => months_between(start, at),
            };
            cursor.k = units / amount.num;
        }
        while let Some(nxt) = amount.nth(start, cursor.k) {
            if nxt > at {
                break;
            }
            cursor.k += 1;
        }
        cursor
    }
}

impl Iterator for IntervalCursor {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.amount.nth(self.start, self.k) {
            Some(nxt)
                if nxt > self.start
                    && self.end.is_none_or(|end| nxt.trunc_subsecs(0) <= end) =>
            {
                self.k += 1;
                Some(nxt)
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

fn build_amount(r: &mut FieldReader<'_>) -> Result<Spec> {
    let num = r.int("num")?;
    let expected = format!("one of {}", Size::names().join(", "));
    let size = r.parsed("size", &expected, Size::from_name)?;
    Ok(Spec::Amount(Amount::new(num, size)))
}

fn amount_field(r: &mut FieldReader<'_>, field: &str) -> Result<Amount> {
    match r.section(field)? {
        Spec::Amount(amount) => Ok(amount),
        other => Err(r.bad_value(field, "an amount", other.to_string())),
    }
}

// ── Interval ────────────────────────────────────────────────────────────────

/// Repeat every `every`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub every: Amount,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interval(every:{})", self.every)
    }
}

fn build_interval(r: &mut FieldReader<'_>) -> Result<Spec> {
    let every = amount_field(r, "every")?;
    if every.num <= 0 {
        return Err(r.bad_value("every", "a positive amount", every.to_string()));
    }
    Ok(Spec::Interval(Interval { every }))
}

// ── Range ───────────────────────────────────────────────────────────────────

/// An amount picked at random between `min` and `max`, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: Amount,
    pub max: Amount,
}

impl Range {
    /// Convert both bounds to the smaller unit and pick one value.
    ///
    /// # Errors
    ///
    /// `BadFieldType` when `min` exceeds `max` once both are expressed in
    /// the same unit.
    pub fn pick(&self, cx: &Context) -> Result<Amount> {
        let size = common_size(self.min.size, self.max.size);
        let now = cx.now();
        let (lo, hi) = match (self.min.sized(size, now), self.max.sized(size, now)) {
            (Some(lo), Some(hi)) if lo.num <= hi.num => (lo, hi),
            _ => {
                return Err(TimepieceError::BadFieldType {
                    path: Provenance::root(),
                    field: "min".to_string(),
                    expected: "an amount no larger than max".to_string(),
                    got: format!("{} > {}", self.min, self.max),
                })
            }
        };
        Ok(Amount::new(cx.pick(lo.num, hi.num), size))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "range(min:{},max:{})", self.min, self.max)
    }
}

fn build_range(r: &mut FieldReader<'_>) -> Result<Spec> {
    let min = amount_field(r, "min")?;
    let max = amount_field(r, "max")?;
    Ok(Spec::Range(Range { min, max }))
}

// ── Between ─────────────────────────────────────────────────────────────────

/// A span from `start` to `end`, or a year from now when `end` is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Between {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl fmt::Display for Between {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = render_instant(&self.start);
        match self.end {
            Some(end) => write!(f, "between(start:{start},end:{})", render_instant(&end)),
            None => write!(f, "between(start:{start})"),
        }
    }
}

const INSTANT_EXPECTED: &str = "a point in time (now, epoch, iso8601 date or time, date & time)";

fn instant_of(r: &FieldReader<'_>, field: &str, spec: Spec) -> Result<DateTime<Utc>> {
    spec.as_instant(r.context())
        .ok_or_else(|| r.bad_value(field, INSTANT_EXPECTED, spec.to_string()))
}

fn build_between(r: &mut FieldReader<'_>) -> Result<Spec> {
    let start = r.section("start")?;
    let start = instant_of(r, "start", start)?;
    let end = match r.opt_section("end")? {
        Some(end) => Some(instant_of(r, "end", end)?),
        None => None,
    };
    if let Some(end) = end.filter(|end| *end < start) {
        return Err(r.bad_value(
            "end",
            "an instant no earlier than start",
            render_instant(&end),
        ));
    }
    Ok(Spec::Between(Between { start, end }))
}

// ── DayName / DayNumber ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayName {
    pub days: Vec<Weekday>,
}

impl DayName {
    pub fn to_filter(&self) -> Filter {
        Filter {
            day_names: Some(self.days.clone()),
            ..Filter::default()
        }
    }
}

impl fmt::Display for DayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.days.iter().map(|d| weekday_name(*d)).collect();
        write!(f, "day_name(name:{})", names.join(";"))
    }
}

fn weekdays(names: &[String]) -> Vec<Weekday> {
    let mut days: Vec<Weekday> = names.iter().filter_map(|n| weekday_from_name(n)).collect();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    days
}

fn build_day_name(r: &mut FieldReader<'_>) -> Result<Spec> {
    let names = r.ssv_choices("name", &WEEKDAY_NAMES)?;
    Ok(Spec::DayName(DayName {
        days: weekdays(&names),
    }))
}

/// Days of the year, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayNumber {
    pub numbers: Vec<u32>,
}

impl DayNumber {
    pub fn to_filter(&self) -> Filter {
        Filter {
            day_numbers: Some(self.numbers.clone()),
            ..Filter::default()
        }
    }
}

impl fmt::Display for DayNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers: Vec<String> = self.numbers.iter().map(u32::to_string).collect();
        write!(f, "day_number(number:{})", numbers.join(";"))
    }
}

fn build_day_number(r: &mut FieldReader<'_>) -> Result<Spec> {
    let numbers = r.ssv_ints("number", 1, 366)?;
    Ok(Spec::DayNumber(DayNumber { numbers }))
}

// ── Time / Date / Epoch ─────────────────────────────────────────────────────

/// A time of day in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub time: NaiveTime,
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use chrono::Timelike;
        write!(
            f,
            "time(hour:{},minute:{})",
            self.time.hour(),
            self.time.minute()
        )
    }
}

fn build_time(r: &mut FieldReader<'_>) -> Result<Spec> {
    let hour = r.int("hour")?;
    let minute = r.int("minute")?;
    if !(0..=23).contains(&hour) {
        return Err(r.bad_value("hour", "an hour between 0 and 23", hour.to_string()));
    }
    if !(0..=59).contains(&minute) {
        return Err(r.bad_value("minute", "a minute between 0 and 59", minute.to_string()));
    }
    match NaiveTime::from_hms_opt(hour as u32, minute as u32, 0) {
        Some(time) => Ok(Spec::Time(TimeOfDay { time })),
        None => Err(r.bad_value("hour", "a valid time of day", format!("{hour}:{minute}"))),
    }
}

/// A calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    pub date: NaiveDate,
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use chrono::Datelike;
        write!(
            f,
            "date(day:{},month:{},year:{})",
            self.date.day(),
            self.date.month(),
            self.date.year()
        )
    }
}

fn build_date(r: &mut FieldReader<'_>) -> Result<Spec> {
    let day = r.int("day")?;
    let month = r.int("month")?;
    let year = r.int("year")?;
    let date = i32::try_from(year).ok().and_then(|y| {
        NaiveDate::from_ymd_opt(y, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
    });
    match date {
        Some(date) => Ok(Spec::Date(CalendarDate { date })),
        None => Err(r.bad_value("day", "a valid calendar date", format!("{year}-{month}-{day}"))),
    }
}

/// Seconds since the Unix epoch, in UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    pub epoch: f64,
}

impl Epoch {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        if !self.epoch.is_finite() {
            return None;
        }
        let secs = self.epoch.floor();
        let nanos = ((self.epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch(epoch:{})", self.epoch)
    }
}

fn build_epoch(r: &mut FieldReader<'_>) -> Result<Spec> {
    let epoch = Epoch {
        epoch: r.float("epoch")?,
    };
    if epoch.datetime().is_none() {
        return Err(r.bad_value("epoch", "a representable timestamp", epoch.epoch.to_string()));
    }
    Ok(Spec::Epoch(epoch))
}

// ── ISO 8601 ────────────────────────────────────────────────────────────────

/// What an `iso8601(...)` section parsed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoParsed {
    Value(IsoValue),
    Duration(Amount),
}

/// An ISO 8601 value of the given `kind`, parsed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iso8601 {
    pub kind: IsoKind,
    pub specification: String,
    pub parsed: IsoParsed,
}

impl fmt::Display for Iso8601 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iso8601(type:{},specification:{})",
            self.kind, self.specification
        )
    }
}

fn build_iso8601(r: &mut FieldReader<'_>) -> Result<Spec> {
    let expected = format!("one of {}", IsoKind::NAMES.join(", "));
    let kind = r.parsed("type", &expected, IsoKind::from_name)?;
    let specification = r.string("specification")?;

    let parsed = match kind {
        IsoKind::Duration => iso8601::parse_duration(&specification)
            .and_then(|d| d.to_amount())
            .map(IsoParsed::Duration),
        point => iso8601::parse_value(point, &specification).map(IsoParsed::Value),
    };
    match parsed {
        Some(parsed) => Ok(Spec::Iso8601(Iso8601 {
            kind,
            specification,
            parsed,
        })),
        None => Err(TimepieceError::InvalidIso8601 {
            path: r.path().field("specification"),
            kind: kind.to_string(),
            value: specification,
        }),
    }
}

// ── Filter ──────────────────────────────────────────────────────────────────

fn build_filter(r: &mut FieldReader<'_>) -> Result<Spec> {
    let mut filter = Filter::default();
    if r.has("minutes") {
        filter.minutes = Some(r.ssv_ints("minutes", 0, 59)?);
    }
    if r.has("hours") {
        filter.hours = Some(r.ssv_ints("hours", 0, 23)?);
    }
    if r.has("weeks") {
        filter.weeks = Some(r.ssv_ints("weeks", 0, 53)?);
    }
    if r.has("months") {
        filter.months = Some(r.ssv_ints("months", 1, 12)?);
    }
    if r.has("day_names") {
        let names = r.ssv_choices("day_names", &WEEKDAY_NAMES)?;
        filter.day_names = Some(weekdays(&names));
    }
    if r.has("day_numbers") {
        filter.day_numbers = Some(r.ssv_ints("day_numbers", 1, 366)?);
    }
    Ok(Spec::Filter(filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::combinators::DateTimeSpec;
    use crate::registry::Normaliser;
    use crate::value::RawSection;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    fn normalise(raw: RawSection) -> Result<Spec> {
        let registry = Registry::with_defaults();
        let cx = Context::new(
            Arc::new(FixedClock(utc(2024, 1, 1, 12, 0, 0))),
            Some(42),
        );
        Normaliser::new(&registry, &cx).normalise(&Provenance::indexed(1, &raw.name), raw)
    }

    fn amount(num: i64, size: &str) -> RawSection {
        RawSection::new("amount").with("num", num).with("size", size)
    }

    // ── Amount / IntervalCursor ─────────────────────────────────────────

    #[test]
    fn test_cursor_yields_strides_after_at() {
        let start = utc(2024, 1, 1, 0, 0, 0);
        let got: Vec<_> = Amount::new(15, Size::Minute)
            .occurrences(start, utc(2024, 1, 1, 0, 20, 0), None)
            .take(3)
            .collect();
        assert_eq!(
            got,
            vec![
                utc(2024, 1, 1, 0, 30, 0),
                utc(2024, 1, 1, 0, 45, 0),
                utc(2024, 1, 1, 1, 0, 0)
            ]
        );
    }

    #[test]
    fn test_cursor_stops_at_end_and_stays_stopped() {
        let start = utc(2024, 1, 1, 0, 0, 0);
        let mut cursor =
            Amount::new(1, Size::Day).occurrences(start, start, Some(utc(2024, 1, 3, 0, 0, 0)));
        assert_eq!(cursor.next(), Some(utc(2024, 1, 2, 0, 0, 0)));
        assert_eq!(cursor.next(), Some(utc(2024, 1, 3, 0, 0, 0)));
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_cursor_yearly_from_leap_day() {
        let start = utc(2024, 2, 29, 6, 0, 0);
        let got: Vec<_> = Amount::new(1, Size::Year)
            .occurrences(start, start, None)
            .take(2)
            .collect();
        assert_eq!(got, vec![utc(2025, 2, 28, 6, 0, 0), utc(2026, 2, 28, 6, 0, 0)]);
    }

    #[test]
    fn test_amount_sized() {
        let now = utc(2024, 1, 1, 0, 0, 0);
        assert_eq!(
            Amount::new(2, Size::Hour).sized(Size::Minute, now),
            Some(Amount::new(120, Size::Minute))
        );
        assert_eq!(
            Amount::new(3, Size::Day).sized(Size::Day, now),
            Some(Amount::new(3, Size::Day))
        );
    }

    #[test]
    fn test_build_amount() {
        assert_eq!(
            normalise(amount(5, "minute")).unwrap(),
            Spec::Amount(Amount::new(5, Size::Minute))
        );
        let err = normalise(amount(5, "fortnight")).unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { ref field, .. } if field == "size"));
    }

    // ── Interval / Range ────────────────────────────────────────────────

    #[test]
    fn test_interval_requires_positive_amount() {
        let err = normalise(RawSection::new("interval").with("every", amount(0, "hour"))).unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { ref field, .. } if field == "every"));

        let err = normalise(RawSection::new("interval").with("every", 5)).unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { .. }));
    }

    #[test]
    fn test_range_simplifies_to_amount_in_common_unit() {
        for _ in 0..20 {
            let spec = normalise(
                RawSection::new("range")
                    .with("min", amount(1, "hour"))
                    .with("max", amount(90, "minute")),
            )
            .unwrap();
            match spec {
                Spec::Amount(a) => {
                    assert_eq!(a.size, Size::Minute);
                    assert!((60..=90).contains(&a.num), "got {}", a.num);
                }
                other => panic!("unexpected spec: {other:?}"),
            }
        }
    }

    #[test]
    fn test_range_equal_bounds() {
        let spec = normalise(
            RawSection::new("range")
                .with("min", amount(5, "minute"))
                .with("max", amount(5, "minute")),
        )
        .unwrap();
        assert_eq!(spec, Spec::Amount(Amount::new(5, Size::Minute)));
    }

    #[test]
    fn test_range_min_above_max_is_rejected() {
        let err = normalise(
            RawSection::new("range")
                .with("min", amount(2, "hour"))
                .with("max", amount(30, "minute")),
        )
        .unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { .. }));
        assert_eq!(err.path().unwrap().to_string(), "1(range)");
    }

    // ── Between ─────────────────────────────────────────────────────────

    #[test]
    fn test_between_without_end_runs_a_year() {
        let spec = normalise(RawSection::new("between").with("start", RawSection::new("now"))).unwrap();
        match spec {
            Spec::Repeat(r) => {
                assert_eq!(r.start, utc(2024, 1, 1, 12, 0, 0));
                assert_eq!(r.end, Some(utc(2024, 12, 31, 12, 0, 0)));
                assert!(r.every.is_none());
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_between_iso_bounds() {
        let spec = normalise(
            RawSection::new("between")
                .with(
                    "start",
                    RawSection::new("iso8601")
                        .with("type", "date")
                        .with("specification", "20240301"),
                )
                .with(
                    "end",
                    RawSection::new("iso8601")
                        .with("type", "datetime")
                        .with("specification", "20240302T120000"),
                ),
        )
        .unwrap();
        match spec {
            Spec::Repeat(r) => {
                assert_eq!(r.start, utc(2024, 3, 1, 0, 0, 0));
                assert_eq!(r.end, Some(utc(2024, 3, 2, 12, 0, 0)));
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_between_rejects_non_instants_and_reversed_bounds() {
        let err = normalise(RawSection::new("between").with("start", amount(1, "day"))).unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { ref field, .. } if field == "start"));

        let err = normalise(RawSection::new("between")).unwrap_err();
        assert!(matches!(err, TimepieceError::MissingField { ref field, .. } if field == "start"));

        let err = normalise(
            RawSection::new("between")
                .with("start", RawSection::new("epoch").with("epoch", 1_700_000_000))
                .with("end", RawSection::new("epoch").with("epoch", 1_600_000_000)),
        )
        .unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { ref field, .. } if field == "end"));
    }

    // ── Day names / numbers ─────────────────────────────────────────────

    #[test]
    fn test_day_name_becomes_filter() {
        let spec = normalise(RawSection::new("day_name").with("name", "wed;mon;wed")).unwrap();
        assert_eq!(
            spec,
            Spec::Filter(Filter {
                day_names: Some(vec![Weekday::Mon, Weekday::Wed]),
                ..Filter::default()
            })
        );
    }

    #[test]
    fn test_day_name_rejects_bad_lists() {
        let err = normalise(RawSection::new("day_name").with("name", "mon;;wed")).unwrap_err();
        assert!(matches!(err, TimepieceError::MalformedListValue { .. }));

        let err = normalise(RawSection::new("day_name").with("name", "monday")).unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { .. }));
    }

    #[test]
    fn test_day_number_accepts_int_or_list() {
        let spec = normalise(RawSection::new("day_number").with("number", 32)).unwrap();
        assert_eq!(
            spec,
            Spec::Filter(Filter {
                day_numbers: Some(vec![32]),
                ..Filter::default()
            })
        );
        let spec = normalise(RawSection::new("day_number").with("number", "100;1")).unwrap();
        assert!(matches!(spec, Spec::Filter(f) if f.day_numbers == Some(vec![1, 100])));

        let err = normalise(RawSection::new("day_number").with("number", 400)).unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { .. }));
    }

    // ── Time / Date / Epoch ─────────────────────────────────────────────

    #[test]
    fn test_time_validates_range() {
        let spec = normalise(RawSection::new("time").with("hour", 9).with("minute", 30)).unwrap();
        assert_eq!(
            spec,
            Spec::Time(TimeOfDay {
                time: NaiveTime::from_hms_opt(9, 30, 0).unwrap()
            })
        );
        let err = normalise(RawSection::new("time").with("hour", 24).with("minute", 0)).unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { ref field, .. } if field == "hour"));
    }

    #[test]
    fn test_date_validates_calendar() {
        let ok = normalise(
            RawSection::new("date")
                .with("day", 29)
                .with("month", 2)
                .with("year", 2024),
        );
        assert!(ok.is_ok());
        let err = normalise(
            RawSection::new("date")
                .with("day", 29)
                .with("month", 2)
                .with("year", 2023),
        )
        .unwrap_err();
        assert!(matches!(err, TimepieceError::BadFieldType { .. }));
    }

    #[test]
    fn test_epoch_is_utc_instant() {
        let spec = normalise(RawSection::new("epoch").with("epoch", 1_704_067_200)).unwrap();
        assert_eq!(
            spec,
            Spec::DateTime(DateTimeSpec::new(utc(2024, 1, 1, 0, 0, 0)))
        );

        let spec = normalise(RawSection::new("epoch").with("epoch", "1704067200.5")).unwrap();
        match spec {
            Spec::DateTime(dt) => assert_eq!(dt.datetime.timestamp_subsec_millis(), 500),
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    // ── ISO 8601 ────────────────────────────────────────────────────────

    #[test]
    fn test_iso8601_duration_becomes_amount() {
        let spec = normalise(
            RawSection::new("iso8601")
                .with("type", "duration")
                .with("specification", "PT30M"),
        )
        .unwrap();
        assert_eq!(spec, Spec::Amount(Amount::new(30, Size::Minute)));
    }

    #[test]
    fn test_iso8601_invalid_value() {
        let err = normalise(
            RawSection::new("iso8601")
                .with("type", "date")
                .with("specification", "not-a-date"),
        )
        .unwrap_err();
        assert!(matches!(err, TimepieceError::InvalidIso8601 { .. }));
        assert_eq!(err.path().unwrap().to_string(), "1(iso8601).specification");
    }

    // ── Filter ──────────────────────────────────────────────────────────

    #[test]
    fn test_filter_section() {
        let spec = normalise(
            RawSection::new("filter")
                .with("hours", "17;9")
                .with("day_names", "fri"),
        )
        .unwrap();
        assert_eq!(
            spec,
            Spec::Filter(Filter {
                hours: Some(vec![9, 17]),
                day_names: Some(vec![Weekday::Fri]),
                ..Filter::default()
            })
        );
    }
}
