//! The [`Spec`] sum type and its AND/OR algebra.
//!
//! A parse produces one `Spec`. Sections are simplified to terminal forms
//! as soon as they are built, and joins (`&`, `|`) are resolved by
//! [`Spec::combine_with`] and [`Spec::or_with`] on those terminal forms.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::capability::{Capability, Specifies};
use crate::combinators::{
    DateTimeSpec, Filter, Intervals, ManyRepeatAndFilters, Repeat, RepeatAndFilters,
};
use crate::error::{Result, TimepieceError};
use crate::iso8601::IsoValue;
use crate::registry::Context;
use crate::sections::{
    Amount, Between, CalendarDate, DayName, DayNumber, Epoch, Interval, Iso8601, IsoParsed,
    Range, TimeOfDay,
};
use crate::value::Provenance;

/// How far `forever()` and open-ended `between(...)` reach.
pub const FOREVER_DAYS: i64 = 365;

/// Any section or combinator.
#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
    Now,
    Forever,
    SunRise,
    SunSet,
    Amount(Amount),
    Interval(Interval),
    Range(Range),
    Between(Between),
    DayName(DayName),
    DayNumber(DayNumber),
    Time(TimeOfDay),
    Epoch(Epoch),
    Date(CalendarDate),
    Iso8601(Iso8601),
    IsoValue(IsoValue),
    DateTime(DateTimeSpec),
    Repeat(Repeat),
    Filter(Filter),
    RepeatAndFilters(RepeatAndFilters),
    ManyRepeatAndFilters(ManyRepeatAndFilters),
    Intervals(Intervals),
}

fn unsupported(op: &'static str, left: &Spec, right: &Spec) -> TimepieceError {
    TimepieceError::UnsupportedCombination {
        path: Provenance::root(),
        op,
        left: left.kind().to_string(),
        right: right.kind().to_string(),
    }
}

fn repeat_every(repeat: &Repeat, every: Intervals) -> Result<Repeat> {
    if repeat.every.is_some() {
        return Err(unsupported(
            "&",
            &Spec::Repeat(repeat.clone()),
            &Spec::Intervals(every),
        ));
    }
    Ok(Repeat {
        every: Some(every),
        ..repeat.clone()
    })
}

impl Spec {
    /// Short name of this variant, as used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Spec::Now => "now",
            Spec::Forever => "forever",
            Spec::SunRise => "sunrise",
            Spec::SunSet => "sunset",
            Spec::Amount(_) => "amount",
            Spec::Interval(_) => "interval",
            Spec::Range(_) => "range",
            Spec::Between(_) => "between",
            Spec::DayName(_) => "day_name",
            Spec::DayNumber(_) => "day_number",
            Spec::Time(_) => "time",
            Spec::Epoch(_) => "epoch",
            Spec::Date(_) => "date",
            Spec::Iso8601(_) | Spec::IsoValue(_) => "iso8601",
            Spec::DateTime(_) => "datetime",
            Spec::Repeat(_) => "repeat",
            Spec::Filter(_) => "filter",
            Spec::RepeatAndFilters(_) => "repeat_and_filters",
            Spec::ManyRepeatAndFilters(_) => "many_repeat_and_filters",
            Spec::Intervals(_) => "intervals",
        }
    }

    /// The temporal questions this spec can answer.
    pub fn specifies(&self) -> Specifies {
        match self {
            Spec::Now | Spec::Forever | Spec::Amount(_) => Specifies::none(),
            Spec::Interval(_) | Spec::Range(_) | Spec::Intervals(_) => {
                Specifies::of(&[Capability::Interval])
            }
            Spec::Between(_) => Specifies::of(&[Capability::Duration]),
            Spec::DayName(_) | Spec::DayNumber(_) | Spec::Date(_) => {
                Specifies::of(&[Capability::Day])
            }
            Spec::Time(_) | Spec::SunSet => Specifies::of(&[Capability::Time]),
            Spec::Epoch(_) | Spec::SunRise => Specifies::of(&[Capability::Day, Capability::Time]),
            Spec::Iso8601(iso) => match iso.parsed {
                IsoParsed::Value(value) => Spec::IsoValue(value).specifies(),
                IsoParsed::Duration(_) => Specifies::none(),
            },
            Spec::IsoValue(IsoValue::DateTime(_)) => {
                Specifies::of(&[Capability::Day, Capability::Time])
            }
            Spec::IsoValue(IsoValue::Date(_)) => Specifies::of(&[Capability::Day]),
            Spec::IsoValue(IsoValue::Time(_)) => Specifies::of(&[Capability::Time]),
            Spec::DateTime(_) => Specifies::of(&[Capability::Once]),
            Spec::Repeat(r) => r.specifies(),
            Spec::Filter(_) => Specifies::of(&[Capability::Filter]),
            Spec::RepeatAndFilters(r) => r.specifies(),
            Spec::ManyRepeatAndFilters(m) => m.specifies(),
        }
    }

    /// One canonicalisation step, or `None` when already terminal.
    ///
    /// # Errors
    ///
    /// `BadFieldType` when a range has `min` above `max`, or an epoch is
    /// out of range.
    pub fn simplify_once(&self, cx: &Context) -> Result<Option<Spec>> {
        let forever = || cx.now() + chrono::Duration::days(FOREVER_DAYS);
        let next = match self {
            Spec::Now => Spec::DateTime(DateTimeSpec::new(cx.now())),
            Spec::Forever => Spec::DateTime(DateTimeSpec::new(forever())),
            Spec::Range(range) => Spec::Amount(range.pick(cx)?),
            Spec::Between(b) => Spec::Repeat(Repeat {
                start: b.start,
                every: None,
                end: Some(b.end.unwrap_or_else(forever)),
            }),
            Spec::DayName(d) => Spec::Filter(d.to_filter()),
            Spec::DayNumber(d) => Spec::Filter(d.to_filter()),
            Spec::Epoch(e) => match e.datetime() {
                Some(dt) => Spec::DateTime(DateTimeSpec::new(dt)),
                None => {
                    return Err(TimepieceError::BadFieldType {
                        path: Provenance::root(),
                        field: "epoch".to_string(),
                        expected: "a representable timestamp".to_string(),
                        got: e.epoch.to_string(),
                    })
                }
            },
            Spec::Iso8601(iso) => match iso.parsed {
                IsoParsed::Value(value) => Spec::IsoValue(value),
                IsoParsed::Duration(amount) => Spec::Amount(amount),
            },
            // A full datetime names an instant, like an epoch does.
            Spec::IsoValue(IsoValue::DateTime(dt)) => {
                Spec::DateTime(DateTimeSpec::new(dt.and_utc()))
            }
            Spec::RepeatAndFilters(raf) => {
                Spec::ManyRepeatAndFilters(ManyRepeatAndFilters::new(vec![raf.clone()]))
            }
            _ => return Ok(None),
        };
        Ok(Some(next))
    }

    /// Simplify until nothing changes.
    pub fn simplify(self, cx: &Context) -> Result<Spec> {
        let mut spec = self;
        while let Some(next) = spec.simplify_once(cx)? {
            spec = next;
        }
        Ok(spec)
    }

    /// This spec as a single instant, for `between(start:..., end:...)`.
    pub fn as_instant(&self, cx: &Context) -> Option<DateTime<Utc>> {
        match self {
            Spec::Now => Some(cx.now()),
            Spec::DateTime(dt) => Some(dt.datetime),
            Spec::Epoch(e) => e.datetime(),
            Spec::Date(d) => Some(d.date.and_time(NaiveTime::MIN).and_utc()),
            Spec::Time(t) => Some(cx.now().date_naive().and_time(t.time).and_utc()),
            Spec::Iso8601(Iso8601 {
                parsed: IsoParsed::Value(value),
                ..
            })
            | Spec::IsoValue(value) => Some(match value {
                IsoValue::DateTime(dt) => dt.and_utc(),
                IsoValue::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
                IsoValue::Time(t) => cx.now().date_naive().and_time(*t).and_utc(),
            }),
            _ => None,
        }
    }

    fn date_only(&self) -> Option<NaiveDate> {
        match self {
            Spec::Date(d) => Some(d.date),
            Spec::IsoValue(IsoValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    fn time_only(&self) -> Option<NaiveTime> {
        match self {
            Spec::Time(t) => Some(t.time),
            Spec::IsoValue(IsoValue::Time(t)) => Some(*t),
            _ => None,
        }
    }

    fn as_repeat(&self) -> Option<Repeat> {
        match self {
            Spec::DateTime(dt) => Some(Repeat::once(dt.datetime)),
            Spec::Repeat(r) => Some(r.clone()),
            _ => None,
        }
    }

    fn as_intervals(&self) -> Option<Intervals> {
        match self {
            Spec::Interval(i) => Some(Intervals::single(*i)),
            Spec::Intervals(is) => Some(is.clone()),
            _ => None,
        }
    }

    fn as_branches(&self) -> Option<Vec<RepeatAndFilters>> {
        match self {
            Spec::RepeatAndFilters(raf) => Some(vec![raf.clone()]),
            Spec::ManyRepeatAndFilters(many) => Some(many.specs.clone()),
            other => other
                .as_repeat()
                .map(|r| vec![RepeatAndFilters::new(r, Vec::new())]),
        }
    }

    /// `self & other`.
    ///
    /// # Errors
    ///
    /// `UnsupportedCombination` for pairings with no meaning, and when an
    /// interval is added to a repeat that already has one.
    pub fn combine_with(&self, other: &Spec) -> Result<Spec> {
        if let (Some(date), Some(time)) = (self.date_only(), other.time_only()) {
            return Ok(Spec::DateTime(DateTimeSpec::new(date.and_time(time).and_utc())));
        }
        if let (Some(time), Some(date)) = (self.time_only(), other.date_only()) {
            return Ok(Spec::DateTime(DateTimeSpec::new(date.and_time(time).and_utc())));
        }

        match (self, other) {
            (Spec::Filter(a), Spec::Filter(b)) => Ok(Spec::Filter(a.merge(b))),

            (Spec::RepeatAndFilters(raf), Spec::Filter(f))
            | (Spec::Filter(f), Spec::RepeatAndFilters(raf)) => {
                Ok(Spec::RepeatAndFilters(raf.with_filter(f)))
            }
            (Spec::ManyRepeatAndFilters(many), Spec::Filter(f))
            | (Spec::Filter(f), Spec::ManyRepeatAndFilters(many)) => {
                Ok(Spec::ManyRepeatAndFilters(ManyRepeatAndFilters::new(
                    many.specs.iter().map(|raf| raf.with_filter(f)).collect(),
                )))
            }
            (base, Spec::Filter(f)) | (Spec::Filter(f), base) => match base.as_repeat() {
                Some(repeat) => Ok(Spec::RepeatAndFilters(RepeatAndFilters::new(
                    repeat,
                    vec![f.clone()],
                ))),
                None => Err(unsupported("&", self, other)),
            },

            (left, right) => {
                let (base, every) = match (left.as_intervals(), right.as_intervals()) {
                    (None, Some(every)) => (left, every),
                    (Some(every), None) => (right, every),
                    _ => return Err(unsupported("&", self, other)),
                };
                match base {
                    Spec::RepeatAndFilters(raf) => Ok(Spec::RepeatAndFilters(RepeatAndFilters::new(
                        repeat_every(&raf.repeat, every)?,
                        raf.filters.clone(),
                    ))),
                    Spec::ManyRepeatAndFilters(many) => {
                        let specs = many
                            .specs
                            .iter()
                            .map(|raf| {
                                Ok(RepeatAndFilters::new(
                                    repeat_every(&raf.repeat, every.clone())?,
                                    raf.filters.clone(),
                                ))
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(Spec::ManyRepeatAndFilters(ManyRepeatAndFilters::new(specs)))
                    }
                    base => match base.as_repeat() {
                        Some(repeat) => Ok(Spec::Repeat(repeat_every(&repeat, every)?)),
                        None => Err(unsupported("&", self, other)),
                    },
                }
            }
        }
    }

    /// `self | other`.
    ///
    /// # Errors
    ///
    /// `UnsupportedCombination` for pairings with no meaning.
    pub fn or_with(&self, other: &Spec) -> Result<Spec> {
        if let (Some(a), Some(b)) = (self.as_intervals(), other.as_intervals()) {
            return Ok(Spec::Intervals(a.concat(&b)));
        }
        if let (Some(mut a), Some(b)) = (self.as_branches(), other.as_branches()) {
            a.extend(b);
            return Ok(Spec::ManyRepeatAndFilters(ManyRepeatAndFilters::new(a)));
        }

        let (repeat, extra) = match (self.as_repeat(), other.as_repeat()) {
            (Some(r), None) => (r, other),
            (None, Some(r)) => (r, self),
            _ => return Err(unsupported("|", self, other)),
        };
        let alternative = match extra {
            Spec::Filter(f) => RepeatAndFilters::new(repeat.clone(), vec![f.clone()]),
            extra => match extra.as_intervals() {
                Some(every) => RepeatAndFilters::new(repeat_every(&repeat, every)?, Vec::new()),
                None => return Err(unsupported("|", self, other)),
            },
        };
        Ok(Spec::ManyRepeatAndFilters(ManyRepeatAndFilters::new(vec![
            RepeatAndFilters::new(repeat, Vec::new()),
            alternative,
        ])))
    }

    /// The next qualifying candidate at or after `at`, for specs that can
    /// name one.
    pub fn following(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Spec::DateTime(dt) => dt.following(at),
            Spec::Repeat(r) => r.following(at),
            Spec::RepeatAndFilters(raf) => raf.following(at),
            Spec::ManyRepeatAndFilters(many) => many.following(at),
            _ => None,
        }
    }

    /// Whether `at` satisfies this spec's constraints.
    pub fn is_filtered(&self, at: DateTime<Utc>) -> bool {
        match self {
            Spec::DateTime(dt) => dt.is_filtered(at),
            Spec::Repeat(r) => r.is_filtered(at),
            Spec::Filter(f) => f.is_filtered(at),
            Spec::RepeatAndFilters(raf) => raf.is_filtered(at),
            Spec::ManyRepeatAndFilters(many) => many.is_filtered(at),
            Spec::Interval(_) | Spec::Intervals(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Spec::Now => f.write_str("now()"),
            Spec::Forever => f.write_str("forever()"),
            Spec::SunRise => f.write_str("sunrise()"),
            Spec::SunSet => f.write_str("sunset()"),
            Spec::Amount(a) => a.fmt(f),
            Spec::Interval(i) => i.fmt(f),
            Spec::Range(r) => r.fmt(f),
            Spec::Between(b) => b.fmt(f),
            Spec::DayName(d) => d.fmt(f),
            Spec::DayNumber(d) => d.fmt(f),
            Spec::Time(t) => t.fmt(f),
            Spec::Epoch(e) => e.fmt(f),
            Spec::Date(d) => d.fmt(f),
            Spec::Iso8601(iso) => iso.fmt(f),
            Spec::IsoValue(value) => write!(
                f,
                "iso8601(type:{},specification:{})",
                value.kind(),
                value.to_basic()
            ),
            Spec::DateTime(dt) => dt.fmt(f),
            Spec::Repeat(r) => r.fmt(f),
            Spec::Filter(filter) => filter.fmt(f),
            Spec::RepeatAndFilters(raf) => raf.fmt(f),
            Spec::ManyRepeatAndFilters(many) => many.fmt(f),
            Spec::Intervals(is) => is.fmt(f),
        }
    }
}
