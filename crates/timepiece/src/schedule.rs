//! Listing upcoming occurrences of a parsed spec.
//!
//! [`upcoming`] drives [`Spec::following`] forward from an instant,
//! keeping only candidates that [`Spec::is_filtered`] accepts, and renders
//! each one in UTC and in an IANA time zone.

use chrono::{DateTime, Datelike, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{Result, TimepieceError};
use crate::spec::Spec;

/// How many candidates [`upcoming`] examines before giving up on filling
/// the requested count.
pub const CANDIDATE_BUDGET: usize = 100_000;

/// One occurrence, as an instant and as wall-clock time in a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    /// The instant in UTC (RFC 3339).
    pub utc: String,
    /// The instant in the target timezone (RFC 3339 with offset).
    pub local: String,
    /// The IANA timezone name used.
    pub timezone: String,
    /// The UTC offset at this instant (e.g., "-05:00").
    pub utc_offset: String,
    /// Whether Daylight Saving Time is active at this instant.
    pub dst_active: bool,
}

/// Look up an IANA zone name.
///
/// # Errors
///
/// Returns [`TimepieceError::InvalidTimezone`] for unknown names.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>()
        .map_err(|_| TimepieceError::InvalidTimezone(s.to_string()))
}

/// Whether `dt` is on a different offset from the zone's January offset.
fn is_dst_active<T: TimeZone>(dt: &DateTime<T>, tz: &Tz) -> bool {
    let utc = dt.with_timezone(&Utc);
    let jan1 = Utc
        .with_ymd_and_hms(utc.year(), 1, 1, 12, 0, 0)
        .single()
        .unwrap_or(utc);

    let current_offset = dt.offset().fix().local_minus_utc();
    let jan_offset = jan1.with_timezone(tz).offset().fix().local_minus_utc();
    current_offset != jan_offset
}

/// Format the UTC offset as a string (e.g., "-05:00", "+09:00").
fn format_utc_offset<T: TimeZone>(dt: &DateTime<T>) -> String {
    let offset_secs = dt.offset().fix().local_minus_utc();
    let sign = if offset_secs >= 0 { "+" } else { "-" };
    let abs_secs = offset_secs.unsigned_abs();
    let hours = abs_secs / 3600;
    let minutes = (abs_secs % 3600) / 60;
    format!("{sign}{hours:02}:{minutes:02}")
}

/// Render `instant` in `tz`.
pub fn localize(instant: DateTime<Utc>, tz: &Tz) -> Occurrence {
    let local = instant.with_timezone(tz);
    Occurrence {
        utc: instant.to_rfc3339(),
        local: local.to_rfc3339(),
        timezone: tz.name().to_string(),
        utc_offset: format_utc_offset(&local),
        dst_active: is_dst_active(&local, tz),
    }
}

/// The next `count` instants after `after` that `spec` both names and
/// accepts.
///
/// Fewer than `count` come back when the spec runs out, or when
/// [`CANDIDATE_BUDGET`] candidates in a row were rejected by the filters of
/// every branch.
///
/// # Arguments
///
/// * `spec`: A parsed spec
/// * `after`: Where to start looking
/// * `count`: How many occurrences to return at most
/// * `timezone`: An IANA timezone name for the `local` rendering
///
/// # Errors
///
/// Returns [`TimepieceError::InvalidTimezone`] if `timezone` is unknown.
pub fn upcoming(
    spec: &Spec,
    after: DateTime<Utc>,
    count: usize,
    timezone: &str,
) -> Result<Vec<Occurrence>> {
    let tz = parse_timezone(timezone)?;
    Ok(upcoming_instants(spec, after, count)
        .into_iter()
        .map(|instant| localize(instant, &tz))
        .collect())
}

/// [`upcoming`] without the rendering.
pub fn upcoming_instants(spec: &Spec, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    let mut found = Vec::with_capacity(count.min(1024));
    let mut at = after;

    while found.len() < count {
        let Some(next) = next_accepted(spec, at) else {
            break;
        };
        found.push(next);
        match next.checked_add_signed(chrono::Duration::seconds(1)) {
            Some(after_next) => at = after_next,
            None => break,
        }
    }
    found
}

/// The soonest instant at or after `at` that `spec` names and accepts.
///
/// Each branch of a union is searched with its own filters, so a branch
/// without filters cannot accept another branch's candidates.
fn next_accepted(spec: &Spec, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match spec {
        Spec::ManyRepeatAndFilters(many) => many
            .specs
            .iter()
            .filter_map(|branch| {
                first_accepted(at, |t| branch.following(t), |t| branch.is_filtered(t))
            })
            .min(),
        other => first_accepted(at, |t| other.following(t), |t| other.is_filtered(t)),
    }
}

/// Step through `following` from `at` until `accepts` passes, giving up
/// after [`CANDIDATE_BUDGET`] rejections.
fn first_accepted(
    at: DateTime<Utc>,
    following: impl Fn(DateTime<Utc>) -> Option<DateTime<Utc>>,
    accepts: impl Fn(DateTime<Utc>) -> bool,
) -> Option<DateTime<Utc>> {
    let mut at = at;
    for _ in 0..CANDIDATE_BUDGET {
        let next = following(at)?;
        if accepts(next) {
            return Some(next);
        }
        at = next.checked_add_signed(chrono::Duration::seconds(1))?;
    }
    tracing::warn!(
        budget = CANDIDATE_BUDGET,
        at = %at,
        "no accepted occurrence within the candidate budget"
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::timespec::TimeSpecGrammar;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    fn parse(text: &str) -> Spec {
        TimeSpecGrammar::new()
            .with_clock(FixedClock(utc(2024, 1, 1, 0, 0, 0)))
            .parse(text)
            .unwrap()
    }

    #[test]
    fn test_upcoming_repeat() {
        let spec = parse("now() & interval(every:amount(num:15,size:minute))");
        let got = upcoming_instants(&spec, utc(2024, 1, 1, 0, 0, 0), 3);
        assert_eq!(
            got,
            vec![
                utc(2024, 1, 1, 0, 15, 0),
                utc(2024, 1, 1, 0, 30, 0),
                utc(2024, 1, 1, 0, 45, 0)
            ]
        );
    }

    #[test]
    fn test_upcoming_skips_filtered_candidates() {
        // Hourly from a Monday midnight, only at 09:00 and 17:00 on Wednesdays.
        let spec = parse(
            "(now() & interval(every:amount(num:1,size:hour))) & filter(day_names:wed,hours:9;17)",
        );
        let got = upcoming_instants(&spec, utc(2024, 1, 1, 0, 0, 0), 3);
        assert_eq!(
            got,
            vec![
                utc(2024, 1, 3, 9, 0, 0),
                utc(2024, 1, 3, 17, 0, 0),
                utc(2024, 1, 10, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_union_branches_keep_their_own_filters() {
        let spec = parse(
            "(now() & interval(every:amount(num:1,size:hour))) \
             | ((now() & interval(every:amount(num:1,size:minute))) & filter(minutes:30))",
        );
        let got = upcoming_instants(&spec, utc(2024, 1, 1, 0, 0, 0), 3);
        assert_eq!(
            got,
            vec![
                utc(2024, 1, 1, 0, 30, 0),
                utc(2024, 1, 1, 1, 0, 0),
                utc(2024, 1, 1, 1, 30, 0)
            ]
        );
    }

    #[test]
    fn test_union_branch_that_never_passes_is_skipped() {
        // Daily at midnight never lands on hour 5, and the span ends in February.
        let spec = parse(
            "(now() & interval(every:amount(num:1,size:hour))) \
             | ((between(start:now(),end:iso8601(type:date,specification:20240201)) \
             & interval(every:amount(num:1,size:day))) & filter(hours:5))",
        );
        let got = upcoming_instants(&spec, utc(2024, 1, 1, 0, 0, 0), 2);
        assert_eq!(got, vec![utc(2024, 1, 1, 1, 0, 0), utc(2024, 1, 1, 2, 0, 0)]);
    }

    #[test]
    fn test_upcoming_once_yields_single_instant() {
        let spec = parse("iso8601(type:datetime,specification:20240105T120000)");
        let got = upcoming_instants(&spec, utc(2024, 1, 1, 0, 0, 0), 5);
        assert_eq!(got, vec![utc(2024, 1, 5, 12, 0, 0)]);
    }

    #[test]
    fn test_localize_reports_offset_and_dst() {
        let tz = parse_timezone("America/New_York").unwrap();
        let winter = localize(utc(2024, 1, 15, 14, 0, 0), &tz);
        assert_eq!(winter.utc_offset, "-05:00");
        assert!(!winter.dst_active);
        assert!(winter.local.contains("09:00:00"));

        let summer = localize(utc(2024, 7, 15, 14, 0, 0), &tz);
        assert_eq!(summer.utc_offset, "-04:00");
        assert!(summer.dst_active);
    }

    #[test]
    fn test_unknown_timezone() {
        let spec = parse("now()");
        let err = upcoming(&spec, utc(2024, 1, 1, 0, 0, 0), 1, "Mars/Olympus").unwrap_err();
        assert_eq!(err, TimepieceError::InvalidTimezone("Mars/Olympus".to_string()));
    }
}
