//! The public entry point: configure a grammar, parse a spec.

use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TimepieceError};
use crate::grammar;
use crate::registry::{Context, Normaliser, Registry};
use crate::spec::Spec;
use crate::visitor::Visitor;

/// Parser configuration: which sections exist, what "now" is, and how
/// `range(...)` picks its value.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use timepiece::{FixedClock, TimeSpecGrammar};
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let grammar = TimeSpecGrammar::new().with_clock(FixedClock(now));
/// let spec = grammar
///     .parse("now() & interval(every:amount(num:5,size:minute))")
///     .unwrap();
/// assert_eq!(
///     spec.following(now),
///     Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap())
/// );
/// ```
#[derive(Clone)]
pub struct TimeSpecGrammar {
    registry: Arc<Registry>,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
}

impl Default for TimeSpecGrammar {
    fn default() -> Self {
        TimeSpecGrammar::new()
    }
}

impl fmt::Debug for TimeSpecGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSpecGrammar")
            .field("registry", &self.registry)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl TimeSpecGrammar {
    /// The built-in sections, the system clock, and an unseeded RNG.
    pub fn new() -> Self {
        TimeSpecGrammar {
            registry: Registry::shared(),
            clock: Arc::new(SystemClock),
            seed: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Make `range(...)` picks repeatable.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A copy of this grammar that also knows the sections in `more`.
    pub fn with_sections(&self, more: &Registry) -> Self {
        let mut registry = (*self.registry).clone();
        registry.extend(more);
        TimeSpecGrammar {
            registry: Arc::new(registry),
            ..self.clone()
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Parse `text` into a spec that can name a start.
    ///
    /// # Errors
    ///
    /// - `InvalidSpecification` when the text does not parse
    /// - `EmptySpecification` when it holds no function call
    /// - `IncompleteSpecification` when the result neither repeats nor
    ///   happens once
    /// - any section or combination error, with its provenance path
    pub fn parse(&self, text: &str) -> Result<Spec> {
        self.parse_inner(text, true)
    }

    /// Like [`TimeSpecGrammar::parse`] without the final capability check,
    /// so a bare `filter(...)` or `interval(...)` can be inspected.
    pub fn parse_unvalidated(&self, text: &str) -> Result<Spec> {
        self.parse_inner(text, false)
    }

    fn parse_inner(&self, text: &str, validate: bool) -> Result<Spec> {
        tracing::debug!(len = text.len(), validate, "parsing time spec");

        let ast = grammar::parse(text).map_err(|source| TimepieceError::InvalidSpecification {
            text: text.to_string(),
            source,
        })?;
        let Some(ast) = ast else {
            return Err(TimepieceError::EmptySpecification);
        };

        let cx = Context::new(self.clock.clone(), self.seed);
        let spec = Visitor::new(Normaliser::new(&self.registry, &cx)).visit(&ast)?;
        let spec = spec.simplify(&cx)?;

        let specifies = spec.specifies();
        if validate && !specifies.is_schedulable() {
            return Err(TimepieceError::IncompleteSpecification { got: specifies });
        }
        tracing::debug!(kind = spec.kind(), specifies = %specifies, "parsed time spec");
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, Specifies};
    use crate::clock::FixedClock;
    use crate::registry::FieldReader;
    use crate::sections::Amount;
    use crate::sizing::Size;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    fn grammar() -> TimeSpecGrammar {
        TimeSpecGrammar::new()
            .with_clock(FixedClock(utc(2024, 1, 1, 0, 0, 0)))
            .with_seed(11)
    }

    #[test_log::test]
    fn test_parse_repeat() {
        let spec = grammar()
            .parse("now() & interval(every:amount(num:1,size:hour))")
            .unwrap();
        assert_eq!(spec.specifies(), Specifies::of(&[Capability::Repeat]));
        assert_eq!(
            spec.following(utc(2024, 1, 1, 3, 30, 0)),
            Some(utc(2024, 1, 1, 4, 0, 0))
        );
    }

    #[test]
    fn test_empty_and_invalid_input() {
        assert_eq!(
            grammar().parse("  ").unwrap_err(),
            TimepieceError::EmptySpecification
        );
        let err = grammar().parse("foo(bar").unwrap_err();
        assert!(matches!(err, TimepieceError::InvalidSpecification { ref text, .. } if text == "foo(bar"));
        assert!(std::error::Error::source(&err).is_some());
    }

    /// Moves forward a second on every read.
    #[derive(Clone)]
    struct TickingClock(Arc<AtomicI64>);

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            let ticks = self.0.fetch_add(1, Ordering::SeqCst);
            utc(2024, 1, 1, 0, 0, 0) + Duration::seconds(ticks)
        }
    }

    #[test]
    fn test_clock_is_read_once_per_parse() {
        let reads = Arc::new(AtomicI64::new(0));
        let grammar = TimeSpecGrammar::new()
            .with_clock(TickingClock(reads.clone()))
            .with_seed(1);

        let spec = grammar
            .parse("(between(start:now()) & interval(every:amount(num:1,size:hour))) | now()")
            .unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        let Spec::ManyRepeatAndFilters(many) = &spec else {
            panic!("expected a union, got {spec:?}");
        };
        let start = utc(2024, 1, 1, 0, 0, 0);
        let repeat = &many.specs[0].repeat;
        assert_eq!(repeat.start, start);
        assert_eq!(repeat.end, Some(start + Duration::days(365)));
        assert_eq!(many.specs[1].repeat.start, start);

        grammar.parse("now()").unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deep_nesting_is_an_invalid_specification() {
        let text = format!("{}now(){}", "(".repeat(2000), ")".repeat(2000));
        let err = grammar().parse(&text).unwrap_err();
        match err {
            TimepieceError::InvalidSpecification { source, .. } => {
                assert_eq!(source.message, "nesting too deep");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let text = vec!["now()"; 5000].join("|");
        let err = grammar().parse(&text).unwrap_err();
        assert!(matches!(err, TimepieceError::InvalidSpecification { .. }));
    }

    #[test]
    fn test_incomplete_specification() {
        let err = grammar().parse("day_name(name:mon)").unwrap_err();
        assert_eq!(
            err,
            TimepieceError::IncompleteSpecification {
                got: Specifies::of(&[Capability::Filter])
            }
        );
        let spec = grammar().parse_unvalidated("day_name(name:mon)").unwrap();
        assert_eq!(spec.specifies(), Specifies::of(&[Capability::Filter]));
    }

    #[test]
    fn test_between_alone_is_incomplete() {
        // A bounded span with no intervals carries only `duration`.
        let err = grammar().parse("between(start:now())").unwrap_err();
        assert!(matches!(err, TimepieceError::IncompleteSpecification { .. }));
    }

    #[test]
    fn test_with_sections_leaves_base_grammar_unchanged() {
        let mut extra = Registry::new();
        extra.register("hourly", |_r: &mut FieldReader<'_>| {
            Ok(Spec::Amount(Amount::new(1, Size::Hour)))
        });
        let base = grammar();
        let extended = base.with_sections(&extra);

        let spec = extended
            .parse("now() & interval(every:hourly())")
            .unwrap();
        assert_eq!(
            spec.following(utc(2024, 1, 1, 0, 0, 0)),
            Some(utc(2024, 1, 1, 1, 0, 0))
        );

        let err = base.parse("now() & interval(every:hourly())").unwrap_err();
        assert!(matches!(err, TimepieceError::UnknownSectionKind { ref name, .. } if name == "hourly"));
    }

    #[test]
    fn test_seeded_range_is_repeatable() {
        let text = "now() & interval(every:range(min:amount(num:1,size:minute),max:amount(num:60,size:minute)))";
        let a = grammar().parse(text).unwrap();
        let b = grammar().parse(text).unwrap();
        assert_eq!(a, b);
    }
}
