//! # timepiece
//!
//! A small DSL for describing when something should happen.
//!
//! ```text
//! now() & interval(every:amount(num:5,size:minute))
//! (between(start:now()) & interval(every:amount(num:1,size:hour))) & filter(hours:9;17)
//! iso8601(type:date,specification:20240301) & time(hour:9,minute:30)
//! ```
//!
//! A spec is a chain of function calls ("sections") joined with `&` and
//! `|`. Parsing resolves it to a [`Spec`] that answers two questions:
//! [`Spec::following`] (when is the next occurrence at or after an
//! instant?) and [`Spec::is_filtered`] (is this instant acceptable?).
//!
//! ## Modules
//!
//! - [`timespec`]: [`TimeSpecGrammar`], the entry point
//! - [`grammar`]: lexer and recursive-descent parser producing an AST
//! - [`visitor`]: AST → [`Spec`], with provenance paths for errors
//! - [`registry`]: name → section builder table and field validation
//! - [`sections`]: the built-in section kinds
//! - [`combinators`]: repeats, filters and their unions
//! - [`spec`]: the [`Spec`] sum type and its `&`/`|` algebra
//! - [`sizing`]: time units and calendar-correct arithmetic
//! - [`iso8601`]: ISO 8601 values and durations
//! - [`schedule`]: list upcoming occurrences in a time zone
//! - [`capability`]: what a spec can answer
//! - [`value`]: raw section fields and provenance paths
//! - [`clock`]: injectable time source
//! - [`error`]: Error types

pub mod capability;
pub mod clock;
pub mod combinators;
pub mod error;
pub mod grammar;
pub mod iso8601;
pub mod registry;
pub mod schedule;
pub mod sections;
pub mod sizing;
pub mod spec;
pub mod timespec;
pub mod value;
pub mod visitor;

pub use capability::{Capability, Specifies};
pub use clock::{Clock, FixedClock, SystemClock};
pub use combinators::{
    DateTimeSpec, Filter, Intervals, ManyRepeatAndFilters, Repeat, RepeatAndFilters, MAX_ROUNDS,
};
pub use error::{Result, TimepieceError};
pub use registry::{Context, FieldReader, Normaliser, Registry};
pub use schedule::{upcoming, upcoming_instants, Occurrence};
pub use sections::{Amount, Interval};
pub use sizing::Size;
pub use spec::Spec;
pub use timespec::TimeSpecGrammar;
pub use value::{Provenance, RawSection, RawValue};
