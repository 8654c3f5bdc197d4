//! Section registry and field-level normalisation.
//!
//! A [`Registry`] maps section names (`"interval"`, `"between"`, ...) to
//! builders. A builder receives a [`FieldReader`] over the raw field map,
//! pulls and validates the fields it declares, and returns a [`Spec`].
//! [`Normaliser::normalise`] then simplifies the result to a fixed point.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::{now_seconds, Clock};
use crate::error::{Result, TimepieceError};
use crate::spec::Spec;
use crate::value::{Provenance, RawSection, RawValue};

/// Builds a spec from a section's fields.
pub type SectionBuilder = Arc<dyn Fn(&mut FieldReader<'_>) -> Result<Spec> + Send + Sync>;

// ── Registry ────────────────────────────────────────────────────────────────

/// Name → builder lookup for every known section kind.
#[derive(Clone, Default)]
pub struct Registry {
    builders: BTreeMap<String, SectionBuilder>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("sections", &self.names())
            .finish()
    }
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// A registry holding every built-in section kind.
    pub fn with_defaults() -> Self {
        let mut registry = Registry::new();
        crate::sections::register_defaults(&mut registry);
        registry
    }

    /// The process-wide default registry, built on first use.
    pub fn shared() -> Arc<Registry> {
        static SHARED: OnceLock<Arc<Registry>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(Registry::with_defaults()))
            .clone()
    }

    /// Register (or replace) a section kind.
    pub fn register<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn(&mut FieldReader<'_>) -> Result<Spec> + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Arc::new(builder));
    }

    /// Copy every kind from `other`, replacing same-named entries.
    pub fn extend(&mut self, other: &Registry) {
        for (name, builder) in &other.builders {
            self.builders.insert(name.clone(), builder.clone());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }

    fn builder(&self, name: &str) -> Option<&SectionBuilder> {
        self.builders.get(name)
    }
}

// ── Context ─────────────────────────────────────────────────────────────────

/// Per-parse environment: the instant "now" stands for and the random
/// source used by `range`.
///
/// The clock is read once, when the context is made, so every `now()`,
/// `forever()` and unit conversion in one parse sees the same instant.
pub struct Context {
    now: DateTime<Utc>,
    rng: RefCell<StdRng>,
}

impl Context {
    /// A context pinned to `clock`'s current instant. With a seed, `range`
    /// picks are repeatable.
    pub fn new(clock: Arc<dyn Clock>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Context {
            now: now_seconds(clock.as_ref()),
            rng: RefCell::new(rng),
        }
    }

    /// The instant read when this context was made, truncated to whole
    /// seconds.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Uniform pick from `lo..=hi`. Callers ensure `lo <= hi`.
    pub fn pick(&self, lo: i64, hi: i64) -> i64 {
        self.rng.borrow_mut().gen_range(lo..=hi)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

// ── Normaliser ──────────────────────────────────────────────────────────────

/// Turns raw sections into simplified specs.
pub struct Normaliser<'a> {
    registry: &'a Registry,
    cx: &'a Context,
}

impl<'a> Normaliser<'a> {
    pub fn new(registry: &'a Registry, cx: &'a Context) -> Self {
        Normaliser { registry, cx }
    }

    pub fn context(&self) -> &'a Context {
        self.cx
    }

    /// Build the section `raw.name` from its fields, then simplify it.
    ///
    /// # Errors
    ///
    /// `UnknownSectionKind` for an unregistered name, and any field error
    /// the section's builder raises, located at `path`.
    pub fn normalise(&self, path: &Provenance, raw: RawSection) -> Result<Spec> {
        tracing::trace!(path = %path, section = %raw.name, "normalising section");

        let Some(builder) = self.registry.builder(&raw.name) else {
            return Err(TimepieceError::UnknownSectionKind {
                path: path.clone(),
                name: raw.name,
                available: self.registry.names(),
            });
        };

        let mut reader = FieldReader {
            section: raw.name.clone(),
            path: path.clone(),
            fields: raw.fields,
            normaliser: self,
        };
        let built = builder(&mut reader).map_err(|e| e.located(path))?;
        reader.finish();

        built.simplify(self.cx).map_err(|e| e.located(path))
    }
}

// ── FieldReader ─────────────────────────────────────────────────────────────

/// Typed access to a section's fields.
///
/// Each accessor removes the field it reads; whatever is left when the
/// builder returns was not declared by the section and is ignored.
pub struct FieldReader<'a> {
    section: String,
    path: Provenance,
    fields: BTreeMap<String, RawValue>,
    normaliser: &'a Normaliser<'a>,
}

impl<'a> FieldReader<'a> {
    pub fn context(&self) -> &'a Context {
        self.normaliser.context()
    }

    pub fn section_name(&self) -> &str {
        &self.section
    }

    pub fn path(&self) -> &Provenance {
        &self.path
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// A `BadFieldType` error for `field`.
    pub fn bad_value(
        &self,
        field: &str,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> TimepieceError {
        TimepieceError::BadFieldType {
            path: self.path.field(field),
            field: field.to_string(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    fn require(&mut self, field: &str) -> Result<RawValue> {
        self.fields
            .remove(field)
            .ok_or_else(|| TimepieceError::MissingField {
                path: self.path.clone(),
                section: self.section.clone(),
                field: field.to_string(),
            })
    }

    fn literal_text(&self, field: &str, expected: &str, value: RawValue) -> Result<String> {
        match value {
            RawValue::Str(s) => Ok(s),
            RawValue::Int(n) => Ok(n.to_string()),
            other => Err(self.bad_value(field, expected, other.describe())),
        }
    }

    pub fn int(&mut self, field: &str) -> Result<i64> {
        match self.require(field)? {
            RawValue::Int(n) => Ok(n),
            RawValue::Str(s) => s
                .parse()
                .map_err(|_| self.bad_value(field, "an integer", format!("string '{s}'"))),
            other => Err(self.bad_value(field, "an integer", other.describe())),
        }
    }

    pub fn float(&mut self, field: &str) -> Result<f64> {
        match self.require(field)? {
            RawValue::Int(n) => Ok(n as f64),
            RawValue::Str(s) => s
                .parse()
                .map_err(|_| self.bad_value(field, "a number", format!("string '{s}'"))),
            other => Err(self.bad_value(field, "a number", other.describe())),
        }
    }

    /// A string field. Integers are accepted and rendered back to text.
    pub fn string(&mut self, field: &str) -> Result<String> {
        let value = self.require(field)?;
        self.literal_text(field, "a string", value)
    }

    /// A string field mapped through `parse`, e.g. a unit name.
    pub fn parsed<T>(
        &mut self,
        field: &str,
        expected: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T> {
        let text = self.string(field)?;
        parse(&text).ok_or_else(|| self.bad_value(field, expected, format!("'{text}'")))
    }

    /// A nested section, normalised at `<path>.<field>`, or a spec that was
    /// already built.
    pub fn section(&mut self, field: &str) -> Result<Spec> {
        match self.require(field)? {
            RawValue::Spec(spec) => Ok(spec),
            RawValue::Section(raw) => self.normaliser.normalise(&self.path.field(field), raw),
            other => Err(self.bad_value(field, "a section", other.describe())),
        }
    }

    pub fn opt_section(&mut self, field: &str) -> Result<Option<Spec>> {
        if self.has(field) {
            self.section(field).map(Some)
        } else {
            Ok(None)
        }
    }

    /// A semicolon-separated list of between 1 and `max_len` non-empty items.
    pub fn ssv(&mut self, field: &str, max_len: usize) -> Result<Vec<String>> {
        let value = self.require(field)?;
        let text = self.literal_text(field, "a semicolon separated list", value)?;
        let items: Vec<String> = text.split(';').map(|s| s.trim().to_string()).collect();

        if items.iter().any(String::is_empty) || items.len() > max_len {
            return Err(TimepieceError::MalformedListValue {
                path: self.path.field(field),
                field: field.to_string(),
                got_length: items.iter().filter(|s| !s.is_empty()).count(),
                got: text,
                min_length: 1,
                max_length: max_len,
            });
        }
        Ok(items)
    }

    /// A semicolon-separated list of integers in `lo..=hi`, sorted and
    /// deduplicated.
    pub fn ssv_ints(&mut self, field: &str, lo: u32, hi: u32) -> Result<Vec<u32>> {
        let max_len = (hi - lo + 1) as usize;
        let items = self.ssv(field, max_len)?;
        let mut values = items
            .iter()
            .map(|item| {
                item.parse::<u32>()
                    .ok()
                    .filter(|n| (lo..=hi).contains(n))
                    .ok_or_else(|| {
                        self.bad_value(
                            field,
                            format!("integers between {lo} and {hi}"),
                            format!("'{item}'"),
                        )
                    })
            })
            .collect::<Result<Vec<u32>>>()?;
        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    /// A semicolon-separated list where every item is one of `choices`.
    pub fn ssv_choices(&mut self, field: &str, choices: &[&str]) -> Result<Vec<String>> {
        let items = self.ssv(field, choices.len())?;
        for item in &items {
            if !choices.contains(&item.as_str()) {
                return Err(self.bad_value(
                    field,
                    format!("items from {}", choices.join(", ")),
                    format!("'{item}'"),
                ));
            }
        }
        Ok(items)
    }

    /// Log (and drop) fields the section did not read.
    fn finish(self) {
        if !self.fields.is_empty() {
            let ignored: Vec<&String> = self.fields.keys().collect();
            tracing::debug!(
                path = %self.path,
                section = %self.section,
                ignored = ?ignored,
                "section ignored undeclared fields"
            );
        }
    }
}
