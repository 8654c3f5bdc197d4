//! Raw, not-yet-validated section values and their provenance.

use std::collections::BTreeMap;
use std::fmt;

use crate::spec::Spec;

/// Where in a parse a value came from, e.g. `1(amount).num`.
///
/// Function calls are numbered in the order the parser meets them, so the
/// path pinpoints which nested call of a spec failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance(Vec<String>);

impl Provenance {
    pub fn root() -> Self {
        Provenance(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A path for the `index`th call, e.g. `"3(interval)"`.
    pub fn indexed(index: usize, name: &str) -> Self {
        Provenance(vec![format!("{index}({name})")])
    }

    /// A path one field deeper.
    pub fn field(&self, field: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(field.to_string());
        Provenance(segments)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0.join("."))
        }
    }
}

/// A field value as handed to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// A nested section, normalised recursively.
    Section(RawSection),
    /// An already-constructed spec, passed through unchanged.
    Spec(Spec),
}

impl RawValue {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            RawValue::Bool(b) => format!("boolean {b}"),
            RawValue::Int(n) => format!("integer {n}"),
            RawValue::Str(s) => format!("string '{s}'"),
            RawValue::Section(s) => format!("section {}()", s.name),
            RawValue::Spec(spec) => format!("{} {}", spec.kind(), spec),
        }
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Int(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Int(n.into())
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<RawSection> for RawValue {
    fn from(s: RawSection) -> Self {
        RawValue::Section(s)
    }
}

impl From<Spec> for RawValue {
    fn from(s: Spec) -> Self {
        RawValue::Spec(s)
    }
}

/// A named section with its field map: `("interval", {every: ...})`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSection {
    pub name: String,
    pub fields: BTreeMap<String, RawValue>,
}

impl RawSection {
    pub fn new(name: impl Into<String>) -> Self {
        RawSection {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion. A repeated key replaces the earlier value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
