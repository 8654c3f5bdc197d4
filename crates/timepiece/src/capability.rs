//! Capability tags describing which temporal question a spec can answer.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// One kind of temporal question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Day,
    Time,
    Once,
    Repeat,
    Duration,
    Interval,
    Filter,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Day => "day",
            Capability::Time => "time",
            Capability::Once => "once",
            Capability::Repeat => "repeat",
            Capability::Duration => "duration",
            Capability::Interval => "interval",
            Capability::Filter => "filter",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of [`Capability`] tags a spec carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Specifies(BTreeSet<Capability>);

impl Specifies {
    pub fn none() -> Self {
        Specifies(BTreeSet::new())
    }

    pub fn of(caps: &[Capability]) -> Self {
        Specifies(caps.iter().copied().collect())
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0.insert(cap);
    }

    pub fn union(&self, other: &Specifies) -> Specifies {
        Specifies(self.0.union(&other.0).copied().collect())
    }

    /// Whether a top-level spec may be used on its own: it must be able to
    /// name a start, optionally repeating.
    pub fn is_schedulable(&self) -> bool {
        self.contains(Capability::Repeat) || self.contains(Capability::Once)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for Specifies {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Specifies(iter.into_iter().collect())
    }
}

impl fmt::Display for Specifies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|c| c.as_str()).collect();
        write!(f, "({})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_merges_tags() {
        let a = Specifies::of(&[Capability::Once]);
        let b = Specifies::of(&[Capability::Filter]);
        let u = a.union(&b);
        assert!(u.contains(Capability::Once));
        assert!(u.contains(Capability::Filter));
        assert!(!u.contains(Capability::Repeat));
    }

    #[test]
    fn test_schedulable_requires_repeat_or_once() {
        assert!(Specifies::of(&[Capability::Repeat]).is_schedulable());
        assert!(Specifies::of(&[Capability::Once, Capability::Day]).is_schedulable());
        assert!(!Specifies::of(&[Capability::Duration, Capability::Filter]).is_schedulable());
        assert!(!Specifies::none().is_schedulable());
    }

    #[test]
    fn test_display_is_sorted() {
        let s = Specifies::of(&[Capability::Filter, Capability::Day]);
        assert_eq!(s.to_string(), "(day, filter)");
    }
}
