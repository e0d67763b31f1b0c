//! Flags the operator asked never to store.

use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// A set of namespaced flag names that are never coerced nor stored.
pub struct ExclusionSet {
    flags: FxHashSet<String>,
}

impl ExclusionSet {
    /// Build the set from a list of flag names.
    ///
    /// Names are trimmed and empty names dropped, so splitting an empty
    /// `--exclude-metrics` value on `,` yields an empty set.
    #[must_use]
    pub fn from_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let flags = flags
            .into_iter()
            .map(|flag| flag.as_ref().trim().to_string())
            .filter(|flag| !flag.is_empty())
            .collect();
        Self { flags }
    }

    /// Whether `flag` may be stored.
    #[must_use]
    pub fn is_tracked(&self, flag: &str) -> bool {
        !self.flags.contains(flag)
    }

    /// Whether `flag` is in the set.
    #[must_use]
    pub fn contains(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Number of flags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Iterate over the flags in the set, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }
}
