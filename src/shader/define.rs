use std::collections::BTreeMap;
use std::fmt;

/// Value of a shader define. A define that is not in a [`DefineSet`] is absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefineValue {
    /// An on/off switch.
    Flag(bool),
    /// An enumerated value, e.g. `"uint32"` or `"attribute"`.
    Variant(&'static str),
}

/// An ordered set of shader defines.
///
/// Ordering makes [`DefineSet::key`] deterministic, so equal sets always yield the same
/// shader variant key.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct DefineSet {
    values: BTreeMap<&'static str, DefineValue>,
}

impl DefineSet {
    /// An empty define set.
    pub fn new() -> DefineSet {
        DefineSet::default()
    }

    /// Sets a flag define.
    pub fn set_flag(&mut self, name: &'static str, value: bool) -> &mut Self {
        let _ = self.values.insert(name, DefineValue::Flag(value));
        self
    }

    /// Sets a variant define.
    pub fn set_variant(&mut self, name: &'static str, value: &'static str) -> &mut Self {
        let _ = self.values.insert(name, DefineValue::Variant(value));
        self
    }

    /// Value of a define, `None` if absent.
    pub fn get(&self, name: &str) -> Option<DefineValue> {
        self.values.get(name).copied()
    }

    /// Returns `true` if the define is present, whatever its value.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of defines.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no define is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the defines in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &DefineValue)> + '_ {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    /// Merges `other` into `self`; defines of `other` win on conflicts.
    pub fn extend(&mut self, other: DefineSet) {
        self.values.extend(other.values);
    }

    /// Canonical textual form, e.g. `dColorType=uniform;dNormal`.
    pub fn key(&self) -> String {
        self.iter()
            .map(|(name, value)| match value {
                DefineValue::Flag(true) => name.to_string(),
                DefineValue::Flag(false) => format!("!{}", name),
                DefineValue::Variant(v) => format!("{}={}", name, v),
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Symbols visible to `#ifdef` directives.
    ///
    /// `Flag(true)` defines `NAME`, `Variant(v)` defines both `NAME` and `NAME_v`.
    pub(crate) fn symbols(&self) -> Vec<String> {
        let mut symbols = Vec::new();
        for (name, value) in self.iter() {
            match value {
                DefineValue::Flag(true) => symbols.push(name.to_string()),
                DefineValue::Flag(false) => {}
                DefineValue::Variant(v) => {
                    symbols.push(name.to_string());
                    symbols.push(format!("{}_{}", name, v));
                }
            }
        }
        symbols
    }
}

impl fmt::Debug for DefineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}
