//! Case-insensitive, insertion-ordered header map.
//!
//! Header names compare ASCII case-insensitively but keep the casing they were
//! last written with, so requests go out exactly as the caller spelled them.
//! An entry may carry several values (repeated header lines) or none at all:
//! a suppressed entry counts as present for lookups but is skipped on the wire.

use std::fmt;

pub const HOST: &str = "Host";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const CONNECTION: &str = "Connection";
pub const USER_AGENT: &str = "User-Agent";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    values: Vec<String>,
}

/// Ordered header map with case-insensitive keys.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Entry>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Set `name` to a single value, replacing any previous values.
    ///
    /// An existing entry keeps its position and takes the new casing.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.put(name.into(), vec![value.into()]);
    }

    /// Add a value to `name`, turning an existing entry into a multi-value one.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].values.push(value.into()),
            None => self.entries.push(Entry {
                name,
                values: vec![value.into()],
            }),
        }
    }

    /// Mark `name` as present with no value.
    ///
    /// Used to stop the session from injecting a default for that header;
    /// the entry itself is never written to the wire.
    pub fn suppress(&mut self, name: impl Into<String>) {
        self.put(name.into(), Vec::new());
    }

    /// Insert `value` only if `name` is not present yet.
    pub fn set_default(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.entries.push(Entry {
                name: name.to_owned(),
                values: vec![value.into()],
            });
        }
    }

    fn put(&mut self, name: String, values: Vec<String>) {
        match self.position(&name) {
            Some(idx) => self.entries[idx] = Entry { name, values },
            None => self.entries.push(Entry { name, values }),
        }
    }

    /// Copy every entry of `other` into `self`, replacing same-named entries.
    pub fn merge(&mut self, other: Headers) {
        for entry in other.entries {
            self.put(entry.name, entry.values);
        }
    }

    /// Remove `name`, returning its values if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let idx = self.position(name)?;
        Some(self.entries.remove(idx).values)
    }

    /// Whether `name` is present, including suppressed entries.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value of `name`, in arrival order. Empty when absent or suppressed.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map_or(&[][..], |idx| self.entries[idx].values.as_slice())
    }

    /// All values of `name` joined into one comma-separated list value.
    #[must_use]
    pub fn get_joined(&self, name: &str) -> Option<String> {
        let values = self.get_all(name);
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// Number of distinct header names, suppressed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Header names in insertion order with their current casing.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// `(name, value)` pairs in wire order; multi-value entries yield one pair
    /// per value and suppressed entries yield nothing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|e| e.values.iter().map(move |v| (e.name.as_str(), v.as_str())))
    }

    /// Whether any value of `name` contains `token` as a comma-separated element.
    #[must_use]
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .iter()
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, &e.values)))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        headers.extend(iter);
        headers
    }
}

impl<K, V> Extend<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    /// Later pairs with the same name overwrite earlier ones.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V> From<Vec<(K, V)>> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}
