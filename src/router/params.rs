use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::FrameworkError;

/// Maximum number of route parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage.
///
/// Names are `Arc<str>` shared with the compiled route; values are per-request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Parameters captured by one route match.
///
/// Each name appears at most once. When a pattern repeats a name, the last
/// capture overwrites the earlier one in place. Parameters inside optional groups
/// that did not match are absent, never empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(ParamVec);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`Params::get`], but a missing parameter is an error.
    pub fn require(&self, name: &str) -> Result<&str, FrameworkError> {
        self.get(name).ok_or_else(|| FrameworkError::MissingParam {
            name: name.to_string(),
        })
    }

    /// Insert or overwrite `name`, keeping its position when it already exists.
    pub fn set(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.0.iter().position(|(k, _)| k.as_ref() == name)?;
        Some(self.0.remove(pos).1)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Values in declaration order, for positional use.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to a `HashMap`. Allocates; prefer [`Params::get`].
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_in_place() {
        let mut params = Params::new();
        params.set("org", "1");
        params.set("user", "2");
        params.set("org", "3");
        assert_eq!(params.values().collect::<Vec<_>>(), vec!["3", "2"]);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_require_reports_missing_name() {
        let params: Params = [("id", "7")].into_iter().collect();
        assert_eq!(params.require("id").unwrap(), "7");
        assert_eq!(
            params.require("slug"),
            Err(FrameworkError::MissingParam {
                name: "slug".to_string()
            })
        );
    }

    #[test]
    fn test_remove_and_map() {
        let mut params: Params = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(params.remove("a"), Some("1".to_string()));
        assert!(!params.contains("a"));
        assert_eq!(params.to_map().get("b").map(String::as_str), Some("2"));
    }
}
