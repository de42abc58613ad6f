//! Insertion-ordered PDF dictionaries.
//!
//! Key order has no meaning in PDF, but keeping it makes output stable and
//! diffable, so dictionaries are backed by an [`IndexMap`].

use crate::object::{Object, ObjectRef};
use indexmap::IndexMap;

/// A PDF dictionary mapping names (without the leading `/`) to objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<String, Object>,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dictionary with `/Type` set.
    pub fn typed(type_name: &str) -> Self {
        let mut dict = Self::new();
        dict.put("Type", Object::name(type_name));
        dict
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    /// Look up a value mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.entries.get_mut(key)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Object>) -> Option<Object> {
        self.entries.insert(key.into(), value.into())
    }

    /// Consuming variant of [`put`](Self::put) for building dictionaries inline.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Object>) -> Self {
        self.put(key, value);
        self
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.shift_remove(key)
    }

    /// Check whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Copy every entry of `other` into this dictionary, overwriting existing keys.
    pub fn merge(&mut self, other: &Dictionary) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Copy only the entries of `other` whose keys are absent here.
    pub fn merge_missing(&mut self, other: &Dictionary) {
        for (key, value) in &other.entries {
            if !self.entries.contains_key(key) {
                self.entries.insert(key.clone(), value.clone());
            }
        }
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter()
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Iterate mutably over values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.entries.values_mut()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of `/Type` as a name, if present.
    pub fn type_name(&self) -> Option<&str> {
        self.get("Type").and_then(Object::as_name)
    }

    /// Value of `key` as a reference, if it is one.
    pub fn get_reference(&self, key: &str) -> Option<ObjectRef> {
        self.get(key).and_then(Object::as_reference)
    }

    /// Value of `key` as a name, if it is one.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }
}

impl FromIterator<(String, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (String, Object)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Dictionary {
    type Item = (String, Object);
    type IntoIter = indexmap::map::IntoIter<String, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a String, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, String, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
