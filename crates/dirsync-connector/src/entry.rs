//! Entry data model
//!
//! An [`Entry`] is the attribute-level view of one logical identity as seen
//! from either the source or the destination side. All values are strings;
//! multivalued attributes keep their order as delivered by the service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pivot identifier for an entry in a source or destination system.
///
/// Different systems use different pivot schemes:
/// - LDAP directory: Distinguished Name or a naming attribute
/// - Database: primary key column value
/// - Flat file: a designated key column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    /// The attribute name used as the pivot (e.g., "dn", "uid", "id").
    attribute: String,
    /// The pivot value.
    value: String,
}

impl EntryKey {
    /// Create a new key with the given pivot attribute name and value.
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Get the pivot attribute name.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Get the pivot value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.attribute, self.value)
    }
}

/// A set of named, multivalued string attributes representing one entry.
///
/// Attribute names are unique. An attribute mapped to an empty value list
/// is distinct from an absent attribute only in write plans, where it means
/// "remove this attribute"; for comparisons the two are equivalent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(flatten)]
    attributes: HashMap<String, Vec<String>>,
}

impl Entry {
    /// Create a new empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute to the given values, replacing any previous values.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attributes.insert(name.into(), values);
    }

    /// Set a multivalued attribute using the builder pattern.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, values: Vec<&str>) -> Self {
        self.set(name, values.into_iter().map(str::to_string).collect());
        self
    }

    /// Set a single-valued attribute using the builder pattern.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, vec![value.into()]);
        self
    }

    /// Get all values of an attribute.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Get the first value of an attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Check if an attribute is present with at least one value.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Remove an attribute, returning its previous values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.attributes.remove(name)
    }

    /// Get all attribute names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Iterate over all attributes and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.attributes.iter()
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the entry carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for Entry {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}
